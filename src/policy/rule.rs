//! Conditional routing rules

use super::{CallParams, Complexity, LanguageClass, TaskKind, TenantTier};
use serde::{Deserialize, Serialize};

/// Half-open numeric range: `gte` inclusive, `lt` exclusive, both optional
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct TokenRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<usize>,
}

impl TokenRange {
    pub fn new(gte: Option<usize>, lt: Option<usize>) -> Self {
        Self { gte, lt }
    }

    pub fn at_least(gte: usize) -> Self {
        Self::new(Some(gte), None)
    }

    pub fn below(lt: usize) -> Self {
        Self::new(None, Some(lt))
    }

    pub fn contains(&self, value: usize) -> bool {
        self.gte.is_none_or(|lo| value >= lo) && self.lt.is_none_or(|hi| value < hi)
    }

    /// A range whose lower bound is not below its upper bound matches nothing
    pub fn is_empty(&self) -> bool {
        matches!((self.gte, self.lt), (Some(lo), Some(hi)) if lo >= hi)
    }
}

/// Conditions a request must meet for a rule to apply
///
/// Every field is optional; an unset field places no constraint on the match.
/// An empty `tenant_tier` list is treated the same as an unset one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct RuleCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<TaskKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<Complexity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<LanguageClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_tier: Option<Vec<TenantTier>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_tokens: Option<TokenRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_tokens: Option<TokenRange>,
}

impl RuleCondition {
    /// Condition with every field unset (matches any request)
    pub fn any() -> Self {
        Self::default()
    }

    pub fn task(mut self, task: TaskKind) -> Self {
        self.task_type = Some(task);
        self
    }

    pub fn complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = Some(complexity);
        self
    }

    pub fn language(mut self, language: LanguageClass) -> Self {
        self.language = Some(language);
        self
    }

    pub fn tiers(mut self, tiers: impl IntoIterator<Item = TenantTier>) -> Self {
        self.tenant_tier = Some(tiers.into_iter().collect());
        self
    }

    pub fn context_tokens(mut self, range: TokenRange) -> Self {
        self.context_tokens = Some(range);
        self
    }

    pub fn chunk_tokens(mut self, range: TokenRange) -> Self {
        self.chunk_tokens = Some(range);
        self
    }

    /// True if no field is set
    pub fn is_wildcard(&self) -> bool {
        self.task_type.is_none()
            && self.complexity.is_none()
            && self.language.is_none()
            && self.tenant_tier.as_ref().is_none_or(|t| t.is_empty())
            && self.context_tokens.is_none()
            && self.chunk_tokens.is_none()
    }
}

/// Ordered routing table entry
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RoutingRule {
    id: String,
    #[serde(default)]
    when: RuleCondition,
    use_model: String,
    #[serde(default)]
    override_params: CallParams,
}

impl RoutingRule {
    pub fn new(id: impl Into<String>, when: RuleCondition, use_model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            when,
            use_model: use_model.into(),
            override_params: CallParams::new(),
        }
    }

    pub fn with_override(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.override_params.insert(name.into(), value);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn condition(&self) -> &RuleCondition {
        &self.when
    }

    /// Id of the target this rule routes to
    pub fn target_id(&self) -> &str {
        &self.use_model
    }

    pub fn override_params(&self) -> &CallParams {
        &self.override_params
    }
}
