//! Rule matching against the policy table
//!
//! Selection is pure CPU logic over an immutable [`PolicyTable`]:
//! 1. Rules are tried in table order; the first rule whose every set
//!    condition agrees with the features wins.
//! 2. Without a match, the default target for the task kind is used.
//! 3. The chosen target's declared limits are enforced before the selection
//!    is returned. Oversized requests are rejected, never truncated.

use crate::error::{AppError, AppResult, CapacityLimit};
use crate::features::FeatureSummary;
use crate::policy::{CallParams, ModelTarget, PolicyTable, RuleCondition, TaskKind};
use serde::Serialize;

/// How a selection was reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum SelectionSource {
    /// Matched the rule with this id
    Rule(String),
    /// No rule matched; the task kind's default target was used
    Default,
    /// Backup of the target with this id after it exhausted its retries
    Failover(String),
}

impl SelectionSource {
    /// Label for metrics and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rule(_) => "rule",
            Self::Default => "default",
            Self::Failover(_) => "failover",
        }
    }
}

/// Chosen target plus the parameters it will be called with
#[derive(Debug, Clone, Serialize)]
pub struct Selection {
    target: ModelTarget,
    params: CallParams,
    source: SelectionSource,
    features: FeatureSummary,
}

impl Selection {
    pub fn target(&self) -> &ModelTarget {
        &self.target
    }

    /// Target defaults merged with the matched rule's overrides
    pub fn params(&self) -> &CallParams {
        &self.params
    }

    pub fn source(&self) -> &SelectionSource {
        &self.source
    }

    /// Features this selection was made for
    pub fn features(&self) -> &FeatureSummary {
        &self.features
    }

    /// Fresh selection for a backup target
    ///
    /// Uses the backup's own default parameters; overrides from the rule that
    /// picked the primary are not inherited. Capacity is checked against the
    /// backup's limits.
    pub(crate) fn for_backup(&self, backup: &ModelTarget) -> AppResult<Self> {
        ensure_capacity(backup, &self.features)?;
        Ok(Self {
            target: backup.clone(),
            params: backup.default_params().clone(),
            source: SelectionSource::Failover(self.target.id().to_string()),
            features: self.features,
        })
    }
}

/// Select a target for the given features
///
/// # Errors
/// - `AppError::NoDefaultConfigured` if nothing matched and the task kind has
///   no default target
/// - `AppError::CapacityExceeded` if the chosen target cannot take the request
pub fn select(features: &FeatureSummary, table: &PolicyTable) -> AppResult<Selection> {
    for rule in table.rules() {
        if !condition_matches(rule.condition(), features) {
            continue;
        }
        // Rule targets are checked when the table is built
        let target = table.target(rule.target_id()).ok_or_else(|| {
            AppError::Internal(format!(
                "Rule '{}' references model '{}' missing from the policy table",
                rule.id(),
                rule.target_id()
            ))
        })?;
        ensure_capacity(target, features)?;

        tracing::debug!(
            rule_id = %rule.id(),
            target_id = %target.id(),
            task = %features.task,
            complexity = ?features.complexity,
            tier = %features.tenant_tier,
            "Routing rule matched"
        );
        return Ok(Selection {
            target: target.clone(),
            params: merge_params(target.default_params(), rule.override_params()),
            source: SelectionSource::Rule(rule.id().to_string()),
            features: *features,
        });
    }

    let target = table
        .default_target(features.task)
        .ok_or(AppError::NoDefaultConfigured {
            task: features.task,
        })?;
    ensure_capacity(target, features)?;

    tracing::debug!(
        target_id = %target.id(),
        task = %features.task,
        "No routing rule matched, using default target"
    );
    Ok(Selection {
        target: target.clone(),
        params: target.default_params().clone(),
        source: SelectionSource::Default,
        features: *features,
    })
}

/// True if every set field of the condition agrees with the features
pub fn condition_matches(condition: &RuleCondition, features: &FeatureSummary) -> bool {
    condition.task_type.is_none_or(|t| t == features.task)
        && condition
            .complexity
            .is_none_or(|c| c == features.complexity)
        && condition.language.is_none_or(|l| l == features.language)
        && condition
            .tenant_tier
            .as_ref()
            .is_none_or(|tiers| tiers.is_empty() || tiers.contains(&features.tenant_tier))
        && condition
            .context_tokens
            .is_none_or(|r| r.contains(features.context_tokens))
        && condition
            .chunk_tokens
            .is_none_or(|r| r.contains(features.token_count))
}

/// `defaults ∪ overrides`, overrides winning on key collision
pub fn merge_params(defaults: &CallParams, overrides: &CallParams) -> CallParams {
    let mut merged = defaults.clone();
    merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Reject requests above the target's declared limit for the task kind
///
/// A value equal to the limit is accepted.
pub fn ensure_capacity(target: &ModelTarget, features: &FeatureSummary) -> AppResult<()> {
    let (limit, requested, maximum) = match features.task {
        TaskKind::Chat => (
            CapacityLimit::ContextTokens,
            features.context_tokens,
            target.max_context_tokens(),
        ),
        TaskKind::Embedding => (
            CapacityLimit::ChunkTokens,
            features.token_count,
            target.max_chunk_tokens(),
        ),
    };

    match maximum {
        Some(maximum) if requested > maximum => {
            tracing::warn!(
                target_id = %target.id(),
                limit = %limit,
                requested = requested,
                maximum = maximum,
                "Request exceeds target capacity"
            );
            Err(AppError::CapacityExceeded {
                target: target.id().to_string(),
                limit,
                requested,
                maximum,
            })
        }
        _ => Ok(()),
    }
}
