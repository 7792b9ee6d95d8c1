//! Immutable policy table assembled from the models and rules documents

use super::{ModelTarget, RoutingRule, TaskKind};
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Models document: `{"models": [ ... ]}`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ModelsDocument {
    #[serde(default)]
    pub models: Vec<ModelTarget>,
}

/// Rules document: `{"rules": [ ... ], "defaults": {"chat": .., "embedding": ..}}`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RulesDocument {
    #[serde(default)]
    pub rules: Vec<RoutingRule>,
    #[serde(default)]
    pub defaults: DefaultTargets,
}

/// Fallback target id per task kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DefaultTargets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<String>,
}

impl DefaultTargets {
    pub fn new(chat: Option<&str>, embedding: Option<&str>) -> Self {
        Self {
            chat: chat.map(str::to_string),
            embedding: embedding.map(str::to_string),
        }
    }

    pub fn get(&self, task: TaskKind) -> Option<&str> {
        match task {
            TaskKind::Chat => self.chat.as_deref(),
            TaskKind::Embedding => self.embedding.as_deref(),
        }
    }
}

/// Validated, immutable routing policy
///
/// Rule order is preserved exactly as loaded; it is part of the contract.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    targets: HashMap<String, ModelTarget>,
    rules: Vec<RoutingRule>,
    defaults: DefaultTargets,
}

impl PolicyTable {
    /// Assemble and validate a table
    ///
    /// # Errors
    /// Returns `AppError::Config` for duplicate or empty ids, rules or defaults
    /// that reference unknown targets, defaults whose target serves another
    /// task kind, self-referencing or task-incompatible backups, empty token
    /// ranges, zero capacity limits, and retry policies allowing zero attempts.
    pub fn new(
        targets: Vec<ModelTarget>,
        rules: Vec<RoutingRule>,
        defaults: DefaultTargets,
    ) -> AppResult<Self> {
        let mut by_id = HashMap::with_capacity(targets.len());
        for target in targets {
            if target.id().trim().is_empty() {
                return Err(AppError::Config(
                    "Model entry has an empty id. Every model needs a unique, non-empty id."
                        .to_string(),
                ));
            }
            if target.model_id().trim().is_empty() {
                return Err(AppError::Config(format!(
                    "Model '{}' has an empty model_id",
                    target.id()
                )));
            }
            if target.retry_policy().max_attempts() == 0 {
                return Err(AppError::Config(format!(
                    "Model '{}' has retry_policy.max_attempts=0. At least one attempt is required.",
                    target.id()
                )));
            }
            for (field, limit) in [
                ("max_context_tokens", target.max_context_tokens()),
                ("max_chunk_tokens", target.max_chunk_tokens()),
            ] {
                if limit == Some(0) {
                    return Err(AppError::Config(format!(
                        "Model '{}' has {}=0. Omit the field for no limit.",
                        target.id(),
                        field
                    )));
                }
            }
            if !target.provider().is_known() {
                tracing::warn!(
                    model = %target.id(),
                    provider = %target.provider(),
                    "Model uses an unrecognised provider; selecting it will fail"
                );
            }
            let id = target.id().to_string();
            if by_id.insert(id.clone(), target).is_some() {
                return Err(AppError::Config(format!(
                    "Duplicate model id '{}'. Model ids must be unique.",
                    id
                )));
            }
        }

        for target in by_id.values() {
            let Some(backup_id) = target.backup_model_id() else {
                continue;
            };
            if backup_id == target.id() {
                return Err(AppError::Config(format!(
                    "Model '{}' lists itself as backup_model_id",
                    target.id()
                )));
            }
            match by_id.get(backup_id) {
                Some(backup) if backup.task() != target.task() => {
                    return Err(AppError::Config(format!(
                        "Model '{}' ({}) has backup '{}' which serves {} requests",
                        target.id(),
                        target.task(),
                        backup_id,
                        backup.task()
                    )));
                }
                Some(_) => {}
                None => {
                    tracing::warn!(
                        model = %target.id(),
                        backup = %backup_id,
                        "backup_model_id does not match any configured model; \
                        failover from this model will fail"
                    );
                }
            }
        }

        let mut rule_ids = HashSet::with_capacity(rules.len());
        for rule in &rules {
            if rule.id().trim().is_empty() {
                return Err(AppError::Config(
                    "Routing rule has an empty id".to_string(),
                ));
            }
            if !rule_ids.insert(rule.id()) {
                return Err(AppError::Config(format!(
                    "Duplicate routing rule id '{}'",
                    rule.id()
                )));
            }
            if !by_id.contains_key(rule.target_id()) {
                return Err(AppError::Config(format!(
                    "Routing rule '{}' uses unknown model '{}'",
                    rule.id(),
                    rule.target_id()
                )));
            }
            let cond = rule.condition();
            for (name, range) in [
                ("context_tokens", cond.context_tokens),
                ("chunk_tokens", cond.chunk_tokens),
            ] {
                if range.is_some_and(|r| r.is_empty()) {
                    return Err(AppError::Config(format!(
                        "Routing rule '{}' has an empty {} range (gte must be below lt)",
                        rule.id(),
                        name
                    )));
                }
            }
        }

        for task in [TaskKind::Chat, TaskKind::Embedding] {
            let Some(default_id) = defaults.get(task) else {
                continue;
            };
            match by_id.get(default_id) {
                None => {
                    return Err(AppError::Config(format!(
                        "Default {} model '{}' is not a configured model",
                        task, default_id
                    )));
                }
                Some(target) if target.task() != task => {
                    return Err(AppError::Config(format!(
                        "Default {} model '{}' serves {} requests",
                        task,
                        default_id,
                        target.task()
                    )));
                }
                Some(_) => {}
            }
        }

        Ok(Self {
            targets: by_id,
            rules,
            defaults,
        })
    }

    /// Assemble from the two parsed configuration documents
    pub fn from_documents(models: ModelsDocument, rules: RulesDocument) -> AppResult<Self> {
        Self::new(models.models, rules.rules, rules.defaults)
    }

    pub fn target(&self, id: &str) -> Option<&ModelTarget> {
        self.targets.get(id)
    }

    pub fn targets(&self) -> impl Iterator<Item = &ModelTarget> {
        self.targets.values()
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Rules in evaluation order
    pub fn rules(&self) -> &[RoutingRule] {
        &self.rules
    }

    pub fn defaults(&self) -> &DefaultTargets {
        &self.defaults
    }

    pub fn default_target(&self, task: TaskKind) -> Option<&ModelTarget> {
        self.defaults.get(task).and_then(|id| self.targets.get(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{RetryPolicy, RuleCondition, TokenRange};

    fn chat(id: &str) -> ModelTarget {
        ModelTarget::new(id, "anthropic", format!("{}-model", id), TaskKind::Chat)
    }

    fn embed(id: &str) -> ModelTarget {
        ModelTarget::new(id, "bedrock", format!("{}-model", id), TaskKind::Embedding)
    }

    #[test]
    fn test_valid_table_builds() {
        let table = PolicyTable::new(
            vec![chat("a").with_backup("b"), chat("b"), embed("e")],
            vec![RoutingRule::new("r1", RuleCondition::any(), "a")],
            DefaultTargets::new(Some("b"), Some("e")),
        )
        .expect("should build table");

        assert_eq!(table.target_count(), 3);
        assert_eq!(table.rules().len(), 1);
        assert_eq!(table.default_target(TaskKind::Chat).unwrap().id(), "b");
        assert_eq!(table.default_target(TaskKind::Embedding).unwrap().id(), "e");
    }

    #[test]
    fn test_duplicate_model_id_rejected() {
        let err = PolicyTable::new(vec![chat("a"), chat("a")], vec![], DefaultTargets::default())
            .unwrap_err();
        assert!(err.to_string().contains("Duplicate model id 'a'"));
    }

    #[test]
    fn test_rule_with_unknown_target_rejected() {
        let err = PolicyTable::new(
            vec![chat("a")],
            vec![RoutingRule::new("r1", RuleCondition::any(), "missing")],
            DefaultTargets::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown model 'missing'"));
    }

    #[test]
    fn test_default_with_wrong_task_rejected() {
        let err = PolicyTable::new(
            vec![chat("a"), embed("e")],
            vec![],
            DefaultTargets::new(Some("e"), None),
        )
        .unwrap_err();
        assert!(err.to_string().contains("serves embedding requests"));
    }

    #[test]
    fn test_unknown_default_rejected() {
        let err = PolicyTable::new(vec![chat("a")], vec![], DefaultTargets::new(Some("z"), None))
            .unwrap_err();
        assert!(err.to_string().contains("'z' is not a configured model"));
    }

    #[test]
    fn test_self_backup_rejected() {
        let err = PolicyTable::new(
            vec![chat("a").with_backup("a")],
            vec![],
            DefaultTargets::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("lists itself"));
    }

    #[test]
    fn test_backup_with_other_task_rejected() {
        let err = PolicyTable::new(
            vec![chat("a").with_backup("e"), embed("e")],
            vec![],
            DefaultTargets::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("backup 'e'"));
    }

    #[test]
    fn test_dangling_backup_is_accepted() {
        let table = PolicyTable::new(
            vec![chat("a").with_backup("ghost")],
            vec![],
            DefaultTargets::default(),
        )
        .expect("dangling backups are reported at call time");
        assert_eq!(table.target("a").unwrap().backup_model_id(), Some("ghost"));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let err = PolicyTable::new(
            vec![chat("a").with_retry_policy(RetryPolicy::new(0, 10))],
            vec![],
            DefaultTargets::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("max_attempts=0"));
    }

    #[test]
    fn test_zero_capacity_limit_rejected() {
        let err = PolicyTable::new(
            vec![chat("a").with_max_context_tokens(0)],
            vec![],
            DefaultTargets::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Config(ref msg) if msg.contains("max_context_tokens=0")));

        let err = PolicyTable::new(
            vec![embed("e").with_max_chunk_tokens(0)],
            vec![],
            DefaultTargets::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("max_chunk_tokens=0"));
    }

    #[test]
    fn test_empty_range_rejected() {
        let err = PolicyTable::new(
            vec![chat("a")],
            vec![RoutingRule::new(
                "r1",
                RuleCondition::any().context_tokens(TokenRange::new(Some(10), Some(10))),
                "a",
            )],
            DefaultTargets::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("empty context_tokens range"));
    }

    #[test]
    fn test_rule_order_preserved() {
        let ids = ["z", "a", "m", "b"];
        let rules = ids
            .iter()
            .map(|id| RoutingRule::new(*id, RuleCondition::any(), "a"))
            .collect();
        let table = PolicyTable::new(vec![chat("a")], rules, DefaultTargets::default()).unwrap();
        let loaded: Vec<&str> = table.rules().iter().map(|r| r.id()).collect();
        assert_eq!(loaded, ids);
    }
}
