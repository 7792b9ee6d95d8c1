//! Routing policy data model
//!
//! A [`PolicyTable`] holds every routable [`ModelTarget`], the ordered
//! [`RoutingRule`]s evaluated against each request, and the default target per
//! task kind. Tables are immutable once built; reloading produces a new table.

pub mod rule;
pub mod table;
pub mod target;

pub use rule::{RoutingRule, RuleCondition, TokenRange};
pub use table::{DefaultTargets, ModelsDocument, PolicyTable, RulesDocument};
pub use target::{CostTier, ModelTarget, ProviderKind, RetryPolicy};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Call parameters passed to a provider (option name to value)
///
/// Ordered so that merged parameters log and serialize deterministically.
pub type CallParams = BTreeMap<String, serde_json::Value>;

/// Kind of work a target serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    #[default]
    Chat,
    Embedding,
}

impl TaskKind {
    /// Convert to string representation for logging and metrics labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Embedding => "embedding",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(Self::Chat),
            "embedding" => Ok(Self::Embedding),
            other => Err(format!(
                "unknown task kind '{}' (expected 'chat' or 'embedding')",
                other
            )),
        }
    }
}

/// Tenant service tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TenantTier {
    Free,
    #[default]
    Standard,
    Premium,
    Internal,
}

impl TenantTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Standard => "standard",
            Self::Premium => "premium",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for TenantTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TenantTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "standard" => Ok(Self::Standard),
            "premium" => Ok(Self::Premium),
            "internal" => Ok(Self::Internal),
            other => Err(format!(
                "unknown tenant tier '{}' (expected free, standard, premium or internal)",
                other
            )),
        }
    }
}

/// Request complexity, ordered low to high
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    #[default]
    Low,
    Medium,
    High,
}

/// Script composition of the request text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LanguageClass {
    /// Primarily single-script (ASCII) text
    #[default]
    En,
    /// Mixed or non-ASCII text
    Multi,
}

/// Token-count band, ordered small to large
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    #[default]
    Small,
    Medium,
    Large,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_kind_default() {
        assert_eq!(TaskKind::default(), TaskKind::Chat);
    }

    #[test]
    fn test_tenant_tier_default() {
        assert_eq!(TenantTier::default(), TenantTier::Standard);
    }

    #[test]
    fn test_task_kind_serde() {
        assert_eq!(
            serde_json::from_str::<TaskKind>(r#""embedding""#).unwrap(),
            TaskKind::Embedding
        );
        assert_eq!(serde_json::to_string(&TaskKind::Chat).unwrap(), r#""chat""#);
    }

    #[test]
    fn test_tenant_tier_serde() {
        assert_eq!(
            serde_json::from_str::<TenantTier>(r#""premium""#).unwrap(),
            TenantTier::Premium
        );
        assert!(serde_json::from_str::<TenantTier>(r#""gold""#).is_err());
    }

    #[test]
    fn test_language_class_serde() {
        assert_eq!(
            serde_json::from_str::<LanguageClass>(r#""en""#).unwrap(),
            LanguageClass::En
        );
        assert_eq!(
            serde_json::from_str::<LanguageClass>(r#""multi""#).unwrap(),
            LanguageClass::Multi
        );
    }

    #[test]
    fn test_complexity_ordering() {
        assert!(Complexity::Low < Complexity::Medium);
        assert!(Complexity::Medium < Complexity::High);
        assert!(SizeClass::Small < SizeClass::Large);
    }

    #[test]
    fn test_from_str_rejects_unknown() {
        assert_eq!("chat".parse::<TaskKind>(), Ok(TaskKind::Chat));
        assert!("completion".parse::<TaskKind>().is_err());
        assert_eq!("internal".parse::<TenantTier>(), Ok(TenantTier::Internal));
        assert!("vip".parse::<TenantTier>().is_err());
    }
}
