//! Request feature extraction
//!
//! Turns a caller's [`RequestDescriptor`] into a [`FeatureSummary`], the only
//! input the selector looks at. Extraction is pure: no I/O, no shared state,
//! and identical input always yields an identical summary.
//!
//! The extractor sits behind the [`FeatureExtractor`] trait so the heuristics
//! can be replaced (for example with a real tokenizer) without touching the
//! selector.

mod heuristic;

pub use heuristic::{ExtractorSettings, HeuristicExtractor};

use crate::policy::{Complexity, LanguageClass, SizeClass, TaskKind, TenantTier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Caller input for one routed request
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RequestDescriptor {
    /// Raw request text used for classification
    pub text: String,
    #[serde(default)]
    pub task: TaskKind,
    /// Known size of the surrounding context, if the caller tracks it
    #[serde(default)]
    pub context_tokens: Option<usize>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub tenant_tier: TenantTier,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl RequestDescriptor {
    /// Create a chat request for the standard tier
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_task(mut self, task: TaskKind) -> Self {
        self.task = task;
        self
    }

    pub fn with_context_tokens(mut self, tokens: usize) -> Self {
        self.context_tokens = Some(tokens);
        self
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_tier(mut self, tier: TenantTier) -> Self {
        self.tenant_tier = tier;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Normalized characterization of one request
///
/// Produced once per request and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeatureSummary {
    pub task: TaskKind,
    /// Heuristic token estimate of the request text
    pub token_count: usize,
    pub size_class: SizeClass,
    pub language: LanguageClass,
    pub complexity: Complexity,
    /// Caller-supplied context size, 0 when unknown
    pub context_tokens: usize,
    pub tenant_tier: TenantTier,
}

/// Derives a [`FeatureSummary`] from a request
///
/// Implementations must be deterministic and side-effect free; the router
/// calls them concurrently from many tasks.
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, request: &RequestDescriptor) -> FeatureSummary;
}
