//! Routable backend model targets

use super::{CallParams, TaskKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backend provider family
///
/// Deserializes from a plain string. Names that are not recognised are kept
/// as `Unknown` so that loading succeeds and the dispatcher can reject them
/// with a clear error when the target is actually selected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum ProviderKind {
    Anthropic,
    Bedrock,
    Gemini,
    /// OpenAI-compatible endpoint (self-hosted or hosted)
    OpenAi,
    Unknown(String),
}

impl ProviderKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Anthropic => "anthropic",
            Self::Bedrock => "bedrock",
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Unknown(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl From<String> for ProviderKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "anthropic" => Self::Anthropic,
            "bedrock" => Self::Bedrock,
            "gemini" => Self::Gemini,
            "openai" => Self::OpenAi,
            _ => Self::Unknown(name),
        }
    }
}

impl From<&str> for ProviderKind {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl From<ProviderKind> for String {
    fn from(kind: ProviderKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relative cost of a target (descriptive only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CostTier {
    Low,
    #[default]
    Medium,
    High,
}

/// Bounded retry applied to throttled calls against one target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    2
}

fn default_backoff_ms() -> u64 {
    200
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_ms: u64) -> Self {
        Self {
            max_attempts,
            backoff_ms,
        }
    }

    /// Total attempts allowed, including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff_ms(&self) -> u64 {
        self.backoff_ms
    }

    /// Wait between two attempts
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// One routable backend model configuration
///
/// Fields are private; instances come from deserialization or the builder
/// methods below and are validated when assembled into a `PolicyTable`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelTarget {
    id: String,
    provider: ProviderKind,
    #[serde(rename = "type")]
    task: TaskKind,
    model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_context_tokens: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_chunk_tokens: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    languages: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    strengths: Option<Vec<String>>,
    #[serde(default)]
    cost_tier: CostTier,
    #[serde(default)]
    default_params: CallParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    backup_model_id: Option<String>,
    #[serde(default)]
    retry_policy: RetryPolicy,
}

impl ModelTarget {
    /// Create a target with default retry policy and no limits
    pub fn new(
        id: impl Into<String>,
        provider: impl Into<ProviderKind>,
        model_id: impl Into<String>,
        task: TaskKind,
    ) -> Self {
        Self {
            id: id.into(),
            provider: provider.into(),
            task,
            model_id: model_id.into(),
            max_context_tokens: None,
            max_chunk_tokens: None,
            languages: None,
            strengths: None,
            cost_tier: CostTier::default(),
            default_params: CallParams::new(),
            backup_model_id: None,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_max_context_tokens(mut self, max: usize) -> Self {
        self.max_context_tokens = Some(max);
        self
    }

    pub fn with_max_chunk_tokens(mut self, max: usize) -> Self {
        self.max_chunk_tokens = Some(max);
        self
    }

    pub fn with_backup(mut self, backup_id: impl Into<String>) -> Self {
        self.backup_model_id = Some(backup_id.into());
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.default_params.insert(name.into(), value);
        self
    }

    pub fn with_cost_tier(mut self, tier: CostTier) -> Self {
        self.cost_tier = tier;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn provider(&self) -> &ProviderKind {
        &self.provider
    }

    pub fn task(&self) -> TaskKind {
        self.task
    }

    /// Backend-specific model identifier sent to the provider
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn max_context_tokens(&self) -> Option<usize> {
        self.max_context_tokens
    }

    pub fn max_chunk_tokens(&self) -> Option<usize> {
        self.max_chunk_tokens
    }

    pub fn languages(&self) -> Option<&[String]> {
        self.languages.as_deref()
    }

    pub fn strengths(&self) -> Option<&[String]> {
        self.strengths.as_deref()
    }

    pub fn cost_tier(&self) -> CostTier {
        self.cost_tier
    }

    pub fn default_params(&self) -> &CallParams {
        &self.default_params
    }

    pub fn backup_model_id(&self) -> Option<&str> {
        self.backup_model_id.as_deref()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }
}
