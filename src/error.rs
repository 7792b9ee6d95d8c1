//! Error types for modelroute
//!
//! `AppError` is the taxonomy surfaced to callers. `BackendError` is what a
//! provider capability reports; the resilient invoker classifies it as
//! transient (retried) or fatal (propagated) via [`BackendError::classify`].
//! All `AppError`s implement `IntoResponse` for Axum handlers.

use crate::policy::TaskKind;
use crate::providers::OperationKind;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read configuration file {path}: {source}")]
    ConfigFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file {path}: {reason}")]
    ConfigParseFailed { path: String, reason: String },

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("No routing rule matched and no default {task} target is configured")]
    NoDefaultConfigured { task: TaskKind },

    #[error("Request needs {requested} {limit} but model {target} allows at most {maximum}")]
    CapacityExceeded {
        target: String,
        limit: CapacityLimit,
        requested: usize,
        maximum: usize,
    },

    #[error("Model {target} uses unsupported provider '{provider}'")]
    UnsupportedProvider { target: String, provider: String },

    #[error("{operation} called on model {target}, which serves {task} requests")]
    TypeMismatch {
        target: String,
        task: TaskKind,
        operation: OperationKind,
    },

    #[error(
        "Model {target} throttled on all {attempts} attempts and has no backup_model_id configured (last error: {last_error})"
    )]
    ExhaustedNoBackup {
        target: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Backup model {backup} for {target} not found in the active policy")]
    BackupNotFound { target: String, backup: String },

    #[error("Model {primary} and backup {backup} both throttled (last error: {last_error})")]
    BothExhausted {
        primary: String,
        backup: String,
        last_error: String,
    },

    #[error("Backend call to {target} failed: {source}")]
    Backend {
        target: String,
        #[source]
        source: BackendError,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Which declared limit a request ran into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityLimit {
    /// `max_context_tokens` on chat targets
    ContextTokens,
    /// `max_chunk_tokens` on embedding targets
    ChunkTokens,
}

impl std::fmt::Display for CapacityLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ContextTokens => f.write_str("context tokens"),
            Self::ChunkTokens => f.write_str("chunk tokens"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) | Self::TypeMismatch { .. } => StatusCode::BAD_REQUEST,
            Self::CapacityExceeded { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Config(_)
            | Self::ConfigFileRead { .. }
            | Self::ConfigParseFailed { .. }
            | Self::NoDefaultConfigured { .. }
            | Self::UnsupportedProvider { .. }
            | Self::BackupNotFound { .. }
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ExhaustedNoBackup { .. } | Self::BothExhausted { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Backend { .. } => StatusCode::BAD_GATEWAY,
        };

        let body = Json(serde_json::json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;

/// Failure reported by a provider capability
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Provider signalled rate limiting structurally (HTTP 429 and friends)
    #[error("{provider} throttled the request: {message}")]
    Throttled { provider: String, message: String },

    #[error("{provider} returned HTTP {status}: {message}")]
    Http {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Transport error talking to {provider}: {message}")]
    Transport { provider: String, message: String },

    #[error("{provider} returned an unexpected response: {message}")]
    InvalidResponse { provider: String, message: String },

    #[error("{provider} does not support {operation}")]
    Unsupported {
        provider: String,
        operation: OperationKind,
    },

    #[error("{0}")]
    Other(String),
}

/// Outcome of classifying a backend failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Throttling; retried per the target's retry policy
    Transient,
    /// Everything else; propagated on first occurrence
    Fatal,
}

/// Message fragments that mark a failure as throttling.
///
/// This is a heuristic boundary, not a structural one: it only applies to
/// failures that carry no structured kind (see [`BackendError::classify`]).
pub const THROTTLING_KEYWORDS: [&str; 4] = [
    "throttling",
    "rate limit",
    "too many requests",
    "tokens per minute",
];

impl BackendError {
    /// Classify this failure as transient (throttling) or fatal
    ///
    /// Structured kinds win: `Throttled` is always transient, `Unsupported`
    /// and `InvalidResponse` are always fatal. Remaining kinds fall back to a
    /// case-insensitive keyword match on the message.
    pub fn classify(&self) -> FailureClass {
        match self {
            Self::Throttled { .. } => FailureClass::Transient,
            Self::Unsupported { .. } | Self::InvalidResponse { .. } => FailureClass::Fatal,
            Self::Http { .. } | Self::Transport { .. } | Self::Other(_) => {
                if mentions_throttling(&self.to_string()) {
                    FailureClass::Transient
                } else {
                    FailureClass::Fatal
                }
            }
        }
    }

    /// Returns true if this failure is retried by the invoker
    pub fn is_transient(&self) -> bool {
        self.classify() == FailureClass::Transient
    }
}

/// Keyword fallback classifier for unstructured failure messages
pub fn mentions_throttling(message: &str) -> bool {
    let lowered = message.to_lowercase();
    THROTTLING_KEYWORDS.iter().any(|k| lowered.contains(k))
}
