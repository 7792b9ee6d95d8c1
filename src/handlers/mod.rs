//! HTTP request handlers for the modelroute API

use crate::error::{AppError, AppResult, BackendError};
use crate::metrics::Metrics;
use crate::router::ModelRouter;
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

pub mod chat;
pub mod embed;
pub mod health;
pub mod metrics;
pub mod reload;

/// Upper bound for one routed call when the config does not set one
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Application state shared across all handlers
///
/// All fields are Arc'd for cheap cloning across Axum handlers.
#[derive(Clone)]
pub struct AppState {
    router: Arc<ModelRouter>,
    metrics: Arc<Metrics>,
    request_timeout: Duration,
}

impl AppState {
    pub fn new(router: Arc<ModelRouter>, metrics: Arc<Metrics>) -> Self {
        Self {
            router,
            metrics,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Bound each routed call, retries and failover included
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn router(&self) -> &Arc<ModelRouter> {
        &self.router
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

/// Run a routed call under the request deadline
///
/// Dropping the call future on expiry abandons any pending backoff or
/// in-flight attempt.
pub(crate) async fn with_deadline<T>(
    timeout: Duration,
    target: &str,
    call: impl std::future::Future<Output = AppResult<T>>,
) -> AppResult<T> {
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| AppError::Backend {
            target: target.to_string(),
            source: BackendError::Other(format!(
                "request deadline of {}s elapsed",
                timeout.as_secs_f64()
            )),
        })?
}

/// Build the HTTP application with every route mounted
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat::handler))
        .route("/embed", post(embed::handler))
        .route("/health", get(health::handler))
        .route("/metrics", get(metrics::handler))
        .route("/admin/reload", post(reload::handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
