//! Health check endpoint
//!
//! Provides a simple health check for monitoring and load balancers.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::handlers::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: &'static str,
    /// Targets in the active policy
    pub models: usize,
    /// Rules in the active policy
    pub rules: usize,
}

/// Health check handler
///
/// Always 200 OK; the counts describe the policy snapshot currently served.
pub async fn handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let snapshot = state.router().snapshot();
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "OK",
            models: snapshot.target_count(),
            rules: snapshot.rules().len(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support;
    use crate::policy::{DefaultTargets, ModelTarget, PolicyTable, RoutingRule, RuleCondition, TaskKind};

    #[tokio::test]
    async fn test_health_handler_returns_ok() {
        let (status, Json(body)) = handler(State(test_support::state())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "OK");
        assert_eq!(body.models, 2);
        assert_eq!(body.rules, 0);
    }

    #[tokio::test]
    async fn test_health_reflects_replaced_policy() {
        let state = test_support::state();
        let table = PolicyTable::new(
            vec![ModelTarget::new("only", "gemini", "gemini-2.0-flash", TaskKind::Chat)],
            vec![RoutingRule::new("all", RuleCondition::any(), "only")],
            DefaultTargets::default(),
        )
        .unwrap();
        state.router().replace_policy(table);

        let (_, Json(body)) = handler(State(state)).await;
        assert_eq!(body.models, 1);
        assert_eq!(body.rules, 1);
    }
}
