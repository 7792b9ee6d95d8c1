//! Policy reload endpoint
//!
//! POST /admin/reload re-reads the policy source and publishes the new table.
//! Calls already in flight finish against the snapshot they started with.

use crate::error::AppError;
use crate::handlers::AppState;
use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ReloadResponse {
    pub status: String,
    pub models: usize,
    pub rules: usize,
}

/// POST /admin/reload handler
///
/// Policy sources do blocking file I/O, so the reload runs on the blocking
/// pool. A failed reload leaves the current policy in place.
pub async fn handler(State(state): State<AppState>) -> Result<Json<ReloadResponse>, AppError> {
    let router = state.router().clone();
    let table = tokio::task::spawn_blocking(move || router.reload())
        .await
        .map_err(|e| AppError::Internal(format!("Policy reload task failed: {}", e)))??;

    Ok(Json(ReloadResponse {
        status: "reloaded".to_string(),
        models: table.target_count(),
        rules: table.rules().len(),
    }))
}
