//! Embedding endpoint handler

use crate::error::AppError;
use crate::features::RequestDescriptor;
use crate::handlers::{AppState, with_deadline};
use crate::policy::{TaskKind, TenantTier};
use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Embedding request from client
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbedRequest {
    pub text: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub tenant_tier: TenantTier,
}

impl EmbedRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.text.trim().is_empty() {
            return Err(AppError::Validation(
                "text cannot be empty or contain only whitespace".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_descriptor(&self) -> RequestDescriptor {
        RequestDescriptor {
            text: self.text.clone(),
            task: TaskKind::Embedding,
            tenant_id: self.tenant_id.clone(),
            tenant_tier: self.tenant_tier,
            ..RequestDescriptor::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub model_id: String,
    pub embedding: Vec<f32>,
    /// Provider response body, unmodified
    pub raw: serde_json::Value,
    pub request_id: Uuid,
}

/// POST /embed handler
pub async fn handler(
    State(state): State<AppState>,
    Json(request): Json<EmbedRequest>,
) -> Result<Json<EmbedResponse>, AppError> {
    request.validate()?;
    let request_id = Uuid::new_v4();

    let handle = state.router().select_target(&request.to_descriptor())?;
    let answered = with_deadline(
        state.request_timeout(),
        handle.target_id(),
        handle.embed(request.text.as_str()),
    )
    .await?;

    tracing::info!(
        request_id = %request_id,
        target_id = %answered.target_id(),
        model_id = %answered.model_id(),
        failed_over = answered.failed_over(),
        dimensions = answered.reply.vector.len(),
        "Embedding request completed"
    );

    Ok(Json(EmbedResponse {
        model_id: answered.model_id().to_string(),
        embedding: answered.reply.vector,
        raw: answered.reply.raw,
        request_id,
    }))
}
