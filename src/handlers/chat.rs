//! Chat endpoint handler
//!
//! Handles POST /chat: routes the question through the policy table and
//! answers with the selected model.

use crate::error::AppError;
use crate::features::RequestDescriptor;
use crate::handlers::{AppState, with_deadline};
use crate::policy::{TaskKind, TenantTier};
use crate::providers::ChatTurn;
use axum::{Json, extract::State};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Maximum allowed question length in characters (100K chars)
const MAX_QUESTION_LENGTH: usize = 100_000;

/// Chat request from client
///
/// Validation is enforced during deserialization - invalid instances cannot exist.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    question: String,
    context_tokens: Option<usize>,
    tenant_id: Option<String>,
    tenant_tier: TenantTier,
    metadata: BTreeMap<String, serde_json::Value>,
    system: Option<String>,
}

impl ChatRequest {
    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }

    /// Request descriptor used for routing
    pub fn to_descriptor(&self) -> RequestDescriptor {
        RequestDescriptor {
            text: self.question.clone(),
            task: TaskKind::Chat,
            context_tokens: self.context_tokens,
            tenant_id: self.tenant_id.clone(),
            tenant_tier: self.tenant_tier,
            metadata: self.metadata.clone(),
        }
    }

    /// Conversation sent to the selected model
    pub fn to_turns(&self) -> Vec<ChatTurn> {
        let mut turns = Vec::with_capacity(2);
        if let Some(system) = &self.system {
            turns.push(ChatTurn::system(system.clone()));
        }
        turns.push(ChatTurn::user(self.question.clone()));
        turns
    }
}

impl<'de> Deserialize<'de> for ChatRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RawChatRequest {
            question: String,
            #[serde(default)]
            context_tokens: Option<usize>,
            #[serde(default)]
            tenant_id: Option<String>,
            #[serde(default)]
            tenant_tier: TenantTier,
            #[serde(default)]
            metadata: BTreeMap<String, serde_json::Value>,
            #[serde(default)]
            system: Option<String>,
        }

        let raw = RawChatRequest::deserialize(deserializer)?;

        if raw.question.trim().is_empty() {
            return Err(serde::de::Error::custom(
                "question cannot be empty or contain only whitespace",
            ));
        }

        // Characters, not bytes
        let char_count = raw.question.chars().count();
        if char_count > MAX_QUESTION_LENGTH {
            return Err(serde::de::Error::custom(format!(
                "question exceeds maximum length of {} characters (got {})",
                MAX_QUESTION_LENGTH, char_count
            )));
        }

        Ok(ChatRequest {
            question: raw.question,
            context_tokens: raw.context_tokens,
            tenant_id: raw.tenant_id,
            tenant_tier: raw.tenant_tier,
            metadata: raw.metadata,
            system: raw.system.filter(|s| !s.trim().is_empty()),
        })
    }
}

/// Chat response to client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    /// Provider model identifier that produced the answer
    pub model_id: String,
    /// Policy target id that was selected
    pub target: String,
    pub request_id: Uuid,
}

/// POST /chat handler
///
/// Latency is dominated by the backend call. With retries and failover the
/// worst case is bounded by the configured request timeout.
pub async fn handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let request_id = Uuid::new_v4();
    tracing::debug!(
        request_id = %request_id,
        question_length = request.question().len(),
        tenant_tier = %request.tenant_tier,
        has_system = request.system().is_some(),
        "Received chat request"
    );

    let handle = state.router().select_target(&request.to_descriptor())?;
    let answered = with_deadline(
        state.request_timeout(),
        handle.target_id(),
        handle.chat(request.to_turns()),
    )
    .await?;

    tracing::info!(
        request_id = %request_id,
        target_id = %answered.target_id(),
        model_id = %answered.model_id(),
        failed_over = answered.failed_over(),
        answer_length = answered.reply.text.len(),
        "Chat request completed"
    );

    Ok(Json(ChatResponse {
        model_id: answered.model_id().to_string(),
        target: answered.target_id().to_string(),
        answer: answered.reply.text,
        request_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{app, test_support};
    use crate::providers::MessageRole;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::json;
    use tower::ServiceExt;

    #[test]
    fn test_chat_request_deserializes_with_defaults() {
        let req: ChatRequest =
            serde_json::from_value(json!({"question": "Hello!"})).expect("should deserialize");

        assert_eq!(req.question(), "Hello!");
        assert!(req.system().is_none());
        let descriptor = req.to_descriptor();
        assert_eq!(descriptor.task, TaskKind::Chat);
        assert_eq!(descriptor.tenant_tier, TenantTier::Standard);
        assert!(descriptor.context_tokens.is_none());
    }

    #[test]
    fn test_chat_request_carries_routing_fields() {
        let req: ChatRequest = serde_json::from_value(json!({
            "question": "Summarize the contract",
            "context_tokens": 12000,
            "tenant_id": "tenant_123",
            "tenant_tier": "premium",
            "metadata": {"channel": "web"}
        }))
        .unwrap();

        let descriptor = req.to_descriptor();
        assert_eq!(descriptor.context_tokens, Some(12000));
        assert_eq!(descriptor.tenant_id.as_deref(), Some("tenant_123"));
        assert_eq!(descriptor.tenant_tier, TenantTier::Premium);
        assert_eq!(descriptor.metadata["channel"], json!("web"));
    }

    #[test]
    fn test_chat_request_rejects_whitespace_only_question() {
        let err = serde_json::from_value::<ChatRequest>(json!({"question": "   \n\t  "}))
            .unwrap_err()
            .to_string();
        assert!(err.contains("empty"), "got: {}", err);
    }

    #[test]
    fn test_chat_request_rejects_unknown_tier() {
        let result =
            serde_json::from_value::<ChatRequest>(json!({"question": "hi", "tenant_tier": "gold"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_chat_request_length_counts_characters() {
        let at_limit = "🦀".repeat(MAX_QUESTION_LENGTH);
        assert!(serde_json::from_value::<ChatRequest>(json!({"question": at_limit})).is_ok());

        let over = "字".repeat(MAX_QUESTION_LENGTH + 1);
        let err = serde_json::from_value::<ChatRequest>(json!({"question": over}))
            .unwrap_err()
            .to_string();
        assert!(err.contains("maximum length"), "got: {}", err);
    }

    #[test]
    fn test_system_prompt_becomes_leading_turn() {
        let req: ChatRequest = serde_json::from_value(json!({
            "question": "What is Rust?",
            "system": "Answer briefly."
        }))
        .unwrap();
        let turns = req.to_turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, MessageRole::System);
        assert_eq!(turns[1].role, MessageRole::User);
        assert_eq!(turns[1].content, "What is Rust?");
    }

    #[test]
    fn test_blank_system_prompt_is_dropped() {
        let req: ChatRequest =
            serde_json::from_value(json!({"question": "hi", "system": "  "})).unwrap();
        assert_eq!(req.to_turns().len(), 1);
    }

    #[tokio::test]
    async fn test_chat_endpoint_answers_with_selected_model() {
        let app = app(test_support::state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"question": "ping"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: ChatResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.answer, "ping");
        assert_eq!(body.model_id, "claude-3-5-haiku");
        assert_eq!(body.target, "chat-default");
    }

    #[tokio::test]
    async fn test_chat_endpoint_rejects_oversized_context() {
        let app = app(test_support::state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"question": "ping", "context_tokens": 8001}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(body["error"].as_str().unwrap().contains("chat-default"));
    }
}
