//! Anthropic Messages API capability

use super::http::Connection;
use super::{ChatReply, ChatTurn, MessageRole, param_f64, param_u64, split_system};
use crate::error::BackendError;
use crate::policy::CallParams;
use serde_json::{Value, json};

pub const PROVIDER: &str = "anthropic";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
const API_VERSION: &str = "2023-06-01";

const DEFAULT_MAX_TOKENS: u64 = 4096;
const DEFAULT_TEMPERATURE: f64 = 0.3;
const DEFAULT_TOP_P: f64 = 0.9;

/// Chat capability bound to one Anthropic model and its merged parameters
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    connection: Connection,
    model_id: String,
    params: CallParams,
}

impl AnthropicClient {
    pub fn new(connection: Connection, model_id: impl Into<String>, params: CallParams) -> Self {
        Self {
            connection,
            model_id: model_id.into(),
            params,
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub(crate) fn request_body(&self, turns: &[ChatTurn]) -> Value {
        let (system, conversation) = split_system(turns);
        let messages: Vec<Value> = conversation
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    MessageRole::Assistant => "assistant",
                    _ => "user",
                };
                json!({"role": role, "content": turn.content})
            })
            .collect();

        let mut body = json!({
            "model": self.model_id,
            "max_tokens": param_u64(&self.params, "max_tokens", DEFAULT_MAX_TOKENS),
            "temperature": param_f64(&self.params, "temperature", DEFAULT_TEMPERATURE),
            "top_p": param_f64(&self.params, "top_p", DEFAULT_TOP_P),
            "messages": messages,
        });
        if let Some(system) = system {
            body["system"] = Value::String(system);
        }
        body
    }

    pub async fn chat(&self, turns: &[ChatTurn]) -> Result<ChatReply, BackendError> {
        let url = self.connection.url(PROVIDER, &["v1", "messages"])?;
        let mut request = self
            .connection
            .http
            .post(url)
            .header("anthropic-version", API_VERSION);
        if let Some(key) = &self.connection.api_key {
            request = request.header("x-api-key", key);
        }

        tracing::debug!(
            provider = PROVIDER,
            model_id = %self.model_id,
            turns = turns.len(),
            "Sending chat request"
        );
        let raw = self
            .connection
            .post_json(PROVIDER, request, &self.request_body(turns))
            .await?;
        Ok(ChatReply {
            text: reply_text(&raw),
            raw,
        })
    }
}

/// Concatenate the `text` blocks of a Messages API response
fn reply_text(raw: &Value) -> String {
    raw.get("content")
        .and_then(Value::as_array)
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}
