//! Google Gemini `generateContent` capability

use super::http::Connection;
use super::{ChatReply, ChatTurn, MessageRole, param_f64, param_u64, split_system};
use crate::error::BackendError;
use crate::policy::CallParams;
use serde_json::{Value, json};

pub const PROVIDER: &str = "gemini";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_API_KEY_ENV: &str = "GOOGLE_API_KEY";

const DEFAULT_MAX_TOKENS: u64 = 4096;
const DEFAULT_TEMPERATURE: f64 = 0.2;
const DEFAULT_TOP_P: f64 = 0.8;

#[derive(Debug, Clone)]
pub struct GeminiClient {
    connection: Connection,
    model_id: String,
    params: CallParams,
}

impl GeminiClient {
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
        // Gemini calls the assistant side "model"
        let contents: Vec<Value> = conversation
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    MessageRole::Assistant => "model",
                    _ => "user",
                };
                json!({"role": role, "parts": [{"text": turn.content}]})
            })
            .collect();

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": param_u64(&self.params, "max_tokens", DEFAULT_MAX_TOKENS),
                "temperature": param_f64(&self.params, "temperature", DEFAULT_TEMPERATURE),
                "topP": param_f64(&self.params, "top_p", DEFAULT_TOP_P),
            },
        });
        if let Some(system) = system {
            body["systemInstruction"] = json!({"parts": [{"text": system}]});
        }
        body
    }

    pub async fn chat(&self, turns: &[ChatTurn]) -> Result<ChatReply, BackendError> {
        let action = format!("{}:generateContent", self.model_id);
        let url = self
            .connection
            .url(PROVIDER, &["v1beta", "models", &action])?;
        let mut request = self.connection.http.post(url);
        if let Some(key) = &self.connection.api_key {
            request = request.header("x-goog-api-key", key);
        }

        tracing::debug!(
            provider = PROVIDER,
            model_id = %self.model_id,
            turns = turns.len(),
            "Sending generateContent request"
        );
        let raw = self
            .connection
            .post_json(PROVIDER, request, &self.request_body(turns))
            .await?;
        Ok(ChatReply {
            text: candidate_text(&raw),
            raw,
        })
    }
}

/// Text parts of the first candidate
fn candidate_text(raw: &Value) -> String {
    raw.pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}
