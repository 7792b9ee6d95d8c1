//! AWS Bedrock runtime capability (Converse for chat, InvokeModel for embeddings)
//!
//! Requests are authenticated with a Bedrock API key sent as a bearer token;
//! SigV4 signing is out of scope.

use super::http::Connection;
use super::{ChatReply, ChatTurn, EmbedReply, MessageRole, param_f64, param_u64, split_system};
use crate::error::BackendError;
use crate::policy::CallParams;
use serde_json::{Value, json};

pub const PROVIDER: &str = "bedrock";
pub const DEFAULT_BASE_URL: &str = "https://bedrock-runtime.us-east-1.amazonaws.com";
pub const DEFAULT_API_KEY_ENV: &str = "AWS_BEARER_TOKEN_BEDROCK";

const DEFAULT_MAX_TOKENS: u64 = 4096;
const DEFAULT_TEMPERATURE: f64 = 0.2;
const DEFAULT_TOP_P: f64 = 0.8;

/// Model families that reject `topP` alongside `temperature`
const NO_TOP_P_MARKERS: [&str; 1] = ["sonnet-4-5"];

/// Chat and embedding capability bound to one Bedrock model
#[derive(Debug, Clone)]
pub struct BedrockClient {
    connection: Connection,
    model_id: String,
    params: CallParams,
}

impl BedrockClient {
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

    fn accepts_top_p(&self) -> bool {
        !NO_TOP_P_MARKERS
            .iter()
            .any(|marker| self.model_id.contains(marker))
    }

    pub(crate) fn converse_body(&self, turns: &[ChatTurn]) -> Value {
        let (system, conversation) = split_system(turns);
        let messages: Vec<Value> = conversation
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    MessageRole::Assistant => "assistant",
                    _ => "user",
                };
                json!({"role": role, "content": [{"text": turn.content}]})
            })
            .collect();

        let mut inference = json!({
            "maxTokens": param_u64(&self.params, "max_tokens", DEFAULT_MAX_TOKENS),
            "temperature": param_f64(&self.params, "temperature", DEFAULT_TEMPERATURE),
        });
        if self.accepts_top_p() {
            inference["topP"] = json!(param_f64(&self.params, "top_p", DEFAULT_TOP_P));
        }

        let mut body = json!({
            "messages": messages,
            "inferenceConfig": inference,
        });
        if let Some(system) = system {
            body["system"] = json!([{"text": system}]);
        }
        body
    }

    fn request(&self, action: &str) -> Result<reqwest::RequestBuilder, BackendError> {
        let url = self
            .connection
            .url(PROVIDER, &["model", &self.model_id, action])?;
        let mut request = self.connection.http.post(url);
        if let Some(key) = &self.connection.api_key {
            request = request.bearer_auth(key);
        }
        Ok(request)
    }

    pub async fn chat(&self, turns: &[ChatTurn]) -> Result<ChatReply, BackendError> {
        tracing::debug!(
            provider = PROVIDER,
            model_id = %self.model_id,
            turns = turns.len(),
            "Sending converse request"
        );
        let request = self.request("converse")?;
        let raw = self
            .connection
            .post_json(PROVIDER, request, &self.converse_body(turns))
            .await?;
        Ok(ChatReply {
            text: converse_text(&raw),
            raw,
        })
    }

    pub async fn embed(&self, text: &str) -> Result<EmbedReply, BackendError> {
        tracing::debug!(
            provider = PROVIDER,
            model_id = %self.model_id,
            text_length = text.len(),
            "Sending embedding request"
        );
        let request = self.request("invoke")?;
        let raw = self
            .connection
            .post_json(PROVIDER, request, &json!({"inputText": text}))
            .await?;
        Ok(EmbedReply {
            vector: embedding_vector(&raw),
            raw,
        })
    }
}

/// Text blocks of `output.message.content`
fn converse_text(raw: &Value) -> String {
    raw.pointer("/output/message/content")
        .and_then(Value::as_array)
        .map(|blocks| {
            blocks
                .iter()
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

fn embedding_vector(raw: &Value) -> Vec<f32> {
    raw.get("embedding")
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_f64)
                .map(|v| v as f32)
                .collect()
        })
        .unwrap_or_default()
}
