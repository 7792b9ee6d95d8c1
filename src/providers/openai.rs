//! OpenAI-compatible chat capability (self-hosted or hosted endpoints)
//!
//! Calls go through `open-agent-sdk`, which streams content blocks from the
//! endpoint's chat completions API. The SDK takes a single prompt, so turns
//! are flattened: system turns first as a plain preamble, then one
//! `Role: content` paragraph per conversation turn.

use super::http::Connection;
use super::{ChatReply, ChatTurn, MessageRole, param_f64, param_u64, split_system};
use crate::error::BackendError;
use crate::policy::CallParams;
use futures::StreamExt;

pub const PROVIDER: &str = "openai";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/v1";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

const DEFAULT_MAX_TOKENS: u64 = 4096;
const DEFAULT_TEMPERATURE: f64 = 0.7;

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    connection: Connection,
    model_id: String,
    params: CallParams,
}

impl OpenAiClient {
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

    pub async fn chat(&self, turns: &[ChatTurn]) -> Result<ChatReply, BackendError> {
        let max_tokens = u32::try_from(param_u64(&self.params, "max_tokens", DEFAULT_MAX_TOKENS))
            .unwrap_or(u32::MAX);
        let temperature = param_f64(&self.params, "temperature", DEFAULT_TEMPERATURE) as f32;

        let mut builder = open_agent::AgentOptions::builder()
            .model(&self.model_id)
            .base_url(self.connection.base_url())
            .max_tokens(max_tokens)
            .temperature(temperature);
        if let Some(key) = &self.connection.api_key {
            builder = builder.api_key(key.as_str());
        }
        let options = builder
            .build()
            .map_err(|e| {
                BackendError::Other(format!(
                    "invalid {} options for model {}: {}",
                    PROVIDER, self.model_id, e
                ))
            })?;

        let prompt = flatten_turns(turns);
        tracing::debug!(
            provider = PROVIDER,
            model_id = %self.model_id,
            prompt_length = prompt.len(),
            "Sending chat request"
        );

        let timeout = self.connection.timeout;
        let collected = tokio::time::timeout(timeout, async {
            let mut stream = open_agent::query(&prompt, &options)
                .await
                .map_err(query_error)?;

            let mut text = String::new();
            while let Some(block) = stream.next().await {
                match block {
                    Ok(open_agent::ContentBlock::Text(block)) => text.push_str(&block.text),
                    Ok(other) => {
                        tracing::warn!(
                            provider = PROVIDER,
                            model_id = %self.model_id,
                            block_type = ?other,
                            "Skipping non-text content block"
                        );
                    }
                    // A partial reply is discarded rather than returned
                    Err(e) => {
                        return Err(BackendError::Transport {
                            provider: PROVIDER.to_string(),
                            message: format!(
                                "stream interrupted after {} chars: {}",
                                text.len(),
                                e
                            ),
                        });
                    }
                }
            }
            Ok::<String, BackendError>(text)
        })
        .await;

        let text = match collected {
            Ok(result) => result?,
            Err(_elapsed) => {
                return Err(BackendError::Transport {
                    provider: PROVIDER.to_string(),
                    message: format!("request timed out after {}s", timeout.as_secs()),
                });
            }
        };

        let raw = serde_json::json!({"model": self.model_id, "text": text});
        Ok(ChatReply { text, raw })
    }
}

/// Map an SDK failure onto `BackendError`
///
/// The SDK reports a non-success status as `Api("API error <status> ...")`.
/// The status is recovered from that text so a 429 stays `Throttled`.
fn query_error(err: open_agent::Error) -> BackendError {
    if let open_agent::Error::Api(detail) = &err
        && let Some(status) = api_status(detail)
    {
        return if status == 429 {
            BackendError::Throttled {
                provider: PROVIDER.to_string(),
                message: detail.clone(),
            }
        } else {
            BackendError::Http {
                provider: PROVIDER.to_string(),
                status,
                message: detail.clone(),
            }
        };
    }
    BackendError::Transport {
        provider: PROVIDER.to_string(),
        message: err.to_string(),
    }
}

fn api_status(detail: &str) -> Option<u16> {
    detail
        .strip_prefix("API error ")?
        .split_whitespace()
        .next()?
        .trim_end_matches(':')
        .parse()
        .ok()
}

fn flatten_turns(turns: &[ChatTurn]) -> String {
    let (system, conversation) = split_system(turns);
    let mut sections: Vec<String> = system.into_iter().collect();
    sections.extend(conversation.iter().map(|turn| {
        let label = match turn.role {
            MessageRole::Assistant => "Assistant",
            _ => "User",
        };
        format!("{}: {}", label, turn.content)
    }));
    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_puts_system_first() {
        let prompt = flatten_turns(&[
            ChatTurn::user("What is 2+2?"),
            ChatTurn::system("Answer with a number."),
            ChatTurn::assistant("4"),
            ChatTurn::user("And 3+3?"),
        ]);
        assert_eq!(
            prompt,
            "Answer with a number.\n\nUser: What is 2+2?\n\nAssistant: 4\n\nUser: And 3+3?"
        );
    }

    #[test]
    fn test_flatten_single_user_turn() {
        assert_eq!(flatten_turns(&[ChatTurn::user("Hi")]), "User: Hi");
    }

    #[test]
    fn test_api_status_is_recovered() {
        assert_eq!(api_status("API error 429 Too Many Requests: slow down"), Some(429));
        assert_eq!(api_status("API error 503: busy"), Some(503));
        assert_eq!(api_status("model not found"), None);
    }

    #[test]
    fn test_query_error_keeps_throttling_structured() {
        let err = query_error(open_agent::Error::Api(
            "API error 429 Too Many Requests: {}".into(),
        ));
        assert!(matches!(err, BackendError::Throttled { .. }));
        assert!(err.is_transient());

        let err = query_error(open_agent::Error::Api("API error 401 Unauthorized: bad key".into()));
        assert!(matches!(err, BackendError::Http { status: 401, .. }));
        assert!(!err.is_transient());

        let err = query_error(open_agent::Error::Api("model not found".into()));
        assert!(matches!(err, BackendError::Transport { .. }));
    }
}
