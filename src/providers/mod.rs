//! Backend invocation capabilities
//!
//! Every provider family is one variant of [`ProviderClient`], and every
//! variant exposes the same two operations through the [`Backend`] trait:
//! `chat` and `embed`. A variant that cannot serve an operation fails locally
//! with [`BackendError::Unsupported`], which is never retried.
//!
//! Adding a provider means adding a module, a `ProviderClient` variant and a
//! dispatcher arm; the selector and invoker are unaffected.
//!
//! ## Role handling
//!
//! All providers share one contract: `system` turns are passed out of band
//! (Anthropic `system`, Bedrock `system` blocks, Gemini `systemInstruction`,
//! OpenAI-compatible prompt prefix), `user` and `assistant` turns map to the
//! provider's conversation roles. No turn is dropped.

pub mod anthropic;
pub mod bedrock;
pub mod dispatcher;
pub mod gemini;
mod http;
pub mod openai;

pub use anthropic::AnthropicClient;
pub use bedrock::BedrockClient;
pub use dispatcher::{Dispatcher, HttpDispatcher};
pub use gemini::GeminiClient;
pub use http::Connection;
pub use openai::OpenAiClient;

use crate::error::BackendError;
use crate::policy::CallParams;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Conversation role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChatTurn {
    pub role: MessageRole,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// Split turns into the joined system prompt and the conversation turns
pub(crate) fn split_system(turns: &[ChatTurn]) -> (Option<String>, Vec<&ChatTurn>) {
    let system: Vec<&str> = turns
        .iter()
        .filter(|t| t.role == MessageRole::System)
        .map(|t| t.content.as_str())
        .collect();
    let conversation = turns
        .iter()
        .filter(|t| t.role != MessageRole::System)
        .collect();
    let system = (!system.is_empty()).then(|| system.join("\n\n"));
    (system, conversation)
}

/// Chat completion result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    /// Concatenated text content of the reply
    pub text: String,
    /// Provider response as received
    pub raw: serde_json::Value,
}

/// Embedding result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedReply {
    /// Embedding vector, empty if the provider response carried none
    pub vector: Vec<f32>,
    /// Provider response as received
    pub raw: serde_json::Value,
}

/// The two operations a capability offers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Chat,
    Embed,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chat => f.write_str("chat"),
            Self::Embed => f.write_str("embed"),
        }
    }
}

/// An operation with its argument, replayable against any capability
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Chat(Vec<ChatTurn>),
    Embed(String),
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Chat(_) => OperationKind::Chat,
            Self::Embed(_) => OperationKind::Embed,
        }
    }
}

/// Result of an [`Operation`]
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Chat(ChatReply),
    Embedding(EmbedReply),
}

/// Uniform two-operation capability over one backend model
///
/// Implementations must allow concurrent calls on the same instance; each
/// call uses its own request/response pair.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Provider label for logs and errors
    fn provider(&self) -> &str;

    /// Whether this capability serves the given operation at all
    fn supports(&self, _operation: OperationKind) -> bool {
        true
    }

    async fn chat(&self, turns: &[ChatTurn]) -> Result<ChatReply, BackendError>;

    async fn embed(&self, text: &str) -> Result<EmbedReply, BackendError>;

    /// Run an operation, dispatching to `chat` or `embed`
    async fn call(&self, operation: &Operation) -> Result<Reply, BackendError> {
        match operation {
            Operation::Chat(turns) => self.chat(turns).await.map(Reply::Chat),
            Operation::Embed(text) => self.embed(text).await.map(Reply::Embedding),
        }
    }
}

/// Closed set of provider capabilities
pub enum ProviderClient {
    Anthropic(AnthropicClient),
    Bedrock(BedrockClient),
    Gemini(GeminiClient),
    OpenAi(OpenAiClient),
}

#[async_trait]
impl Backend for ProviderClient {
    fn provider(&self) -> &str {
        match self {
            Self::Anthropic(_) => anthropic::PROVIDER,
            Self::Bedrock(_) => bedrock::PROVIDER,
            Self::Gemini(_) => gemini::PROVIDER,
            Self::OpenAi(_) => openai::PROVIDER,
        }
    }

    fn supports(&self, operation: OperationKind) -> bool {
        match operation {
            OperationKind::Chat => true,
            OperationKind::Embed => matches!(self, Self::Bedrock(_)),
        }
    }

    async fn chat(&self, turns: &[ChatTurn]) -> Result<ChatReply, BackendError> {
        match self {
            Self::Anthropic(client) => client.chat(turns).await,
            Self::Bedrock(client) => client.chat(turns).await,
            Self::Gemini(client) => client.chat(turns).await,
            Self::OpenAi(client) => client.chat(turns).await,
        }
    }

    async fn embed(&self, text: &str) -> Result<EmbedReply, BackendError> {
        match self {
            Self::Bedrock(client) => client.embed(text).await,
            Self::Anthropic(_) | Self::Gemini(_) | Self::OpenAi(_) => {
                Err(BackendError::Unsupported {
                    provider: self.provider().to_string(),
                    operation: OperationKind::Embed,
                })
            }
        }
    }
}

/// Read an unsigned integer parameter, falling back to `default`
pub(crate) fn param_u64(params: &CallParams, name: &str, default: u64) -> u64 {
    params
        .get(name)
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(default)
}

/// Read a float parameter, falling back to `default`
pub(crate) fn param_f64(params: &CallParams, name: &str, default: f64) -> f64 {
    params
        .get(name)
        .and_then(serde_json::Value::as_f64)
        .unwrap_or(default)
}
