//! Target → capability resolution

use super::http::Connection;
use super::{
    AnthropicClient, Backend, BedrockClient, GeminiClient, OpenAiClient, ProviderClient,
    anthropic, bedrock, gemini, openai,
};
use crate::config::{ProviderEndpoint, ProvidersConfig};
use crate::error::{AppError, AppResult};
use crate::policy::{CallParams, ModelTarget, ProviderKind};
use std::sync::Arc;
use std::time::Duration;

/// Resolves a target plus merged parameters to an invocation capability
///
/// Resolution never performs I/O; it only binds configuration. Tests swap in
/// scripted implementations.
pub trait Dispatcher: Send + Sync {
    /// # Errors
    /// Returns `AppError::UnsupportedProvider` when the target's provider kind
    /// has no capability variant.
    fn resolve(&self, target: &ModelTarget, params: &CallParams) -> AppResult<Arc<dyn Backend>>;
}

/// Dispatcher for the built-in HTTP providers
///
/// Holds one `reqwest::Client` shared by every capability it hands out, plus
/// a resolved [`Connection`] per provider.
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    anthropic: Connection,
    bedrock: Connection,
    gemini: Connection,
    openai: Connection,
}

impl HttpDispatcher {
    /// Build connections from provider settings
    ///
    /// Credentials are read once here from the configured environment
    /// variables; a missing variable means requests are sent without one.
    pub fn new(config: &ProvidersConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder().build().map_err(|e| {
            AppError::Internal(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(Self {
            anthropic: connect(
                &http,
                anthropic::PROVIDER,
                &config.anthropic,
                anthropic::DEFAULT_BASE_URL,
                anthropic::DEFAULT_API_KEY_ENV,
            ),
            bedrock: connect(
                &http,
                bedrock::PROVIDER,
                &config.bedrock,
                bedrock::DEFAULT_BASE_URL,
                bedrock::DEFAULT_API_KEY_ENV,
            ),
            gemini: connect(
                &http,
                gemini::PROVIDER,
                &config.gemini,
                gemini::DEFAULT_BASE_URL,
                gemini::DEFAULT_API_KEY_ENV,
            ),
            openai: connect(
                &http,
                openai::PROVIDER,
                &config.openai,
                openai::DEFAULT_BASE_URL,
                openai::DEFAULT_API_KEY_ENV,
            ),
        })
    }

    /// Connection settings used for a provider kind, if it is supported
    pub fn connection(&self, kind: &ProviderKind) -> Option<&Connection> {
        match kind {
            ProviderKind::Anthropic => Some(&self.anthropic),
            ProviderKind::Bedrock => Some(&self.bedrock),
            ProviderKind::Gemini => Some(&self.gemini),
            ProviderKind::OpenAi => Some(&self.openai),
            ProviderKind::Unknown(_) => None,
        }
    }
}

fn connect(
    http: &reqwest::Client,
    provider: &str,
    endpoint: &ProviderEndpoint,
    default_base_url: &str,
    default_key_env: &str,
) -> Connection {
    let base_url = endpoint
        .base_url
        .clone()
        .unwrap_or_else(|| default_base_url.to_string());
    let key_env = endpoint.api_key_env.as_deref().unwrap_or(default_key_env);
    let api_key = std::env::var(key_env).ok().filter(|k| !k.is_empty());

    tracing::debug!(
        provider = provider,
        base_url = %base_url,
        api_key_env = key_env,
        has_api_key = api_key.is_some(),
        timeout_seconds = endpoint.timeout_seconds,
        "Configured provider connection"
    );

    Connection::new(
        http.clone(),
        base_url,
        api_key,
        Duration::from_secs(endpoint.timeout_seconds),
    )
}

impl Dispatcher for HttpDispatcher {
    fn resolve(&self, target: &ModelTarget, params: &CallParams) -> AppResult<Arc<dyn Backend>> {
        let model_id = target.model_id();
        let params = params.clone();
        let client = match target.provider() {
            ProviderKind::Anthropic => ProviderClient::Anthropic(AnthropicClient::new(
                self.anthropic.clone(),
                model_id,
                params,
            )),
            ProviderKind::Bedrock => ProviderClient::Bedrock(BedrockClient::new(
                self.bedrock.clone(),
                model_id,
                params,
            )),
            ProviderKind::Gemini => {
                ProviderClient::Gemini(GeminiClient::new(self.gemini.clone(), model_id, params))
            }
            ProviderKind::OpenAi => {
                ProviderClient::OpenAi(OpenAiClient::new(self.openai.clone(), model_id, params))
            }
            ProviderKind::Unknown(name) => {
                tracing::error!(
                    target_id = %target.id(),
                    provider = %name,
                    "Selected target uses an unsupported provider"
                );
                return Err(AppError::UnsupportedProvider {
                    target: target.id().to_string(),
                    provider: name.clone(),
                });
            }
        };
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::TaskKind;
    use crate::providers::OperationKind;

    fn dispatcher() -> HttpDispatcher {
        HttpDispatcher::new(&ProvidersConfig::default()).expect("should build dispatcher")
    }

    #[test]
    fn test_resolves_each_known_provider() {
        let dispatcher = dispatcher();
        for (provider, embeds) in [
            ("anthropic", false),
            ("bedrock", true),
            ("gemini", false),
            ("openai", false),
        ] {
            let target = ModelTarget::new("t", provider, "m", TaskKind::Chat);
            let backend = dispatcher
                .resolve(&target, &CallParams::new())
                .expect("known provider should resolve");
            assert_eq!(backend.provider(), provider);
            assert!(backend.supports(OperationKind::Chat));
            assert_eq!(backend.supports(OperationKind::Embed), embeds, "{}", provider);
        }
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let target = ModelTarget::new("granite", "watsonx", "ibm/granite", TaskKind::Chat);
        let err = dispatcher()
            .resolve(&target, &CallParams::new())
            .err()
            .expect("unknown provider must fail");
        assert!(matches!(
            err,
            AppError::UnsupportedProvider { ref target, ref provider }
                if target == "granite" && provider == "watsonx"
        ));
    }

    #[test]
    fn test_base_url_override() {
        let mut config = ProvidersConfig::default();
        config.gemini.base_url = Some("http://127.0.0.1:9999".to_string());
        let dispatcher = HttpDispatcher::new(&config).unwrap();
        assert_eq!(
            dispatcher
                .connection(&ProviderKind::Gemini)
                .unwrap()
                .base_url(),
            "http://127.0.0.1:9999"
        );
        assert_eq!(
            dispatcher
                .connection(&ProviderKind::Anthropic)
                .unwrap()
                .base_url(),
            anthropic::DEFAULT_BASE_URL
        );
        assert!(dispatcher.connection(&ProviderKind::Unknown("x".into())).is_none());
    }

    #[tokio::test]
    async fn test_embed_on_chat_only_provider_fails_locally() {
        let target = ModelTarget::new("c", "anthropic", "claude", TaskKind::Chat);
        let backend = dispatcher().resolve(&target, &CallParams::new()).unwrap();
        let err = backend.embed("hello").await.unwrap_err();
        assert!(matches!(err, crate::error::BackendError::Unsupported { .. }));
        assert!(!err.is_transient());
    }
}
