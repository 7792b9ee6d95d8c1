//! Configuration management for modelroute
//!
//! Two kinds of configuration live here:
//! - the service config (`router.toml`): listen address, where the policy
//!   files are, log level and per-provider connection settings
//! - the routing policy itself (models + rules documents), read through a
//!   [`PolicySource`] and assembled into a validated [`PolicyTable`]

use crate::error::{AppError, AppResult};
use crate::policy::{ModelsDocument, PolicyTable, RulesDocument};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable overriding `policy.models_path`
pub const MODELS_PATH_ENV: &str = "MODEL_ROUTER_MODELS_PATH";
/// Environment variable overriding `policy.rules_path`
pub const RULES_PATH_ENV: &str = "MODEL_ROUTER_RULES_PATH";

/// Upper bound for any configured timeout, in seconds
const MAX_TIMEOUT_SECONDS: u64 = 300;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_request_timeout() -> u64 {
    60
}

/// Where the routing policy documents live
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PolicyConfig {
    #[serde(default = "default_models_path")]
    pub models_path: PathBuf,
    #[serde(default = "default_rules_path")]
    pub rules_path: PathBuf,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            models_path: default_models_path(),
            rules_path: default_rules_path(),
        }
    }
}

fn default_models_path() -> PathBuf {
    PathBuf::from("config/models.json")
}

fn default_rules_path() -> PathBuf {
    PathBuf::from("config/rules.json")
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Connection settings per provider family
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub anthropic: ProviderEndpoint,
    #[serde(default)]
    pub bedrock: ProviderEndpoint,
    #[serde(default)]
    pub gemini: ProviderEndpoint,
    #[serde(default)]
    pub openai: ProviderEndpoint,
}

impl ProvidersConfig {
    fn entries(&self) -> [(&'static str, &ProviderEndpoint); 4] {
        [
            ("anthropic", &self.anthropic),
            ("bedrock", &self.bedrock),
            ("gemini", &self.gemini),
            ("openai", &self.openai),
        ]
    }
}

/// Connection settings for one provider
///
/// Unset fields fall back to the provider's public endpoint and its usual
/// credential variable.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderEndpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Name of the environment variable holding the credential
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_provider_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ProviderEndpoint {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key_env: None,
            timeout_seconds: default_provider_timeout(),
        }
    }
}

fn default_provider_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|source| AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            })?;

        let config: Self =
            toml::from_str(&content).map_err(|e| AppError::ConfigParseFailed {
                path: path_display.clone(),
                reason: e.to_string(),
            })?;

        config.validate().map_err(|e| AppError::ConfigParseFailed {
            path: path_display,
            reason: e.to_string(),
        })?;

        Ok(config)
    }

    /// Validate configuration after parsing
    ///
    /// Called by `from_file()` and `from_str()`; call it explicitly when
    /// building a `Config` by hand.
    pub fn validate(&self) -> AppResult<()> {
        check_timeout(
            "server.request_timeout_seconds",
            self.server.request_timeout_seconds,
        )?;

        for (name, endpoint) in self.providers.entries() {
            check_timeout(
                &format!("providers.{}.timeout_seconds", name),
                endpoint.timeout_seconds,
            )?;

            if let Some(url) = &endpoint.base_url
                && !url.starts_with("http://")
                && !url.starts_with("https://")
            {
                return Err(AppError::Config(format!(
                    "providers.{}.base_url '{}' must start with 'http://' or 'https://'",
                    name, url
                )));
            }

            if endpoint
                .api_key_env
                .as_deref()
                .is_some_and(|v| v.trim().is_empty())
            {
                return Err(AppError::Config(format!(
                    "providers.{}.api_key_env must not be empty; remove it to use the default",
                    name
                )));
            }
        }

        if self.observability.log_level.trim().is_empty() {
            return Err(AppError::Config(
                "observability.log_level must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Policy source for the configured paths, after environment overrides
    pub fn policy_source(&self) -> FilePolicySource {
        FilePolicySource::from_config(&self.policy, |name| std::env::var(name).ok())
    }
}

fn check_timeout(field: &str, value: u64) -> AppResult<()> {
    if value == 0 {
        return Err(AppError::Config(format!(
            "{} must be greater than 0, got {}",
            field, value
        )));
    }
    if value > MAX_TIMEOUT_SECONDS {
        return Err(AppError::Config(format!(
            "{} cannot exceed {} seconds, got {}",
            field, MAX_TIMEOUT_SECONDS, value
        )));
    }
    Ok(())
}

impl FromStr for Config {
    type Err = AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let config: Config =
            toml::from_str(toml_str).map_err(|e| AppError::ConfigParseFailed {
                path: "<string>".to_string(),
                reason: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }
}

/// Serialization format of a policy document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Toml,
}

impl DocumentFormat {
    /// Pick the format from the file extension (`.json` or `.toml`)
    pub fn from_path(path: &Path) -> AppResult<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::Json),
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(Self::Toml),
            _ => Err(AppError::Config(format!(
                "Cannot tell the format of policy file {}; use a .json or .toml extension",
                path.display()
            ))),
        }
    }

    /// Parse a document, naming `origin` in errors
    pub fn parse<T: DeserializeOwned>(self, content: &str, origin: &str) -> AppResult<T> {
        let parsed = match self {
            Self::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            Self::Toml => toml::from_str(content).map_err(|e| e.to_string()),
        };
        parsed.map_err(|reason| AppError::ConfigParseFailed {
            path: origin.to_string(),
            reason,
        })
    }
}

/// Read and parse one policy document
pub fn read_document<T: DeserializeOwned>(path: &Path) -> AppResult<T> {
    let format = DocumentFormat::from_path(path)?;
    let content = std::fs::read_to_string(path).map_err(|source| AppError::ConfigFileRead {
        path: path.display().to_string(),
        source,
    })?;
    format.parse(&content, &path.display().to_string())
}

/// Provider of routing policy tables
///
/// `load` builds the initial table; `reload` builds a replacement on
/// request. Both are synchronous and must fail rather than fall back to
/// partial or default data.
pub trait PolicySource: Send + Sync {
    fn load(&self) -> AppResult<PolicyTable>;

    fn reload(&self) -> AppResult<PolicyTable> {
        self.load()
    }

    /// Human-readable origin for logs
    fn describe(&self) -> String;
}

/// Policy read from a models file and a rules file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePolicySource {
    models_path: PathBuf,
    rules_path: PathBuf,
}

impl FilePolicySource {
    pub fn new(models_path: impl Into<PathBuf>, rules_path: impl Into<PathBuf>) -> Self {
        Self {
            models_path: models_path.into(),
            rules_path: rules_path.into(),
        }
    }

    /// Paths from config, with [`MODELS_PATH_ENV`] / [`RULES_PATH_ENV`]
    /// taking precedence when `env` returns a non-empty value
    pub fn from_config(config: &PolicyConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        let pick = |name: &str, configured: &Path| {
            env(name)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| configured.to_path_buf())
        };
        Self {
            models_path: pick(MODELS_PATH_ENV, &config.models_path),
            rules_path: pick(RULES_PATH_ENV, &config.rules_path),
        }
    }

    pub fn models_path(&self) -> &Path {
        &self.models_path
    }

    pub fn rules_path(&self) -> &Path {
        &self.rules_path
    }
}

impl PolicySource for FilePolicySource {
    fn load(&self) -> AppResult<PolicyTable> {
        let models: ModelsDocument = read_document(&self.models_path)?;
        let rules: RulesDocument = read_document(&self.rules_path)?;
        tracing::debug!(
            models_path = %self.models_path.display(),
            rules_path = %self.rules_path.display(),
            models = models.models.len(),
            rules = rules.rules.len(),
            "Parsed policy documents"
        );
        PolicyTable::from_documents(models, rules)
    }

    fn describe(&self) -> String {
        format!(
            "files {} + {}",
            self.models_path.display(),
            self.rules_path.display()
        )
    }
}

/// Policy held in memory, for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct StaticPolicySource {
    models: ModelsDocument,
    rules: RulesDocument,
}

impl StaticPolicySource {
    pub fn new(models: ModelsDocument, rules: RulesDocument) -> Self {
        Self { models, rules }
    }
}

impl PolicySource for StaticPolicySource {
    fn load(&self) -> AppResult<PolicyTable> {
        PolicyTable::from_documents(self.models.clone(), self.rules.clone())
    }

    fn describe(&self) -> String {
        "in-memory policy".to_string()
    }
}
