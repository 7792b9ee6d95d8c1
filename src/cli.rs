//! Command-line interface for modelroute
//!
//! Provides argument parsing and subcommand handling for the modelroute binary.

use crate::policy::{TaskKind, TenantTier};
use clap::{Parser, Subcommand};

/// Policy-driven model router with retry and failover
#[derive(Parser)]
#[command(name = "modelroute")]
#[command(version)]
#[command(about = "Policy-driven model router with retry and failover")]
#[command(
    long_about = "modelroute picks a backend model for each request from an ordered rule \
    table, enforces per-model capacity limits, and calls the model with bounded retry on \
    throttling and failover to a backup model."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "router.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,

    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Load and validate the routing policy, then print a summary
    Check,

    /// Show which model a request would be routed to, without calling it
    Select {
        /// Request text to classify
        #[arg(short, long)]
        text: String,

        #[arg(long, default_value = "chat", value_parser = parse_task)]
        task: TaskKind,

        #[arg(long, default_value = "standard", value_parser = parse_tier)]
        tier: TenantTier,

        /// Size of the surrounding context, in tokens
        #[arg(long)]
        context_tokens: Option<usize>,
    },
}

fn parse_task(s: &str) -> Result<TaskKind, String> {
    s.parse()
}

fn parse_tier(s: &str) -> Result<TenantTier, String> {
    s.parse()
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# modelroute Configuration
# ========================
#
# Service settings for the modelroute HTTP server. The routing policy itself
# (models and rules) lives in separate JSON or TOML documents referenced from
# the [policy] section.

# ─────────────────────────────────────────────────────────────────────────────
# SERVER CONFIGURATION
# ─────────────────────────────────────────────────────────────────────────────

[server]
# IP address to bind to (0.0.0.0 for all interfaces, 127.0.0.1 for localhost only)
host = "0.0.0.0"

# Port to listen on
port = 3000

# Upper bound for one routed call in seconds, retries and failover included
request_timeout_seconds = 60

# ─────────────────────────────────────────────────────────────────────────────
# ROUTING POLICY
# ─────────────────────────────────────────────────────────────────────────────
#
# Format is chosen by extension (.json or .toml).
# MODEL_ROUTER_MODELS_PATH and MODEL_ROUTER_RULES_PATH override these paths.
# POST /admin/reload re-reads both files without a restart.

[policy]
models_path = "config/models.json"
rules_path = "config/rules.json"

# ─────────────────────────────────────────────────────────────────────────────
# OBSERVABILITY
# ─────────────────────────────────────────────────────────────────────────────

[observability]
# Log level: "trace", "debug", "info", "warn", "error" (RUST_LOG wins when set)
log_level = "info"

# Prometheus metrics are always available at /metrics on the server port

# ─────────────────────────────────────────────────────────────────────────────
# PROVIDERS (Optional)
# ─────────────────────────────────────────────────────────────────────────────
#
# base_url defaults to the provider's public endpoint; api_key_env names the
# environment variable holding the credential.

[providers.anthropic]
api_key_env = "ANTHROPIC_API_KEY"
timeout_seconds = 30

[providers.bedrock]
base_url = "https://bedrock-runtime.us-east-1.amazonaws.com"
api_key_env = "AWS_BEARER_TOKEN_BEDROCK"
timeout_seconds = 30

[providers.gemini]
api_key_env = "GOOGLE_API_KEY"
timeout_seconds = 30

[providers.openai]
# Any OpenAI-compatible server (vLLM, llama.cpp, LM Studio, ...)
base_url = "http://localhost:8080/v1"
timeout_seconds = 60
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn default_config_path() {
        let cli = Cli::parse_from(["modelroute"]);
        assert_eq!(cli.config, "router.toml");
        assert!(cli.command.is_none());
    }

    #[test]
    fn custom_config_path() {
        let cli = Cli::parse_from(["modelroute", "--config", "custom.toml", "check"]);
        assert_eq!(cli.config, "custom.toml");
        assert!(matches!(cli.command, Some(Command::Check)));
    }

    #[test]
    fn config_subcommand_with_output() {
        let cli = Cli::parse_from(["modelroute", "config", "-o", "my-config.toml"]);
        assert!(matches!(
            cli.command,
            Some(Command::Config { output: Some(ref path) }) if path == "my-config.toml"
        ));
    }

    #[test]
    fn select_subcommand_defaults() {
        let cli = Cli::parse_from(["modelroute", "select", "--text", "hello"]);
        match cli.command {
            Some(Command::Select {
                text,
                task,
                tier,
                context_tokens,
            }) => {
                assert_eq!(text, "hello");
                assert_eq!(task, TaskKind::Chat);
                assert_eq!(tier, TenantTier::Standard);
                assert!(context_tokens.is_none());
            }
            _ => panic!("expected select subcommand"),
        }
    }

    #[test]
    fn select_subcommand_parses_enums() {
        let cli = Cli::parse_from([
            "modelroute",
            "select",
            "-t",
            "chunk",
            "--task",
            "embedding",
            "--tier",
            "premium",
            "--context-tokens",
            "2048",
        ]);
        assert!(matches!(
            cli.command,
            Some(Command::Select {
                task: TaskKind::Embedding,
                tier: TenantTier::Premium,
                context_tokens: Some(2048),
                ..
            })
        ));
    }

    #[test]
    fn select_subcommand_rejects_unknown_tier() {
        let result =
            Cli::try_parse_from(["modelroute", "select", "--text", "x", "--tier", "gold"]);
        assert!(result.is_err());
    }

    #[test]
    fn template_is_a_valid_config() {
        let config: Config = generate_config_template()
            .parse()
            .expect("template should parse and validate");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.policy.models_path.to_str(), Some("config/models.json"));
        assert_eq!(
            config.providers.openai.base_url.as_deref(),
            Some("http://localhost:8080/v1")
        );
    }
}
