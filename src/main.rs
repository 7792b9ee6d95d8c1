//! modelroute HTTP server
//!
//! Starts an Axum web server that routes chat and embedding requests to the
//! model selected by the routing policy.

use clap::Parser;
use modelroute::cli::{Cli, Command, generate_config_template};
use modelroute::config::{Config, PolicySource};
use modelroute::features::RequestDescriptor;
use modelroute::handlers::{self, AppState};
use modelroute::metrics::Metrics;
use modelroute::policy::{TaskKind, TenantTier};
use modelroute::providers::HttpDispatcher;
use modelroute::router::ModelRouter;
use modelroute::telemetry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let Cli { config, command } = Cli::parse();

    match command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config).await,
        Command::Config { output } => write_template(output.as_deref()),
        Command::Check => check(&config),
        Command::Select {
            text,
            task,
            tier,
            context_tokens,
        } => select(&config, text, task, tier, context_tokens),
    }
}

async fn serve(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_file(config_path)?;
    telemetry::init(&config.observability.log_level);

    let metrics = Arc::new(Metrics::new()?);
    let router = build_router(&config)?.with_metrics(metrics.clone());
    let state = AppState::new(Arc::new(router), metrics)
        .with_request_timeout(Duration::from_secs(config.server.request_timeout_seconds));
    let app = handlers::app(state);

    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .unwrap_or_else(|_| std::net::IpAddr::from([0, 0, 0, 0])),
        config.server.port,
    ));

    tracing::info!("Starting modelroute server on {}", addr);
    tracing::info!("Health check available at http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn build_router(config: &Config) -> Result<ModelRouter, Box<dyn std::error::Error>> {
    let source: Arc<dyn PolicySource> = Arc::new(config.policy_source());
    let dispatcher = Arc::new(HttpDispatcher::new(&config.providers)?);
    Ok(ModelRouter::from_source(source, dispatcher)?)
}

fn write_template(output: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        Some(path) => {
            std::fs::write(path, generate_config_template())?;
            println!("Wrote configuration template to {}", path);
        }
        None => print!("{}", generate_config_template()),
    }
    Ok(())
}

fn check(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_file(config_path)?;
    telemetry::init("warn");

    let source = config.policy_source();
    let table = source.load()?;

    println!("Policy OK ({})", source.describe());
    println!("  models: {}", table.target_count());
    let mut targets: Vec<_> = table.targets().collect();
    targets.sort_by(|a, b| a.id().cmp(b.id()));
    for target in targets {
        println!(
            "    {:<24} {:<10} {:<10} {}{}",
            target.id(),
            target.task().as_str(),
            target.provider().as_str(),
            target.model_id(),
            target
                .backup_model_id()
                .map(|b| format!(" (backup: {})", b))
                .unwrap_or_default()
        );
    }
    println!("  rules: {}", table.rules().len());
    for rule in table.rules() {
        println!("    {:<24} -> {}", rule.id(), rule.target_id());
    }
    for task in [TaskKind::Chat, TaskKind::Embedding] {
        println!(
            "  default {}: {}",
            task,
            table.defaults().get(task).unwrap_or("(none)")
        );
    }
    Ok(())
}

fn select(
    config_path: &str,
    text: String,
    task: TaskKind,
    tier: TenantTier,
    context_tokens: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_file(config_path)?;
    telemetry::init("warn");

    let router = build_router(&config)?;
    let mut request = RequestDescriptor::new(text).with_task(task).with_tier(tier);
    if let Some(tokens) = context_tokens {
        request = request.with_context_tokens(tokens);
    }

    let selection = router.preview(&request)?;
    println!("{}", serde_json::to_string_pretty(&selection)?);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
