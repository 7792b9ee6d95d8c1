//! Structured logging for the router
//!
//! Routing events are emitted as `tracing` events with stable field names so
//! a single call can be followed across its stages:
//! - `request_id` on every handler line
//! - `target_id` / `source` on selection
//! - `target_id`, `attempt`, `max_attempts` on each backend attempt
//! - `target_id`, `backup_id` on failover
//!
//! The level comes from `[observability] log_level` in `router.toml`;
//! `RUST_LOG`, when set, replaces the whole filter.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Filter used when `RUST_LOG` is not set
///
/// The router logs at `level`; request spans from `TraceLayer` stay at
/// debug, and the HTTP client stack is held to warnings so provider calls do
/// not drown out attempt and failover events.
pub fn default_filter(level: &str) -> String {
    format!(
        "modelroute={},tower_http=debug,reqwest=warn,hyper_util=warn",
        level
    )
}

/// Install the global subscriber
///
/// Only the first call per process has any effect.
///
/// ```no_run
/// modelroute::telemetry::init("info");
/// tracing::info!(target_id = "claude-fast", source = "rule", "Selected target");
/// ```
pub fn init(level: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter(level)));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    });
}
