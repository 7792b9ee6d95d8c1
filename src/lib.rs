//! modelroute - policy-driven model router
//!
//! Picks a backend model for each request from an ordered rule table,
//! enforces per-model capacity limits, and invokes the model with bounded
//! retry on throttling and failover to a designated backup.
//!
//! ```no_run
//! use modelroute::config::FilePolicySource;
//! use modelroute::config::ProvidersConfig;
//! use modelroute::features::RequestDescriptor;
//! use modelroute::providers::{ChatTurn, HttpDispatcher};
//! use modelroute::router::ModelRouter;
//! use std::sync::Arc;
//!
//! # async fn run() -> modelroute::error::AppResult<()> {
//! let source = Arc::new(FilePolicySource::new("config/models.json", "config/rules.json"));
//! let dispatcher = Arc::new(HttpDispatcher::new(&ProvidersConfig::default())?);
//! let router = ModelRouter::from_source(source, dispatcher)?;
//!
//! let handle = router.select_target(&RequestDescriptor::new("What is a B-tree?"))?;
//! let answered = handle.chat(vec![ChatTurn::user("What is a B-tree?")]).await?;
//! println!("{} answered: {}", answered.model_id(), answered.reply.text);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod features;
pub mod handlers;
pub mod metrics;
pub mod policy;
pub mod providers;
pub mod router;
pub mod telemetry;
