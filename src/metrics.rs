//! Prometheus metrics collection for modelroute
//!
//! Tracks:
//! - Selections by target and how they were reached (rule, default, failover)
//! - Selection latency
//! - Backend attempts by target and outcome
//! - Failovers to backup targets
//! - Terminal invocation outcomes
//!
//! Metrics are exposed via the `/metrics` endpoint in Prometheus text format.
//! Target labels come from the policy files, so cardinality is bounded by the
//! number of configured models.

use crate::router::SelectionSource;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Outcome of one backend attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    /// Classified as throttling
    Throttled,
    /// Any non-throttling failure
    Failed,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Throttled => "throttled",
            Self::Failed => "failed",
        }
    }
}

/// Terminal outcome of one routed invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationOutcome {
    /// Primary target answered
    Success,
    /// Backup target answered after the primary exhausted its retries
    FailoverSuccess,
    /// Retries exhausted with no usable backup
    Exhausted,
    /// Non-throttling failure propagated to the caller
    Failed,
}

impl InvocationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::FailoverSuccess => "failover_success",
            Self::Exhausted => "exhausted",
            Self::Failed => "failed",
        }
    }
}

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
    selections_total: IntCounterVec,
    selection_duration: Histogram,
    attempts_total: IntCounterVec,
    failovers_total: IntCounterVec,
    invocations_total: IntCounterVec,
}

impl Metrics {
    /// Create a new Metrics instance with its own registry
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails (e.g., duplicate names).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let selections_total = IntCounterVec::new(
            Opts::new(
                "modelroute_selections_total",
                "Total target selections by target id and selection source",
            ),
            &["target", "source"],
        )?;

        let selection_duration = Histogram::with_opts(
            HistogramOpts::new(
                "modelroute_selection_duration_seconds",
                "Time spent extracting features and selecting a target",
            )
            .buckets(vec![
                0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05,
            ]),
        )?;

        let attempts_total = IntCounterVec::new(
            Opts::new(
                "modelroute_attempts_total",
                "Total backend attempts by target id and outcome",
            ),
            &["target", "outcome"],
        )?;

        // Labelled by the primary that gave up
        let failovers_total = IntCounterVec::new(
            Opts::new(
                "modelroute_failovers_total",
                "Total failovers from a throttled primary to its backup",
            ),
            &["target"],
        )?;

        let invocations_total = IntCounterVec::new(
            Opts::new(
                "modelroute_invocations_total",
                "Total routed invocations by terminal outcome",
            ),
            &["outcome"],
        )?;

        registry.register(Box::new(selections_total.clone()))?;
        registry.register(Box::new(selection_duration.clone()))?;
        registry.register(Box::new(attempts_total.clone()))?;
        registry.register(Box::new(failovers_total.clone()))?;
        registry.register(Box::new(invocations_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            selections_total,
            selection_duration,
            attempts_total,
            failovers_total,
            invocations_total,
        })
    }

    pub fn record_selection(
        &self,
        target: &str,
        source: &SelectionSource,
    ) -> Result<(), prometheus::Error> {
        self.selections_total
            .get_metric_with_label_values(&[target, source.as_str()])?
            .inc();
        Ok(())
    }

    /// Record selection latency in seconds
    ///
    /// # Errors
    ///
    /// NaN, infinite and negative values are rejected; they would corrupt
    /// every percentile of the histogram.
    pub fn record_selection_duration(&self, seconds: f64) -> Result<(), prometheus::Error> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(prometheus::Error::Msg(format!(
                "Histogram value must be finite and non-negative, got: {}",
                seconds
            )));
        }
        self.selection_duration.observe(seconds);
        Ok(())
    }

    pub fn record_attempt(
        &self,
        target: &str,
        outcome: AttemptOutcome,
    ) -> Result<(), prometheus::Error> {
        self.attempts_total
            .get_metric_with_label_values(&[target, outcome.as_str()])?
            .inc();
        Ok(())
    }

    pub fn record_failover(&self, primary: &str) -> Result<(), prometheus::Error> {
        self.failovers_total
            .get_metric_with_label_values(&[primary])?
            .inc();
        Ok(())
    }

    pub fn record_invocation(&self, outcome: InvocationOutcome) -> Result<(), prometheus::Error> {
        self.invocations_total
            .get_metric_with_label_values(&[outcome.as_str()])?
            .inc();
        Ok(())
    }

    /// Attempts recorded for one target and outcome
    pub fn attempts_count(&self, target: &str, outcome: AttemptOutcome) -> u64 {
        self.attempts_total
            .get_metric_with_label_values(&[target, outcome.as_str()])
            .map(|c| c.get())
            .unwrap_or(0)
    }

    /// Failovers away from one primary target
    pub fn failovers_count(&self, primary: &str) -> u64 {
        self.failovers_total
            .get_metric_with_label_values(&[primary])
            .map(|c| c.get())
            .unwrap_or(0)
    }

    pub fn invocations_count(&self, outcome: InvocationOutcome) -> u64 {
        self.invocations_total
            .get_metric_with_label_values(&[outcome.as_str()])
            .map(|c| c.get())
            .unwrap_or(0)
    }

    /// Selections summed across every target and source
    pub fn selections_count(&self) -> u64 {
        self.registry
            .gather()
            .iter()
            .find(|mf| mf.name() == "modelroute_selections_total")
            .map(|mf| {
                mf.get_metric()
                    .iter()
                    .map(|m| m.counter.value.unwrap_or(0.0) as u64)
                    .sum()
            })
            .unwrap_or(0)
    }

    /// Gather all metrics and encode them in Prometheus text format
    ///
    /// # Errors
    ///
    /// Returns an error if metric encoding fails.
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    metric_family_count = metric_families.len(),
                    "Prometheus text encoder failed"
                );
                e
            })?;

        String::from_utf8(buffer).map_err(|e| {
            prometheus::Error::Msg(format!(
                "Prometheus encoder produced invalid UTF-8 at byte {}: {}",
                e.utf8_error().valid_up_to(),
                e
            ))
        })
    }
}
