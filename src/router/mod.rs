//! Request routing for modelroute
//!
//! [`ModelRouter`] ties the pieces together:
//! request → feature extraction → selection against the current policy
//! snapshot → capability resolution → [`CallHandle`].
//!
//! The policy table lives behind an `ArcSwap`. Every selection loads one
//! snapshot and uses it for the whole call, so a concurrent reload is seen
//! either completely or not at all.

pub mod handle;
pub mod invoker;
pub mod selector;

pub use handle::CallHandle;
pub use invoker::{Answered, ResilientInvoker};
pub use selector::{Selection, SelectionSource, condition_matches, ensure_capacity, merge_params, select};

use crate::config::PolicySource;
use crate::error::{AppError, AppResult};
use crate::features::{FeatureExtractor, FeatureSummary, HeuristicExtractor, RequestDescriptor};
use crate::metrics::Metrics;
use crate::policy::PolicyTable;
use crate::providers::Dispatcher;
use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Instant;

/// Entry point for routed calls
pub struct ModelRouter {
    policy: ArcSwap<PolicyTable>,
    source: Option<Arc<dyn PolicySource>>,
    extractor: Arc<dyn FeatureExtractor>,
    invoker: ResilientInvoker,
    metrics: Option<Arc<Metrics>>,
}

impl ModelRouter {
    /// Create a router over a fixed table
    ///
    /// Without a policy source, [`reload`](Self::reload) fails; use
    /// [`replace_policy`](Self::replace_policy) to swap tables directly.
    pub fn new(table: PolicyTable, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            policy: ArcSwap::from_pointee(table),
            source: None,
            extractor: Arc::new(HeuristicExtractor::new()),
            invoker: ResilientInvoker::new(dispatcher),
            metrics: None,
        }
    }

    /// Create a router by loading the initial table from `source`
    ///
    /// # Errors
    /// Propagates the source's load error; there is no fallback table.
    pub fn from_source(
        source: Arc<dyn PolicySource>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> AppResult<Self> {
        let table = source.load()?;
        tracing::info!(
            source = %source.describe(),
            models = table.target_count(),
            rules = table.rules().len(),
            "Loaded routing policy"
        );
        let mut router = Self::new(table, dispatcher);
        router.source = Some(source);
        Ok(router)
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn FeatureExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.invoker = self.invoker.with_metrics(metrics.clone());
        self.metrics = Some(metrics);
        self
    }

    /// Current policy snapshot
    pub fn snapshot(&self) -> Arc<PolicyTable> {
        self.policy.load_full()
    }

    /// Publish a new table; calls already holding a handle keep the old one
    pub fn replace_policy(&self, table: PolicyTable) {
        self.policy.store(Arc::new(table));
    }

    /// Reload the table from the policy source and publish it
    ///
    /// On failure the current table stays active.
    ///
    /// # Errors
    /// `AppError::Config` if the router has no policy source, or the source's
    /// load error.
    pub fn reload(&self) -> AppResult<Arc<PolicyTable>> {
        let source = self.source.as_ref().ok_or_else(|| {
            AppError::Config("Router was built without a policy source; nothing to reload".into())
        })?;

        let table = match source.reload() {
            Ok(table) => Arc::new(table),
            Err(e) => {
                tracing::error!(
                    source = %source.describe(),
                    error = %e,
                    "Policy reload failed, keeping the current policy"
                );
                return Err(e);
            }
        };

        self.policy.store(table.clone());
        tracing::info!(
            source = %source.describe(),
            models = table.target_count(),
            rules = table.rules().len(),
            "Reloaded routing policy"
        );
        Ok(table)
    }

    pub fn extract(&self, request: &RequestDescriptor) -> FeatureSummary {
        self.extractor.extract(request)
    }

    /// Select a target without resolving a capability
    pub fn preview(&self, request: &RequestDescriptor) -> AppResult<Selection> {
        let snapshot = self.policy.load();
        select(&self.extract(request), &snapshot)
    }

    /// Select a target for `request` and bind it to a capability
    ///
    /// # Errors
    /// `NoDefaultConfigured`, `CapacityExceeded` from selection and
    /// `UnsupportedProvider` from resolution.
    pub fn select_target(&self, request: &RequestDescriptor) -> AppResult<CallHandle> {
        let started = Instant::now();
        let snapshot = self.snapshot();
        let features = self.extract(request);
        let selection = select(&features, &snapshot)?;

        if let Some(metrics) = &self.metrics {
            let recorded = metrics
                .record_selection(selection.target().id(), selection.source())
                .and_then(|()| {
                    metrics.record_selection_duration(started.elapsed().as_secs_f64())
                });
            if let Err(e) = recorded {
                tracing::warn!(error = %e, "Failed to record selection metrics");
            }
        }

        tracing::info!(
            target_id = %selection.target().id(),
            source = selection.source().as_str(),
            task = %features.task,
            token_count = features.token_count,
            context_tokens = features.context_tokens,
            tenant_id = request.tenant_id.as_deref().unwrap_or("-"),
            "Selected target"
        );

        let backend = self
            .invoker
            .dispatcher()
            .resolve(selection.target(), selection.params())?;
        Ok(CallHandle::new(
            selection,
            backend,
            self.invoker.clone(),
            snapshot,
        ))
    }
}

impl std::fmt::Debug for ModelRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.policy.load();
        f.debug_struct("ModelRouter")
            .field("models", &snapshot.target_count())
            .field("rules", &snapshot.rules().len())
            .field(
                "source",
                &self.source.as_ref().map(|s| s.describe()),
            )
            .finish()
    }
}
