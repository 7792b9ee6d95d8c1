//! Bounded retry with failover to a backup target
//!
//! Per invocation:
//! 1. Call the primary. Success returns; a fatal failure propagates at once.
//! 2. A throttled failure is retried after the target's backoff until its
//!    `max_attempts` (which counts the first call) are used up.
//! 3. Once exhausted, the primary's backup is looked up in the policy snapshot
//!    the call was selected against and driven through the same loop with its
//!    own default parameters and retry policy.
//!
//! All retry state lives in the future returned by [`ResilientInvoker::invoke`].
//! Dropping that future abandons the call without leaving anything behind.

use super::selector::{Selection, SelectionSource};
use crate::error::{AppError, AppResult, BackendError, FailureClass};
use crate::metrics::{AttemptOutcome, InvocationOutcome, Metrics};
use crate::policy::{ModelTarget, PolicyTable};
use crate::providers::{Backend, Dispatcher, Operation, Reply};
use std::sync::Arc;

/// Result of driving one target through its retry loop
enum LoopOutcome {
    Success(Reply),
    /// Every attempt was throttled
    Exhausted {
        attempts: u32,
        last_error: BackendError,
    },
}

/// A reply together with the selection that produced it
///
/// After a failover `selection` is the backup's, not the one the call was
/// started with.
#[derive(Debug, Clone)]
pub struct Answered<R> {
    pub reply: R,
    pub selection: Selection,
}

impl<R> Answered<R> {
    /// Id of the target that answered
    pub fn target_id(&self) -> &str {
        self.selection.target().id()
    }

    /// Backend model identifier of the target that answered
    pub fn model_id(&self) -> &str {
        self.selection.target().model_id()
    }

    pub fn failed_over(&self) -> bool {
        matches!(self.selection.source(), SelectionSource::Failover(_))
    }
}

/// Executes operations against selected targets
#[derive(Clone)]
pub struct ResilientInvoker {
    dispatcher: Arc<dyn Dispatcher>,
    metrics: Option<Arc<Metrics>>,
}

impl ResilientInvoker {
    pub fn new(dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            dispatcher,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn dispatcher(&self) -> &Arc<dyn Dispatcher> {
        &self.dispatcher
    }

    /// Run `operation` against the selected target, failing over if needed
    ///
    /// `backend` is the capability already resolved for `selection`; `table`
    /// is the snapshot the selection was made against. The returned
    /// [`Answered`] names the target that actually produced the reply.
    ///
    /// # Errors
    /// - `AppError::Backend` for the first non-throttling failure
    /// - `AppError::ExhaustedNoBackup` if the primary is throttled on every
    ///   attempt and has no backup
    /// - `AppError::BackupNotFound` if the backup id is not in `table`
    /// - `AppError::BothExhausted` if the backup is throttled on every attempt
    pub async fn invoke(
        &self,
        selection: &Selection,
        backend: &Arc<dyn Backend>,
        operation: &Operation,
        table: &PolicyTable,
    ) -> AppResult<Answered<Reply>> {
        let primary = selection.target();
        match self.run_attempts(primary, backend.as_ref(), operation).await {
            Ok(LoopOutcome::Success(reply)) => {
                self.observe(|m| m.record_invocation(InvocationOutcome::Success));
                Ok(Answered {
                    reply,
                    selection: selection.clone(),
                })
            }
            Ok(LoopOutcome::Exhausted {
                attempts,
                last_error,
            }) => {
                self.fail_over(selection, operation, table, attempts, last_error)
                    .await
            }
            Err(e) => {
                self.observe(|m| m.record_invocation(InvocationOutcome::Failed));
                Err(e)
            }
        }
    }

    async fn fail_over(
        &self,
        selection: &Selection,
        operation: &Operation,
        table: &PolicyTable,
        attempts: u32,
        last_error: BackendError,
    ) -> AppResult<Answered<Reply>> {
        let primary = selection.target();

        let Some(backup_id) = primary.backup_model_id() else {
            tracing::error!(
                target_id = %primary.id(),
                attempts = attempts,
                last_error = %last_error,
                "Target throttled on every attempt and has no backup"
            );
            self.observe(|m| m.record_invocation(InvocationOutcome::Exhausted));
            return Err(AppError::ExhaustedNoBackup {
                target: primary.id().to_string(),
                attempts,
                last_error: last_error.to_string(),
            });
        };

        let Some(backup) = table.target(backup_id) else {
            tracing::error!(
                target_id = %primary.id(),
                backup_id = %backup_id,
                "Backup target is not in the active policy"
            );
            self.observe(|m| m.record_invocation(InvocationOutcome::Exhausted));
            return Err(AppError::BackupNotFound {
                target: primary.id().to_string(),
                backup: backup_id.to_string(),
            });
        };

        tracing::warn!(
            target_id = %primary.id(),
            backup_id = %backup.id(),
            attempts = attempts,
            last_error = %last_error,
            "Primary exhausted on throttling, failing over to backup"
        );
        self.observe(|m| m.record_failover(primary.id()));

        let result: AppResult<(Selection, LoopOutcome)> = async {
            let failover = selection.for_backup(backup)?;
            let backend = self
                .dispatcher
                .resolve(failover.target(), failover.params())?;
            let outcome = self
                .run_attempts(failover.target(), backend.as_ref(), operation)
                .await?;
            Ok((failover, outcome))
        }
        .await;

        match result {
            Ok((failover, LoopOutcome::Success(reply))) => {
                self.observe(|m| m.record_invocation(InvocationOutcome::FailoverSuccess));
                Ok(Answered {
                    reply,
                    selection: failover,
                })
            }
            Ok((
                _,
                LoopOutcome::Exhausted {
                    attempts: backup_attempts,
                    last_error,
                },
            )) => {
                tracing::error!(
                    target_id = %primary.id(),
                    backup_id = %backup.id(),
                    backup_attempts = backup_attempts,
                    last_error = %last_error,
                    "Primary and backup both exhausted on throttling"
                );
                self.observe(|m| m.record_invocation(InvocationOutcome::Exhausted));
                Err(AppError::BothExhausted {
                    primary: primary.id().to_string(),
                    backup: backup.id().to_string(),
                    last_error: last_error.to_string(),
                })
            }
            Err(e) => {
                self.observe(|m| m.record_invocation(InvocationOutcome::Failed));
                Err(e)
            }
        }
    }

    /// Drive one target through its bounded retry loop
    ///
    /// Only throttling is retried; any other failure returns on first
    /// occurrence as `AppError::Backend`.
    async fn run_attempts(
        &self,
        target: &ModelTarget,
        backend: &dyn Backend,
        operation: &Operation,
    ) -> AppResult<LoopOutcome> {
        let policy = target.retry_policy();
        let max_attempts = policy.max_attempts().max(1);
        let mut attempt = 1;

        loop {
            tracing::debug!(
                target_id = %target.id(),
                provider = %backend.provider(),
                operation = %operation.kind(),
                attempt = attempt,
                max_attempts = max_attempts,
                "Calling backend"
            );

            let err = match backend.call(operation).await {
                Ok(reply) => {
                    self.observe(|m| m.record_attempt(target.id(), AttemptOutcome::Success));
                    return Ok(LoopOutcome::Success(reply));
                }
                Err(err) => err,
            };

            if err.classify() == FailureClass::Fatal {
                tracing::warn!(
                    target_id = %target.id(),
                    attempt = attempt,
                    error = %err,
                    "Backend call failed with a non-retryable error"
                );
                self.observe(|m| m.record_attempt(target.id(), AttemptOutcome::Failed));
                return Err(AppError::Backend {
                    target: target.id().to_string(),
                    source: err,
                });
            }

            self.observe(|m| m.record_attempt(target.id(), AttemptOutcome::Throttled));
            if attempt >= max_attempts {
                return Ok(LoopOutcome::Exhausted {
                    attempts: attempt,
                    last_error: err,
                });
            }

            tracing::info!(
                target_id = %target.id(),
                attempt = attempt,
                max_attempts = max_attempts,
                backoff_ms = policy.backoff_ms(),
                error = %err,
                "Backend throttled, retrying after backoff"
            );
            tokio::time::sleep(policy.backoff()).await;
            attempt += 1;
        }
    }

    /// Record a metric, logging instead of failing the call if recording fails
    fn observe(&self, record: impl FnOnce(&Metrics) -> Result<(), prometheus::Error>) {
        if let Some(metrics) = &self.metrics
            && let Err(e) = record(metrics)
        {
            tracing::warn!(error = %e, "Failed to record metric");
        }
    }
}
