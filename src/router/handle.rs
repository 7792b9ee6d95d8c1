//! Caller-facing handle for one routed request

use super::invoker::{Answered, ResilientInvoker};
use super::selector::Selection;
use crate::error::{AppError, AppResult, BackendError};
use crate::policy::{PolicyTable, TaskKind};
use crate::providers::{Backend, ChatReply, ChatTurn, EmbedReply, Operation, OperationKind, Reply};
use std::sync::Arc;

/// A selection bound to its capability, invoker and policy snapshot
///
/// The handle pins the `PolicyTable` it was selected against, so a reload
/// that lands while the call is in flight does not change which backup is
/// used.
pub struct CallHandle {
    selection: Selection,
    backend: Arc<dyn Backend>,
    invoker: ResilientInvoker,
    snapshot: Arc<PolicyTable>,
}

impl CallHandle {
    pub(crate) fn new(
        selection: Selection,
        backend: Arc<dyn Backend>,
        invoker: ResilientInvoker,
        snapshot: Arc<PolicyTable>,
    ) -> Self {
        Self {
            selection,
            backend,
            invoker,
            snapshot,
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Id of the selected target
    ///
    /// This is the target the call starts on. After a failover the reply
    /// comes from its backup; see [`Answered::target_id`].
    pub fn target_id(&self) -> &str {
        self.selection.target().id()
    }

    /// Backend model identifier of the selected target
    pub fn model_id(&self) -> &str {
        self.selection.target().model_id()
    }

    /// Policy snapshot the selection was made against
    pub fn snapshot(&self) -> &Arc<PolicyTable> {
        &self.snapshot
    }

    /// Send a conversation to the selected chat target
    ///
    /// # Errors
    /// `AppError::TypeMismatch` if the target serves embeddings; otherwise
    /// any error of [`ResilientInvoker::invoke`].
    pub async fn chat(&self, turns: Vec<ChatTurn>) -> AppResult<Answered<ChatReply>> {
        let Answered { reply, selection } = self.run(Operation::Chat(turns)).await?;
        match reply {
            Reply::Chat(reply) => Ok(Answered { reply, selection }),
            Reply::Embedding(_) => Err(self.unexpected_reply(OperationKind::Chat)),
        }
    }

    /// Embed text with the selected embedding target
    ///
    /// # Errors
    /// `AppError::TypeMismatch` if the target serves chat; otherwise any
    /// error of [`ResilientInvoker::invoke`].
    pub async fn embed(&self, text: impl Into<String>) -> AppResult<Answered<EmbedReply>> {
        let Answered { reply, selection } = self.run(Operation::Embed(text.into())).await?;
        match reply {
            Reply::Embedding(reply) => Ok(Answered { reply, selection }),
            Reply::Chat(_) => Err(self.unexpected_reply(OperationKind::Embed)),
        }
    }

    async fn run(&self, operation: Operation) -> AppResult<Answered<Reply>> {
        let kind = operation.kind();
        let target = self.selection.target();
        let expected = match kind {
            OperationKind::Chat => TaskKind::Chat,
            OperationKind::Embed => TaskKind::Embedding,
        };
        if target.task() != expected {
            return Err(AppError::TypeMismatch {
                target: target.id().to_string(),
                task: target.task(),
                operation: kind,
            });
        }
        if !self.backend.supports(kind) {
            return Err(AppError::Backend {
                target: target.id().to_string(),
                source: BackendError::Unsupported {
                    provider: self.backend.provider().to_string(),
                    operation: kind,
                },
            });
        }

        self.invoker
            .invoke(&self.selection, &self.backend, &operation, &self.snapshot)
            .await
    }

    fn unexpected_reply(&self, operation: OperationKind) -> AppError {
        AppError::Internal(format!(
            "{} on model {} produced a reply of the wrong kind",
            operation,
            self.target_id()
        ))
    }
}

impl std::fmt::Debug for CallHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallHandle")
            .field("target", &self.target_id())
            .field("provider", &self.backend.provider())
            .field("source", self.selection.source())
            .finish()
    }
}
