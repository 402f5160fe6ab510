// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dispatch from operation kind to handler, and outcome classification.
//!
//! The executor never touches queue state; it runs one operation and hands
//! back a `Result` the scheduler turns into a status transition.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use holdfast_core::{ErrorKind, ExecutionError, Operation, OperationKind};
use tracing::trace;

/// Performs the network call for one operation kind.
///
/// Handlers may run more than once for the same operation (a crash after
/// the server applied the call but before the queue recorded it), so they
/// must be safe to retry.
#[async_trait]
pub trait OperationHandler: Send + Sync + 'static {
    async fn execute(&self, operation: &Operation) -> Result<(), ExecutionError>;
}

/// Decides whether a failed execution is a conflict.
pub type ConflictPredicate = Arc<dyn Fn(&ExecutionError) -> bool + Send + Sync>;

/// What the scheduler should do with an attempted operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed,
    Conflict(ExecutionError),
    Failed(ExecutionError),
    Retry(ExecutionError),
}

#[derive(Clone)]
pub struct Executor {
    handlers: HashMap<OperationKind, Arc<dyn OperationHandler>>,
    is_conflict: ConflictPredicate,
}

impl Executor {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            is_conflict: Arc::new(|e: &ExecutionError| e.kind == ErrorKind::Conflict),
        }
    }

    /// Register `handler` for `kind`, returning the handler it replaced.
    pub fn register(
        &mut self,
        kind: OperationKind,
        handler: Arc<dyn OperationHandler>,
    ) -> Option<Arc<dyn OperationHandler>> {
        self.handlers.insert(kind, handler)
    }

    pub fn with_handler(mut self, kind: OperationKind, handler: Arc<dyn OperationHandler>) -> Self {
        self.register(kind, handler);
        self
    }

    /// Replace the conflict predicate.
    pub fn with_conflict_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ExecutionError) -> bool + Send + Sync + 'static,
    {
        self.is_conflict = Arc::new(predicate);
        self
    }

    pub fn handles(&self, kind: OperationKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn is_conflict(&self, error: &ExecutionError) -> bool {
        (self.is_conflict)(error)
    }

    pub async fn execute(&self, operation: &Operation) -> Result<(), ExecutionError> {
        let Some(handler) = self.handlers.get(&operation.kind) else {
            return Err(ExecutionError::terminal(format!(
                "no handler registered for {}",
                operation.kind
            )));
        };
        trace!(operation_id = %operation.id, kind = %operation.kind, "dispatching");
        handler.execute(operation).await
    }

    /// Classify `result` for an operation that has now made `retry_count`
    /// attempts.
    pub fn classify(
        &self,
        result: Result<(), ExecutionError>,
        retry_count: u32,
        max_retries: u32,
    ) -> Outcome {
        match result {
            Ok(()) => Outcome::Completed,
            Err(e) if self.is_conflict(&e) => Outcome::Conflict(e),
            Err(e) if e.kind == ErrorKind::Terminal || retry_count >= max_retries => {
                Outcome::Failed(e)
            }
            Err(e) => Outcome::Retry(e),
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<String> = self.handlers.keys().map(|k| k.to_string()).collect();
        kinds.sort();
        f.debug_struct("Executor").field("handlers", &kinds).finish()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use holdfast_core::NewOperation;

    use super::*;

    struct Fixed(Result<(), ExecutionError>);

    #[async_trait]
    impl OperationHandler for Fixed {
        async fn execute(&self, _operation: &Operation) -> Result<(), ExecutionError> {
            self.0.clone()
        }
    }

    fn operation(kind: OperationKind) -> Operation {
        Operation::from_request(NewOperation::new(kind, "s-1", serde_json::json!({})), Utc::now())
    }

    #[tokio::test]
    async fn dispatches_by_kind() {
        let executor = Executor::new()
            .with_handler(OperationKind::PinSession, Arc::new(Fixed(Ok(()))))
            .with_handler(
                OperationKind::ArchiveSession,
                Arc::new(Fixed(Err(ExecutionError::transient("later")))),
            );

        assert!(executor.execute(&operation(OperationKind::PinSession)).await.is_ok());
        let err = executor
            .execute(&operation(OperationKind::ArchiveSession))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Transient);
    }

    #[tokio::test]
    async fn missing_handler_is_terminal() {
        let executor = Executor::new();
        let err = executor
            .execute(&operation(OperationKind::SendMessage))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Terminal);
        assert!(err.message.contains("send-message"));
    }

    #[test]
    fn classification_follows_kind_and_ceiling() {
        let executor = Executor::new();
        assert_eq!(executor.classify(Ok(()), 1, 3), Outcome::Completed);
        assert!(matches!(
            executor.classify(Err(ExecutionError::conflict("stale")), 1, 3),
            Outcome::Conflict(_)
        ));
        assert!(matches!(
            executor.classify(Err(ExecutionError::transient("down")), 2, 3),
            Outcome::Retry(_)
        ));
        assert!(matches!(
            executor.classify(Err(ExecutionError::transient("down")), 3, 3),
            Outcome::Failed(_)
        ));
        assert!(matches!(
            executor.classify(Err(ExecutionError::terminal("bad request")), 1, 3),
            Outcome::Failed(_)
        ));
    }

    #[test]
    fn conflict_predicate_is_pluggable() {
        let executor =
            Executor::new().with_conflict_predicate(|e: &ExecutionError| e.status == Some(422));

        assert!(matches!(
            executor.classify(Err(ExecutionError::terminal("dup").with_status(422)), 1, 3),
            Outcome::Conflict(_)
        ));
        assert!(matches!(
            executor.classify(Err(ExecutionError::conflict("plain")), 1, 3),
            Outcome::Retry(_)
        ));
    }
}
