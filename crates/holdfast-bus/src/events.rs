// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event payloads published by the queue.

use chrono::{DateTime, Utc};
use holdfast_core::{ExecutionError, Operation, OperationId, SubjectId};
use serde::Serialize;
use strum::{Display, EnumString};

/// Names callers subscribe to with [`EventBus::on`](crate::EventBus::on).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum EventName {
    Added,
    ProcessingStart,
    ProcessingEnd,
    OperationStart,
    OperationCompleted,
    OperationRetry,
    OperationFailed,
    OperationConflict,
    QueuePruned,
    SessionCleared,
    Loaded,
    Online,
    Offline,
    PersistFailed,
}

/// Why operations were removed without being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PruneReason {
    /// Size cap reached on enqueue.
    Evicted,
    /// Terminal and older than the retention window.
    Expired,
    /// Dropped on load after exhausting retries before a restart.
    Exhausted,
}

/// Everything observable about the queue's progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum QueueEvent {
    Added {
        operation: Operation,
    },
    ProcessingStart {
        pending: usize,
    },
    ProcessingEnd {
        pending: usize,
    },
    OperationStart {
        operation: Operation,
    },
    OperationCompleted {
        operation: Operation,
    },
    /// A transient failure; the operation went back to `pending`.
    OperationRetry {
        operation: Operation,
        error: ExecutionError,
    },
    OperationFailed {
        operation: Operation,
        error: ExecutionError,
    },
    OperationConflict {
        operation: Operation,
        error: ExecutionError,
    },
    QueuePruned {
        removed: Vec<OperationId>,
        reason: PruneReason,
    },
    SessionCleared {
        subject_id: SubjectId,
        removed: usize,
    },
    Loaded {
        count: usize,
        dropped: usize,
    },
    Online,
    Offline,
    /// The persisted mirror could not be written; the next restart may
    /// observe stale state.
    PersistFailed {
        message: String,
    },
}

impl QueueEvent {
    pub fn name(&self) -> EventName {
        match self {
            QueueEvent::Added { .. } => EventName::Added,
            QueueEvent::ProcessingStart { .. } => EventName::ProcessingStart,
            QueueEvent::ProcessingEnd { .. } => EventName::ProcessingEnd,
            QueueEvent::OperationStart { .. } => EventName::OperationStart,
            QueueEvent::OperationCompleted { .. } => EventName::OperationCompleted,
            QueueEvent::OperationRetry { .. } => EventName::OperationRetry,
            QueueEvent::OperationFailed { .. } => EventName::OperationFailed,
            QueueEvent::OperationConflict { .. } => EventName::OperationConflict,
            QueueEvent::QueuePruned { .. } => EventName::QueuePruned,
            QueueEvent::SessionCleared { .. } => EventName::SessionCleared,
            QueueEvent::Loaded { .. } => EventName::Loaded,
            QueueEvent::Online => EventName::Online,
            QueueEvent::Offline => EventName::Offline,
            QueueEvent::PersistFailed { .. } => EventName::PersistFailed,
        }
    }

    /// The operation this event is about, if any.
    pub fn operation(&self) -> Option<&Operation> {
        match self {
            QueueEvent::Added { operation }
            | QueueEvent::OperationStart { operation }
            | QueueEvent::OperationCompleted { operation }
            | QueueEvent::OperationRetry { operation, .. }
            | QueueEvent::OperationFailed { operation, .. }
            | QueueEvent::OperationConflict { operation, .. } => Some(operation),
            _ => None,
        }
    }
}

/// A published event with its envelope metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusEvent {
    pub id: uuid::Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: QueueEvent,
}

impl BusEvent {
    pub fn new(event: QueueEvent) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}
