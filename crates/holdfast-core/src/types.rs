// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The queue's data model: operations, their kinds, statuses and priorities.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Opaque, stable identifier of a queued operation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(pub String);

impl OperationId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identifier of the aggregate (usually a chat session) an operation targets.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub String);

impl SubjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// The kinds of deferred API call the queue knows how to replay.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum OperationKind {
    SendMessage,
    UpdateSession,
    DeleteMessage,
    CreateSession,
    ArchiveSession,
    PinSession,
}

impl OperationKind {
    pub const ALL: [OperationKind; 6] = [
        OperationKind::SendMessage,
        OperationKind::UpdateSession,
        OperationKind::DeleteMessage,
        OperationKind::CreateSession,
        OperationKind::ArchiveSession,
        OperationKind::PinSession,
    ];
}

/// Lifecycle status of an operation.
///
/// `Completed`, `Failed` and `Conflicted` are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    Retrying,
    Completed,
    Failed,
    Conflicted,
}

impl OperationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OperationStatus::Completed | OperationStatus::Failed | OperationStatus::Conflicted
        )
    }

    /// Pending or retrying: still owed an attempt.
    pub fn is_active(self) -> bool {
        matches!(self, OperationStatus::Pending | OperationStatus::Retrying)
    }
}

/// Scheduling priority. Declaration order is processing order.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

/// A deferred unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: OperationId,
    pub kind: OperationKind,
    pub payload: serde_json::Value,
    pub subject_id: SubjectId,
    pub created_at: DateTime<Utc>,
    pub status: OperationStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub last_attempt_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<OperationId>,
}

impl Operation {
    /// Materialize a request into a fresh `pending` operation.
    pub fn from_request(request: NewOperation, created_at: DateTime<Utc>) -> Self {
        Self {
            id: OperationId::generate(),
            kind: request.kind,
            payload: request.payload,
            subject_id: request.subject_id,
            created_at,
            status: OperationStatus::Pending,
            priority: request.priority,
            retry_count: 0,
            last_attempt_at: None,
            last_error: None,
            depends_on: request.depends_on,
        }
    }
}

/// Caller-supplied description of an operation to enqueue.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOperation {
    pub kind: OperationKind,
    pub subject_id: SubjectId,
    pub payload: serde_json::Value,
    pub priority: Priority,
    pub depends_on: Vec<OperationId>,
}

impl NewOperation {
    pub fn new(
        kind: OperationKind,
        subject_id: impl Into<SubjectId>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            kind,
            subject_id: subject_id.into(),
            payload,
            priority: Priority::default(),
            depends_on: Vec::new(),
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn depends_on(mut self, ids: impl IntoIterator<Item = OperationId>) -> Self {
        self.depends_on = ids.into_iter().collect();
        self
    }
}

impl From<String> for SubjectId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A not-yet-delivered chat message, for optimistic rendering by callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingMessage {
    pub id: OperationId,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// HTTP verbs the transport must support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

/// A request handed to the [`Transport`](crate::traits::Transport).
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<serde_json::Value>,
}

/// A successful (2xx) transport response.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Option<serde_json::Value>,
}
