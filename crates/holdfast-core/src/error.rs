// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Holdfast offline queue.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// The primary error type shared across the Holdfast crates.
#[derive(Debug, Error)]
pub enum HoldfastError {
    /// Configuration errors (invalid TOML, bad values, missing fields).
    #[error("configuration error: {0}")]
    Config(String),

    /// Persistence backend errors (file I/O, SQLite failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The persisted queue could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The HTTP transport could not be constructed or failed outside an operation.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// No operation with the given id is present in the queue.
    #[error("operation not found: {0}")]
    NotFound(String),

    /// An awaited condition did not complete in time.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// How a failed execution should be treated by the scheduler.
///
/// Set by the transport adapter (or a handler) from structured information
/// such as the HTTP status, never inferred from message text.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Network error, timeout, 5xx. Eligible for retry.
    Transient,
    /// Version or precondition mismatch. Never retried.
    Conflict,
    /// The request can never succeed as written.
    Terminal,
}

/// Error surfaced by a [`Transport`](crate::traits::Transport) request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} transport failure: {message}")]
pub struct TransportError {
    pub kind: ErrorKind,
    /// HTTP status code, when the server answered.
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// Error returned by the executor for a single operation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind} failure: {message}")]
pub struct ExecutionError {
    pub kind: ErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl ExecutionError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Transient,
            status: None,
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Conflict,
            status: None,
            message: message.into(),
        }
    }

    pub fn terminal(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Terminal,
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

impl From<TransportError> for ExecutionError {
    fn from(err: TransportError) -> Self {
        Self {
            kind: err.kind,
            status: err.status,
            message: err.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_converts_with_status() {
        let err = TransportError::new(ErrorKind::Conflict, "version mismatch").with_status(409);
        let exec: ExecutionError = err.into();
        assert_eq!(exec.kind, ErrorKind::Conflict);
        assert_eq!(exec.status, Some(409));
        assert_eq!(exec.message, "version mismatch");
    }

    #[test]
    fn error_kind_display_is_snake_case() {
        assert_eq!(ErrorKind::Transient.to_string(), "transient");
        assert_eq!(ErrorKind::Conflict.to_string(), "conflict");
    }

    #[test]
    fn execution_error_message_includes_kind() {
        let err = ExecutionError::terminal("missing message_id");
        assert_eq!(err.to_string(), "terminal failure: missing message_id");
    }
}
