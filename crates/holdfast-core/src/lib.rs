// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Holdfast offline operation queue.
//!
//! Holds the operation data model, the shared error type, and the
//! collaborator traits (auth, transport, persistence) every other crate in
//! the workspace builds on.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{ErrorKind, ExecutionError, HoldfastError, TransportError};
pub use traits::{AuthProvider, Persistence, Transport};
pub use types::{
    HttpMethod, NewOperation, Operation, OperationId, OperationKind, OperationStatus,
    PendingMessage, Priority, SubjectId, TransportRequest, TransportResponse,
};
