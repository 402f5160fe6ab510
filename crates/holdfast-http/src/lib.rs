// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP collaborators for the Holdfast offline queue.
//!
//! - [`HttpTransport`]: reqwest transport that classifies failures into
//!   transient, conflict, and terminal kinds from the response status.
//! - [`BearerAuth`] / [`AnonymousAuth`]: credential providers.
//! - [`HttpProbe`]: a connectivity signal from polling a health URL.

pub mod auth;
pub mod probe;
pub mod transport;

pub use auth::{AnonymousAuth, BearerAuth};
pub use probe::HttpProbe;
pub use transport::{HttpTransport, classify_status};
