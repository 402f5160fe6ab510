// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP transport collaborator.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::types::{TransportRequest, TransportResponse};

/// Performs a single HTTP request.
///
/// Implementations own call-level timeouts and must classify every failure
/// into an [`ErrorKind`](crate::error::ErrorKind). Non-2xx responses are
/// returned as errors.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn request(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}
