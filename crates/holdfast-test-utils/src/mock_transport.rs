// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock HTTP transport for deterministic handler tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use holdfast_core::{ErrorKind, Transport, TransportError, TransportRequest, TransportResponse};
use tokio::sync::Mutex;

type Scripted = Result<TransportResponse, TransportError>;

/// A transport that replays scripted results and records every request.
///
/// Results are popped from a FIFO queue. When the queue is empty the
/// request succeeds with `200` and no body.
#[derive(Clone, Default)]
pub struct MockTransport {
    responses: Arc<Mutex<VecDeque<Scripted>>>,
    requests: Arc<Mutex<Vec<TransportRequest>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(responses: Vec<Scripted>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            requests: Arc::default(),
        }
    }

    pub async fn push_ok(&self, status: u16, body: Option<serde_json::Value>) {
        self.responses
            .lock()
            .await
            .push_back(Ok(TransportResponse { status, body }));
    }

    /// Queue a failure with the given classification and HTTP status.
    pub async fn push_error(&self, kind: ErrorKind, status: Option<u16>, message: &str) {
        let mut error = TransportError::new(kind, message);
        if let Some(status) = status {
            error = error.with_status(status);
        }
        self.responses.lock().await.push_back(Err(error));
    }

    /// Requests received so far, oldest first.
    pub async fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.requests.lock().await.push(request);
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or(Ok(TransportResponse {
                status: 200,
                body: None,
            }))
    }
}
