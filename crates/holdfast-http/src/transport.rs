// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! reqwest-backed [`Transport`] with structured failure classification.

use std::time::Duration;

use async_trait::async_trait;
use holdfast_config::model::ApiConfig;
use holdfast_core::{
    ErrorKind, HoldfastError, HttpMethod, Transport, TransportError, TransportRequest,
    TransportResponse,
};
use tracing::{debug, warn};

/// Longest response body excerpt carried in an error message.
const ERROR_BODY_LIMIT: usize = 512;

/// HTTP transport for replaying queued operations.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    conflict_statuses: Vec<u16>,
}

impl HttpTransport {
    pub fn new(timeout: Duration, conflict_statuses: Vec<u16>) -> Result<Self, HoldfastError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                HoldfastError::Transport(TransportError::new(
                    ErrorKind::Terminal,
                    format!("failed to build HTTP client: {e}"),
                ))
            })?;
        Ok(Self {
            client,
            conflict_statuses,
        })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, HoldfastError> {
        Self::new(
            Duration::from_secs(config.timeout_secs),
            config.conflict_statuses.clone(),
        )
    }
}

/// Classify a non-2xx status.
///
/// Configured conflict statuses win; 401, 408, 425, 429 and 5xx are worth
/// retrying; any other status is terminal.
pub fn classify_status(status: u16, conflict_statuses: &[u16]) -> ErrorKind {
    if conflict_statuses.contains(&status) {
        return ErrorKind::Conflict;
    }
    match status {
        401 | 408 | 425 | 429 => ErrorKind::Transient,
        500..=599 => ErrorKind::Transient,
        _ => ErrorKind::Terminal,
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            // Connect failures and timeouts are what "offline" looks like.
            warn!(url = %request.url, error = %e, "request did not complete");
            TransportError::new(ErrorKind::Transient, format!("HTTP request failed: {e}"))
        })?;

        let status = response.status();
        debug!(method = %request.method, url = %request.url, status = %status, "response received");

        let text = response.text().await.unwrap_or_default();
        if status.is_success() {
            let body = if text.trim().is_empty() {
                None
            } else {
                serde_json::from_str(&text).ok()
            };
            return Ok(TransportResponse {
                status: status.as_u16(),
                body,
            });
        }

        let kind = classify_status(status.as_u16(), &self.conflict_statuses);
        Err(
            TransportError::new(kind, format!("API returned {status}: {}", truncate(&text)))
                .with_status(status.as_u16()),
        )
    }
}
