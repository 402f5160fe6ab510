// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handlers that replay queued operations against the chat REST API.

use std::sync::Arc;

use async_trait::async_trait;
use holdfast_core::{
    AuthProvider, ExecutionError, HttpMethod, Operation, OperationKind, Transport,
    TransportRequest,
};
use tracing::debug;

use crate::executor::{Executor, OperationHandler};

/// Shared state for every route: where to send requests and how to sign
/// them.
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    auth: Arc<dyn AuthProvider>,
    base_url: String,
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        auth: Arc<dyn AuthProvider>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            auth,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<(), ExecutionError> {
        if !self.auth.is_authenticated() {
            return Err(ExecutionError::transient("not authenticated"));
        }
        let request = TransportRequest {
            method,
            url: format!("{}{path}", self.base_url),
            headers: self.auth.auth_headers(),
            body,
        };
        debug!(method = %method, url = %request.url, "replaying request");
        self.transport.request(request).await?;
        Ok(())
    }
}

type PathFn = fn(&Operation) -> Result<String, ExecutionError>;

/// One REST endpoint an operation kind maps to.
#[derive(Clone, Copy)]
pub struct Route {
    pub method: HttpMethod,
    path: PathFn,
    send_body: bool,
}

impl Route {
    pub fn path(&self, operation: &Operation) -> Result<String, ExecutionError> {
        (self.path)(operation)
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("send_body", &self.send_body)
            .finish()
    }
}

/// The endpoint for `kind`.
pub fn route_for(kind: OperationKind) -> Route {
    let route = |method: HttpMethod, path: PathFn, send_body: bool| Route {
        method,
        path,
        send_body,
    };
    match kind {
        OperationKind::CreateSession => route(HttpMethod::Post, sessions_path, true),
        OperationKind::UpdateSession => route(HttpMethod::Patch, session_path, true),
        OperationKind::ArchiveSession => route(HttpMethod::Post, archive_path, true),
        OperationKind::PinSession => route(HttpMethod::Post, pin_path, true),
        OperationKind::SendMessage => route(HttpMethod::Post, messages_path, true),
        OperationKind::DeleteMessage => route(HttpMethod::Delete, message_path, false),
    }
}

fn sessions_path(_op: &Operation) -> Result<String, ExecutionError> {
    Ok("/sessions".to_string())
}

fn session_path(op: &Operation) -> Result<String, ExecutionError> {
    let subject = op.subject_id.as_str();
    if subject.is_empty() {
        return Err(ExecutionError::terminal(format!(
            "{} requires a session id",
            op.kind
        )));
    }
    Ok(format!("/sessions/{}", encode_segment(subject)))
}

fn archive_path(op: &Operation) -> Result<String, ExecutionError> {
    Ok(format!("{}/archive", session_path(op)?))
}

fn pin_path(op: &Operation) -> Result<String, ExecutionError> {
    Ok(format!("{}/pin", session_path(op)?))
}

fn messages_path(op: &Operation) -> Result<String, ExecutionError> {
    Ok(format!("{}/messages", session_path(op)?))
}

fn message_path(op: &Operation) -> Result<String, ExecutionError> {
    let message_id = op
        .payload
        .get("message_id")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ExecutionError::terminal("delete-message payload lacks message_id"))?;
    Ok(format!(
        "{}/messages/{}",
        session_path(op)?,
        encode_segment(message_id)
    ))
}

/// Percent-encode everything outside the unreserved set.
fn encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Handler that replays one [`Route`].
pub struct RouteHandler {
    client: Arc<ApiClient>,
    route: Route,
}

impl RouteHandler {
    pub fn new(client: Arc<ApiClient>, kind: OperationKind) -> Self {
        Self {
            client,
            route: route_for(kind),
        }
    }
}

#[async_trait]
impl OperationHandler for RouteHandler {
    async fn execute(&self, operation: &Operation) -> Result<(), ExecutionError> {
        let path = self.route.path(operation)?;
        let body = self.route.send_body.then(|| operation.payload.clone());
        self.client.send(self.route.method, &path, body).await
    }
}

/// Register a [`RouteHandler`] for every operation kind.
pub fn register_chat_handlers(executor: &mut Executor, client: Arc<ApiClient>) {
    for kind in OperationKind::ALL {
        executor.register(kind, Arc::new(RouteHandler::new(Arc::clone(&client), kind)));
    }
}

/// An executor wired to the chat API for all kinds.
pub fn chat_executor(client: Arc<ApiClient>) -> Executor {
    let mut executor = Executor::new();
    register_chat_handlers(&mut executor, client);
    executor
}
