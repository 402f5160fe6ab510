// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable offline operation queue.
//!
//! API calls made while the network is unavailable are captured as
//! [`Operation`](holdfast_core::Operation)s, persisted write-through, and
//! replayed once connectivity returns:
//!
//! - [`store`] keeps the ordered list and its persisted mirror;
//! - [`queue`] drains it one operation at a time, with backoff between
//!   passes and a background worker driven by connectivity;
//! - [`executor`] maps each operation kind to a handler and classifies the
//!   outcome; [`handlers`] supplies the chat API routes.

pub mod backoff;
pub mod codec;
pub mod connectivity;
pub mod executor;
pub mod handlers;
pub mod queue;
pub mod store;

pub use backoff::BackoffPolicy;
pub use connectivity::{ConnectivityMonitor, ManualConnectivity};
pub use executor::{ConflictPredicate, Executor, OperationHandler, Outcome};
pub use handlers::{ApiClient, RouteHandler, chat_executor, register_chat_handlers, route_for};
pub use queue::{DrainReport, OfflineQueue, OfflineQueueBuilder, QueueSettings};
pub use store::{LoadReport, QueueStore, StoreLimits};
