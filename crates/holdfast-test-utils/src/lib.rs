// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Holdfast integration tests.
//!
//! Provides mock collaborators and a harness for fast, deterministic,
//! CI-runnable tests without a network or a disk.
//!
//! # Components
//!
//! - [`MockTransport`] - scripted HTTP responses with request capture
//! - [`ScriptedHandler`] - operation handler with scripted outcomes
//! - [`FlakyStore`] - in-memory persistence whose writes can be made to fail
//! - [`EventRecorder`] - collects queue events from the broadcast stream
//! - [`TestHarness`] - a queue wired to all of the above

pub mod events;
pub mod harness;
pub mod mock_handler;
pub mod mock_persistence;
pub mod mock_transport;

pub use events::EventRecorder;
pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_handler::ScriptedHandler;
pub use mock_persistence::FlakyStore;
pub use mock_transport::MockTransport;
