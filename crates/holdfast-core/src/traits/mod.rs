// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits the queue core consumes.
//!
//! The queue never talks to the network, the credential store, or the disk
//! directly; it goes through these seams so each can be swapped or mocked.

pub mod auth;
pub mod persistence;
pub mod transport;

pub use auth::AuthProvider;
pub use persistence::Persistence;
pub use transport::Transport;
