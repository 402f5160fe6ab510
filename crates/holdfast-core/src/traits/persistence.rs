// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable key-value slot used to mirror the queue.

use async_trait::async_trait;

use crate::error::HoldfastError;

/// Load/save contract for the queue's persisted bytes.
///
/// Writes are last-writer-wins; implementations perform no
/// compare-and-swap against the stored copy.
#[async_trait]
pub trait Persistence: Send + Sync + 'static {
    /// Returns the bytes stored under `key`, or `None` if the slot is empty.
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, HoldfastError>;

    /// Replaces the bytes stored under `key`.
    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), HoldfastError>;
}
