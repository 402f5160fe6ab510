// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory persistence, for tests and ephemeral queues.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use holdfast_core::{HoldfastError, Persistence};
use tokio::sync::RwLock;

/// Keeps persisted slots in a shared map.
///
/// Clones share the same map, so a test can hand one clone to a queue and
/// inspect or pre-seed slots through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slots: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the bytes under `key`.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.slots.read().await.get(key).cloned()
    }

    /// Seeds a slot directly, bypassing any queue.
    pub async fn put(&self, key: &str, bytes: Vec<u8>) {
        self.slots.write().await.insert(key.to_string(), bytes);
    }
}

#[async_trait]
impl Persistence for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, HoldfastError> {
        Ok(self.get(key).await)
    }

    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), HoldfastError> {
        self.put(key, bytes.to_vec()).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clones_share_slots() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.save("k", b"v1").await.unwrap();
        assert_eq!(other.load("k").await.unwrap(), Some(b"v1".to_vec()));
        assert_eq!(other.load("missing").await.unwrap(), None);
    }
}
