// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence whose writes can be switched to fail.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use holdfast_core::{HoldfastError, Persistence};
use holdfast_storage::MemoryStore;

/// A [`MemoryStore`] that can refuse saves and counts them.
#[derive(Clone, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_saves: Arc<AtomicBool>,
    saves: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_saves.store(failing, Ordering::SeqCst);
    }

    /// Successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.inner
    }
}

#[async_trait]
impl Persistence for FlakyStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, HoldfastError> {
        self.inner.load(key).await
    }

    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), HoldfastError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(HoldfastError::Storage {
                source: "simulated write failure".into(),
            });
        }
        self.inner.save(key, bytes).await?;
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
