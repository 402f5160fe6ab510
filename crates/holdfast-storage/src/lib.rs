// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence backends for the Holdfast offline queue.
//!
//! Each backend implements [`holdfast_core::Persistence`]: a durable
//! key-value slot with last-writer-wins semantics.

pub mod file;
pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use holdfast_config::model::{StorageBackend, StorageConfig};
use holdfast_core::{HoldfastError, Persistence};
use tracing::info;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Open the backend selected by `config`.
pub async fn open_persistence(
    config: &StorageConfig,
) -> Result<Arc<dyn Persistence>, HoldfastError> {
    info!(backend = ?config.backend, path = %config.path, "opening queue storage");
    Ok(match config.backend {
        StorageBackend::Sqlite => Arc::new(SqliteStore::open(&config.path).await?),
        StorageBackend::File => Arc::new(FileStore::open(&config.path).await?),
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
    })
}
