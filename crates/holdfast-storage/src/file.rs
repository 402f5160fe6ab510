// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-file-per-key persistence in a directory.
//!
//! Writes go to a sibling temp file which is then renamed over the target,
//! so a crash mid-write leaves the previous contents intact.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use holdfast_core::{HoldfastError, Persistence};
use tracing::debug;

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Creates the directory if needed.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, HoldfastError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| HoldfastError::Storage { source: e.into() })?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, HoldfastError> {
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            || key.starts_with('.')
        {
            return Err(HoldfastError::Storage {
                source: format!("invalid storage key `{key}`").into(),
            });
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl Persistence for FileStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, HoldfastError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(HoldfastError::Storage { source: e.into() }),
        }
    }

    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), HoldfastError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| HoldfastError::Storage { source: e.into() })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| HoldfastError::Storage { source: e.into() })?;
        debug!(path = %path.display(), bytes = bytes.len(), "queue slot written");
        Ok(())
    }
}
