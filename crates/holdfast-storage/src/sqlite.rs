// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite key-value persistence.
//!
//! All reads and writes are serialized through `tokio-rusqlite`'s single
//! background thread. Do NOT open additional connections for writes.

use std::path::Path;

use async_trait::async_trait;
use holdfast_core::{HoldfastError, Persistence};
use rusqlite::{OptionalExtension, params};
use tracing::debug;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS kv (
    key        TEXT PRIMARY KEY NOT NULL,
    value      BLOB NOT NULL,
    updated_at TEXT NOT NULL
);";

/// Maps a `tokio-rusqlite` or `rusqlite` failure into the shared error type.
pub(crate) fn map_sqlite_err(e: impl std::fmt::Display) -> HoldfastError {
    HoldfastError::Storage {
        source: format!("sqlite: {e}").into(),
    }
}

/// Persisted slots in a single `kv` table.
#[derive(Clone)]
pub struct SqliteStore {
    conn: tokio_rusqlite::Connection,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) the database file in WAL mode.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, HoldfastError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| HoldfastError::Storage { source: e.into() })?;
        }

        let conn = tokio_rusqlite::Connection::open(&path)
            .await
            .map_err(map_sqlite_err)?;
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            debug!(journal_mode = %mode, "sqlite journal mode set");
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
        .map_err(map_sqlite_err)?;

        Ok(Self { conn })
    }

    /// Open a private in-memory database.
    pub async fn open_in_memory() -> Result<Self, HoldfastError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(map_sqlite_err)?;
        conn.call(|conn| -> Result<(), rusqlite::Error> { conn.execute_batch(SCHEMA) })
            .await
            .map_err(map_sqlite_err)?;
        Ok(Self { conn })
    }

    /// Keys currently stored, sorted.
    pub async fn keys(&self) -> Result<Vec<String>, HoldfastError> {
        self.conn
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key")?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect()
            })
            .await
            .map_err(map_sqlite_err)
    }
}

#[async_trait]
impl Persistence for SqliteStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, HoldfastError> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<Vec<u8>>, rusqlite::Error> {
                conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                    row.get(0)
                })
                .optional()
            })
            .await
            .map_err(map_sqlite_err)
    }

    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), HoldfastError> {
        let key = key.to_string();
        let value = bytes.to_vec();
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO kv (key, value, updated_at)
                     VALUES (?1, ?2, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                     ON CONFLICT(key) DO UPDATE SET
                         value = excluded.value,
                         updated_at = excluded.updated_at",
                    params![key, value],
                )?;
                Ok(())
            })
            .await
            .map_err(map_sqlite_err)
    }
}
