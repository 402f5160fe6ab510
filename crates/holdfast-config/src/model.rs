// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Holdfast offline queue.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Holdfast configuration.
///
/// Every section is optional and falls back to its defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HoldfastConfig {
    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Queue sizing, retry ceiling, and retention.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Delayed-retry timing.
    #[serde(default)]
    pub backoff: BackoffConfig,

    /// Remote chat API the queued operations are replayed against.
    #[serde(default)]
    pub api: ApiConfig,

    /// Reachability probing.
    #[serde(default)]
    pub connectivity: ConnectivityConfig,

    /// Where the queue is persisted.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Queue store and scheduler limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Maximum number of operations held before eviction kicks in.
    #[serde(default = "default_max_size")]
    pub max_size: usize,

    /// Fraction of `max_size` the queue is pruned down to on overflow.
    #[serde(default = "default_eviction_target_ratio")]
    pub eviction_target_ratio: f64,

    /// Attempts per operation before it is marked failed.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Age after which terminal operations are removed by cleanup.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Key of the persisted slot.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    /// Fail pending dependents when a dependency fails or conflicts.
    #[serde(default = "default_cascade")]
    pub cascade_dependency_failures: bool,
}

impl QueueConfig {
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention_days))
    }

    /// Number of entries the store shrinks to when it overflows.
    pub fn eviction_target(&self) -> usize {
        ((self.max_size as f64) * self.eviction_target_ratio).floor() as usize
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            eviction_target_ratio: default_eviction_target_ratio(),
            max_retries: default_max_retries(),
            retention_days: default_retention_days(),
            storage_key: default_storage_key(),
            cascade_dependency_failures: default_cascade(),
        }
    }
}

fn default_max_size() -> usize {
    100
}

fn default_eviction_target_ratio() -> f64 {
    0.9
}

fn default_max_retries() -> u32 {
    3
}

fn default_retention_days() -> u32 {
    7
}

fn default_storage_key() -> String {
    "offline-operation-queue".to_string()
}

fn default_cascade() -> bool {
    true
}

/// Exponential backoff between drain passes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackoffConfig {
    /// Delay for an operation that has never been retried.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Growth factor per attempt.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Relative jitter applied in both directions (0.2 = ±20%).
    #[serde(default = "default_jitter")]
    pub jitter: f64,

    /// Floor applied after jitter.
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Ceiling applied before and after jitter.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl BackoffConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            multiplier: default_multiplier(),
            jitter: default_jitter(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_multiplier() -> f64 {
    1.5
}

fn default_jitter() -> f64 {
    0.2
}

fn default_min_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

/// Remote API settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Base URL the handler paths are appended to.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token. `None` leaves requests unauthenticated.
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Per-request timeout enforced by the transport.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// HTTP statuses classified as version/precondition conflicts.
    #[serde(default = "default_conflict_statuses")]
    pub conflict_statuses: Vec<u16>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            bearer_token: None,
            timeout_secs: default_timeout_secs(),
            conflict_statuses: default_conflict_statuses(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080/api".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_conflict_statuses() -> Vec<u16> {
    vec![409, 412]
}

/// Reachability probe settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectivityConfig {
    /// Health URL polled to decide online/offline. `None` assumes online.
    #[serde(default)]
    pub probe_url: Option<String>,

    /// Seconds between probes.
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,

    /// Timeout for a single probe.
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_url: None,
            probe_interval_secs: default_probe_interval_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

fn default_probe_interval_secs() -> u64 {
    15
}

fn default_probe_timeout_secs() -> u64 {
    3
}

/// Persistence backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Sqlite,
    File,
    Memory,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,

    /// SQLite database file, or directory for the file backend.
    #[serde(default = "default_storage_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_storage_path(),
        }
    }
}

fn default_backend() -> StorageBackend {
    StorageBackend::Sqlite
}

fn default_storage_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("holdfast").join("queue.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("queue.db"))
        .to_string_lossy()
        .to_string()
}
