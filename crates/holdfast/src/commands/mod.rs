// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subcommand implementations and shared helpers.

pub mod drain;
pub mod enqueue;
pub mod list;
pub mod maintenance;
pub mod status;

use std::io::IsTerminal;
use std::str::FromStr;

use holdfast_config::HoldfastConfig;
use holdfast_core::{HoldfastError, OperationKind, Priority};
use holdfast_queue::{ConnectivityMonitor, Executor, OfflineQueue, QueueSettings};
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber on stderr.
///
/// `RUST_LOG` wins over the configured level.
pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("holdfast={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Open the configured storage and load the queue without starting its worker.
pub async fn open_queue(
    config: &HoldfastConfig,
    executor: Executor,
    connectivity: ConnectivityMonitor,
) -> Result<OfflineQueue, HoldfastError> {
    let persistence = holdfast_storage::open_persistence(&config.storage).await?;
    OfflineQueue::builder()
        .settings(QueueSettings::from_config(config))
        .persistence(persistence)
        .executor(executor)
        .connectivity(connectivity)
        .build()
        .await
}

/// Queue for read-only and maintenance commands: no handlers, never drains.
pub async fn open_inert_queue(config: &HoldfastConfig) -> Result<OfflineQueue, HoldfastError> {
    open_queue(config, Executor::new(), ConnectivityMonitor::always_online()).await
}

pub fn use_color(plain: bool) -> bool {
    !plain && std::io::stdout().is_terminal()
}

pub fn parse_kind(s: &str) -> Result<OperationKind, String> {
    OperationKind::from_str(s).map_err(|_| {
        let valid: Vec<String> = OperationKind::ALL.iter().map(|k| k.to_string()).collect();
        format!("unknown operation kind '{s}' (expected one of: {})", valid.join(", "))
    })
}

pub fn parse_priority(s: &str) -> Result<Priority, String> {
    Priority::from_str(s).map_err(|_| format!("unknown priority '{s}' (expected high, medium or low)"))
}

pub fn parse_payload(s: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(s).map_err(|e| format!("payload is not valid JSON: {e}"))
}
