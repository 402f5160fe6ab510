// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `holdfast status` - summary of the persisted queue.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use colored::Colorize;
use holdfast_config::HoldfastConfig;
use holdfast_core::{HoldfastError, Operation, OperationStatus};
use serde::Serialize;

use super::{open_inert_queue, use_color};

/// JSON shape of `holdfast status --json`.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub backend: String,
    pub path: String,
    pub storage_key: String,
    pub total: usize,
    pub pending: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_kind: BTreeMap<String, usize>,
    pub oldest_pending: Option<DateTime<Utc>>,
}

impl StatusReport {
    pub fn from_operations(config: &HoldfastConfig, operations: &[Operation]) -> Self {
        let mut by_status = BTreeMap::new();
        let mut by_kind = BTreeMap::new();
        for op in operations {
            *by_status.entry(op.status.to_string()).or_insert(0) += 1;
            *by_kind.entry(op.kind.to_string()).or_insert(0) += 1;
        }
        let pending = operations
            .iter()
            .filter(|op| op.status == OperationStatus::Pending)
            .count();
        let oldest_pending = operations
            .iter()
            .filter(|op| op.status.is_active())
            .map(|op| op.created_at)
            .min();

        Self {
            backend: format!("{:?}", config.storage.backend).to_lowercase(),
            path: config.storage.path.clone(),
            storage_key: config.queue.storage_key.clone(),
            total: operations.len(),
            pending,
            by_status,
            by_kind,
            oldest_pending,
        }
    }
}

pub async fn run_status(
    config: &HoldfastConfig,
    json: bool,
    plain: bool,
) -> Result<(), HoldfastError> {
    let queue = open_inert_queue(config).await?;
    let report = StatusReport::from_operations(config, &queue.snapshot().await);

    if json {
        let out = serde_json::to_string_pretty(&report)
            .map_err(|e| HoldfastError::Internal(format!("failed to render status: {e}")))?;
        println!("{out}");
        return Ok(());
    }

    let color = use_color(plain);
    let title = "Holdfast queue";
    if color {
        println!("{}", title.bold());
    } else {
        println!("{title}");
    }
    println!("  {}", "-".repeat(35));
    println!("  Storage:  {} ({})", report.backend, report.path);
    println!("  Key:      {}", report.storage_key);
    println!("  Total:    {}", report.total);
    let pending = report.pending.to_string();
    if color && report.pending > 0 {
        println!("  Pending:  {}", pending.yellow());
    } else {
        println!("  Pending:  {pending}");
    }
    if let Some(oldest) = report.oldest_pending {
        println!("  Oldest:   {}", oldest.to_rfc3339());
    }
    for (status, count) in &report.by_status {
        println!("    {status:<12} {count}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use holdfast_core::{NewOperation, OperationKind};
    use serde_json::json;

    use super::*;

    #[test]
    fn report_counts_by_status_and_kind() {
        let config = HoldfastConfig::default();
        let now = Utc::now();
        let mut done = Operation::from_request(
            NewOperation::new(OperationKind::SendMessage, "s-1", json!({})),
            now,
        );
        done.status = OperationStatus::Completed;
        let older = now - chrono::Duration::minutes(5);
        let pending = Operation::from_request(
            NewOperation::new(OperationKind::SendMessage, "s-1", json!({})),
            older,
        );
        let pin = Operation::from_request(
            NewOperation::new(OperationKind::PinSession, "s-2", json!({})),
            now,
        );

        let report = StatusReport::from_operations(&config, &[done, pending, pin]);

        assert_eq!(report.total, 3);
        assert_eq!(report.pending, 2);
        assert_eq!(report.by_status["completed"], 1);
        assert_eq!(report.by_kind["send-message"], 2);
        assert_eq!(report.oldest_pending, Some(older));
        assert_eq!(report.backend, "sqlite");
    }
}
