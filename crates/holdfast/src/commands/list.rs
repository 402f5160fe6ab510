// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `holdfast list` - show queued operations.

use colored::Colorize;
use holdfast_config::HoldfastConfig;
use holdfast_core::{HoldfastError, Operation, OperationStatus, SubjectId};

use super::{open_inert_queue, use_color};

pub async fn run_list(
    config: &HoldfastConfig,
    subject: Option<String>,
    json: bool,
    plain: bool,
) -> Result<(), HoldfastError> {
    let queue = open_inert_queue(config).await?;
    let operations = match subject {
        Some(subject) => queue.list_by_subject(&SubjectId::from(subject)).await,
        None => queue.snapshot().await,
    };

    if json {
        let out = serde_json::to_string_pretty(&operations)
            .map_err(|e| HoldfastError::Internal(format!("failed to render operations: {e}")))?;
        println!("{out}");
        return Ok(());
    }

    if operations.is_empty() {
        println!("queue is empty");
        return Ok(());
    }
    let color = use_color(plain);
    for op in &operations {
        println!("{}", format_line(op, color));
    }
    Ok(())
}

fn format_line(op: &Operation, color: bool) -> String {
    let status = format!("{:<10}", op.status.to_string());
    let status = if color {
        match op.status {
            OperationStatus::Completed => status.green().to_string(),
            OperationStatus::Failed | OperationStatus::Conflicted => status.red().to_string(),
            OperationStatus::Retrying => status.yellow().to_string(),
            OperationStatus::Pending => status,
        }
    } else {
        status
    };
    let mut line = format!(
        "{}  {status}  {:<15} {:<6}  {}  retries={}",
        op.id, op.kind.to_string(), op.priority.to_string(), op.subject_id, op.retry_count
    );
    if let Some(err) = &op.last_error {
        line.push_str(&format!("  error=\"{err}\""));
    }
    line
}
