// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `holdfast cleanup` and `holdfast clear`.

use holdfast_config::HoldfastConfig;
use holdfast_core::{HoldfastError, SubjectId};

use super::open_inert_queue;

pub async fn run_cleanup(config: &HoldfastConfig) -> Result<(), HoldfastError> {
    let queue = open_inert_queue(config).await?;
    let removed = queue.cleanup().await;
    println!(
        "removed {removed} operation(s) older than {} day(s)",
        config.queue.retention_days
    );
    Ok(())
}

pub async fn run_clear(config: &HoldfastConfig, subject: String) -> Result<(), HoldfastError> {
    let queue = open_inert_queue(config).await?;
    let removed = queue.remove_by_subject(&SubjectId::from(subject.clone())).await;
    println!("removed {removed} operation(s) for {subject}");
    Ok(())
}
