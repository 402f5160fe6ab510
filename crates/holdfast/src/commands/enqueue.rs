// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `holdfast enqueue` - record an operation for later replay.

use holdfast_config::HoldfastConfig;
use holdfast_core::{HoldfastError, NewOperation};

use super::open_inert_queue;

/// Enqueue and print the new id on stdout.
pub async fn run_enqueue(config: &HoldfastConfig, request: NewOperation) -> Result<(), HoldfastError> {
    let queue = open_inert_queue(config).await?;
    let queued = queue.snapshot().await;
    for dep in &request.depends_on {
        if !queued.iter().any(|op| &op.id == dep) {
            tracing::warn!(dependency = %dep, "dependency is not queued; treating it as satisfied");
        }
    }
    let id = queue.enqueue(request).await;
    println!("{id}");
    Ok(())
}
