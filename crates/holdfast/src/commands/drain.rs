// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `holdfast drain` - replay the queue against the configured API.
//!
//! Passes are driven in the foreground with [`OfflineQueue::force_process`],
//! sleeping for the queue's backoff between passes, until nothing is owed
//! an attempt or the deadline passes. A pass is never cut short by the
//! deadline; the per-request timeout bounds it instead.

use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use holdfast_config::HoldfastConfig;
use holdfast_core::HoldfastError;
use holdfast_http::{BearerAuth, HttpProbe, HttpTransport};
use holdfast_queue::{ApiClient, ConnectivityMonitor, DrainReport, OfflineQueue, chat_executor};
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{open_queue, use_color};

/// How long to wait before trying again while offline.
const OFFLINE_POLL: Duration = Duration::from_secs(1);

/// Accumulated results of every pass in one `drain` run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct DrainTotals {
    pub passes: usize,
    pub attempted: usize,
    pub completed: usize,
    pub retried: usize,
    pub failed: usize,
    pub conflicted: usize,
    pub cascaded: usize,
    pub remaining: usize,
    pub timed_out: bool,
}

impl DrainTotals {
    fn absorb(&mut self, report: &DrainReport) {
        self.passes += 1;
        self.attempted += report.attempted;
        self.completed += report.completed;
        self.retried += report.retried;
        self.failed += report.failed;
        self.conflicted += report.conflicted;
        self.cascaded += report.cascaded;
        self.remaining = report.remaining;
    }
}

pub async fn run_drain(
    config: &HoldfastConfig,
    timeout: Duration,
    json: bool,
    plain: bool,
) -> Result<(), HoldfastError> {
    let transport = Arc::new(HttpTransport::from_config(&config.api)?);
    let auth = Arc::new(BearerAuth::new(config.api.bearer_token.clone()));
    let client = Arc::new(ApiClient::new(transport, auth, config.api.base_url.clone()));

    let cancel = CancellationToken::new();
    let (connectivity, probe) = match HttpProbe::from_config(&config.connectivity)? {
        Some(probe) => {
            let (rx, handle) = probe.spawn(cancel.clone()).await;
            (ConnectivityMonitor::new(rx), Some(handle))
        }
        None => (ConnectivityMonitor::always_online(), None),
    };

    let queue = open_queue(config, chat_executor(client), connectivity).await?;
    let totals = drain_until_settled(&queue, timeout).await;
    queue.shutdown().await;
    cancel.cancel();
    if let Some(handle) = probe {
        let _ = handle.await;
    }

    print_totals(&totals, json, plain)?;
    if totals.timed_out {
        return Err(HoldfastError::Timeout { duration: timeout });
    }
    Ok(())
}

/// Run passes until nothing is owed an attempt or `timeout` elapses.
pub async fn drain_until_settled(queue: &OfflineQueue, timeout: Duration) -> DrainTotals {
    let deadline = Instant::now() + timeout;
    let mut totals = DrainTotals::default();

    loop {
        let wait = match queue.force_process().await {
            Some(report) => {
                totals.absorb(&report);
                if report.remaining == 0 {
                    break;
                }
                report
                    .next_retry_ms
                    .map(Duration::from_millis)
                    .unwrap_or(OFFLINE_POLL)
            }
            None => {
                debug!("drain pass skipped, waiting for connectivity");
                OFFLINE_POLL
            }
        };

        if Instant::now() + wait >= deadline {
            totals.timed_out = true;
            break;
        }
        debug!(wait_ms = wait.as_millis() as u64, "waiting before next pass");
        tokio::time::sleep(wait).await;
    }

    totals.remaining = queue
        .snapshot()
        .await
        .iter()
        .filter(|op| op.status.is_active())
        .count();
    info!(
        passes = totals.passes,
        completed = totals.completed,
        remaining = totals.remaining,
        timed_out = totals.timed_out,
        "drain finished"
    );
    totals
}

fn print_totals(totals: &DrainTotals, json: bool, plain: bool) -> Result<(), HoldfastError> {
    if json {
        let out = serde_json::to_string_pretty(totals)
            .map_err(|e| HoldfastError::Internal(format!("failed to render drain totals: {e}")))?;
        println!("{out}");
        return Ok(());
    }

    let summary = format!(
        "completed {} of {} attempt(s) in {} pass(es); {} failed, {} conflicted, {} cascaded, {} remaining",
        totals.completed,
        totals.attempted,
        totals.passes,
        totals.failed,
        totals.conflicted,
        totals.cascaded,
        totals.remaining,
    );
    if use_color(plain) {
        if totals.remaining == 0 && totals.failed == 0 && totals.conflicted == 0 {
            println!("{}", summary.green());
        } else {
            println!("{}", summary.yellow());
        }
    } else {
        println!("{summary}");
    }
    Ok(())
}
