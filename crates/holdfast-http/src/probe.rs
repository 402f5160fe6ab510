// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connectivity signal derived from polling a health endpoint.

use std::time::Duration;

use holdfast_config::model::ConnectivityConfig;
use holdfast_core::HoldfastError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Polls `url` and reports a 2xx answer as online.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
    interval: Duration,
}

impl HttpProbe {
    pub fn new(url: String, interval: Duration, timeout: Duration) -> Result<Self, HoldfastError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HoldfastError::Internal(format!("failed to create probe client: {e}")))?;
        Ok(Self {
            client,
            url,
            interval,
        })
    }

    /// Returns `None` when no probe URL is configured.
    pub fn from_config(config: &ConnectivityConfig) -> Result<Option<Self>, HoldfastError> {
        config
            .probe_url
            .as_ref()
            .map(|url| {
                Self::new(
                    url.clone(),
                    Duration::from_secs(config.probe_interval_secs),
                    Duration::from_secs(config.probe_timeout_secs),
                )
            })
            .transpose()
    }

    /// One reachability check.
    pub async fn check(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(url = %self.url, error = %e, "probe failed");
                false
            }
        }
    }

    /// Probe once, then keep probing every interval until `cancel` fires.
    ///
    /// The returned receiver only observes a change when reachability flips.
    pub async fn spawn(
        self,
        cancel: CancellationToken,
    ) -> (watch::Receiver<bool>, JoinHandle<()>) {
        let initial = self.check().await;
        info!(url = %self.url, online = initial, "connectivity probe started");
        let (tx, rx) = watch::channel(initial);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let online = self.check().await;
                let changed = tx.send_if_modified(|current| {
                    if *current == online {
                        false
                    } else {
                        *current = online;
                        true
                    }
                });
                if changed {
                    info!(online, "connectivity changed");
                }
            }
            debug!("connectivity probe stopped");
        });

        (rx, handle)
    }
}
