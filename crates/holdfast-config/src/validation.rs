// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::HoldfastConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every violation instead of stopping at the first.
pub fn validate_config(config: &HoldfastConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.queue.max_size == 0 {
        fail("queue.max_size must be at least 1".to_string());
    }

    let ratio = config.queue.eviction_target_ratio;
    if !(ratio > 0.0 && ratio <= 1.0) {
        fail(format!(
            "queue.eviction_target_ratio must be in (0, 1], got {ratio}"
        ));
    }

    if config.queue.max_retries == 0 {
        fail("queue.max_retries must be at least 1".to_string());
    }

    if config.queue.storage_key.trim().is_empty() {
        fail("queue.storage_key must not be empty".to_string());
    }

    let backoff = &config.backoff;
    if backoff.multiplier < 1.0 {
        fail(format!(
            "backoff.multiplier must be at least 1.0, got {}",
            backoff.multiplier
        ));
    }

    if !(0.0..1.0).contains(&backoff.jitter) {
        fail(format!(
            "backoff.jitter must be in [0, 1), got {}",
            backoff.jitter
        ));
    }

    if backoff.min_delay_ms > backoff.max_delay_ms {
        fail(format!(
            "backoff.min_delay_ms ({}) must not exceed backoff.max_delay_ms ({})",
            backoff.min_delay_ms, backoff.max_delay_ms
        ));
    }

    let base_url = config.api.base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        fail(format!(
            "api.base_url `{base_url}` must start with http:// or https://"
        ));
    }

    if config.api.timeout_secs == 0 {
        fail("api.timeout_secs must be at least 1".to_string());
    }

    if let Some(status) = config
        .api
        .conflict_statuses
        .iter()
        .find(|s| !(400..=599).contains(*s))
    {
        fail(format!(
            "api.conflict_statuses entries must be 4xx or 5xx, got {status}"
        ));
    }

    if config.connectivity.probe_interval_secs == 0 {
        fail("connectivity.probe_interval_secs must be at least 1".to_string());
    }

    if config.storage.path.trim().is_empty() {
        fail("storage.path must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
