// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Jittered exponential delay between drain passes.

use std::time::Duration;

use holdfast_config::model::BackoffConfig;
use rand::Rng;

#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub multiplier: f64,
    /// Relative jitter in both directions, 0.0..=1.0.
    pub jitter: f64,
    pub min: Duration,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&BackoffConfig::default())
    }
}

impl BackoffPolicy {
    pub fn from_config(config: &BackoffConfig) -> Self {
        Self {
            base: config.base_delay(),
            multiplier: config.multiplier,
            jitter: config.jitter.clamp(0.0, 1.0),
            min: config.min_delay(),
            max: config.max_delay(),
        }
    }

    /// A policy with no jitter, for deterministic schedules.
    pub fn without_jitter(mut self) -> Self {
        self.jitter = 0.0;
        self
    }

    /// `min(max, base * multiplier^retry_count)` before jitter.
    pub fn raw_delay(&self, retry_count: u32) -> Duration {
        let exponent = i32::try_from(retry_count).unwrap_or(i32::MAX);
        let factor = self.multiplier.powi(exponent);
        let millis = (self.base.as_millis() as f64) * factor;
        if !millis.is_finite() || millis >= self.max.as_millis() as f64 {
            return self.max;
        }
        Duration::from_millis(millis.max(0.0).round() as u64)
    }

    /// Jittered delay for the next pass, clamped to `[min, max]`.
    pub fn delay(&self, retry_count: u32) -> Duration {
        let unit = if self.jitter > 0.0 {
            rand::thread_rng().gen_range(-1.0..=1.0)
        } else {
            0.0
        };
        self.delay_with_unit(retry_count, unit)
    }

    /// Delay with an explicit jitter sample `unit` in `-1.0..=1.0`.
    pub fn delay_with_unit(&self, retry_count: u32, unit: f64) -> Duration {
        let raw = self.raw_delay(retry_count).as_millis() as f64;
        let jittered = raw * (1.0 + self.jitter * unit.clamp(-1.0, 1.0));
        let clamped = jittered.clamp(self.min.as_millis() as f64, self.max.as_millis() as f64);
        Duration::from_millis(clamped.round() as u64)
    }
}
