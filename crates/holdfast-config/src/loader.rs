// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Lookup order: `/etc/holdfast/holdfast.toml`, then
//! `~/.config/holdfast/holdfast.toml`, then `./holdfast.toml`, with
//! `HOLDFAST_` environment variables applied last.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::HoldfastConfig;

/// Top-level sections an environment variable may address.
const SECTIONS: &[&str] = &[
    "logging",
    "queue",
    "backoff",
    "api",
    "connectivity",
    "storage",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
pub fn load_config() -> Result<HoldfastConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no file lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<HoldfastConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HoldfastConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<HoldfastConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HoldfastConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(HoldfastConfig::default()))
        .merge(Toml::file("/etc/holdfast/holdfast.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("holdfast/holdfast.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("holdfast.toml"))
        .merge(env_provider())
}

/// Map `HOLDFAST_QUEUE_MAX_SIZE` to `queue.max_size`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `HOLDFAST_QUEUE_STORAGE_KEY` stays `queue.storage_key`.
pub(crate) fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

fn env_provider() -> Env {
    Env::prefixed("HOLDFAST_").map(|key| map_env_key(key.as_str()).into())
}
