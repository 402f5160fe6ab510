// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Holdfast offline queue.
//!
//! TOML configuration with strict validation (`deny_unknown_fields`), XDG
//! file lookup, `HOLDFAST_*` environment overrides, and miette diagnostics
//! with typo suggestions.
//!
//! ```no_run
//! let config = holdfast_config::load_and_validate().expect("config errors");
//! println!("queue cap: {}", config.queue.max_size);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::HoldfastConfig;

/// Load configuration from the standard locations and validate it.
pub fn load_and_validate() -> Result<HoldfastConfig, Vec<ConfigError>> {
    checked(loader::load_config(), collect_toml_sources)
}

/// Load configuration from an explicit file and validate it.
///
/// Unlike the standard locations, a missing file is an error.
pub fn load_and_validate_path(path: &std::path::Path) -> Result<HoldfastConfig, Vec<ConfigError>> {
    if !path.is_file() {
        return Err(vec![ConfigError::Other(format!(
            "config file {} does not exist",
            path.display()
        ))]);
    }
    checked(loader::load_config_from_path(path), || {
        std::fs::read_to_string(path)
            .map(|content| vec![(path.display().to_string(), content)])
            .unwrap_or_default()
    })
}

/// Validate a TOML string on top of the defaults, ignoring files and env.
pub fn load_and_validate_str(toml_content: &str) -> Result<HoldfastConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

/// Run semantic validation on success; otherwise build diagnostics, reading
/// sources only when there is something to report.
fn checked(
    loaded: Result<HoldfastConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<HoldfastConfig, Vec<ConfigError>> {
    let config = loaded.map_err(|err| diagnostic::figment_to_config_errors(err, &sources()))?;
    validation::validate_config(&config)?;
    Ok(config)
}

/// Collect TOML source contents for error span resolution.
fn collect_toml_sources() -> Vec<(String, String)> {
    let mut candidates = vec![std::path::PathBuf::from("/etc/holdfast/holdfast.toml")];
    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join("holdfast/holdfast.toml"));
    }
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join("holdfast.toml"));
    }

    candidates
        .into_iter()
        .filter_map(|path| {
            std::fs::read_to_string(&path)
                .ok()
                .map(|content| (path.display().to_string(), content))
        })
        .collect()
}
