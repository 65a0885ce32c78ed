//! `trackwatch-config` — runtime configuration for the trackwatch bot.
//!
//! Provides:
//! - Typed config schema (discord, tracking, messages, storage, http, logging)
//! - Optional YAML file loading
//! - Environment variable overrides using the bot's historical variable names
//! - Default value application and normalization
//! - Validation with errors and warnings

pub mod defaults;
pub mod env;
pub mod io;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{apply_env_overrides, apply_env_overrides_with};
pub use io::{config_dir, config_file_path, load_config};
pub use schema::{
    DiscordConfig, HttpConfig, LoggingConfig, MessagesConfig, StorageConfig, TrackingConfig,
    TrackwatchConfig,
};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{bail, Result};
use std::path::Path;

/// Load the YAML file (if any), then apply env overrides and defaults.
///
/// The result is not validated and nothing is logged, so this can run before
/// the logger exists. Rejected env values come back alongside the config for
/// [`ensure_valid`] to report.
pub async fn load_unvalidated(path: &Path) -> Result<(TrackwatchConfig, Vec<ConfigValidationError>)> {
    let config = load_config(path).await?;
    let (config, rejected) = apply_env_overrides(config);
    Ok((apply_all_defaults(config), rejected))
}

/// Log validation warnings, including rejected env values, and fail on errors.
pub fn ensure_valid(config: &TrackwatchConfig, rejected_env: Vec<ConfigValidationError>) -> Result<()> {
    let report = validate(config).with_warnings(rejected_env);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    if !report.is_valid() {
        let errors: Vec<String> = report.errors.iter().map(ToString::to_string).collect();
        bail!("invalid configuration:\n  {}", errors.join("\n  "));
    }
    Ok(())
}
