//! Config validation: field checks with user-friendly error messages.

use crate::schema::TrackwatchConfig;
use thiserror::Error;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Append warnings found outside [`validate`], such as rejected env values.
    pub fn with_warnings(mut self, warnings: impl IntoIterator<Item = ConfigValidationError>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &TrackwatchConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_discord(config, &mut report);
    validate_tracking(config, &mut report);
    validate_messages(config, &mut report);
    validate_http(config, &mut report);
    report
}

fn validate_discord(config: &TrackwatchConfig, report: &mut ValidationReport) {
    if config.discord.bot_token.is_none() {
        report.warn("discord.botToken", "No bot token configured; `serve` will refuse to start");
    }
    if config.discord.command_prefix.chars().any(char::is_whitespace) {
        report.error("discord.commandPrefix", "Command prefix cannot contain whitespace");
    }
}

fn validate_tracking(config: &TrackwatchConfig, report: &mut ValidationReport) {
    let t = &config.tracking;
    if t.target_days == 0 {
        report.error("tracking.targetDays", "targetDays must be >= 1");
    }
    if t.check_interval_minutes == 0 {
        report.error("tracking.checkIntervalMinutes", "checkIntervalMinutes must be >= 1");
    }
    if t.thresholds.is_empty() {
        report.error("tracking.thresholds", "At least one threshold is required");
    }
    for &threshold in &t.thresholds {
        if threshold >= t.target_days && t.target_days > 0 {
            report.warn(
                "tracking.thresholds",
                format!(
                    "Threshold {threshold} is not below targetDays {}; it fires right after every post",
                    t.target_days
                ),
            );
        }
    }
    if t.audio_extensions.is_empty() {
        report.error("tracking.audioExtensions", "At least one audio extension is required");
    }
    if t.backfill_budget == 0 {
        report.warn("tracking.backfillBudget", "Backfill budget is 0; history scans do nothing");
    }
}

fn validate_messages(config: &TrackwatchConfig, report: &mut ValidationReport) {
    for &threshold in &config.tracking.thresholds {
        match config.messages.templates.get(&threshold) {
            None => report.error(
                format!("messages.templates.{threshold}"),
                "Threshold has no template",
            ),
            Some(tpl) if tpl.trim().is_empty() => report.error(
                format!("messages.templates.{threshold}"),
                "Template cannot be empty",
            ),
            Some(tpl) if !tpl.contains("{user}") => report.warn(
                format!("messages.templates.{threshold}"),
                "Template does not mention {user}; the member will not be pinged",
            ),
            Some(_) => {}
        }
    }
    for key in config.messages.templates.keys() {
        if !config.tracking.thresholds.contains(key) {
            report.warn(
                format!("messages.templates.{key}"),
                "Template has no matching threshold and is never used",
            );
        }
    }
}

fn validate_http(config: &TrackwatchConfig, report: &mut ValidationReport) {
    if config.http.port == 0 {
        report.error("http.port", "Port must be > 0");
    }
}
