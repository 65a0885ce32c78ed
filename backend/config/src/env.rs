//! Environment variable overrides.
//!
//! The bot has always been configured through plain variables (`BOT_TOKEN`,
//! `TARGET_DAYS`, `NOTIFY_7DAYS`, ...). Any variable that is set wins over the
//! YAML file. Unparseable numbers are ignored, keeping the previous value,
//! and come back as rejections so they can be reported once logging is up.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use crate::schema::TrackwatchConfig;
use crate::validation::ConfigValidationError;

/// `NOTIFY_<N>DAYS` / `NOTIFY_<N>DAY` template variables.
static NOTIFY_DAYS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^NOTIFY_(\d+)DAYS?$").unwrap());

/// Template variable for the overdue (`0`) threshold.
const NOTIFY_OVERDUE: &str = "NOTIFY_OVERDUE";

/// Apply overrides from the process environment.
///
/// Returns the updated config and one entry per variable that was set but
/// could not be used.
pub fn apply_env_overrides(config: TrackwatchConfig) -> (TrackwatchConfig, Vec<ConfigValidationError>) {
    apply_env_overrides_with(config, &std::env::vars().collect())
}

/// Apply overrides from the given map (useful for testing).
pub fn apply_env_overrides_with(
    mut config: TrackwatchConfig,
    env: &HashMap<String, String>,
) -> (TrackwatchConfig, Vec<ConfigValidationError>) {
    let mut rejected = Vec::new();
    let get = |name: &str| env.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());

    if let Some(token) = get("BOT_TOKEN") {
        config.discord.bot_token = Some(token.to_string());
    }
    if let Some(prefix) = get("COMMAND_PREFIX") {
        config.discord.command_prefix = prefix.to_string();
    }

    override_positive(
        &mut config.tracking.target_days,
        "TARGET_DAYS",
        get("TARGET_DAYS"),
        &mut rejected,
    );
    override_positive(
        &mut config.tracking.check_interval_minutes,
        "CHECK_INTERVAL_MINUTES",
        get("CHECK_INTERVAL_MINUTES"),
        &mut rejected,
    );
    override_parsed(
        &mut config.tracking.startup_grace_secs,
        "STARTUP_GRACE_SECS",
        get("STARTUP_GRACE_SECS"),
        &mut rejected,
    );
    override_parsed(
        &mut config.tracking.backfill_budget,
        "BACKFILL_BUDGET",
        get("BACKFILL_BUDGET"),
        &mut rejected,
    );

    if let Some(list) = get("NOTIFY_THRESHOLDS") {
        match parse_list::<u32>(list) {
            Ok(thresholds) if !thresholds.is_empty() => config.tracking.thresholds = thresholds,
            _ => rejected.push(rejection("NOTIFY_THRESHOLDS", list, "expected a comma-separated list of day counts")),
        }
    }
    if let Some(list) = get("AUDIO_EXTENSIONS") {
        config.tracking.audio_extensions = list.split(',').map(|e| e.trim().to_string()).collect();
    }

    for (name, value) in env {
        if value.trim().is_empty() {
            continue;
        }
        let threshold = if name == NOTIFY_OVERDUE {
            Some(0)
        } else {
            NOTIFY_DAYS_PATTERN
                .captures(name)
                .and_then(|caps| caps[1].parse::<u32>().ok())
        };
        if let Some(t) = threshold {
            config.messages.templates.insert(t, value.clone());
        }
    }

    if let Some(path) = get("DATA_FILE") {
        config.storage.data_file = PathBuf::from(path);
    }
    if let Some(bind) = get("BIND_ADDRESS") {
        config.http.bind_address = bind.to_string();
    }
    override_positive(&mut config.http.port, "PORT", get("PORT"), &mut rejected);

    if let Some(level) = get("RUST_LOG") {
        config.logging.level = level.to_string();
    }
    if let Some(dir) = get("TRACKWATCH_LOG_DIR") {
        config.logging.dir = Some(PathBuf::from(dir));
    }

    (config, rejected)
}

fn rejection(name: &str, raw: &str, reason: &str) -> ConfigValidationError {
    ConfigValidationError {
        path: format!("env.{name}"),
        message: format!("ignoring {raw:?}: {reason}"),
    }
}

fn override_parsed<T: FromStr>(
    slot: &mut T,
    name: &str,
    raw: Option<&str>,
    rejected: &mut Vec<ConfigValidationError>,
) {
    let Some(raw) = raw else { return };
    match raw.parse() {
        Ok(v) => *slot = v,
        Err(_) => rejected.push(rejection(name, raw, "not a number")),
    }
}

/// Like [`override_parsed`] but zero is treated as unset.
fn override_positive<T: FromStr + Default + PartialEq>(
    slot: &mut T,
    name: &str,
    raw: Option<&str>,
    rejected: &mut Vec<ConfigValidationError>,
) {
    let Some(raw) = raw else { return };
    match raw.parse::<T>() {
        Ok(v) if v != T::default() => *slot = v,
        _ => rejected.push(rejection(name, raw, "expected a positive number")),
    }
}

fn parse_list<T: FromStr>(raw: &str) -> Result<Vec<T>, T::Err> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}
