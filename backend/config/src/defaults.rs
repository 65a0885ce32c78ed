//! Config defaults: constants plus the normalization applied after loading.

use crate::schema::TrackwatchConfig;

pub const DEFAULT_TARGET_DAYS: u32 = 30;
pub const DEFAULT_CHECK_INTERVAL_MINUTES: u64 = 60;
pub const DEFAULT_STARTUP_GRACE_SECS: u64 = 10;
pub const DEFAULT_THRESHOLDS: &[u32] = &[7, 3, 1, 0];
pub const DEFAULT_AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "flac", "ogg", "aac", "opus"];
pub const DEFAULT_BACKFILL_BUDGET: usize = 1_000;
pub const DEFAULT_DATA_FILE: &str = "./audioData.json";
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 10_000;
pub const DEFAULT_COMMAND_PREFIX: &str = "!";

pub const DEFAULT_FALLBACK_TEMPLATE: &str = "{user} only a few days left to post a track! {duedate}";

/// Built-in reminder wording for the standard thresholds.
pub fn default_template(threshold: u32) -> Option<&'static str> {
    match threshold {
        7 => Some("{user} you have 7 days or less left to post a track! 💣 {duedate}"),
        3 => Some("{user}! ⚠️ Few days left! Post music! 🥺 {duedate}"),
        1 => Some("😱 {user}!!! 1 day left to post music! QUICK send something 🙏"),
        0 => Some("🚨🚨🚨 {user}!!!!! It's been over a month of no music! 😳😳😳"),
        _ => None,
    }
}

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: TrackwatchConfig) -> TrackwatchConfig {
    let config = apply_threshold_defaults(config);
    let config = apply_template_defaults(config);
    let config = apply_extension_defaults(config);
    apply_discord_defaults(config)
}

/// Thresholds are kept sorted most severe first, without duplicates.
fn apply_threshold_defaults(mut config: TrackwatchConfig) -> TrackwatchConfig {
    let thresholds = &mut config.tracking.thresholds;
    if thresholds.is_empty() {
        thresholds.extend_from_slice(DEFAULT_THRESHOLDS);
    }
    thresholds.sort_unstable();
    thresholds.dedup();
    config
}

/// Ensure every configured threshold has a template.
fn apply_template_defaults(mut config: TrackwatchConfig) -> TrackwatchConfig {
    let fallback = config
        .messages
        .fallback
        .get_or_insert_with(|| DEFAULT_FALLBACK_TEMPLATE.to_string())
        .clone();
    for &t in &config.tracking.thresholds {
        config
            .messages
            .templates
            .entry(t)
            .or_insert_with(|| default_template(t).map(str::to_string).unwrap_or_else(|| fallback.clone()));
    }
    config
}

fn apply_extension_defaults(mut config: TrackwatchConfig) -> TrackwatchConfig {
    let exts = &mut config.tracking.audio_extensions;
    for e in exts.iter_mut() {
        *e = e.trim().trim_start_matches('.').to_ascii_lowercase();
    }
    exts.retain(|e| !e.is_empty());
    if exts.is_empty() {
        exts.extend(DEFAULT_AUDIO_EXTENSIONS.iter().map(|e| e.to_string()));
    }
    config
}

fn apply_discord_defaults(mut config: TrackwatchConfig) -> TrackwatchConfig {
    if config.discord.command_prefix.trim().is_empty() {
        config.discord.command_prefix = DEFAULT_COMMAND_PREFIX.to_string();
    }
    if config.discord.bot_token.as_deref().is_some_and(|t| t.trim().is_empty()) {
        config.discord.bot_token = None;
    }
    config
}
