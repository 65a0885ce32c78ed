//! trackwatch runtime configuration schema.
//!
//! Every section is optional in the YAML file; missing fields take the
//! values in [`crate::defaults`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::defaults;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackwatchConfig {
    /// Chat platform credentials and command handling
    pub discord: DiscordConfig,
    /// Deadline, thresholds, and what counts as a track
    pub tracking: TrackingConfig,
    /// Reminder templates keyed by threshold day count
    pub messages: MessagesConfig,
    /// Where activity records are persisted
    pub storage: StorageConfig,
    /// Liveness endpoint and API
    pub http: HttpConfig,
    pub logging: LoggingConfig,
}

impl TrackwatchConfig {
    /// Copy safe to log or print: secrets are masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.discord.bot_token.is_some() {
            copy.discord.bot_token = Some("***".to_string());
        }
        copy
    }
}

// ---------------------------------------------------------------------------
// Discord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiscordConfig {
    pub bot_token: Option<String>,
    /// Prefix that marks a chat message as a command, e.g. `!check`.
    pub command_prefix: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            command_prefix: defaults::DEFAULT_COMMAND_PREFIX.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tracking
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackingConfig {
    /// Days a member may go without posting before they are overdue.
    pub target_days: u32,
    pub check_interval_minutes: u64,
    /// Delay before the first pass, giving the platform client time to connect.
    pub startup_grace_secs: u64,
    /// Reminder thresholds in days left; `0` means overdue.
    pub thresholds: Vec<u32>,
    /// Attachment extensions that count as a posted track.
    pub audio_extensions: Vec<String>,
    /// Maximum messages scanned per channel backfill.
    pub backfill_budget: usize,
    /// Backfill the invoking channel before an on-demand `check`.
    pub backfill_on_check: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            target_days: defaults::DEFAULT_TARGET_DAYS,
            check_interval_minutes: defaults::DEFAULT_CHECK_INTERVAL_MINUTES,
            startup_grace_secs: defaults::DEFAULT_STARTUP_GRACE_SECS,
            thresholds: defaults::DEFAULT_THRESHOLDS.to_vec(),
            audio_extensions: defaults::DEFAULT_AUDIO_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            backfill_budget: defaults::DEFAULT_BACKFILL_BUDGET,
            backfill_on_check: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessagesConfig {
    /// Template per threshold. Placeholders: `{user}`, `{duedate}`.
    pub templates: BTreeMap<u32, String>,
    /// Used for a threshold that has no template of its own.
    pub fallback: Option<String>,
}

// ---------------------------------------------------------------------------
// Storage / HTTP / logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageConfig {
    pub data_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from(defaults::DEFAULT_DATA_FILE),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: defaults::DEFAULT_BIND_ADDRESS.to_string(),
            port: defaults::DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    pub level: String,
    /// Directory for rolling NDJSON logs; console only when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let yaml = r#"
tracking:
  targetDays: 14
messages:
  templates:
    7: "{user} one week left"
"#;
        let cfg: TrackwatchConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.tracking.target_days, 14);
        assert_eq!(cfg.tracking.thresholds, vec![7, 3, 1, 0]);
        assert_eq!(cfg.messages.templates[&7], "{user} one week left");
        assert_eq!(cfg.http.port, defaults::DEFAULT_PORT);
    }

    #[test]
    fn redacted_masks_token() {
        let mut cfg = TrackwatchConfig::default();
        cfg.discord.bot_token = Some("real-token".into());
        let json = serde_json::to_string(&cfg.redacted()).unwrap();
        assert!(!json.contains("real-token"));
        assert!(json.contains("***"));
    }
}
