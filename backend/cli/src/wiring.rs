//! Turns a prepared config into engine, scheduler and adapter settings.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use trackwatch_channels::CommandSettings;
use trackwatch_config::TrackwatchConfig;
use trackwatch_core::AttachmentClassifier;
use trackwatch_engine::EscalationPolicy;
use trackwatch_scheduler::SchedulerTiming;
use trackwatch_store::{ActivityStore, JsonFilePersistence};

/// `--config` if given, else `config.yaml` in the trackwatch config directory.
pub fn resolve_config_path(flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(|| trackwatch_config::config_file_path(&trackwatch_config::config_dir()))
}

pub fn build_policy(config: &TrackwatchConfig) -> EscalationPolicy {
    let mut policy = EscalationPolicy::new(
        config.tracking.target_days,
        config.tracking.thresholds.iter().copied(),
    );
    for (&threshold, text) in &config.messages.templates {
        policy = policy.with_template(threshold, text.as_str());
    }
    match &config.messages.fallback {
        Some(fallback) => policy.with_fallback(fallback.as_str()),
        None => policy,
    }
}

pub fn build_classifier(config: &TrackwatchConfig) -> AttachmentClassifier {
    AttachmentClassifier::new(config.tracking.audio_extensions.iter())
}

pub fn open_store(config: &TrackwatchConfig) -> Arc<ActivityStore> {
    Arc::new(ActivityStore::open(Arc::new(JsonFilePersistence::new(
        &config.storage.data_file,
    ))))
}

pub fn scheduler_timing(config: &TrackwatchConfig) -> SchedulerTiming {
    SchedulerTiming::new(
        config.tracking.startup_grace_secs,
        config.tracking.check_interval_minutes,
    )
}

pub fn command_settings(config: &TrackwatchConfig) -> CommandSettings {
    CommandSettings {
        prefix: config.discord.command_prefix.clone(),
        backfill_budget: config.tracking.backfill_budget,
        backfill_on_check: config.tracking.backfill_on_check,
    }
}

/// The non-secret settings reported by `/api/status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSummary {
    pub target_days: u32,
    pub check_interval_minutes: u64,
    pub thresholds: Vec<u32>,
    pub audio_extensions: Vec<String>,
    pub backfill_budget: usize,
    pub data_file: String,
}

impl From<&TrackwatchConfig> for ConfigSummary {
    fn from(config: &TrackwatchConfig) -> Self {
        Self {
            target_days: config.tracking.target_days,
            check_interval_minutes: config.tracking.check_interval_minutes,
            thresholds: config.tracking.thresholds.clone(),
            audio_extensions: config.tracking.audio_extensions.clone(),
            backfill_budget: config.tracking.backfill_budget,
            data_file: config.storage.data_file.display().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackwatch_config::apply_all_defaults;
    use trackwatch_core::{Attachment, Threshold};

    fn prepared() -> TrackwatchConfig {
        apply_all_defaults(TrackwatchConfig::default())
    }

    #[test]
    fn policy_carries_thresholds_and_templates() {
        let mut config = TrackwatchConfig::default();
        config.tracking.target_days = 14;
        config.tracking.thresholds = vec![0, 5];
        config.messages.templates.insert(5, "{user} five".to_string());
        let policy = build_policy(&apply_all_defaults(config));

        assert_eq!(policy.target_days(), 14);
        assert_eq!(policy.thresholds(), &[Threshold::OVERDUE, Threshold::days(5)]);
        assert_eq!(policy.render(Threshold::days(5), "<@1>", 0), "<@1> five");
    }

    #[test]
    fn classifier_uses_configured_extensions() {
        let mut config = TrackwatchConfig::default();
        config.tracking.audio_extensions = vec![".MID".to_string()];
        let classifier = build_classifier(&apply_all_defaults(config));
        assert!(classifier.is_qualifying(&Attachment::named("song.mid")));
        assert!(!classifier.is_qualifying(&Attachment::named("song.mp3")));
    }

    #[test]
    fn timing_and_commands_follow_config() {
        let config = prepared();
        let timing = scheduler_timing(&config);
        assert_eq!(timing.startup_grace.as_secs(), 10);
        assert_eq!(timing.check_interval.as_secs(), 3600);

        let settings = command_settings(&config);
        assert_eq!(settings.prefix, "!");
        assert!(settings.backfill_on_check);
    }

    #[test]
    fn summary_omits_token() {
        let mut config = prepared();
        config.discord.bot_token = Some("secret".to_string());
        let json = serde_json::to_string(&ConfigSummary::from(&config)).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("\"targetDays\":30"));
    }

    #[test]
    fn explicit_config_path_wins() {
        let path = resolve_config_path(Some(PathBuf::from("/etc/tw.yaml")));
        assert_eq!(path, PathBuf::from("/etc/tw.yaml"));
    }
}
