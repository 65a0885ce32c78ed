//! Tracker Event Logger
//!
//! Structured events (activity, reminders, backfills, errors) emitted on the
//! `tracker_events` target, so the JSON file layer captures them as NDJSON.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::redact::redact_sensitive_data;

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum TrackerEvent {
    ActivityRecorded {
        key: String,
        timestamp_ms: i64,
        source: String,
    },
    ReminderSent {
        key: String,
        threshold_days: u32,
        days_left: f64,
        direct_delivered: bool,
        channel_delivered: bool,
    },
    ReminderSkipped {
        key: String,
        reason: String,
    },
    BackfillCompleted {
        channel: String,
        users_updated: usize,
        messages_scanned: usize,
        aborted: bool,
    },
    Error {
        error_msg: String,
    },
}

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    /// Correlates every event of one check pass or backfill.
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: TrackerEvent,
}

pub struct EventLogger;

impl EventLogger {
    /// Emit a tracker event through `tracing`, scrubbing free-form text first.
    pub fn log_event(run_id: &str, mut event: TrackerEvent) {
        match &mut event {
            TrackerEvent::ReminderSkipped { reason, .. } => {
                *reason = redact_sensitive_data(reason);
            }
            TrackerEvent::Error { error_msg } => {
                *error_msg = redact_sensitive_data(error_msg);
            }
            _ => {}
        }

        let entry = EventLogEntry {
            run_id: run_id.into(),
            timestamp: Utc::now(),
            event,
        };

        match serde_json::to_string(&entry) {
            Ok(json) => info!(target: "tracker_events", event = %json, "Tracker event"),
            Err(_) => info!(target: "tracker_events", event = ?entry, "Tracker event"),
        }
    }
}
