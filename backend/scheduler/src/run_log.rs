/// Recent run log for reminder checks and backfills.
///
/// Every pass the scheduler runs leaves one entry here; the HTTP status
/// endpoint reports the most recent ones.
use std::collections::VecDeque;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Entries kept before the oldest is dropped.
pub const DEFAULT_RUN_LOG_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Ok,
    /// Finished, but some deliveries or history pages failed.
    Partial,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunLogEntry {
    pub run_id: String,
    /// `"scheduled"`, `"backfill"`, or the reason passed with an on-demand check.
    pub trigger: String,
    pub fired_at: i64,
    pub finished_at: i64,
    pub status: RunStatus,
    pub summary: String,
}

pub struct RunLog {
    entries: Mutex<VecDeque<RunLogEntry>>,
    capacity: usize,
}

impl RunLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&self, entry: RunLogEntry) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Newest first.
    pub fn recent(&self, limit: usize) -> Vec<RunLogEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().rev().take(limit).cloned().collect()
    }

    pub fn last(&self) -> Option<RunLogEntry> {
        self.recent(1).pop()
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new(DEFAULT_RUN_LOG_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> RunLogEntry {
        RunLogEntry {
            run_id: id.to_string(),
            trigger: "scheduled".to_string(),
            fired_at: 0,
            finished_at: 1,
            status: RunStatus::Ok,
            summary: String::new(),
        }
    }

    #[test]
    fn keeps_newest_entries_up_to_capacity() {
        let log = RunLog::new(2);
        log.record(entry("a"));
        log.record(entry("b"));
        log.record(entry("c"));

        let ids: Vec<_> = log.recent(10).into_iter().map(|e| e.run_id).collect();
        assert_eq!(ids, vec!["c", "b"]);
        assert_eq!(log.last().unwrap().run_id, "c");
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(entry("a")).unwrap();
        assert_eq!(json["runId"], "a");
        assert_eq!(json["status"], "ok");
    }
}
