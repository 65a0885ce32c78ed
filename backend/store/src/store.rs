use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, error, info};
use trackwatch_core::{ActivityKey, ActivityRecord, Threshold, TrackedActivity};

use crate::persistence::{ActivityPersistence, InMemoryPersistence, StoreData};

/// Result of merging an activity timestamp into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No record existed; one was created.
    Created,
    /// The stored timestamp moved forward and escalation state was cleared.
    Advanced { previous: i64 },
    /// The incoming timestamp was not newer; nothing changed.
    Unchanged,
}

impl MergeOutcome {
    pub fn changed(self) -> bool {
        !matches!(self, MergeOutcome::Unchanged)
    }
}

/// Where an activity timestamp came from. Only affects logging.
#[derive(Debug, Clone, Copy)]
enum ActivitySource {
    Live,
    Backfill,
}

/// Owner of every activity record.
///
/// All mutations are conditional "advance if greater" operations, so two
/// passes interleaving at `.await` points converge on the same state in
/// either order. The lock only spans one synchronous operation and is never
/// held across an await. Every mutation that changes something is persisted
/// before returning; a failed save is logged and the in-memory state stays
/// authoritative until the next successful save.
pub struct ActivityStore {
    records: RwLock<StoreData>,
    persistence: Arc<dyn ActivityPersistence>,
}

impl ActivityStore {
    /// Open the store, loading whatever the backend currently holds.
    pub fn open(persistence: Arc<dyn ActivityPersistence>) -> Self {
        let records = persistence.load();
        Self {
            records: RwLock::new(records),
            persistence,
        }
    }

    /// A store that is never written to disk.
    pub fn in_memory() -> Self {
        Self::open(Arc::new(InMemoryPersistence::new()))
    }

    /// Real-time activity: advance `last_activity_at` if `timestamp` is newer,
    /// clearing any escalation state.
    pub fn record_activity(&self, key: &ActivityKey, timestamp: i64) -> MergeOutcome {
        self.advance(key, timestamp, ActivitySource::Live)
    }

    /// History reconciliation: same monotonic rule as [`record_activity`].
    ///
    /// Escalation state is cleared only when the backfilled timestamp is
    /// strictly newer than the stored one, so old history never erases a
    /// threshold already earned against newer activity.
    ///
    /// [`record_activity`]: ActivityStore::record_activity
    pub fn merge_backfill(&self, key: &ActivityKey, timestamp: i64) -> MergeOutcome {
        self.advance(key, timestamp, ActivitySource::Backfill)
    }

    fn advance(&self, key: &ActivityKey, timestamp: i64, source: ActivitySource) -> MergeOutcome {
        let mut records = self.write();
        let users = records
            .entry(key.community.clone())
            .or_default()
            .entry(key.channel.clone())
            .or_default();

        let outcome = match users.get_mut(&key.user) {
            None => {
                users.insert(key.user.clone(), ActivityRecord::new(timestamp));
                MergeOutcome::Created
            }
            Some(record) if timestamp > record.last_activity_at => {
                let previous = record.last_activity_at;
                *record = ActivityRecord::new(timestamp);
                MergeOutcome::Advanced { previous }
            }
            Some(_) => MergeOutcome::Unchanged,
        };

        match outcome {
            MergeOutcome::Unchanged => {
                debug!(key = %key, timestamp, ?source, "Activity not newer than stored, ignored");
            }
            _ => {
                debug!(key = %key, timestamp, ?source, ?outcome, "Activity recorded");
                self.persist(&records);
            }
        }
        outcome
    }

    /// Advance the notified threshold if `threshold` is more severe than the
    /// current one. Returns whether the record changed.
    pub fn record_notification(&self, key: &ActivityKey, threshold: Threshold) -> bool {
        self.advance_notification(key, threshold, None)
    }

    /// Whether a reminder for `threshold`, planned against `activity_at`, is
    /// still owed: the record holds that activity and has not yet been
    /// notified at `threshold` or anything more severe.
    pub fn is_pending(&self, key: &ActivityKey, threshold: Threshold, activity_at: i64) -> bool {
        self.get(key).is_some_and(|record| {
            record.last_activity_at == activity_at
                && record
                    .last_notified_threshold
                    .map_or(true, |current| threshold.is_more_severe_than(current))
        })
    }

    /// Like [`record_notification`], but only while the record still holds the
    /// activity timestamp the reminder was planned against, so a reminder
    /// delivered for old activity never marks newer activity as notified.
    ///
    /// [`record_notification`]: ActivityStore::record_notification
    pub fn record_notification_at(&self, key: &ActivityKey, threshold: Threshold, activity_at: i64) -> bool {
        self.advance_notification(key, threshold, Some(activity_at))
    }

    fn advance_notification(&self, key: &ActivityKey, threshold: Threshold, activity_at: Option<i64>) -> bool {
        let mut records = self.write();
        let Some(record) = records
            .get_mut(&key.community)
            .and_then(|channels| channels.get_mut(&key.channel))
            .and_then(|users| users.get_mut(&key.user))
        else {
            debug!(key = %key, %threshold, "Notification for unknown record ignored");
            return false;
        };

        if activity_at.is_some_and(|at| at != record.last_activity_at) {
            debug!(key = %key, %threshold, "Record has newer activity, notification ignored");
            return false;
        }
        let advances = match record.last_notified_threshold {
            None => true,
            Some(current) => threshold.is_more_severe_than(current),
        };
        if !advances {
            debug!(
                key = %key,
                %threshold,
                current = ?record.last_notified_threshold,
                "Notification not more severe than recorded, ignored"
            );
            return false;
        }

        record.last_notified_threshold = Some(threshold);
        self.persist(&records);
        true
    }

    /// Administrative wipe of every record.
    pub fn reset(&self) {
        let mut records = self.write();
        let cleared: usize = count(&records);
        records.clear();
        info!(cleared, "Activity store reset");
        self.persist(&records);
    }

    /// Every record, sorted by key.
    pub fn snapshot(&self) -> Vec<TrackedActivity> {
        let records = self.read();
        let mut out = Vec::with_capacity(count(&records));
        for (community, channels) in records.iter() {
            for (channel, users) in channels {
                for (user, record) in users {
                    out.push(TrackedActivity {
                        key: ActivityKey {
                            community: community.clone(),
                            channel: channel.clone(),
                            user: user.clone(),
                        },
                        record: *record,
                    });
                }
            }
        }
        out
    }

    pub fn get(&self, key: &ActivityKey) -> Option<ActivityRecord> {
        self.read()
            .get(&key.community)
            .and_then(|channels| channels.get(&key.channel))
            .and_then(|users| users.get(&key.user))
            .copied()
    }

    pub fn len(&self) -> usize {
        count(&self.read())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, records: &StoreData) {
        if let Err(e) = self.persistence.save(records) {
            error!(error = %e, "Failed to save activity data; keeping in-memory state");
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreData> {
        self.records.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreData> {
        self.records.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn count(records: &StoreData) -> usize {
    records
        .values()
        .flat_map(|channels| channels.values())
        .map(|users| users.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ActivityKey {
        ActivityKey::new("guild", "chan", "user")
    }

    fn store_with(persistence: &Arc<InMemoryPersistence>) -> ActivityStore {
        ActivityStore::open(Arc::clone(persistence) as Arc<dyn ActivityPersistence>)
    }

    #[test]
    fn merge_is_monotonic_in_either_order() {
        let forward = ActivityStore::in_memory();
        forward.record_activity(&key(), 100);
        forward.record_activity(&key(), 200);

        let backward = ActivityStore::in_memory();
        backward.record_activity(&key(), 200);
        assert_eq!(backward.record_activity(&key(), 100), MergeOutcome::Unchanged);

        assert_eq!(forward.get(&key()).unwrap().last_activity_at, 200);
        assert_eq!(backward.get(&key()).unwrap().last_activity_at, 200);

        let mixed = ActivityStore::in_memory();
        mixed.merge_backfill(&key(), 200);
        mixed.record_activity(&key(), 100);
        assert_eq!(mixed.get(&key()).unwrap().last_activity_at, 200);
    }

    #[test]
    fn newer_activity_resets_threshold() {
        let store = ActivityStore::in_memory();
        assert_eq!(store.record_activity(&key(), 100), MergeOutcome::Created);
        assert!(store.record_notification(&key(), Threshold::days(3)));

        assert_eq!(
            store.record_activity(&key(), 150),
            MergeOutcome::Advanced { previous: 100 }
        );
        assert_eq!(store.get(&key()).unwrap().last_notified_threshold, None);
    }

    #[test]
    fn replayed_activity_keeps_threshold() {
        let store = ActivityStore::in_memory();
        store.record_activity(&key(), 100);
        store.record_notification(&key(), Threshold::days(7));
        assert_eq!(store.record_activity(&key(), 100), MergeOutcome::Unchanged);
        assert_eq!(
            store.get(&key()).unwrap().last_notified_threshold,
            Some(Threshold::days(7))
        );
    }

    #[test]
    fn old_backfill_does_not_erase_escalation() {
        let store = ActivityStore::in_memory();
        store.record_activity(&key(), 1_000);
        store.record_notification(&key(), Threshold::days(1));

        assert_eq!(store.merge_backfill(&key(), 900), MergeOutcome::Unchanged);
        assert_eq!(store.merge_backfill(&key(), 1_000), MergeOutcome::Unchanged);
        let record = store.get(&key()).unwrap();
        assert_eq!(record.last_activity_at, 1_000);
        assert_eq!(record.last_notified_threshold, Some(Threshold::days(1)));
    }

    #[test]
    fn newer_backfill_clears_stale_escalation() {
        let store = ActivityStore::in_memory();
        store.record_activity(&key(), 1_000);
        store.record_notification(&key(), Threshold::OVERDUE);

        // A post the live feed missed is newer than what the threshold was computed from.
        assert!(store.merge_backfill(&key(), 2_000).changed());
        let record = store.get(&key()).unwrap();
        assert_eq!(record.last_activity_at, 2_000);
        assert_eq!(record.last_notified_threshold, None);
    }

    #[test]
    fn notification_only_escalates() {
        let store = ActivityStore::in_memory();
        store.record_activity(&key(), 0);
        assert!(store.record_notification(&key(), Threshold::days(3)));
        assert!(!store.record_notification(&key(), Threshold::days(7)));
        assert!(!store.record_notification(&key(), Threshold::days(3)));
        assert!(store.record_notification(&key(), Threshold::OVERDUE));
        assert_eq!(
            store.get(&key()).unwrap().last_notified_threshold,
            Some(Threshold::OVERDUE)
        );
    }

    #[test]
    fn notification_requires_planned_activity() {
        let store = ActivityStore::in_memory();
        store.record_activity(&key(), 100);
        assert!(!store.record_notification_at(&key(), Threshold::days(7), 50));
        assert!(store.record_notification_at(&key(), Threshold::days(7), 100));
        assert!(!store.record_notification_at(&key(), Threshold::days(7), 100));

        store.record_activity(&key(), 200);
        assert!(!store.record_notification_at(&key(), Threshold::days(3), 100));
        assert_eq!(store.get(&key()).unwrap().last_notified_threshold, None);
    }

    #[test]
    fn pending_tracks_activity_and_severity() {
        let store = ActivityStore::in_memory();
        assert!(!store.is_pending(&key(), Threshold::days(7), 100));

        store.record_activity(&key(), 100);
        assert!(store.is_pending(&key(), Threshold::days(7), 100));
        assert!(!store.is_pending(&key(), Threshold::days(7), 50));

        store.record_notification(&key(), Threshold::days(3));
        assert!(!store.is_pending(&key(), Threshold::days(7), 100));
        assert!(!store.is_pending(&key(), Threshold::days(3), 100));
        assert!(store.is_pending(&key(), Threshold::days(1), 100));
    }

    #[test]
    fn notification_for_missing_record_is_noop() {
        let store = ActivityStore::in_memory();
        assert!(!store.record_notification(&key(), Threshold::days(7)));
        assert!(store.is_empty());
    }

    #[test]
    fn only_changes_are_persisted() {
        let persistence = Arc::new(InMemoryPersistence::new());
        let store = store_with(&persistence);

        store.record_activity(&key(), 10);
        store.record_activity(&key(), 5);
        store.record_notification(&key(), Threshold::days(7));
        store.record_notification(&key(), Threshold::days(7));
        assert_eq!(persistence.save_count(), 2);

        let reopened = store_with(&persistence);
        assert_eq!(
            reopened.get(&key()).unwrap(),
            ActivityRecord {
                last_activity_at: 10,
                last_notified_threshold: Some(Threshold::days(7)),
            }
        );
    }

    #[test]
    fn failed_save_keeps_memory_state_and_next_save_catches_up() {
        let persistence = Arc::new(InMemoryPersistence::new());
        let store = store_with(&persistence);

        persistence.set_failing(true);
        store.record_activity(&key(), 10);
        assert_eq!(store.get(&key()).unwrap().last_activity_at, 10);
        assert!(persistence.stored().is_empty());

        persistence.set_failing(false);
        let other = ActivityKey::new("guild", "chan", "other");
        store.record_activity(&other, 20);
        let reopened = store_with(&persistence);
        assert_eq!(reopened.len(), 2);
    }

    #[test]
    fn reset_and_snapshot() {
        let store = ActivityStore::in_memory();
        store.record_activity(&ActivityKey::new("g", "c", "b"), 2);
        store.record_activity(&ActivityKey::new("g", "c", "a"), 1);
        store.record_activity(&ActivityKey::new("g", "d", "a"), 3);

        let snap = store.snapshot();
        let users: Vec<_> = snap
            .iter()
            .map(|t| format!("{}:{}", t.key.channel, t.key.user))
            .collect();
        assert_eq!(users, vec!["c:a", "c:b", "d:a"]);

        store.reset();
        assert!(store.is_empty());
        assert!(store.snapshot().is_empty());
    }
}
