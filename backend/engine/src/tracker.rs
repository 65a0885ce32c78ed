//! The trigger boundary: everything a scheduler tick, chat command or HTTP
//! request can ask the tracker to do.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;
use trackwatch_core::{
    AttachmentClassifier, ChannelRef, ChatMessage, HistorySource, MemberResolver, Notifier,
    Threshold, UserId,
};
use trackwatch_logging::{EventLogger, TrackerEvent};
use trackwatch_store::{ActivityStore, MergeOutcome};
use uuid::Uuid;

use crate::escalation::{execute_plan, plan_pass, CheckReport, Delivery, EscalationPolicy};
use crate::reconciler::{BackfillReport, HistoryReconciler};

/// One member's standing in a channel, for status output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberStatus {
    pub user: UserId,
    pub last_activity_at: i64,
    pub days_left: f64,
    pub last_notified: Option<Threshold>,
}

pub struct Tracker {
    store: Arc<ActivityStore>,
    policy: EscalationPolicy,
    classifier: AttachmentClassifier,
    notifier: Arc<dyn Notifier>,
    members: Arc<dyn MemberResolver>,
    history: Arc<dyn HistorySource>,
}

impl Tracker {
    pub fn new(
        store: Arc<ActivityStore>,
        policy: EscalationPolicy,
        classifier: AttachmentClassifier,
        notifier: Arc<dyn Notifier>,
        members: Arc<dyn MemberResolver>,
        history: Arc<dyn HistorySource>,
    ) -> Self {
        Self {
            store,
            policy,
            classifier,
            notifier,
            members,
            history,
        }
    }

    /// Build a tracker whose three platform boundaries are one adapter.
    pub fn with_platform<P>(
        store: Arc<ActivityStore>,
        policy: EscalationPolicy,
        classifier: AttachmentClassifier,
        platform: Arc<P>,
    ) -> Self
    where
        P: Notifier + MemberResolver + HistorySource + 'static,
    {
        Self::new(
            store,
            policy,
            classifier,
            platform.clone(),
            platform.clone(),
            platform,
        )
    }

    pub fn store(&self) -> &ActivityStore {
        &self.store
    }

    pub fn policy(&self) -> &EscalationPolicy {
        &self.policy
    }

    pub fn classifier(&self) -> &AttachmentClassifier {
        &self.classifier
    }

    /// Feed one live message through the classifier into the store.
    ///
    /// Returns `None` when the message does not count as activity.
    pub fn observe_message(&self, channel: &ChannelRef, message: &ChatMessage) -> Option<MergeOutcome> {
        if !self.classifier.is_qualifying_message(message) {
            return None;
        }
        let key = channel.key_for(message.author.clone());
        let outcome = self.store.record_activity(&key, message.timestamp_ms);
        if outcome.changed() {
            info!(key = %key, "Audio activity recorded");
            EventLogger::log_event(
                message.id.as_str(),
                TrackerEvent::ActivityRecorded {
                    key: key.to_string(),
                    timestamp_ms: message.timestamp_ms,
                    source: "live".to_string(),
                },
            );
        }
        Some(outcome)
    }

    /// Run one escalation pass over every tracked record.
    pub async fn run_check_pass(&self) -> CheckReport {
        self.run_check_pass_at(&Uuid::new_v4().to_string(), Utc::now().timestamp_millis())
            .await
    }

    pub async fn run_check_pass_at(&self, run_id: &str, now_ms: i64) -> CheckReport {
        let snapshot = self.store.snapshot();
        let plan = plan_pass(&snapshot, now_ms, &self.policy);
        info!(run_id, tracked = snapshot.len(), due = plan.len(), "Running reminder check");

        let delivery = Delivery {
            store: &self.store,
            members: self.members.as_ref(),
            notifier: self.notifier.as_ref(),
        };
        let mut report = execute_plan(plan, &self.policy, &delivery, run_id).await;
        report.tracked = snapshot.len();

        info!(
            run_id,
            notified = report.notified,
            skipped_unresolved = report.skipped_unresolved,
            skipped_stale = report.skipped_stale,
            delivery_failures = report.delivery_failures,
            "Reminder check finished"
        );
        report
    }

    /// Reconcile up to `budget` messages of `channel` history into the store.
    pub async fn run_backfill(&self, channel: &ChannelRef, budget: usize) -> BackfillReport {
        self.run_backfill_with_id(&Uuid::new_v4().to_string(), channel, budget)
            .await
    }

    pub async fn run_backfill_with_id(
        &self,
        run_id: &str,
        channel: &ChannelRef,
        budget: usize,
    ) -> BackfillReport {
        info!(run_id, channel = %channel, budget, "Backfilling channel history");
        HistoryReconciler::new(self.history.as_ref(), &self.classifier)
            .reconcile(&self.store, channel, budget, run_id)
            .await
    }

    /// Members tracked in `channel`, closest to their deadline first.
    pub fn channel_status(&self, channel: &ChannelRef, now_ms: i64) -> Vec<MemberStatus> {
        let target_days = self.policy.target_days();
        let mut rows: Vec<MemberStatus> = self
            .store
            .snapshot()
            .into_iter()
            .filter(|t| t.key.channel_ref() == *channel)
            .map(|t| MemberStatus {
                user: t.key.user,
                last_activity_at: t.record.last_activity_at,
                days_left: t.record.days_left(now_ms, target_days),
                last_notified: t.record.last_notified_threshold,
            })
            .collect();
        rows.sort_by(|a, b| a.days_left.total_cmp(&b.days_left));
        rows
    }

    /// Administrative wipe of all tracking state.
    pub fn reset(&self) {
        self.store.reset();
    }
}
