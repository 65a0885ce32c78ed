//! Threshold escalation: decide who is due a reminder, then deliver it.
//!
//! Planning ([`plan_pass`]) is pure over a store snapshot and a clock value.
//! Execution ([`execute_plan`]) performs the awaits: member lookup, both
//! deliveries, and only then the threshold write.

use std::collections::BTreeMap;

use chrono::DateTime;
use serde::Serialize;
use tracing::{debug, info, warn};
use trackwatch_core::{
    ActivityKey, ActivityRecord, MemberResolver, MessageTemplate, Notifier, Threshold,
    TrackedActivity,
};
use trackwatch_logging::{EventLogger, TrackerEvent};
use trackwatch_store::ActivityStore;

/// Format used for `{duedate}`, e.g. `Mon 3 Nov`.
const DUE_DATE_FORMAT: &str = "%a %-d %b";

const GENERIC_TEMPLATE: &str = "{user} your posting deadline is coming up: {duedate}";

/// Deadline, thresholds, and wording for reminders.
#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    target_days: u32,
    /// Most severe (fewest days) first.
    thresholds: Vec<Threshold>,
    templates: BTreeMap<Threshold, MessageTemplate>,
    fallback: MessageTemplate,
}

impl EscalationPolicy {
    pub fn new(target_days: u32, thresholds: impl IntoIterator<Item = u32>) -> Self {
        let mut thresholds: Vec<Threshold> = thresholds.into_iter().map(Threshold::days).collect();
        thresholds.sort();
        thresholds.dedup();
        Self {
            target_days,
            thresholds,
            templates: BTreeMap::new(),
            fallback: MessageTemplate::new(GENERIC_TEMPLATE),
        }
    }

    pub fn with_template(mut self, threshold: u32, template: impl Into<MessageTemplate>) -> Self {
        self.templates.insert(Threshold::days(threshold), template.into());
        self
    }

    pub fn with_fallback(mut self, template: impl Into<MessageTemplate>) -> Self {
        self.fallback = template.into();
        self
    }

    pub fn target_days(&self) -> u32 {
        self.target_days
    }

    pub fn thresholds(&self) -> &[Threshold] {
        &self.thresholds
    }

    /// The most severe threshold whose day count is at or above `days_left`.
    ///
    /// Scanning from most severe down means that after an outage spanning
    /// several thresholds the member hears the most urgent one, not the
    /// first one configured.
    pub fn select_threshold(&self, days_left: f64) -> Option<Threshold> {
        self.thresholds
            .iter()
            .copied()
            .find(|t| days_left <= f64::from(t.day_count()))
    }

    /// Threshold to notify for `record` at `now_ms`, if a reminder is due.
    pub fn due_threshold(&self, record: &ActivityRecord, now_ms: i64) -> Option<Threshold> {
        let selected = self.select_threshold(record.days_left(now_ms, self.target_days))?;
        is_due(selected, record.last_notified_threshold).then_some(selected)
    }

    pub fn template_for(&self, threshold: Threshold) -> &MessageTemplate {
        self.templates.get(&threshold).unwrap_or(&self.fallback)
    }

    pub fn render(&self, threshold: Threshold, mention: &str, due_at_ms: i64) -> String {
        self.template_for(threshold)
            .render_reminder(mention, &format_due_date(due_at_ms))
    }
}

/// A reminder is due only when the selected threshold is strictly more
/// severe than the last one sent. A record already past a threshold is never
/// sent the milder one again, even if clock skew makes it reappear.
pub fn is_due(selected: Threshold, last_notified: Option<Threshold>) -> bool {
    match last_notified {
        None => true,
        Some(last) => selected.is_more_severe_than(last),
    }
}

pub fn format_due_date(due_at_ms: i64) -> String {
    DateTime::from_timestamp_millis(due_at_ms)
        .map(|d| d.format(DUE_DATE_FORMAT).to_string())
        .unwrap_or_else(|| "soon".to_string())
}

/// One reminder the planner decided to send.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedNotification {
    pub key: ActivityKey,
    pub threshold: Threshold,
    pub days_left: f64,
    /// The `last_activity_at` this reminder was computed from.
    pub activity_at: i64,
    /// Deadline in milliseconds since the epoch.
    pub due_at: i64,
}

/// Decide which tracked records are due a reminder at `now_ms`.
pub fn plan_pass(
    snapshot: &[TrackedActivity],
    now_ms: i64,
    policy: &EscalationPolicy,
) -> Vec<PlannedNotification> {
    snapshot
        .iter()
        .filter_map(|tracked| {
            let threshold = policy.due_threshold(&tracked.record, now_ms)?;
            Some(PlannedNotification {
                key: tracked.key.clone(),
                threshold,
                days_left: tracked.record.days_left(now_ms, policy.target_days),
                activity_at: tracked.record.last_activity_at,
                due_at: tracked.record.due_at(policy.target_days),
            })
        })
        .collect()
}

/// Counters for one escalation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub tracked: usize,
    pub planned: usize,
    pub notified: usize,
    /// Member could not be resolved; retried next pass.
    pub skipped_unresolved: usize,
    /// Plan invalidated by activity or another pass while this one was awaiting.
    pub skipped_stale: usize,
    pub delivery_failures: usize,
}

/// External collaborators needed to carry out a plan.
pub struct Delivery<'a> {
    pub store: &'a ActivityStore,
    pub members: &'a dyn MemberResolver,
    pub notifier: &'a dyn Notifier,
}

/// Deliver each planned reminder, then record its threshold.
///
/// Resolution failures skip the entry without touching state. A plan whose
/// record saw new activity, or that an interleaved pass already handled, is
/// skipped before sending. The threshold is written after both sends are
/// attempted, so a crash mid-delivery leaves it owed and the next pass plans
/// it again. Delivery failures are logged; the threshold is still recorded so
/// a flaky DM does not turn into repeated pings.
pub async fn execute_plan(
    plan: Vec<PlannedNotification>,
    policy: &EscalationPolicy,
    delivery: &Delivery<'_>,
    run_id: &str,
) -> CheckReport {
    let mut report = CheckReport {
        planned: plan.len(),
        ..CheckReport::default()
    };

    for planned in plan {
        let key = &planned.key;

        let member = match delivery.members.resolve_member(&key.community, &key.user).await {
            Ok(Some(member)) => member,
            Ok(None) => {
                skip(run_id, key, "member not resolvable");
                report.skipped_unresolved += 1;
                continue;
            }
            Err(e) => {
                skip(run_id, key, &format!("member lookup failed: {e:#}"));
                report.skipped_unresolved += 1;
                continue;
            }
        };

        // New activity or an interleaved pass may have changed the record
        // while the lookup was in flight.
        if !delivery
            .store
            .is_pending(key, planned.threshold, planned.activity_at)
        {
            debug!(key = %key, threshold = %planned.threshold, "Plan is stale, skipping");
            report.skipped_stale += 1;
            continue;
        }

        info!(key = %key, threshold = %planned.threshold, days_left = planned.days_left, "Reminder due");
        let text = policy.render(planned.threshold, &member.mention, planned.due_at);

        let direct_delivered = match delivery.notifier.send_direct(&member, &text).await {
            Ok(()) => true,
            Err(e) => {
                warn!(member = %member.tag, error = %e, "Could not DM member");
                report.delivery_failures += 1;
                false
            }
        };
        let channel = key.channel_ref();
        let channel_delivered = match delivery.notifier.send_to_channel(&channel, &text).await {
            Ok(()) => true,
            Err(e) => {
                warn!(channel = %channel, error = %e, "Failed to send to channel");
                report.delivery_failures += 1;
                false
            }
        };

        if !delivery
            .store
            .record_notification_at(key, planned.threshold, planned.activity_at)
        {
            debug!(key = %key, threshold = %planned.threshold, "Record moved on during delivery, threshold not written");
        }
        report.notified += 1;

        EventLogger::log_event(
            run_id,
            TrackerEvent::ReminderSent {
                key: key.to_string(),
                threshold_days: planned.threshold.day_count(),
                days_left: planned.days_left,
                direct_delivered,
                channel_delivered,
            },
        );
        info!(member = %member.tag, threshold = %planned.threshold, "Notified");
    }

    report
}

fn skip(run_id: &str, key: &ActivityKey, reason: &str) {
    debug!(key = %key, reason, "Skipping reminder this pass");
    EventLogger::log_event(
        run_id,
        TrackerEvent::ReminderSkipped {
            key: key.to_string(),
            reason: reason.to_string(),
        },
    );
}
