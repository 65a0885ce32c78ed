use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use trackwatch_core::{BackfillRequest, CheckRequest, Component, TrackerMessage};
use trackwatch_engine::{BackfillReport, CheckReport, Tracker};

use crate::run_log::{RunLog, RunLogEntry, RunStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerTiming {
    /// Delay before the first pass, so the platform client can connect.
    pub startup_grace: Duration,
    pub check_interval: Duration,
}

impl SchedulerTiming {
    pub fn new(startup_grace_secs: u64, check_interval_minutes: u64) -> Self {
        Self {
            startup_grace: Duration::from_secs(startup_grace_secs),
            check_interval: Duration::from_secs(check_interval_minutes.max(1) * 60),
        }
    }
}

impl Default for SchedulerTiming {
    fn default() -> Self {
        Self::new(10, 60)
    }
}

/// Runs a reminder check after the startup grace, then every interval, and
/// serves on-demand requests from the tracker bus in between.
pub struct CheckScheduler {
    tracker: Arc<Tracker>,
    timing: SchedulerTiming,
    run_log: Arc<RunLog>,
}

impl CheckScheduler {
    pub fn new(tracker: Arc<Tracker>, timing: SchedulerTiming, run_log: Arc<RunLog>) -> Self {
        Self {
            tracker,
            timing,
            run_log,
        }
    }

    pub fn run_log(&self) -> &Arc<RunLog> {
        &self.run_log
    }

    async fn check(&self, run_id: Uuid, trigger: &str) {
        let fired_at = Utc::now().timestamp_millis();
        let run_id = run_id.to_string();
        let report = self.tracker.run_check_pass_at(&run_id, fired_at).await;
        self.run_log.record(RunLogEntry {
            run_id,
            trigger: trigger.to_string(),
            fired_at,
            finished_at: Utc::now().timestamp_millis(),
            status: check_status(&report),
            summary: check_summary(&report),
        });
    }

    async fn backfill(&self, request: BackfillRequest) {
        let fired_at = Utc::now().timestamp_millis();
        let run_id = request.run_id.to_string();
        let report = self
            .tracker
            .run_backfill_with_id(&run_id, &request.channel, request.budget)
            .await;
        self.run_log.record(RunLogEntry {
            run_id,
            trigger: "backfill".to_string(),
            fired_at,
            finished_at: Utc::now().timestamp_millis(),
            status: if report.aborted { RunStatus::Partial } else { RunStatus::Ok },
            summary: backfill_summary(&report),
        });
    }
}

fn check_status(report: &CheckReport) -> RunStatus {
    if report.delivery_failures > 0 {
        RunStatus::Partial
    } else {
        RunStatus::Ok
    }
}

fn check_summary(report: &CheckReport) -> String {
    format!(
        "tracked={} notified={} unresolved={} stale={} delivery_failures={}",
        report.tracked,
        report.notified,
        report.skipped_unresolved,
        report.skipped_stale,
        report.delivery_failures
    )
}

fn backfill_summary(report: &BackfillReport) -> String {
    format!(
        "scanned={} pages={} users_seen={} users_updated={}",
        report.messages_scanned, report.pages_fetched, report.users_seen, report.users_updated
    )
}

#[async_trait]
impl Component for CheckScheduler {
    fn name(&self) -> &str {
        "check-scheduler"
    }

    async fn start(&self, mut rx: mpsc::Receiver<TrackerMessage>) -> Result<()> {
        info!(
            grace_secs = self.timing.startup_grace.as_secs(),
            interval_secs = self.timing.check_interval.as_secs(),
            "Check scheduler started"
        );

        // First tick lands when the grace period ends.
        let mut ticker = time::interval_at(
            Instant::now() + self.timing.startup_grace,
            self.timing.check_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    debug!("Scheduled check tick");
                    self.check(Uuid::new_v4(), "scheduled").await;
                }
                msg = rx.recv() => {
                    match msg {
                        Some(TrackerMessage::RunCheck(CheckRequest { run_id, reason })) => {
                            info!(run_id = %run_id, reason = %reason, "On-demand check received");
                            self.check(run_id, &reason).await;
                        }
                        Some(TrackerMessage::Backfill(request)) => {
                            info!(
                                run_id = %request.run_id,
                                channel = %request.channel,
                                budget = request.budget,
                                "Backfill request received"
                            );
                            let run_id = request.run_id;
                            self.backfill(request).await;
                            self.check(run_id, "backfill").await;
                        }
                        None => {
                            info!("Scheduler channel closed, shutting down");
                            break;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackwatch_core::{
        AttachmentClassifier, ChannelRef, ChatMessage, CommunityId, HistorySource, MemberRef,
        MemberResolver, MessageId, Notifier, UserId,
    };
    use trackwatch_engine::EscalationPolicy;
    use trackwatch_store::ActivityStore;

    struct QuietPlatform;

    #[async_trait]
    impl Notifier for QuietPlatform {
        async fn send_direct(&self, _member: &MemberRef, _text: &str) -> Result<()> {
            Ok(())
        }

        async fn send_to_channel(&self, _channel: &ChannelRef, _text: &str) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl MemberResolver for QuietPlatform {
        async fn resolve_member(&self, _c: &CommunityId, _u: &UserId) -> Result<Option<MemberRef>> {
            Ok(None)
        }
    }

    #[async_trait]
    impl HistorySource for QuietPlatform {
        async fn fetch_page(
            &self,
            _channel: &ChannelRef,
            _limit: usize,
            _before: Option<&MessageId>,
        ) -> Result<Vec<ChatMessage>> {
            Ok(Vec::new())
        }
    }

    fn scheduler() -> Arc<CheckScheduler> {
        let tracker = Tracker::with_platform(
            Arc::new(ActivityStore::in_memory()),
            EscalationPolicy::new(30, [7, 3, 1, 0]),
            AttachmentClassifier::default(),
            Arc::new(QuietPlatform),
        );
        Arc::new(CheckScheduler::new(
            Arc::new(tracker),
            SchedulerTiming::new(10, 60),
            Arc::new(RunLog::default()),
        ))
    }

    fn spawn(s: &Arc<CheckScheduler>, rx: mpsc::Receiver<TrackerMessage>) -> tokio::task::JoinHandle<Result<()>> {
        let s = Arc::clone(s);
        tokio::spawn(async move { s.start(rx).await })
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_grace_then_runs_every_interval() {
        let s = scheduler();
        let (_tx, rx) = mpsc::channel(8);
        let _handle = spawn(&s, rx);

        time::sleep(Duration::from_secs(9)).await;
        assert!(s.run_log().recent(10).is_empty());

        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(s.run_log().recent(10).len(), 1);

        time::sleep(Duration::from_secs(60 * 60)).await;
        let runs = s.run_log().recent(10);
        assert_eq!(runs.len(), 2);
        assert!(runs.iter().all(|r| r.trigger == "scheduled"));
    }

    #[tokio::test(start_paused = true)]
    async fn on_demand_check_runs_during_grace() {
        let s = scheduler();
        let (tx, rx) = mpsc::channel(8);
        let _handle = spawn(&s, rx);

        let msg = TrackerMessage::check("api");
        let run_id = msg.run_id().to_string();
        tx.send(msg).await.unwrap();
        time::sleep(Duration::from_secs(1)).await;

        let last = s.run_log().last().unwrap();
        assert_eq!(last.run_id, run_id);
        assert_eq!(last.trigger, "api");
        assert_eq!(last.status, RunStatus::Ok);
    }

    #[tokio::test(start_paused = true)]
    async fn backfill_request_is_followed_by_a_check() {
        let s = scheduler();
        let (tx, rx) = mpsc::channel(8);
        let _handle = spawn(&s, rx);

        tx.send(TrackerMessage::backfill(ChannelRef::new("g", "c"), 200))
            .await
            .unwrap();
        time::sleep(Duration::from_secs(1)).await;

        let triggers: Vec<_> = s.run_log().recent(10).into_iter().map(|r| r.trigger).collect();
        assert_eq!(triggers, vec!["backfill", "backfill"]);
        assert!(s.run_log().recent(10)[1].summary.starts_with("scanned=0"));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_channel_closes() {
        let s = scheduler();
        let (tx, rx) = mpsc::channel(8);
        let handle = spawn(&s, rx);
        drop(tx);
        let result = time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
        assert!(result.is_ok());
    }
}
