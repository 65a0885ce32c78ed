use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use trackwatch_core::{ChannelRef, TrackerMessage};
use trackwatch_engine::Tracker;
use trackwatch_scheduler::RunLog;

use crate::wiring::ConfigSummary;

const BANNER: &str = "trackwatch bot running";
const RECENT_RUNS: usize = 10;

/// Shared application state for API handlers.
pub struct AppState {
    pub tracker: Arc<Tracker>,
    pub scheduler_tx: mpsc::Sender<TrackerMessage>,
    pub run_log: Arc<RunLog>,
    pub config: ConfigSummary,
    pub started_at: DateTime<Utc>,
}

/// Build the Axum router with all HTTP routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/health", get(health))
        .route("/api/status", get(get_status))
        .route("/api/check", post(trigger_check))
        .route("/api/backfill", post(trigger_backfill))
        .fallback(banner)
        .with_state(state)
}

/// Liveness probe for the hosting platform.
async fn health() -> &'static str {
    "ok"
}

async fn banner() -> &'static str {
    BANNER
}

async fn get_status(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSeconds": (Utc::now() - state.started_at).num_seconds(),
        "tracked": state.tracker.store().len(),
        "config": state.config,
        "recentRuns": state.run_log.recent(RECENT_RUNS),
    }))
}

/// Queue an immediate reminder pass on the scheduler.
async fn trigger_check(State(state): State<Arc<AppState>>) -> Result<(StatusCode, Json<Value>), StatusCode> {
    queue(&state, TrackerMessage::check("api")).await
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackfillBody {
    community_id: String,
    channel_id: String,
    /// Defaults to the configured backfill budget.
    budget: Option<usize>,
}

/// Queue a history scan of one channel; the scheduler runs a pass after it.
async fn trigger_backfill(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BackfillBody>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let budget = body.budget.unwrap_or(state.config.backfill_budget);
    if budget == 0 {
        return Err(StatusCode::BAD_REQUEST);
    }
    let channel = ChannelRef::new(body.community_id, body.channel_id);
    queue(&state, TrackerMessage::backfill(channel, budget)).await
}

async fn queue(state: &AppState, msg: TrackerMessage) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let run_id = msg.run_id();

    state.scheduler_tx.send(msg).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to queue scheduler request");
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "queued", "runId": run_id })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use trackwatch_config::{apply_all_defaults, TrackwatchConfig};
    use trackwatch_core::{
        ActivityKey, ChannelRef, ChatMessage, CommunityId, HistorySource, MemberRef,
        MemberResolver, MessageId, Notifier, UserId,
    };
    use trackwatch_store::ActivityStore;

    struct Offline;

    #[async_trait]
    impl Notifier for Offline {
        async fn send_direct(&self, _m: &MemberRef, _t: &str) -> anyhow::Result<()> {
            anyhow::bail!("offline")
        }

        async fn send_to_channel(&self, _c: &ChannelRef, _t: &str) -> anyhow::Result<()> {
            anyhow::bail!("offline")
        }
    }

    #[async_trait]
    impl MemberResolver for Offline {
        async fn resolve_member(&self, _c: &CommunityId, _u: &UserId) -> anyhow::Result<Option<MemberRef>> {
            Ok(None)
        }
    }

    #[async_trait]
    impl HistorySource for Offline {
        async fn fetch_page(
            &self,
            _c: &ChannelRef,
            _l: usize,
            _b: Option<&MessageId>,
        ) -> anyhow::Result<Vec<ChatMessage>> {
            Ok(Vec::new())
        }
    }

    fn state(scheduler_tx: mpsc::Sender<TrackerMessage>) -> Arc<AppState> {
        let config = apply_all_defaults(TrackwatchConfig::default());
        let tracker = Tracker::with_platform(
            Arc::new(ActivityStore::in_memory()),
            crate::wiring::build_policy(&config),
            crate::wiring::build_classifier(&config),
            Arc::new(Offline),
        );
        tracker.store().record_activity(&ActivityKey::new("g", "c", "u"), 1);
        Arc::new(AppState {
            tracker: Arc::new(tracker),
            scheduler_tx,
            run_log: Arc::new(RunLog::default()),
            config: ConfigSummary::from(&config),
            started_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn health_and_banner() {
        assert_eq!(health().await, "ok");
        assert_eq!(banner().await, "trackwatch bot running");
    }

    #[tokio::test]
    async fn status_reports_tracked_count_and_config() {
        let (tx, _rx) = mpsc::channel(1);
        let Json(body) = get_status(State(state(tx))).await;
        assert_eq!(body["tracked"], 1);
        assert_eq!(body["config"]["targetDays"], 30);
        assert_eq!(body["config"]["thresholds"], json!([0, 1, 3, 7]));
        assert!(body["recentRuns"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn check_is_queued_on_the_scheduler() {
        let (tx, mut rx) = mpsc::channel(1);
        let (code, Json(body)) = trigger_check(State(state(tx))).await.unwrap();
        assert_eq!(code, StatusCode::ACCEPTED);

        let queued = rx.recv().await.unwrap();
        assert_eq!(body["runId"], json!(queued.run_id()));
        assert!(matches!(queued, TrackerMessage::RunCheck(ref r) if r.reason == "api"));
    }

    #[tokio::test]
    async fn backfill_is_queued_with_default_budget() {
        let (tx, mut rx) = mpsc::channel(1);
        let body = BackfillBody {
            community_id: "g".to_string(),
            channel_id: "c".to_string(),
            budget: None,
        };
        let (code, Json(reply)) = trigger_backfill(State(state(tx)), Json(body)).await.unwrap();
        assert_eq!(code, StatusCode::ACCEPTED);

        match rx.recv().await.unwrap() {
            TrackerMessage::Backfill(request) => {
                assert_eq!(reply["runId"], json!(request.run_id));
                assert_eq!(request.channel, ChannelRef::new("g", "c"));
                assert_eq!(request.budget, 1_000);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[tokio::test]
    async fn backfill_rejects_zero_budget() {
        let (tx, _rx) = mpsc::channel(1);
        let body: BackfillBody =
            serde_json::from_value(json!({ "communityId": "g", "channelId": "c", "budget": 0 })).unwrap();
        let err = trigger_backfill(State(state(tx)), Json(body)).await.unwrap_err();
        assert_eq!(err, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn check_fails_when_scheduler_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let err = trigger_check(State(state(tx))).await.unwrap_err();
        assert_eq!(err, StatusCode::SERVICE_UNAVAILABLE);
    }
}
