use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ChannelRef;

/// On-demand work requests delivered to the check scheduler via the [`TrackerBus`](crate::TrackerBus).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackerMessage {
    /// API / command → Scheduler: run an escalation pass now
    RunCheck(CheckRequest),
    /// API / command → Scheduler: reconcile a channel's history, then run a pass
    Backfill(BackfillRequest),
}

/// Request for an immediate escalation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRequest {
    pub run_id: Uuid,
    pub reason: String,
}

/// Request to scan a channel's history into the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillRequest {
    pub run_id: Uuid,
    pub channel: ChannelRef,
    /// Maximum number of historical messages to scan.
    pub budget: usize,
}

impl TrackerMessage {
    pub fn check(reason: impl Into<String>) -> Self {
        TrackerMessage::RunCheck(CheckRequest {
            run_id: Uuid::new_v4(),
            reason: reason.into(),
        })
    }

    pub fn backfill(channel: ChannelRef, budget: usize) -> Self {
        TrackerMessage::Backfill(BackfillRequest {
            run_id: Uuid::new_v4(),
            channel,
            budget,
        })
    }

    pub fn run_id(&self) -> Uuid {
        match self {
            TrackerMessage::RunCheck(c) => c.run_id,
            TrackerMessage::Backfill(b) => b.run_id,
        }
    }
}
