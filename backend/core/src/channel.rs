use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::message::TrackerMessage;

/// Default channel buffer size for trigger requests.
const DEFAULT_BUFFER_SIZE: usize = 64;

/// Message bus carrying on-demand requests from the HTTP API and chat
/// commands to the check scheduler.
///
/// Built on a bounded Tokio mpsc channel, so a flood of requests applies backpressure.
pub struct TrackerBus {
    pub scheduler_tx: mpsc::Sender<TrackerMessage>,
    pub scheduler_rx: Option<mpsc::Receiver<TrackerMessage>>,
}

impl TrackerBus {
    /// Create a new bus with the default buffer size.
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    /// Create a new bus with a custom buffer size.
    pub fn with_buffer_size(buffer: usize) -> Self {
        let (scheduler_tx, scheduler_rx) = mpsc::channel(buffer);
        info!(buffer_size = buffer, "TrackerBus initialized");
        Self {
            scheduler_tx,
            scheduler_rx: Some(scheduler_rx),
        }
    }

    /// Take the scheduler receiver (can only be called once).
    pub fn take_scheduler_rx(&mut self) -> Option<mpsc::Receiver<TrackerMessage>> {
        debug!("Scheduler receiver taken");
        self.scheduler_rx.take()
    }
}

impl Default for TrackerBus {
    fn default() -> Self {
        Self::new()
    }
}
