use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::message::TrackerMessage;
use crate::types::{ChannelRef, ChatMessage, CommunityId, MemberRef, MessageId, UserId};

/// Trait for long-running trackwatch components (the check scheduler, platform adapters).
///
/// Each component consumes trigger messages from its channel and runs in its own Tokio task.
#[async_trait]
pub trait Component: Send + Sync + 'static {
    /// Human-readable name of this component.
    fn name(&self) -> &str;

    /// Start the component's event loop, consuming from the given receiver.
    async fn start(&self, rx: mpsc::Receiver<TrackerMessage>) -> Result<()>;
}

/// Outbound delivery of reminder text.
///
/// Both methods may fail; the engine logs failures and never retries within a pass.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a private message to the member.
    async fn send_direct(&self, member: &MemberRef, text: &str) -> Result<()>;

    /// Post the text in the tracked channel.
    async fn send_to_channel(&self, channel: &ChannelRef, text: &str) -> Result<()>;
}

/// Backward pagination over a channel's message history.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Fetch up to `limit` messages older than `before` (or the newest when `None`),
    /// ordered newest first. An empty page means the history is exhausted.
    async fn fetch_page(
        &self,
        channel: &ChannelRef,
        limit: usize,
        before: Option<&MessageId>,
    ) -> Result<Vec<ChatMessage>>;
}

/// Looks up a community member so a reminder can address them.
#[async_trait]
pub trait MemberResolver: Send + Sync {
    /// `Ok(None)` means the member is not resolvable right now (left, not cached,
    /// community unavailable). Callers treat it like a transient error.
    async fn resolve_member(&self, community: &CommunityId, user: &UserId)
        -> Result<Option<MemberRef>>;
}
