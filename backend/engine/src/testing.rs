//! In-process fakes for the platform boundaries.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use trackwatch_core::{
    Attachment, ChannelRef, ChatMessage, CommunityId, HistorySource, MemberRef, MemberResolver,
    MessageId, Notifier, UserId,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Direct { user: String, text: String },
    Channel { channel: String, text: String },
}

#[derive(Default)]
pub struct FakeNotifier {
    pub sent: Mutex<Vec<Delivery>>,
    pub fail_direct: bool,
    pub fail_channel: bool,
}

impl FakeNotifier {
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.sent.lock().unwrap().clone()
    }

    pub fn direct_count(&self) -> usize {
        self.deliveries()
            .iter()
            .filter(|d| matches!(d, Delivery::Direct { .. }))
            .count()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn send_direct(&self, member: &MemberRef, text: &str) -> Result<()> {
        tokio::task::yield_now().await;
        if self.fail_direct {
            return Err(anyhow!("cannot DM {}", member.tag));
        }
        self.sent.lock().unwrap().push(Delivery::Direct {
            user: member.user.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_to_channel(&self, channel: &ChannelRef, text: &str) -> Result<()> {
        tokio::task::yield_now().await;
        if self.fail_channel {
            return Err(anyhow!("missing access to {channel}"));
        }
        self.sent.lock().unwrap().push(Delivery::Channel {
            channel: channel.channel.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}

/// Resolves every user except the ones listed as missing.
#[derive(Default)]
pub struct FakeMembers {
    pub missing: HashSet<String>,
    pub erroring: HashSet<String>,
}

#[async_trait]
impl MemberResolver for FakeMembers {
    async fn resolve_member(&self, _community: &CommunityId, user: &UserId) -> Result<Option<MemberRef>> {
        tokio::task::yield_now().await;
        if self.erroring.contains(user.as_str()) {
            return Err(anyhow!("gateway timeout"));
        }
        if self.missing.contains(user.as_str()) {
            return Ok(None);
        }
        Ok(Some(MemberRef {
            user: user.clone(),
            mention: format!("<@{user}>"),
            tag: format!("user#{user}"),
        }))
    }
}

/// Channel histories stored newest first, paged by message id like the real API.
#[derive(Default)]
pub struct FakeHistory {
    pub channels: HashMap<String, Vec<ChatMessage>>,
    /// Fail the Nth fetch (0-based) for every channel.
    pub fail_on_fetch: Option<usize>,
    pub fetches: Mutex<usize>,
}

impl FakeHistory {
    /// `messages` may be given in any order; they are sorted newest first.
    pub fn with_channel(mut self, channel: &str, mut messages: Vec<ChatMessage>) -> Self {
        messages.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
        self.channels.insert(channel.to_string(), messages);
        self
    }

    pub fn fetch_count(&self) -> usize {
        *self.fetches.lock().unwrap()
    }
}

#[async_trait]
impl HistorySource for FakeHistory {
    async fn fetch_page(
        &self,
        channel: &ChannelRef,
        limit: usize,
        before: Option<&MessageId>,
    ) -> Result<Vec<ChatMessage>> {
        tokio::task::yield_now().await;
        let n = {
            let mut fetches = self.fetches.lock().unwrap();
            let n = *fetches;
            *fetches += 1;
            n
        };
        if self.fail_on_fetch == Some(n) {
            return Err(anyhow!("history page {n} failed"));
        }
        let all = self.channels.get(channel.channel.as_str()).cloned().unwrap_or_default();
        let start = match before {
            Some(id) => all.iter().position(|m| &m.id == id).map(|i| i + 1).unwrap_or(all.len()),
            None => 0,
        };
        Ok(all.into_iter().skip(start).take(limit).collect())
    }
}

pub fn audio_post(id: u64, author: &str, at: i64) -> ChatMessage {
    post(id, author, at, &["track.mp3"])
}

pub fn post(id: u64, author: &str, at: i64, files: &[&str]) -> ChatMessage {
    ChatMessage {
        id: MessageId::new(id.to_string()),
        author: UserId::new(author),
        system_authored: false,
        timestamp_ms: at,
        attachments: files.iter().map(|f| Attachment::named(*f)).collect(),
    }
}
