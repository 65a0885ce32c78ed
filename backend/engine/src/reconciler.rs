//! History backfill: derive each member's latest track from channel history.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info, warn};
use trackwatch_core::{AttachmentClassifier, ChannelRef, HistorySource, MessageId, UserId};
use trackwatch_logging::{EventLogger, TrackerEvent};
use trackwatch_store::ActivityStore;

/// Largest page the chat platform returns in one history request.
pub const HISTORY_PAGE_SIZE: usize = 100;

/// What a history scan found, before anything is written.
#[derive(Debug, Default)]
pub struct HistoryScan {
    /// Newest qualifying post per author within the scanned range.
    pub latest: HashMap<UserId, i64>,
    pub messages_scanned: usize,
    pub pages_fetched: usize,
    /// Why a page fetch failed; `latest` covers only the pages before it.
    pub failure: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    /// Authors whose stored timestamp moved forward or who were first seen.
    pub users_updated: usize,
    /// Authors with at least one qualifying post in the scanned range.
    pub users_seen: usize,
    pub messages_scanned: usize,
    pub pages_fetched: usize,
    pub aborted: bool,
}

pub struct HistoryReconciler<'a> {
    source: &'a dyn HistorySource,
    classifier: &'a AttachmentClassifier,
    page_size: usize,
}

impl<'a> HistoryReconciler<'a> {
    pub fn new(source: &'a dyn HistorySource, classifier: &'a AttachmentClassifier) -> Self {
        Self {
            source,
            classifier,
            page_size: HISTORY_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, HISTORY_PAGE_SIZE);
        self
    }

    /// Page backward through `channel`, newest first, scanning at most `budget` messages.
    pub async fn scan(&self, channel: &ChannelRef, budget: usize) -> HistoryScan {
        let mut scan = HistoryScan::default();
        let mut before: Option<MessageId> = None;

        while scan.messages_scanned < budget {
            let limit = self.page_size.min(budget - scan.messages_scanned);
            let page = match self.source.fetch_page(channel, limit, before.as_ref()).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(
                        channel = %channel,
                        pages = scan.pages_fetched,
                        error = %e,
                        "History fetch failed, keeping partial scan"
                    );
                    scan.failure = Some(format!("{e:#}"));
                    break;
                }
            };
            scan.pages_fetched += 1;

            // Never count more than requested, even if the source over-delivers.
            let page_len = page.len().min(limit);
            for message in page.iter().take(page_len) {
                if !self.classifier.is_qualifying_message(message) {
                    continue;
                }
                scan.latest
                    .entry(message.author.clone())
                    .and_modify(|t| *t = (*t).max(message.timestamp_ms))
                    .or_insert(message.timestamp_ms);
            }
            scan.messages_scanned += page_len;
            debug!(channel = %channel, page = scan.pages_fetched, page_len, "Scanned history page");

            if page_len < limit {
                break;
            }
            match page.get(page_len - 1) {
                Some(oldest) => before = Some(oldest.id.clone()),
                None => break,
            }
        }

        scan
    }

    /// Scan, then merge each author's newest post through `merge_backfill`.
    pub async fn reconcile(
        &self,
        store: &ActivityStore,
        channel: &ChannelRef,
        budget: usize,
        run_id: &str,
    ) -> BackfillReport {
        let scan = self.scan(channel, budget).await;
        let report = merge_scan(store, channel, &scan);

        if let Some(failure) = &scan.failure {
            EventLogger::log_event(
                run_id,
                TrackerEvent::Error {
                    error_msg: format!("history fetch for {channel} failed: {failure}"),
                },
            );
        }

        info!(
            channel = %channel,
            users_updated = report.users_updated,
            users_seen = report.users_seen,
            messages_scanned = report.messages_scanned,
            aborted = report.aborted,
            "Backfill complete"
        );
        EventLogger::log_event(
            run_id,
            TrackerEvent::BackfillCompleted {
                channel: channel.to_string(),
                users_updated: report.users_updated,
                messages_scanned: report.messages_scanned,
                aborted: report.aborted,
            },
        );
        report
    }
}

/// Merge a finished scan into the store.
pub fn merge_scan(store: &ActivityStore, channel: &ChannelRef, scan: &HistoryScan) -> BackfillReport {
    let users_updated = scan
        .latest
        .iter()
        .filter(|(user, &at)| store.merge_backfill(&channel.key_for((*user).clone()), at).changed())
        .count();

    BackfillReport {
        users_updated,
        users_seen: scan.latest.len(),
        messages_scanned: scan.messages_scanned,
        pages_fetched: scan.pages_fetched,
        aborted: scan.failure.is_some(),
    }
}
