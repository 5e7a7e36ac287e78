//! Message relay.
//!
//! Saves every message to history and then fans it out to the channel's
//! subscribers. Publishing is at-most-once: a subscriber that lags behind
//! loses messages, and a message nobody listens to is simply dropped. A
//! message whose save fails is never published.

use crate::config::HistoryConfig;
use crate::history::{
    ChannelId, HistoryError, HistoryRecord, HistoryStore, Page, ValidationError,
};
use crate::metrics;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Per-channel broadcast buffer; slower subscribers miss older messages.
const SUBSCRIBER_BUFFER: usize = 256;

/// A message as delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Published {
    pub channel: ChannelId,
    pub author: String,
    pub message: String,
}

pub struct Relay {
    store: Arc<dyn HistoryStore>,
    backend: &'static str,
    default_lines: usize,
    max_lines: usize,
    max_offset: usize,
    channels: DashMap<ChannelId, broadcast::Sender<Arc<Published>>>,
}

impl Relay {
    pub fn new(store: Arc<dyn HistoryStore>, config: &HistoryConfig) -> Self {
        Self {
            store,
            backend: config.backend.as_str(),
            default_lines: config.default_lines,
            max_lines: config.max_lines.max(1),
            max_offset: config.max_offset,
            channels: DashMap::new(),
        }
    }

    /// Save a message, then publish it to current subscribers.
    ///
    /// Returns how many subscribers the message was handed to.
    pub async fn send_message(
        &self,
        channel: &ChannelId,
        author: &str,
        message: &str,
    ) -> Result<usize, HistoryError> {
        self.timed("save", self.store.save(channel, author, message))
            .await?;

        let Some(sender) = self.channels.get(channel).map(|s| s.clone()) else {
            return Ok(0);
        };

        let published = Arc::new(Published {
            channel: channel.clone(),
            author: author.to_string(),
            message: message.to_string(),
        });
        match sender.send(published) {
            Ok(reached) => {
                metrics::record_published();
                Ok(reached)
            }
            Err(_) => {
                self.release(channel);
                Ok(0)
            }
        }
    }

    /// Replay a channel's history, newest first.
    ///
    /// `lines` defaults to the configured count and is capped at `max_lines`;
    /// an `offset` past `max_offset` is rejected.
    pub async fn get_history(
        &self,
        channel: &ChannelId,
        lines: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<HistoryRecord>, HistoryError> {
        let requested = lines.unwrap_or(self.default_lines as i64);
        let mut page = Page::new(requested, offset.unwrap_or(0))?;
        if page.offset > self.max_offset {
            return Err(ValidationError::OffsetTooLarge {
                offset: page.offset,
                max: self.max_offset,
            }
            .into());
        }
        if page.limit > self.max_lines {
            debug!(requested, max = self.max_lines, "Clamping history request");
            page.limit = self.max_lines;
        }
        self.timed("get", self.store.get(channel, page)).await
    }

    /// Subscribe to messages published on `channel` from now on.
    pub fn subscribe(&self, channel: &ChannelId) -> broadcast::Receiver<Arc<Published>> {
        self.channels
            .entry(channel.clone())
            .or_insert_with(|| broadcast::channel(SUBSCRIBER_BUFFER).0)
            .subscribe()
    }

    /// Drop the channel's sender once nobody listens on it any more.
    ///
    /// Returns whether the channel was removed.
    pub fn release(&self, channel: &ChannelId) -> bool {
        self.channels
            .remove_if(channel, |_, s| s.receiver_count() == 0)
            .is_some()
    }

    /// Number of channels with a live broadcast sender.
    pub fn active_channels(&self) -> usize {
        self.channels.len()
    }

    async fn timed<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T, HistoryError>>,
    ) -> Result<T, HistoryError> {
        let start = Instant::now();
        let result = fut.await;
        let elapsed = start.elapsed().as_secs_f64();

        match &result {
            Ok(_) => metrics::record_history_op(self.backend, op, elapsed, None),
            Err(e) => {
                metrics::record_history_op(self.backend, op, elapsed, Some(e.error_code()));
                if e.is_storage() {
                    warn!(backend = self.backend, op, error = %e, "History store failed");
                } else {
                    debug!(backend = self.backend, op, error = %e, "Rejected history request");
                }
            }
        }
        result
    }
}
