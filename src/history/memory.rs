//! In-memory history store.
//!
//! Used for development and tests. Everything is lost when the process
//! exits and nothing bounds how much is kept.

use super::types::validate_message;
use super::{ChannelId, HistoryError, HistoryRecord, HistoryStore, Page};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

type Log = HashMap<ChannelId, Vec<HistoryRecord>>;

static SHARED: OnceLock<MemoryStore> = OnceLock::new();

/// Handle to an in-memory, per-channel append-only log.
///
/// Clones share the same log.
#[derive(Clone, Default)]
pub struct MemoryStore {
    log: Arc<RwLock<Log>>,
}

impl MemoryStore {
    /// Create a store with its own, private log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the log shared by the whole process.
    pub fn shared() -> Self {
        SHARED.get_or_init(Self::new).clone()
    }

    /// Drop every channel's history.
    pub fn clear(&self) {
        *self.log.write() = HashMap::new();
    }

    /// Number of channels with at least one saved line.
    pub fn channel_count(&self) -> usize {
        self.log.read().len()
    }
}

impl fmt::Debug for MemoryStore {
    // First 1000 characters only; the log is unbounded.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dump = format!("{:?}", *self.log.read());
        let cut = dump
            .char_indices()
            .nth(1000)
            .map_or(dump.len(), |(idx, _)| idx);
        write!(f, "MemoryStore({})", &dump[..cut])
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn save(
        &self,
        channel: &ChannelId,
        author: &str,
        message: &str,
    ) -> Result<(), HistoryError> {
        validate_message(channel, author, message)?;

        self.log
            .write()
            .entry(channel.clone())
            .or_default()
            .push(HistoryRecord::new(author, message));
        Ok(())
    }

    async fn get(
        &self,
        channel: &ChannelId,
        page: Page,
    ) -> Result<Vec<HistoryRecord>, HistoryError> {
        let log = self.log.read();
        let Some(lines) = log.get(channel) else {
            return Ok(vec![]);
        };

        Ok(lines
            .iter()
            .rev()
            .skip(page.offset)
            .take(page.limit)
            .cloned()
            .collect())
    }
}
