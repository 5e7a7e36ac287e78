//! Redb-backed persistent history storage.
//!
//! Implements [`HistoryStore`] on the redb embedded database for single-node
//! deployments that still want history to survive a restart.
//!
//! # Schema
//!
//! ```text
//! chat_history: (channel, ticks) -> StoredLine (serde_json)
//! chat_meta:    "last_ticks"      -> newest ticks ever written
//! ```
//!
//! `ticks` is the [`MessageId`] clock value, so keys within a channel sort in
//! save order and a reverse range scan yields the newest line first. Opening the
//! file raises the id clock past `last_ticks`. redb is a
//! blocking API; every transaction runs on the blocking pool.

use super::offload::offload;
use super::types::validate_message;
use super::{ChannelId, HistoryError, HistoryRecord, HistoryStore, MessageId, Page, msgid};
use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const HISTORY_TABLE: TableDefinition<(&str, u64), &[u8]> = TableDefinition::new("chat_history");
const META_TABLE: TableDefinition<&str, u64> = TableDefinition::new("chat_meta");
const LAST_TICKS_KEY: &str = "last_ticks";

/// Row value as persisted.
#[derive(Debug, Serialize, Deserialize)]
struct StoredLine {
    message_id: String,
    author: String,
    message: String,
}

pub struct RedbStore {
    db: Arc<Database>,
    timeout: Duration,
}

impl RedbStore {
    /// Open or create the history file at `path`, creating the table if needed.
    pub fn open(path: impl AsRef<Path>, timeout: Duration) -> Result<Self, HistoryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(path).map_err(|e| HistoryError::Bootstrap(e.to_string()))?;

        let write_txn = db
            .begin_write()
            .map_err(|e| HistoryError::Bootstrap(e.to_string()))?;
        let last_ticks = {
            let _ = write_txn
                .open_table(HISTORY_TABLE)
                .map_err(|e| HistoryError::Bootstrap(e.to_string()))?;
            let meta = write_txn
                .open_table(META_TABLE)
                .map_err(|e| HistoryError::Bootstrap(e.to_string()))?;
            meta.get(LAST_TICKS_KEY)
                .map_err(|e| HistoryError::Bootstrap(e.to_string()))?
                .map(|v| v.value())
        };
        write_txn
            .commit()
            .map_err(|e| HistoryError::Bootstrap(e.to_string()))?;

        if let Some(ticks) = last_ticks {
            msgid::advance_past(ticks);
        }
        debug!(path = %path.display(), ?last_ticks, "History table ready");
        Ok(Self {
            db: Arc::new(db),
            timeout,
        })
    }
}

#[async_trait]
impl HistoryStore for RedbStore {
    async fn save(
        &self,
        channel: &ChannelId,
        author: &str,
        message: &str,
    ) -> Result<(), HistoryError> {
        validate_message(channel, author, message)?;

        let id = MessageId::generate();
        let value = serde_json::to_vec(&StoredLine {
            message_id: id.uuid().to_string(),
            author: author.to_string(),
            message: message.to_string(),
        })
        .map_err(|e| HistoryError::Serialization(e.to_string()))?;

        let db = Arc::clone(&self.db);
        let channel = channel.as_str().to_string();
        offload(self.timeout, move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| HistoryError::Write(e.to_string()))?;
            {
                let mut table = write_txn
                    .open_table(HISTORY_TABLE)
                    .map_err(|e| HistoryError::Write(e.to_string()))?;
                table
                    .insert((channel.as_str(), id.ticks()), value.as_slice())
                    .map_err(|e| HistoryError::Write(e.to_string()))?;

                let mut meta = write_txn
                    .open_table(META_TABLE)
                    .map_err(|e| HistoryError::Write(e.to_string()))?;
                let stored = meta
                    .get(LAST_TICKS_KEY)
                    .map_err(|e| HistoryError::Write(e.to_string()))?
                    .map(|v| v.value());
                if stored.is_none_or(|last| last < id.ticks()) {
                    meta.insert(LAST_TICKS_KEY, id.ticks())
                        .map_err(|e| HistoryError::Write(e.to_string()))?;
                }
            }
            write_txn
                .commit()
                .map_err(|e| HistoryError::Write(e.to_string()))
        })
        .await
    }

    async fn get(
        &self,
        channel: &ChannelId,
        page: Page,
    ) -> Result<Vec<HistoryRecord>, HistoryError> {
        if page.limit == 0 {
            return Ok(vec![]);
        }

        let db = Arc::clone(&self.db);
        let channel = channel.as_str().to_string();
        offload(self.timeout, move || {
            let read_txn = db
                .begin_read()
                .map_err(|e| HistoryError::Read(e.to_string()))?;
            let table = read_txn
                .open_table(HISTORY_TABLE)
                .map_err(|e| HistoryError::Read(e.to_string()))?;

            let range = table
                .range((channel.as_str(), 0u64)..=(channel.as_str(), u64::MAX))
                .map_err(|e| HistoryError::Read(e.to_string()))?;

            let mut records = Vec::with_capacity(page.limit.min(1024));
            for item in range.rev().skip(page.offset).take(page.limit) {
                let (_k, v) = item.map_err(|e| HistoryError::Read(e.to_string()))?;
                let line: StoredLine = serde_json::from_slice(v.value())
                    .map_err(|e| HistoryError::Serialization(e.to_string()))?;
                records.push(HistoryRecord {
                    author: line.author,
                    message: line.message,
                });
            }
            Ok(records)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn create_test_store() -> (RedbStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("history.redb"), TIMEOUT).unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_save_and_get() {
        let (store, _dir) = create_test_store();
        let channel = ChannelId::from(1i64);
        store.save(&channel, "Nicholas", "Yo Brows").await.unwrap();

        let records = store.get(&channel, Page::latest(1)).await.unwrap();
        assert_eq!(records, vec![HistoryRecord::new("Nicholas", "Yo Brows")]);
    }

    #[tokio::test]
    async fn test_newest_first_with_offset() {
        let (store, _dir) = create_test_store();
        let channel = ChannelId::from("room3");
        for n in 0..6 {
            store.save(&channel, "bot", &format!("line {n}")).await.unwrap();
        }

        let records = store
            .get(&channel, Page { limit: 2, offset: 1 })
            .await
            .unwrap();
        let lines: Vec<_> = records.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(lines, ["line 4", "line 3"]);
    }

    fn newest_key_ticks(store: &RedbStore, channel: &str) -> u64 {
        let read_txn = store.db.begin_read().unwrap();
        let table = read_txn.open_table(HISTORY_TABLE).unwrap();
        let mut range = table.range((channel, 0u64)..=(channel, u64::MAX)).unwrap();
        let (key, _) = range.next_back().unwrap().unwrap();
        key.value().1
    }

    #[tokio::test]
    async fn test_reopen_orders_after_stored_ticks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.redb");
        // Ten minutes ahead, as if the clock was set back since the last run.
        let future = MessageId::generate().ticks() + 6_000_000_000;
        {
            let db = Database::create(&path).unwrap();
            let write_txn = db.begin_write().unwrap();
            {
                let mut table = write_txn.open_table(HISTORY_TABLE).unwrap();
                let line = serde_json::to_vec(&StoredLine {
                    message_id: String::new(),
                    author: "past".to_string(),
                    message: "written before restart".to_string(),
                })
                .unwrap();
                table.insert(("room", future), line.as_slice()).unwrap();
                let mut meta = write_txn.open_table(META_TABLE).unwrap();
                meta.insert(LAST_TICKS_KEY, future).unwrap();
            }
            write_txn.commit().unwrap();
        }

        let store = RedbStore::open(&path, TIMEOUT).unwrap();
        let channel = ChannelId::from("room");
        store.save(&channel, "now", "written after restart").await.unwrap();

        assert!(newest_key_ticks(&store, "room") > future);
        let records = store.get(&channel, Page::default()).await.unwrap();
        let authors: Vec<_> = records.iter().map(|r| r.author.as_str()).collect();
        assert_eq!(authors, ["now", "past"]);
    }

    #[tokio::test]
    async fn test_save_records_last_ticks() {
        let (store, _dir) = create_test_store();
        let channel = ChannelId::from("room");
        store.save(&channel, "a", "one").await.unwrap();
        store.save(&channel, "a", "two").await.unwrap();

        let read_txn = store.db.begin_read().unwrap();
        let meta = read_txn.open_table(META_TABLE).unwrap();
        let last = meta.get(LAST_TICKS_KEY).unwrap().unwrap().value();
        assert_eq!(last, newest_key_ticks(&store, "room"));
    }

    #[tokio::test]
    async fn test_channel_prefixes_do_not_leak() {
        let (store, _dir) = create_test_store();
        store.save(&ChannelId::from("a"), "x", "in a").await.unwrap();
        store.save(&ChannelId::from("a\0b"), "y", "in a\\0b").await.unwrap();
        store.save(&ChannelId::from("ab"), "z", "in ab").await.unwrap();

        let records = store
            .get(&ChannelId::from("a"), Page::default())
            .await
            .unwrap();
        assert_eq!(records, vec![HistoryRecord::new("x", "in a")]);
    }

    #[tokio::test]
    async fn test_validation_happens_before_write() {
        let (store, _dir) = create_test_store();
        let err = store
            .save(&ChannelId::from(""), "Author", "MSG")
            .await
            .unwrap_err();
        assert!(matches!(err, HistoryError::Validation(_)));
        assert!(
            store
                .get(&ChannelId::from(""), Page::default())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_history_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.redb");
        {
            let store = RedbStore::open(&path, TIMEOUT).unwrap();
            store
                .save(&ChannelId::from("room3"), "Lindsay", "Please dont go...")
                .await
                .unwrap();
        }

        let store = RedbStore::open(&path, TIMEOUT).unwrap();
        let records = store
            .get(&ChannelId::from("room3"), Page::default())
            .await
            .unwrap();
        assert_eq!(records, vec![HistoryRecord::new("Lindsay", "Please dont go...")]);
    }

    #[tokio::test]
    async fn test_open_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/deeper/history.redb");
        RedbStore::open(&path, TIMEOUT).unwrap();
        assert!(path.exists());
    }
}
