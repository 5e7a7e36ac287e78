//! History store abstraction.
//!
//! Every message relayed through a channel is appended to that channel's log
//! by [`HistoryStore::save`]; [`HistoryStore::get`] replays a window of it,
//! newest first. The backend is picked from configuration by [`open`].

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::{HistoryBackend, HistoryConfig};

#[cfg(feature = "cassandra")]
pub mod cassandra;
pub mod memory;
pub mod msgid;
mod offload;
pub mod redb;
pub mod types;

pub use memory::MemoryStore;
pub use msgid::MessageId;
pub use types::{ChannelId, Field, HistoryRecord, Page, ValidationError};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("bootstrap error: {0}")]
    Bootstrap(String),
    #[error("write error: {0}")]
    Write(String),
    #[error("read error: {0}")]
    Read(String),
    #[error("storage timed out after {0:?}")]
    Timeout(Duration),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl HistoryError {
    /// Whether the failure came from the storage layer rather than the caller.
    pub fn is_storage(&self) -> bool {
        !matches!(self, Self::Validation(_))
    }

    /// Static error code for metrics labels and wire replies.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Connection(_) => "connection",
            Self::Bootstrap(_) => "bootstrap",
            Self::Write(_) => "write",
            Self::Read(_) => "read",
            Self::Timeout(_) => "timeout",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append one line to a channel's history.
    ///
    /// Fails with [`HistoryError::Validation`] before touching storage when any
    /// field is empty.
    async fn save(&self, channel: &ChannelId, author: &str, message: &str)
    -> Result<(), HistoryError>;

    /// Retrieve a page of a channel's history, most recent first.
    ///
    /// Unknown channels yield an empty vector.
    async fn get(&self, channel: &ChannelId, page: Page)
    -> Result<Vec<HistoryRecord>, HistoryError>;
}

/// Build the configured history backend, running its bootstrap.
pub async fn open(config: &HistoryConfig) -> Result<Arc<dyn HistoryStore>, HistoryError> {
    match config.backend {
        HistoryBackend::Memory => {
            info!("Using process-wide in-memory history");
            Ok(Arc::new(MemoryStore::shared()))
        }
        HistoryBackend::Redb => {
            info!(path = %config.redb.path, "Initializing Redb history backend");
            Ok(Arc::new(redb::RedbStore::open(
                &config.redb.path,
                config.redb.request_timeout(),
            )?))
        }
        #[cfg(feature = "cassandra")]
        HistoryBackend::Cassandra => {
            let cassandra = config.cassandra.as_ref().ok_or_else(|| {
                HistoryError::Bootstrap("history.cassandra section is missing".to_string())
            })?;
            info!(
                hosts = ?cassandra.hosts,
                keyspace = %cassandra.keyspace,
                "Initializing Cassandra history backend"
            );
            Ok(Arc::new(cassandra::CassandraStore::connect(cassandra).await?))
        }
        #[cfg(not(feature = "cassandra"))]
        HistoryBackend::Cassandra => Err(HistoryError::Bootstrap(
            "built without the `cassandra` feature".to_string(),
        )),
    }
}
