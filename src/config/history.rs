//! History storage configuration.

use serde::Deserialize;
use std::time::Duration;

use super::types::default_true;

/// Which [`HistoryStore`](crate::history::HistoryStore) implementation to build.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HistoryBackend {
    /// Process-wide in-memory log; lost on restart.
    #[default]
    Memory,
    /// Cassandra / ScyllaDB cluster.
    Cassandra,
    /// Embedded redb file.
    Redb,
}

impl HistoryBackend {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Cassandra => "cassandra",
            Self::Redb => "redb",
        }
    }
}

/// History configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    /// Backend type: "memory", "cassandra", "redb".
    #[serde(default)]
    pub backend: HistoryBackend,
    /// Lines returned by `history.get` when the caller does not ask for a count.
    #[serde(default = "default_lines")]
    pub default_lines: usize,
    /// Upper bound on lines returned by a single `history.get`.
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
    /// Deepest `offset` a single `history.get` may ask for.
    #[serde(default = "default_max_offset")]
    pub max_offset: usize,
    /// Cassandra settings; required when `backend = "cassandra"`.
    pub cassandra: Option<CassandraConfig>,
    /// Redb settings.
    #[serde(default)]
    pub redb: RedbConfig,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            backend: HistoryBackend::Memory,
            default_lines: default_lines(),
            max_lines: default_max_lines(),
            max_offset: default_max_offset(),
            cassandra: None,
            redb: RedbConfig::default(),
        }
    }
}

/// Cassandra cluster and schema settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CassandraConfig {
    /// Contact points; the port defaults to 9042.
    #[serde(default = "default_hosts")]
    pub hosts: Vec<String>,
    /// Keyspace holding the history table.
    pub keyspace: String,
    /// Create the keyspace on first start if it is missing.
    #[serde(default = "default_true")]
    pub create_keyspace: bool,
    /// Replication strategy class used when creating the keyspace.
    #[serde(default = "default_replication_class")]
    pub replication_class: String,
    /// Replication factor used when creating the keyspace.
    #[serde(default = "default_replication_factor")]
    pub replication_factor: u32,
    /// Deadline for a single read or write, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Deadline for establishing the session, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl CassandraConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for CassandraConfig {
    fn default() -> Self {
        Self {
            hosts: default_hosts(),
            keyspace: String::new(),
            create_keyspace: true,
            replication_class: default_replication_class(),
            replication_factor: default_replication_factor(),
            request_timeout_ms: default_timeout_ms(),
            connect_timeout_ms: default_timeout_ms(),
        }
    }
}

/// Embedded redb settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RedbConfig {
    /// Path to the history database file.
    #[serde(default = "default_redb_path")]
    pub path: String,
    /// Deadline for a single transaction, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl RedbConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for RedbConfig {
    fn default() -> Self {
        Self {
            path: default_redb_path(),
            request_timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_lines() -> usize {
    crate::history::types::DEFAULT_LIMIT
}

fn default_max_lines() -> usize {
    1000
}

fn default_max_offset() -> usize {
    10_000
}

fn default_hosts() -> Vec<String> {
    vec!["localhost".to_string()]
}

fn default_replication_class() -> String {
    "SimpleStrategy".to_string()
}

fn default_replication_factor() -> u32 {
    3
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_redb_path() -> String {
    "history.redb".to_string()
}
