//! Cassandra / ScyllaDB history storage.
//!
//! Each channel is one partition (`room_id`); inside it rows are clustered by
//! a time UUID in descending order, so the cluster returns the newest line
//! first without any sorting on our side.
//!
//! Construction bootstraps the keyspace and table once. "Already exists" is
//! success; anything else aborts construction. CQL has no `OFFSET`, so `get`
//! reads `offset + limit` rows and drops the first `offset`; callers bound the
//! offset (see `history.max_offset`).

use super::offload::bounded;
use super::types::validate_message;
use super::{ChannelId, HistoryError, HistoryRecord, HistoryStore, MessageId, Page};
use crate::config::CassandraConfig;
use async_trait::async_trait;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::errors::{DbError, ExecutionError, RequestAttemptError};
use scylla::statement::prepared::PreparedStatement;
use scylla::value::CqlTimeuuid;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const HISTORY_TABLE: &str = "chat_history";

/// CQL creating the history table in the session's keyspace.
pub fn create_table_cql() -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {HISTORY_TABLE} (\
         room_id text, \
         message_id timeuuid, \
         author text, \
         message text, \
         PRIMARY KEY ((room_id), message_id)\
         ) WITH CLUSTERING ORDER BY (message_id DESC)"
    )
}

/// CQL creating the keyspace with the configured replication.
pub fn create_keyspace_cql(config: &CassandraConfig) -> String {
    format!(
        "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = \
         {{'class': '{}', 'replication_factor': {}}}",
        config.keyspace, config.replication_class, config.replication_factor
    )
}

/// Whether a schema statement failed only because its target already exists.
///
/// Concurrent bootstraps from several nodes can still race past `IF NOT EXISTS`.
pub fn is_already_exists(err: &ExecutionError) -> bool {
    matches!(
        err,
        ExecutionError::LastAttemptError(RequestAttemptError::DbError(
            DbError::AlreadyExists { .. },
            _
        ))
    )
}

/// Run one schema statement. `Ok(false)` means its target already existed.
async fn run_schema(
    session: &Session,
    cql: String,
    timeout: Duration,
) -> Result<bool, HistoryError> {
    bounded(
        timeout,
        async {
            match session.query_unpaged(cql, ()).await {
                Ok(_) => Ok(true),
                Err(e) if is_already_exists(&e) => Ok(false),
                Err(e) => Err(e),
            }
        },
        |e| HistoryError::Bootstrap(e.to_string()),
    )
    .await
}

pub struct CassandraStore {
    session: Session,
    insert: PreparedStatement,
    select: PreparedStatement,
    timeout: Duration,
}

impl CassandraStore {
    /// Connect to the cluster and bootstrap keyspace and table.
    pub async fn connect(config: &CassandraConfig) -> Result<Self, HistoryError> {
        let timeout = config.request_timeout();

        let session = bounded(
            config.connect_timeout(),
            SessionBuilder::new()
                .known_nodes(&config.hosts)
                .connection_timeout(config.connect_timeout())
                .build(),
            |e| HistoryError::Connection(e.to_string()),
        )
        .await?;
        info!(hosts = ?config.hosts, "Connected to Cassandra cluster");

        Self::select_keyspace(&session, config).await?;
        Self::create_table(&session, timeout).await?;

        let insert = bounded(
            timeout,
            session.prepare(format!(
                "INSERT INTO {HISTORY_TABLE} (room_id, message_id, author, message) \
                 VALUES (?, ?, ?, ?)"
            )),
            |e| HistoryError::Bootstrap(e.to_string()),
        )
        .await?;
        let select = bounded(
            timeout,
            session.prepare(format!(
                "SELECT author, message FROM {HISTORY_TABLE} WHERE room_id = ? LIMIT ?"
            )),
            |e| HistoryError::Bootstrap(e.to_string()),
        )
        .await?;

        Ok(Self {
            session,
            insert,
            select,
            timeout,
        })
    }

    async fn select_keyspace(
        session: &Session,
        config: &CassandraConfig,
    ) -> Result<(), HistoryError> {
        let timeout = config.request_timeout();
        let first = bounded(
            timeout,
            session.use_keyspace(config.keyspace.as_str(), false),
            |e| HistoryError::Bootstrap(e.to_string()),
        )
        .await;

        match first {
            Ok(()) => return Ok(()),
            Err(e) if !config.create_keyspace => return Err(e),
            Err(e) => {
                debug!(keyspace = %config.keyspace, error = %e, "Keyspace not usable, creating it");
            }
        }

        if run_schema(session, create_keyspace_cql(config), timeout).await? {
            info!(
                keyspace = %config.keyspace,
                class = %config.replication_class,
                factor = config.replication_factor,
                "Created keyspace"
            );
        } else {
            debug!(keyspace = %config.keyspace, "Keyspace created concurrently");
        }

        bounded(
            timeout,
            session.use_keyspace(config.keyspace.as_str(), false),
            |e| HistoryError::Bootstrap(e.to_string()),
        )
        .await
    }

    async fn create_table(session: &Session, timeout: Duration) -> Result<(), HistoryError> {
        if run_schema(session, create_table_cql(), timeout).await? {
            info!(table = HISTORY_TABLE, "History table ready");
        } else {
            debug!(table = HISTORY_TABLE, "History table already exists");
        }
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for CassandraStore {
    async fn save(
        &self,
        channel: &ChannelId,
        author: &str,
        message: &str,
    ) -> Result<(), HistoryError> {
        validate_message(channel, author, message)?;

        let message_id = CqlTimeuuid::from(MessageId::generate().uuid());
        bounded(
            self.timeout,
            self.session.execute_unpaged(
                &self.insert,
                (channel.as_str(), message_id, author, message),
            ),
            |e| HistoryError::Write(e.to_string()),
        )
        .await
        .inspect_err(|e| warn!(channel = %channel, error = %e, "History insert failed"))?;
        Ok(())
    }

    async fn get(
        &self,
        channel: &ChannelId,
        page: Page,
    ) -> Result<Vec<HistoryRecord>, HistoryError> {
        // Cassandra rejects an empty partition key.
        if page.limit == 0 || channel.is_empty() {
            return Ok(vec![]);
        }
        let span = i32::try_from(page.span()).unwrap_or(i32::MAX);

        let result = bounded(
            self.timeout,
            self.session
                .execute_unpaged(&self.select, (channel.as_str(), span)),
            |e| HistoryError::Read(e.to_string()),
        )
        .await?;

        let rows = result
            .into_rows_result()
            .map_err(|e| HistoryError::Read(e.to_string()))?;

        let mut records = Vec::with_capacity(page.limit.min(1024));
        for row in rows
            .rows::<(String, String)>()
            .map_err(|e| HistoryError::Read(e.to_string()))?
            .skip(page.offset)
            .take(page.limit)
        {
            let (author, message) = row.map_err(|e| HistoryError::Read(e.to_string()))?;
            records.push(HistoryRecord { author, message });
        }
        Ok(records)
    }
}
