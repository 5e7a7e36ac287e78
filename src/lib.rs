//! chato - chat relay with paginated, durable message history.
//!
//! The heart of the crate is [`history::HistoryStore`]: every relayed message
//! is appended to its channel's log, and joining clients replay a bounded
//! window of it, newest first. Three backends implement it:
//!
//! - [`history::MemoryStore`]: process-wide in-memory log (development, tests)
//! - `history::cassandra::CassandraStore`: Cassandra / ScyllaDB cluster
//!   (`cassandra` feature, on by default)
//! - [`history::redb::RedbStore`]: embedded single-file store
//!
//! [`relay::Relay`] saves then republishes messages, and
//! [`network::Gateway`] exposes it to clients as JSON lines over TCP.

pub mod config;
pub mod history;
pub mod http;
pub mod metrics;
pub mod network;
pub mod relay;
