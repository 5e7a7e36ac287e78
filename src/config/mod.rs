//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Top-level config struct and loading (Config, ServerConfig)
//! - [`listen`]: Gateway listener configuration (ListenConfig)
//! - [`history`]: History backend configuration (HistoryConfig, CassandraConfig, RedbConfig)
//! - [`validation`]: Startup checks that collect every problem at once

mod history;
mod listen;
mod types;
pub mod validation;

pub use history::{CassandraConfig, HistoryBackend, HistoryConfig, RedbConfig};
pub use listen::ListenConfig;
pub use types::{Config, ConfigError, ServerConfig};
