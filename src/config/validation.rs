//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::{Config, HistoryBackend};
use std::path::Path;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.name is required")]
    MissingServerName,
    #[error("history.max_lines must be at least 1")]
    ZeroMaxLines,
    #[error("history.backend is \"cassandra\" but [history.cassandra] is missing")]
    MissingCassandraSection,
    #[error("history.backend is \"cassandra\" but this build has no cassandra support")]
    CassandraUnsupported,
    #[error("history.cassandra.hosts must not be empty")]
    NoCassandraHosts,
    #[error("history.cassandra.keyspace must match [A-Za-z0-9_]{{1,48}}, got '{0}'")]
    InvalidKeyspace(String),
    #[error("history.cassandra.replication_class must match [A-Za-z0-9_.]+, got '{0}'")]
    InvalidReplicationClass(String),
    #[error("history.cassandra.replication_factor must be at least 1")]
    ZeroReplicationFactor,
    #[error("history.redb.path parent directory does not exist: {0}")]
    RedbPathInvalid(String),
}

/// CQL unquoted identifier rules for keyspace names.
fn is_valid_keyspace(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 48
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.name.is_empty() {
        errors.push(ValidationError::MissingServerName);
    }

    let history = &config.history;
    if history.max_lines == 0 {
        errors.push(ValidationError::ZeroMaxLines);
    }

    match history.backend {
        HistoryBackend::Cassandra => {
            if !cfg!(feature = "cassandra") {
                errors.push(ValidationError::CassandraUnsupported);
            }
            match history.cassandra {
                None => errors.push(ValidationError::MissingCassandraSection),
                Some(ref cassandra) => {
                    if cassandra.hosts.is_empty() {
                        errors.push(ValidationError::NoCassandraHosts);
                    }
                    if !is_valid_keyspace(&cassandra.keyspace) {
                        errors.push(ValidationError::InvalidKeyspace(cassandra.keyspace.clone()));
                    }
                    if cassandra.replication_class.is_empty()
                        || !cassandra
                            .replication_class
                            .chars()
                            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
                    {
                        errors.push(ValidationError::InvalidReplicationClass(
                            cassandra.replication_class.clone(),
                        ));
                    }
                    if cassandra.replication_factor == 0 {
                        errors.push(ValidationError::ZeroReplicationFactor);
                    }
                }
            }
        }
        HistoryBackend::Redb => {
            let db_path = Path::new(&history.redb.path);
            if let Some(parent) = db_path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                errors.push(ValidationError::RedbPathInvalid(history.redb.path.clone()));
            }
        }
        HistoryBackend::Memory => {}
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
