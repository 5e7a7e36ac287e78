//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use super::history::HistoryConfig;
use super::listen::ListenConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Relay configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server identity.
    pub server: ServerConfig,
    /// Gateway listen configuration.
    pub listen: ListenConfig,
    /// History backend configuration.
    #[serde(default)]
    pub history: HistoryConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Name reported in logs.
    pub name: String,
    /// Prometheus metrics HTTP port (default: 9090, 0 disables).
    pub metrics_port: Option<u16>,
}

pub(super) fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HistoryBackend;

    #[test]
    fn minimal_config_uses_memory_history() {
        let config: Config = toml::from_str(
            r#"
[server]
name = "chato"

[listen]
address = "127.0.0.1:8080"
"#,
        )
        .unwrap();
        assert_eq!(config.server.name, "chato");
        assert_eq!(config.server.metrics_port, None);
        assert_eq!(config.history.backend, HistoryBackend::Memory);
        assert!(config.history.cassandra.is_none());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Config::load("/nonexistent/chato.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\nname = ").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reads_full_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[server]
name = "chato"
metrics_port = 0

[listen]
address = "0.0.0.0:9000"

[history]
backend = "cassandra"

[history.cassandra]
keyspace = "chato"
hosts = ["10.0.0.1", "10.0.0.2:9042"]
"#,
        )
        .unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.metrics_port, Some(0));
        assert_eq!(config.listen.address.port(), 9000);
        assert_eq!(config.history.backend, HistoryBackend::Cassandra);
        let cassandra = config.history.cassandra.unwrap();
        assert_eq!(cassandra.hosts, vec!["10.0.0.1", "10.0.0.2:9042"]);
        assert!(cassandra.create_keyspace);
    }
}
