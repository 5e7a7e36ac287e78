//! Gateway listener configuration.

use serde::Deserialize;
use std::net::SocketAddr;

/// Gateway listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// Address to bind to (e.g., "0.0.0.0:8080").
    pub address: SocketAddr,
    /// Longest accepted request line in bytes.
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
}

fn default_max_line_length() -> usize {
    64 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_line_length_defaults_to_64k() {
        let config: ListenConfig = toml::from_str(r#"address = "127.0.0.1:8080""#).unwrap();
        assert_eq!(config.max_line_length, 65536);
    }
}
