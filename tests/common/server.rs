//! Test server management.
//!
//! Runs a gateway inside the test process on an ephemeral port.

use chato::config::{HistoryConfig, ListenConfig};
use chato::history::{HistoryStore, MemoryStore};
use chato::network::Gateway;
use chato::relay::Relay;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A test server instance.
pub struct TestServer {
    addr: SocketAddr,
    relay: Arc<Relay>,
    task: JoinHandle<()>,
}

impl TestServer {
    /// Spawn a gateway backed by a fresh, isolated in-memory store.
    pub async fn spawn() -> anyhow::Result<Self> {
        Self::spawn_with(Arc::new(MemoryStore::new()), HistoryConfig::default()).await
    }

    /// Spawn a gateway over the given store and history settings.
    pub async fn spawn_with(
        store: Arc<dyn HistoryStore>,
        history: HistoryConfig,
    ) -> anyhow::Result<Self> {
        let listen = ListenConfig {
            address: "127.0.0.1:0".parse()?,
            max_line_length: 4096,
        };
        let relay = Arc::new(Relay::new(store, &history));
        let gateway = Gateway::bind(&listen, Arc::clone(&relay)).await?;
        let addr = gateway.local_addr()?;

        let task = tokio::spawn(async move {
            let _ = gateway.run().await;
        });

        Ok(Self { addr, relay, task })
    }

    /// Get the server address.
    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    /// The relay behind the gateway, for asserting on server-side state.
    #[allow(dead_code)]
    pub fn relay(&self) -> &Arc<Relay> {
        &self.relay
    }

    /// Create a new test client connected to this server.
    pub async fn connect(&self) -> anyhow::Result<super::client::TestClient> {
        super::client::TestClient::connect(self.address()).await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
