//! Gateway - TCP listener that accepts incoming connections.
//!
//! The Gateway binds the configured address and spawns a Connection task for
//! each incoming client.

use crate::config::ListenConfig;
use crate::network::Connection;
use crate::relay::Relay;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{Instrument, error, info, info_span, instrument};
use uuid::Uuid;

/// The Gateway accepts incoming TCP connections and spawns handlers.
pub struct Gateway {
    listener: TcpListener,
    relay: Arc<Relay>,
    max_line_length: usize,
}

impl Gateway {
    /// Bind the gateway to the configured address.
    pub async fn bind(config: &ListenConfig, relay: Arc<Relay>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(config.address).await?;
        info!(address = %listener.local_addr()?, "Gateway listener bound");

        Ok(Self {
            listener,
            relay,
            max_line_length: config.max_line_length,
        })
    }

    /// Address actually bound (useful when binding port 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the gateway, accepting connections forever.
    #[instrument(skip(self), name = "gateway")]
    pub async fn run(self) -> anyhow::Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let connection =
                        Connection::new(addr, Arc::clone(&self.relay), self.max_line_length);
                    let span = info_span!("connection", id = %Uuid::new_v4(), %addr);
                    tokio::spawn(
                        async move {
                            if let Err(e) = connection.run(stream).await {
                                error!(error = %e, "Connection error");
                            }
                        }
                        .instrument(span),
                    );
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}
