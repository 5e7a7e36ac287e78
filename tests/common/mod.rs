//! Integration test common infrastructure.
//!
//! Provides utilities for spawning in-process gateways, creating JSON-lines
//! test clients, and asserting on request/event flows.

pub mod client;
pub mod server;

#[allow(unused_imports)]
pub use client::TestClient;
#[allow(unused_imports)]
pub use server::TestServer;
