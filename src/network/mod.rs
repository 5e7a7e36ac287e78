//! Network module.
//!
//! Contains the Gateway (TCP listener), the per-client Connection handler,
//! and the JSON-lines wire protocol.

mod connection;
mod gateway;
pub mod protocol;

pub use connection::Connection;
pub use gateway::Gateway;
