//! Wire format of the gateway.
//!
//! One JSON document per line. Clients send requests:
//!
//! ```text
//! {"id": 1, "procedure": "message.send", "args": {"channel": 1, "author": "Nicholas", "message": "Yo Brows"}}
//! {"id": 2, "procedure": "history.get", "args": {"channel": "room3", "lines": 20, "offset": 0}}
//! {"id": 3, "procedure": "channel.subscribe", "args": {"channel": "room3"}}
//! ```
//!
//! and receive replies (`{"id", "result"}` or `{"id", "error": {"code", "message"}}`)
//! plus, after subscribing, events (`{"event": "message", "channel", "author", "message"}`).

use crate::history::{ChannelId, HistoryError};
use crate::relay::Published;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const SEND_MESSAGE: &str = "message.send";
pub const GET_HISTORY: &str = "history.get";
pub const SUBSCRIBE: &str = "channel.subscribe";

#[derive(Debug, Deserialize)]
pub struct Request {
    pub id: u64,
    pub procedure: String,
    #[serde(default)]
    pub args: Value,
}

/// Missing fields default to empty so the store reports which one is absent.
#[derive(Debug, Deserialize)]
pub struct SendArgs {
    #[serde(default)]
    pub channel: ChannelId,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryArgs {
    #[serde(default)]
    pub channel: ChannelId,
    pub lines: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeArgs {
    #[serde(default)]
    pub channel: ChannelId,
}

/// Reasons a single call fails; the connection itself stays open.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("malformed request: {0}")]
    Parse(serde_json::Error),
    #[error("invalid arguments: {0}")]
    InvalidArgs(serde_json::Error),
    #[error("no such procedure: {0}")]
    UnknownProcedure(String),
    #[error("request line too long")]
    LineTooLong,
    #[error("failed to encode result: {0}")]
    Encode(serde_json::Error),
    #[error(transparent)]
    History(#[from] HistoryError),
}

impl CallError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Parse(_) => "parse_error",
            Self::InvalidArgs(_) => "invalid_args",
            Self::UnknownProcedure(_) => "unknown_procedure",
            Self::LineTooLong => "line_too_long",
            Self::Encode(_) => "internal",
            Self::History(e) => e.error_code(),
        }
    }
}

pub fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, CallError> {
    // `args` may be omitted entirely.
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args).map_err(CallError::InvalidArgs)
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Result {
        id: u64,
        result: Value,
    },
    Error {
        id: Option<u64>,
        error: ErrorBody,
    },
    Event {
        event: &'static str,
        channel: ChannelId,
        author: String,
        message: String,
    },
}

impl Reply {
    pub fn result(id: u64, result: Value) -> Self {
        Self::Result { id, result }
    }

    pub fn error(id: Option<u64>, err: &CallError) -> Self {
        Self::Error {
            id,
            error: ErrorBody {
                code: err.code(),
                message: err.to_string(),
            },
        }
    }

    pub fn event(published: &Published) -> Self {
        Self::Event {
            event: "message",
            channel: published.channel.clone(),
            author: published.author.clone(),
            message: published.message.clone(),
        }
    }
}
