//! Type definitions for message history.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Number of records returned by `get` when the caller does not say.
pub const DEFAULT_LIMIT: usize = 100;

/// Name of a conversation partition.
///
/// Callers may address channels by string or by integer; integers are kept in
/// their decimal form so `1` and `"1"` name the same channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ChannelId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<i64> for ChannelId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<u64> for ChannelId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl Serialize for ChannelId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ChannelId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Self(s),
            Raw::Signed(n) => Self::from(n),
            Raw::Unsigned(n) => Self::from(n),
        })
    }
}

/// A line of history as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub author: String,
    pub message: String,
}

impl HistoryRecord {
    pub fn new(author: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            message: message.into(),
        }
    }
}

/// Required field of a saved message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Channel,
    Author,
    Message,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Channel => "channel",
            Self::Author => "author",
            Self::Message => "message",
        })
    }
}

/// Caller-correctable request errors, raised before any I/O.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is empty")]
    Empty(Field),
    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: i64 },
    #[error("offset {offset} is beyond the {max} most recent lines")]
    OffsetTooLarge { offset: usize, max: usize },
}

/// Check the three required fields of a save, channel first.
pub fn validate_message(
    channel: &ChannelId,
    author: &str,
    message: &str,
) -> Result<(), ValidationError> {
    if channel.is_empty() {
        return Err(ValidationError::Empty(Field::Channel));
    }
    if author.is_empty() {
        return Err(ValidationError::Empty(Field::Author));
    }
    if message.is_empty() {
        return Err(ValidationError::Empty(Field::Message));
    }
    Ok(())
}

/// Window into a channel's history, counted from the most recent record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Page {
    /// Build a page from caller-supplied signed values.
    pub fn new(limit: i64, offset: i64) -> Result<Self, ValidationError> {
        let limit = usize::try_from(limit).map_err(|_| ValidationError::Negative {
            field: "limit",
            value: limit,
        })?;
        let offset = usize::try_from(offset).map_err(|_| ValidationError::Negative {
            field: "offset",
            value: offset,
        })?;
        Ok(Self { limit, offset })
    }

    /// The `limit` most recent records.
    pub fn latest(limit: usize) -> Self {
        Self { limit, offset: 0 }
    }

    /// Number of records a backend has to read to serve this page.
    pub fn span(&self) -> usize {
        self.offset.saturating_add(self.limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::latest(DEFAULT_LIMIT)
    }
}
