//! Core types shared by the assembler, store, and hub.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for generating record IDs. Process-wide so IDs stay ordered by creation.
static NEXT_RECORD_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a record, ordered by creation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl RecordId {
    /// Allocate the next ID.
    pub fn next() -> Self {
        RecordId(NEXT_RECORD_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(RecordId)
    }
}

/// Identifier of one viewer connection.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(String);

impl StreamId {
    pub fn new(id: impl Into<String>) -> Self {
        StreamId(id.into())
    }

    /// Server-generated identifier for viewers that don't bring their own.
    pub fn generate() -> Self {
        StreamId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamId({})", self.0)
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamId {
    fn from(s: &str) -> Self {
        StreamId(s.to_string())
    }
}

impl From<String> for StreamId {
    fn from(s: String) -> Self {
        StreamId(s)
    }
}

/// One logical log emission, possibly spanning several physical lines.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Unique identifier (assigned on creation).
    pub id: RecordId,

    /// When the first line of the record arrived.
    pub timestamp: DateTime<Utc>,

    /// Message text, lines joined with `\n`, escape sequences removed.
    pub message: String,
}

impl LogRecord {
    /// Create a record stamped now with a fresh ID.
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_timestamp(message, Utc::now())
    }

    /// Create a record with an explicit arrival time and a fresh ID.
    pub fn with_timestamp(message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: RecordId::next(),
            timestamp,
            message: message.into(),
        }
    }
}
