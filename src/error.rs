//! Error types for the log hub.

use crate::types::{RecordId, StreamId};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Why a sink refused an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SinkError {
    /// Send buffer is full (slow consumer).
    #[error("sink buffer full")]
    Full,

    /// The receiving side went away.
    #[error("sink disconnected")]
    Disconnected,
}

/// Main error type for hub operations.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stream not found: {0}")]
    StreamNotFound(StreamId),

    #[error("Session not found: {0}")]
    SessionNotFound(StreamId),

    #[error("Malformed filter {pattern:?}: {reason}")]
    MalformedFilter { pattern: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unbalanced group: {lines} lines still {depth} deep")]
    UnbalancedGroup { lines: usize, depth: i64 },

    #[error("Out of order append: {got} after {last}")]
    OutOfOrder { last: RecordId, got: RecordId },

    #[error("Backdated append: {got} is earlier than {last}")]
    Backdated {
        last: DateTime<Utc>,
        got: DateTime<Utc>,
    },

    #[error("Delivery failed: {0}")]
    Sink(#[from] SinkError),
}

impl From<serde_json::Error> for StreamError {
    fn from(e: serde_json::Error) -> Self {
        StreamError::Serialization(e.to_string())
    }
}

/// Result type for hub operations.
pub type Result<T> = std::result::Result<T, StreamError>;
