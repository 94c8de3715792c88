//! # tailcast
//!
//! Streams a process's output to any number of connected viewers, each with
//! its own filter, replaying matching history on connect before switching
//! to live updates.
//!
//! ## Core Concepts
//!
//! - **Assembler**: groups physical lines into records by bracket depth
//! - **Store**: append-only, in-memory record history
//! - **Sessions**: one per viewer, holding its filter and replay cursor
//! - **Hub**: fans records out to sessions and replays history exactly once
//!
//! ## Example
//!
//! ```ignore
//! use tailcast::{FilterParams, LogHub, StreamId};
//! use std::io::BufReader;
//! use std::sync::Arc;
//!
//! let hub = Arc::new(LogHub::new());
//! hub.spawn_ingest(BufReader::new(std::io::stdin()))?;
//!
//! // For each viewer the transport accepts:
//! let (events, history) = hub.join(StreamId::generate(), &FilterParams::new().with_query("error"))?;
//! for event in events.iter() {
//!     write_sse(event.data());
//! }
//! ```

pub mod assembler;
pub mod error;
pub mod filter;
pub mod hub;
pub mod records;
pub mod sessions;
pub mod types;

// Re-exports
pub use assembler::{
    strip_ansi, Assembled, AssemblerConfig, Delimiters, GroupOutcome, RecordAssembler,
    TruncationReason,
};
pub use error::{Result, SinkError, StreamError};
pub use filter::{FilterParams, RecordFilter};
pub use hub::{HubConfig, HubStats, IngestSummary, LogHub};
pub use records::{bucket_width, HistogramBucket, LogStore};
pub use sessions::{
    ChannelSink, EventKind, Session, SessionRegistry, SessionStatus, Sink, StreamEvent,
    StreamHandle,
};
pub use types::{LogRecord, RecordId, StreamId};
