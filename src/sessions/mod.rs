//! Viewer sessions and the sinks that carry events to them.
//!
//! Each connected viewer has:
//! - A [`Sink`] attached by the transport (where events go)
//! - A [`Session`] created on subscribe (which records it wants)
//!
//! The two are tracked separately so the hub can tell "no connection" apart
//! from "connected but never subscribed".
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tailcast::{ChannelSink, FilterParams, SessionRegistry, StreamId};
//!
//! let registry = SessionRegistry::new();
//! let id = StreamId::new("viewer-1");
//!
//! let (sink, handle) = ChannelSink::bounded(16);
//! registry.attach(id.clone(), Arc::new(sink));
//! let session = registry.subscribe(id.clone(), &FilterParams::new().with_query("error"));
//! assert_eq!(session.stream_id(), &id);
//!
//! registry.unsubscribe(&id);
//! registry.unsubscribe(&id); // no-op
//! assert_eq!(registry.session_count(), 0);
//! # drop(handle);
//! ```

mod registry;
mod sink;
mod types;

pub use registry::SessionRegistry;
pub use sink::{ChannelSink, Sink, StreamHandle};
pub use types::{EventKind, Session, SessionStatus, StreamEvent};
