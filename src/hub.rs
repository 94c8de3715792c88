//! LogHub: the broadcast point for live viewers.
//!
//! `LogHub` ties the store and the session registry together:
//!
//! - `publish` appends a record and pushes it to every matching live session
//! - `replay` sends a session its filtered history and makes it live
//! - Slow or vanished viewers are dropped without affecting the others
//!
//! # Delivery guarantee
//!
//! Publish holds the ordering gate exclusively across append and fan-out.
//! Replay holds it shared only while it takes its snapshot and starts
//! queueing the session's live events. Encoding and pushing the batch happen
//! after the gate is released; live events published meanwhile are flushed
//! right behind the batch. A record is therefore either in a session's replay
//! batch or pushed to it live, exactly once, and the replay batch arrives
//! before any live event.
//!
//! # Usage
//!
//! ```
//! use tailcast::{FilterParams, LogHub, LogRecord, StreamId};
//!
//! let hub = LogHub::new();
//! let id = StreamId::new("viewer");
//!
//! let handle = hub.connect(id.clone());
//! hub.subscribe(id.clone(), &FilterParams::new().with_query("error"));
//! assert!(hub.replay(&id).unwrap().is_empty());
//!
//! hub.publish(LogRecord::new("INFO starting")).unwrap();
//! hub.publish(LogRecord::new("ERROR disk full")).unwrap();
//!
//! let events = handle.drain();
//! assert_eq!(events.len(), 2); // empty replay, then one live record
//! assert_eq!(events[1].records()[0].message, "ERROR disk full");
//! ```

use std::io::BufRead;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::assembler::{AssemblerConfig, RecordAssembler};
use crate::error::{Result, SinkError, StreamError};
use crate::filter::{FilterParams, RecordFilter};
use crate::records::{HistogramBucket, LogStore};
use crate::sessions::{
    ChannelSink, EventKind, Session, SessionRegistry, Sink, StreamEvent, StreamHandle,
};
use crate::types::{LogRecord, StreamId};

/// Default per-viewer buffer
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Hub configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Max undelivered events per viewer before it is dropped.
    /// Default: 1024
    pub channel_capacity: usize,

    /// How `ingest` groups lines.
    pub assembler: AssemblerConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            assembler: AssemblerConfig::default(),
        }
    }
}

/// What one `ingest` run did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Records published
    pub records: u64,
    /// Records the store refused
    pub rejected: u64,
    /// Records flushed before their group balanced
    pub truncated: u64,
    /// Physical lines read
    pub lines: u64,
}

/// The distribution engine
pub struct LogHub {
    config: HubConfig,
    store: LogStore,
    sessions: SessionRegistry,
    /// Orders publish against replay
    gate: RwLock<()>,
    /// Total records published
    published: AtomicU64,
    /// Total live pushes that reached a sink
    delivered: AtomicU64,
    /// Streams dropped because their sink failed
    dropped_streams: AtomicU64,
}

impl LogHub {
    /// Create a hub with default configuration
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    pub fn with_config(config: HubConfig) -> Self {
        Self {
            config,
            store: LogStore::new(),
            sessions: SessionRegistry::new(),
            gate: RwLock::new(()),
            published: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dropped_streams: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn store(&self) -> &LogStore {
        &self.store
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    // --- Connections ---

    /// Register a transport sink for a stream
    pub fn attach(&self, stream_id: StreamId, sink: Arc<dyn Sink>) {
        self.sessions.attach(stream_id, sink);
    }

    /// Attach a bounded channel sink and return its receiving end
    pub fn connect(&self, stream_id: StreamId) -> StreamHandle {
        let (sink, handle) = ChannelSink::bounded(self.config.channel_capacity);
        self.attach(stream_id, Arc::new(sink));
        handle
    }

    /// Connect, subscribe, and replay in one go
    ///
    /// This is the usual sequence for a viewer that just opened its stream.
    pub fn join(
        &self,
        stream_id: StreamId,
        params: &FilterParams,
    ) -> Result<(StreamHandle, Vec<Arc<LogRecord>>)> {
        let handle = self.connect(stream_id.clone());
        self.subscribe(stream_id.clone(), params);
        let replayed = self.replay(&stream_id)?;
        Ok((handle, replayed))
    }

    /// Create the session for a stream
    ///
    /// The caller must follow up with `replay`; until then the session gets
    /// no live pushes.
    pub fn subscribe(&self, stream_id: StreamId, params: &FilterParams) -> Session {
        self.sessions.subscribe(stream_id, params)
    }

    /// Remove a stream. Safe to call at any time, any number of times.
    pub fn unsubscribe(&self, stream_id: &StreamId) {
        self.sessions.unsubscribe(stream_id);
    }

    pub fn pause(&self, stream_id: &StreamId) -> Result<()> {
        self.sessions.pause(stream_id)
    }

    pub fn resume(&self, stream_id: &StreamId) -> Result<()> {
        self.sessions.resume(stream_id)
    }

    // --- Delivery ---

    /// Append a record and push it to every matching live session
    ///
    /// Returns the number of sessions it was delivered or queued to. Sessions
    /// mid-replay get it right after their replay batch.
    pub fn publish(&self, record: LogRecord) -> Result<usize> {
        let _gate = self.gate.write();

        let record = self.store.append(record)?;
        self.published.fetch_add(1, Ordering::Relaxed);

        // Fast path: nobody to tell
        if self.sessions.session_count() == 0 {
            return Ok(0);
        }

        let event = StreamEvent::encode(EventKind::Live, vec![Arc::clone(&record)])?;
        let fan_out = self.sessions.fan_out(&record, &event);

        for (stream_id, reason) in &fan_out.failed {
            self.drop_stream(stream_id, *reason);
        }

        if fan_out.delivered > 0 {
            self.delivered
                .fetch_add(fan_out.delivered as u64, Ordering::Relaxed);
            trace!(id = %record.id, sent = fan_out.delivered, "published record");
        }

        Ok(fan_out.delivered + fan_out.queued)
    }

    /// Send a session its filtered history, then start live delivery
    ///
    /// The whole batch goes out as one `Replay` event and is also returned.
    /// Publishing is held up only for the snapshot, not for encoding.
    pub fn replay(&self, stream_id: &StreamId) -> Result<Vec<Arc<LogRecord>>> {
        let (ticket, records) = {
            let _gate = self.gate.read();
            let ticket = self.sessions.begin_replay(stream_id)?;
            let session = ticket.session();
            let records = self
                .store
                .snapshot_filtered_by(session.filter(), session.cursor());
            (ticket, records)
        };

        let event = match StreamEvent::encode(EventKind::Replay, records.clone()) {
            Ok(event) => event,
            Err(e) => {
                self.sessions.abort_replay(&ticket);
                return Err(e);
            }
        };

        let flushed = match self.sessions.finish_replay(&ticket, &event) {
            Ok(flushed) => flushed,
            Err(StreamError::Sink(reason)) => {
                self.drop_stream(stream_id, reason);
                return Err(reason.into());
            }
            Err(e) => return Err(e),
        };
        self.delivered.fetch_add(flushed as u64, Ordering::Relaxed);

        debug!(
            stream_id = %stream_id,
            count = records.len(),
            flushed,
            cursor = ?ticket.session().cursor(),
            "replayed history"
        );

        Ok(records)
    }

    /// Forget all history. Sessions stay subscribed with their filters.
    pub fn clear(&self) {
        let _gate = self.gate.write();
        let removed = self.store.clear();
        info!(removed, "cleared history");
    }

    /// Time histogram of stored records matching `params`
    pub fn histogram(&self, params: &FilterParams) -> Vec<HistogramBucket> {
        self.store.histogram(&RecordFilter::from_params(params))
    }

    fn drop_stream(&self, stream_id: &StreamId, reason: SinkError) {
        self.sessions.unsubscribe(stream_id);
        self.dropped_streams.fetch_add(1, Ordering::Relaxed);
        warn!(stream_id = %stream_id, reason = %reason, "dropping stream");
    }

    // --- Ingest ---

    /// Assemble records from `reader` and publish them until it is exhausted
    ///
    /// Truncated groups are published and reported; a failed publish is
    /// logged and skipped. Only a read error ends ingest early.
    pub fn ingest<R: BufRead>(&self, reader: R) -> Result<IngestSummary> {
        let mut assembler = RecordAssembler::new(reader, self.config.assembler.clone());
        let mut summary = IngestSummary::default();

        info!("ingest started");

        while let Some(assembled) = assembler.next_record()? {
            if let Some(e) = assembled.unbalanced() {
                warn!(error = %e, "flushing unbalanced group");
                summary.truncated += 1;
            }

            match self.publish(assembled.record) {
                Ok(_) => summary.records += 1,
                Err(e) => {
                    warn!(error = %e, "failed to publish record");
                    summary.rejected += 1;
                }
            }
        }

        summary.lines = assembler.lines_read();
        info!(
            records = summary.records,
            truncated = summary.truncated,
            rejected = summary.rejected,
            lines = summary.lines,
            "ingest finished"
        );

        Ok(summary)
    }

    /// Run `ingest` on its own thread
    pub fn spawn_ingest<R>(self: &Arc<Self>, reader: R) -> Result<JoinHandle<Result<IngestSummary>>>
    where
        R: BufRead + Send + 'static,
    {
        let hub = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name("tailcast-ingest".to_string())
            .spawn(move || hub.ingest(reader))?;
        Ok(handle)
    }

    // --- Stats ---

    /// Get hub statistics
    pub fn stats(&self) -> HubStats {
        HubStats {
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped_streams: self.dropped_streams.load(Ordering::Relaxed),
            stored_records: self.store.len(),
            sessions: self.sessions.session_count(),
            streams: self.sessions.stream_count(),
        }
    }
}

impl Default for LogHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about the hub
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubStats {
    /// Total records published
    pub published: u64,
    /// Total live pushes delivered
    pub delivered: u64,
    /// Streams dropped for a failing sink
    pub dropped_streams: u64,
    /// Records currently stored
    pub stored_records: usize,
    /// Current number of sessions
    pub sessions: usize,
    /// Current number of attached streams
    pub streams: usize,
}
