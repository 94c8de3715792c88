//! Session registry: which viewers are connected and what they want.

use crate::error::{Result, SinkError, StreamError};
use crate::filter::FilterParams;
use crate::types::{LogRecord, StreamId};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

use super::sink::Sink;
use super::types::{Session, SessionStatus, StreamEvent};

/// Where a session is in the replay-then-live sequence.
#[derive(Debug)]
enum Delivery {
    /// Subscribed but not yet replayed. Live pushes are skipped; the replay
    /// snapshot will contain them.
    Pending,
    /// Snapshot taken, batch not yet pushed. Live events queue here.
    Replaying(Vec<StreamEvent>),
    /// Receives live pushes directly.
    Live,
    /// Unsubscribed or replaced.
    Closed,
}

/// Internal session state.
struct SessionEntry {
    session: Session,
    delivery: Arc<Mutex<Delivery>>,
}

#[derive(Default)]
struct RegistryInner {
    sinks: HashMap<StreamId, Arc<dyn Sink>>,
    sessions: HashMap<StreamId, SessionEntry>,
}

/// Result of pushing one live event to every interested session.
#[derive(Debug, Default)]
pub(crate) struct FanOut {
    pub delivered: usize,
    /// Sessions mid-replay that will get the event once their batch is out.
    pub queued: usize,
    pub failed: Vec<(StreamId, SinkError)>,
}

/// A replay in progress, returned by `begin_replay`.
pub(crate) struct ReplayTicket {
    session: Session,
    sink: Arc<dyn Sink>,
    delivery: Arc<Mutex<Delivery>>,
}

impl ReplayTicket {
    pub fn session(&self) -> &Session {
        &self.session
    }
}

/// Concurrent map of stream IDs to sinks and sessions.
///
/// Both maps sit behind one lock, so fan-out never sees a session whose sink
/// is half-registered, and removal during a fan-out simply waits for it.
#[derive(Default)]
pub struct SessionRegistry {
    inner: RwLock<RegistryInner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the transport sink for a stream. Returns the sink it replaced.
    pub fn attach(&self, stream_id: StreamId, sink: Arc<dyn Sink>) -> Option<Arc<dyn Sink>> {
        debug!(stream_id = %stream_id, "stream attached");
        self.inner.write().sinks.insert(stream_id, sink)
    }

    /// Create (or replace) the session for a stream.
    ///
    /// The new session receives no live pushes until it has been replayed.
    pub fn subscribe(&self, stream_id: StreamId, params: &FilterParams) -> Session {
        let session = Session::new(stream_id.clone(), params);

        let replaced = self.inner.write().sessions.insert(
            stream_id.clone(),
            SessionEntry {
                session: session.clone(),
                delivery: Arc::new(Mutex::new(Delivery::Pending)),
            },
        );
        if let Some(old) = &replaced {
            *old.delivery.lock() = Delivery::Closed;
        }

        debug!(
            stream_id = %stream_id,
            query = %params.query,
            regex = params.use_regex,
            cursor = ?session.cursor(),
            replaced = replaced.is_some(),
            "session subscribed"
        );

        session
    }

    /// Remove a stream's session and sink. Removing an unknown stream is a no-op.
    ///
    /// Returns whether anything was removed.
    pub fn unsubscribe(&self, stream_id: &StreamId) -> bool {
        let mut inner = self.inner.write();
        let session = inner.sessions.remove(stream_id);
        let had_sink = inner.sinks.remove(stream_id).is_some();
        drop(inner);

        let had_session = match session {
            Some(entry) => {
                *entry.delivery.lock() = Delivery::Closed;
                true
            }
            None => false,
        };

        if had_session || had_sink {
            debug!(stream_id = %stream_id, "session unsubscribed");
        }
        had_session || had_sink
    }

    /// Stop live pushes to a session without forgetting it.
    pub fn pause(&self, stream_id: &StreamId) -> Result<()> {
        self.set_status(stream_id, SessionStatus::Paused)
    }

    /// Resume live pushes. Records published while paused are not sent.
    pub fn resume(&self, stream_id: &StreamId) -> Result<()> {
        self.set_status(stream_id, SessionStatus::Active)
    }

    fn set_status(&self, stream_id: &StreamId, status: SessionStatus) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.sinks.contains_key(stream_id) {
            return Err(StreamError::StreamNotFound(stream_id.clone()));
        }
        let entry = inner
            .sessions
            .get_mut(stream_id)
            .ok_or_else(|| StreamError::SessionNotFound(stream_id.clone()))?;
        entry.session.set_status(status);

        debug!(stream_id = %stream_id, ?status, "session status changed");
        Ok(())
    }

    /// Current state of a stream's session.
    pub fn session(&self, stream_id: &StreamId) -> Option<Session> {
        self.inner
            .read()
            .sessions
            .get(stream_id)
            .map(|e| e.session.clone())
    }

    /// Check if a transport sink is attached for this stream.
    pub fn has_stream(&self, stream_id: &StreamId) -> bool {
        self.inner.read().sinks.contains_key(stream_id)
    }

    /// Check if the session has been replayed and now receives live pushes.
    pub fn is_caught_up(&self, stream_id: &StreamId) -> bool {
        self.inner
            .read()
            .sessions
            .get(stream_id)
            .is_some_and(|e| matches!(*e.delivery.lock(), Delivery::Live))
    }

    pub fn session_count(&self) -> usize {
        self.inner.read().sessions.len()
    }

    pub fn stream_count(&self) -> usize {
        self.inner.read().sinks.len()
    }

    /// IDs of all attached streams.
    pub fn stream_ids(&self) -> Vec<StreamId> {
        self.inner.read().sinks.keys().cloned().collect()
    }

    // --- Hub Helpers ---

    /// Look up the session and sink for a replay and start queueing its live
    /// events. Must be called under the hub gate, before the snapshot.
    pub(crate) fn begin_replay(&self, stream_id: &StreamId) -> Result<ReplayTicket> {
        let inner = self.inner.read();
        let sink = inner
            .sinks
            .get(stream_id)
            .cloned()
            .ok_or_else(|| StreamError::StreamNotFound(stream_id.clone()))?;
        let entry = inner
            .sessions
            .get(stream_id)
            .ok_or_else(|| StreamError::SessionNotFound(stream_id.clone()))?;
        *entry.delivery.lock() = Delivery::Replaying(Vec::new());

        Ok(ReplayTicket {
            session: entry.session.clone(),
            sink,
            delivery: Arc::clone(&entry.delivery),
        })
    }

    /// Push the replay batch, then everything queued behind it, and go live.
    ///
    /// Runs without the hub gate or the registry lock. Returns how many
    /// queued live events were flushed.
    pub(crate) fn finish_replay(&self, ticket: &ReplayTicket, event: &StreamEvent) -> Result<usize> {
        let stream_id = ticket.session.stream_id();
        if !self.is_replaying(ticket) {
            return Err(StreamError::SessionNotFound(stream_id.clone()));
        }
        ticket.sink.push(event)?;

        let mut flushed = 0;
        loop {
            let batch = {
                let mut delivery = ticket.delivery.lock();
                let Delivery::Replaying(queued) = &mut *delivery else {
                    return Err(StreamError::SessionNotFound(stream_id.clone()));
                };
                if queued.is_empty() {
                    *delivery = Delivery::Live;
                    return Ok(flushed);
                }
                std::mem::take(queued)
            };

            // Fan-out only queues while we are replaying, so order holds
            for queued in &batch {
                ticket.sink.push(queued)?;
                flushed += 1;
            }
            trace!(stream_id = %stream_id, count = batch.len(), "flushed queued events");
        }
    }

    /// Give up on a replay that could not be encoded. The session goes back
    /// to waiting for a replay; queued events are still in the store.
    pub(crate) fn abort_replay(&self, ticket: &ReplayTicket) {
        let mut delivery = ticket.delivery.lock();
        if matches!(*delivery, Delivery::Replaying(_)) {
            *delivery = Delivery::Pending;
        }
    }

    fn is_replaying(&self, ticket: &ReplayTicket) -> bool {
        matches!(*ticket.delivery.lock(), Delivery::Replaying(_))
    }

    /// Push a live event to every active session matching `record`.
    ///
    /// Sessions mid-replay get the event queued instead; sessions not yet
    /// replayed are skipped.
    pub(crate) fn fan_out(&self, record: &LogRecord, event: &StreamEvent) -> FanOut {
        let inner = self.inner.read();
        let mut result = FanOut::default();

        for (stream_id, entry) in inner.sessions.iter() {
            if entry.session.is_paused() || !entry.session.matches(record) {
                continue;
            }
            let Some(sink) = inner.sinks.get(stream_id) else {
                continue;
            };

            let mut delivery = entry.delivery.lock();
            match &mut *delivery {
                Delivery::Live => match sink.push(event) {
                    Ok(()) => {
                        trace!(stream_id = %stream_id, id = %record.id, "record pushed");
                        result.delivered += 1;
                    }
                    Err(e) => result.failed.push((stream_id.clone(), e)),
                },
                Delivery::Replaying(queued) => {
                    queued.push(event.clone());
                    result.queued += 1;
                }
                Delivery::Pending | Delivery::Closed => {}
            }
        }

        result
    }
}
