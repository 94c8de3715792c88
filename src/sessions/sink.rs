//! Transport sinks.

use crate::error::SinkError;
use crossbeam_channel::{bounded, Iter, Receiver, RecvError, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

use super::types::StreamEvent;

/// Where the hub pushes events for one viewer.
///
/// Implementations must not block: a slow viewer should report
/// [`SinkError::Full`] rather than stall the producer.
///
/// `push` runs inside a publish, with the hub's ordering gate and the session
/// registry locked. It must not call back into the [`LogHub`](crate::LogHub)
/// or its [`SessionRegistry`](crate::SessionRegistry); doing so deadlocks.
/// Report failure through the returned error and the hub drops the stream.
pub trait Sink: Send + Sync {
    fn push(&self, event: &StreamEvent) -> Result<(), SinkError>;
}

/// Sink backed by a bounded channel. The transport drains the paired
/// [`StreamHandle`].
#[derive(Clone, Debug)]
pub struct ChannelSink {
    sender: Sender<StreamEvent>,
}

impl ChannelSink {
    /// Create a sink holding at most `capacity` undelivered events.
    pub fn bounded(capacity: usize) -> (Self, StreamHandle) {
        let (sender, receiver) = bounded(capacity.max(1));
        (Self { sender }, StreamHandle { receiver })
    }
}

impl Sink for ChannelSink {
    fn push(&self, event: &StreamEvent) -> Result<(), SinkError> {
        match self.sender.try_send(event.clone()) {
            Ok(()) => Ok(()),
            Err(crossbeam_channel::TrySendError::Full(_)) => Err(SinkError::Full),
            Err(crossbeam_channel::TrySendError::Disconnected(_)) => Err(SinkError::Disconnected),
        }
    }
}

/// Receiving end of a [`ChannelSink`].
#[derive(Debug)]
pub struct StreamHandle {
    receiver: Receiver<StreamEvent>,
}

impl StreamHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<StreamEvent, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<StreamEvent, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<StreamEvent, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Blocking iterator that ends once the sink is gone.
    pub fn iter(&self) -> Iter<'_, StreamEvent> {
        self.receiver.iter()
    }

    /// Everything queued right now.
    pub fn drain(&self) -> Vec<StreamEvent> {
        self.receiver.try_iter().collect()
    }

    /// Events waiting to be read.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::types::EventKind;
    use crate::types::LogRecord;
    use std::sync::Arc;

    fn event(message: &str) -> StreamEvent {
        StreamEvent::encode(EventKind::Live, vec![Arc::new(LogRecord::new(message))]).unwrap()
    }

    #[test]
    fn test_push_and_receive() {
        let (sink, handle) = ChannelSink::bounded(4);
        sink.push(&event("a")).unwrap();

        let received = handle.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(received.records()[0].message, "a");
    }

    #[test]
    fn test_full_buffer_reports_full() {
        let (sink, handle) = ChannelSink::bounded(1);
        sink.push(&event("a")).unwrap();
        assert_eq!(sink.push(&event("b")), Err(SinkError::Full));
        assert_eq!(handle.pending(), 1);
    }

    #[test]
    fn test_dropped_handle_reports_disconnected() {
        let (sink, handle) = ChannelSink::bounded(4);
        drop(handle);

        assert_eq!(sink.push(&event("a")), Err(SinkError::Disconnected));
    }

    #[test]
    fn test_drain() {
        let (sink, handle) = ChannelSink::bounded(8);
        sink.push(&event("a")).unwrap();
        sink.push(&event("b")).unwrap();

        let events = handle.drain();
        assert_eq!(events.len(), 2);
        assert!(handle.try_recv().is_err());
    }
}
