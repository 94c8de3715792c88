//! Session and event types.

use crate::error::Result;
use crate::filter::{FilterParams, RecordFilter};
use crate::types::{LogRecord, RecordId, StreamId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Whether live pushes reach a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Active,
    Paused,
}

/// Server-side state of one viewer: its filter and replay cursor.
#[derive(Clone, Debug)]
pub struct Session {
    stream_id: StreamId,
    params: FilterParams,
    filter: Arc<RecordFilter>,
    cursor: Option<RecordId>,
    status: SessionStatus,
}

impl Session {
    /// Build a session from subscribe parameters.
    pub fn new(stream_id: StreamId, params: &FilterParams) -> Self {
        Self {
            stream_id,
            filter: Arc::new(RecordFilter::from_params(params)),
            cursor: params.cursor(),
            params: params.clone(),
            status: SessionStatus::Active,
        }
    }

    pub fn stream_id(&self) -> &StreamId {
        &self.stream_id
    }

    /// Parameters the session was created from.
    pub fn params(&self) -> &FilterParams {
        &self.params
    }

    pub fn filter(&self) -> &RecordFilter {
        &self.filter
    }

    /// Replay only records after this one.
    pub fn cursor(&self) -> Option<RecordId> {
        self.cursor
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_paused(&self) -> bool {
        self.status == SessionStatus::Paused
    }

    #[inline]
    pub fn matches(&self, record: &LogRecord) -> bool {
        self.filter.matches(record)
    }

    pub(crate) fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
    }
}

/// What an event carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Filtered history; replaces whatever the viewer showed before.
    Replay,
    /// A newly published record.
    Live,
}

/// A batch of records ready for a transport.
///
/// `data` is the JSON array of the records, encoded once and shared by
/// every sink the event is pushed to.
#[derive(Clone, Debug)]
pub struct StreamEvent {
    kind: EventKind,
    records: Arc<[Arc<LogRecord>]>,
    data: Arc<str>,
}

impl StreamEvent {
    /// Encode a batch.
    pub fn encode(kind: EventKind, records: Vec<Arc<LogRecord>>) -> Result<Self> {
        let data = serde_json::to_string(&records)?;
        Ok(Self {
            kind,
            records: records.into(),
            data: data.into(),
        })
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn is_replay(&self) -> bool {
        self.kind == EventKind::Replay
    }

    pub fn records(&self) -> &[Arc<LogRecord>] {
        &self.records
    }

    /// JSON array payload, as written to the wire.
    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_from_params() {
        let params = FilterParams::new()
            .with_query("db")
            .with_after_record(RecordId(9));
        let session = Session::new(StreamId::new("s"), &params);

        assert_eq!(session.cursor(), Some(RecordId(9)));
        assert_eq!(session.status(), SessionStatus::Active);
        assert_eq!(session.params(), &params);
        assert!(session.matches(&LogRecord::new("DB ready")));
        assert!(!session.matches(&LogRecord::new("cache ready")));
    }

    #[test]
    fn test_event_encodes_json_array() {
        let record = Arc::new(LogRecord::new("hello"));
        let event = StreamEvent::encode(EventKind::Live, vec![Arc::clone(&record)]).unwrap();

        assert_eq!(event.len(), 1);
        assert!(!event.is_replay());

        let decoded: Vec<LogRecord> = serde_json::from_str(event.data()).unwrap();
        assert_eq!(decoded, vec![(*record).clone()]);
    }

    #[test]
    fn test_empty_replay_encodes_empty_array() {
        let event = StreamEvent::encode(EventKind::Replay, Vec::new()).unwrap();
        assert!(event.is_empty());
        assert_eq!(event.data(), "[]");
    }
}
