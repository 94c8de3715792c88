//! Append-only record store.

use crate::error::{Result, StreamError};
use crate::filter::RecordFilter;
use crate::types::{LogRecord, RecordId};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::histogram::{self, HistogramBucket};

/// Append-only, arrival-ordered record history.
///
/// Single writer, many readers. Readers copy out `Arc`s under a brief read
/// lock, so they never observe a half-written append.
#[derive(Debug, Default)]
pub struct LogStore {
    records: RwLock<Vec<Arc<LogRecord>>>,
    /// Records ever appended, including cleared ones.
    total_appended: AtomicU64,
}

impl LogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record.
    ///
    /// IDs must increase and timestamps must not decrease in stored order. An
    /// append that would break either is rejected.
    pub fn append(&self, record: LogRecord) -> Result<Arc<LogRecord>> {
        let mut records = self.records.write();

        if let Some(last) = records.last() {
            if record.id <= last.id {
                return Err(StreamError::OutOfOrder {
                    last: last.id,
                    got: record.id,
                });
            }
            if record.timestamp < last.timestamp {
                return Err(StreamError::Backdated {
                    last: last.timestamp,
                    got: record.timestamp,
                });
            }
        }

        let record = Arc::new(record);
        records.push(Arc::clone(&record));
        self.total_appended.fetch_add(1, Ordering::Relaxed);

        Ok(record)
    }

    /// Ordered records matching `filter`, optionally only those after `cursor`.
    ///
    /// A cursor that is not in the store (e.g. it was cleared) is ignored and
    /// the whole matching history is returned.
    pub fn snapshot_filtered_by(
        &self,
        filter: &RecordFilter,
        cursor: Option<RecordId>,
    ) -> Vec<Arc<LogRecord>> {
        let records = self.records.read();

        // IDs are strictly increasing, so the cursor can be found by search.
        let start = cursor
            .and_then(|id| records.binary_search_by_key(&id, |r| r.id).ok())
            .map_or(0, |pos| pos + 1);

        records[start..]
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect()
    }

    /// Everything currently stored, oldest first.
    pub fn records(&self) -> Vec<Arc<LogRecord>> {
        self.records.read().clone()
    }

    /// Look up a record by ID.
    pub fn get(&self, id: RecordId) -> Option<Arc<LogRecord>> {
        let records = self.records.read();
        records
            .binary_search_by_key(&id, |r| r.id)
            .ok()
            .map(|pos| Arc::clone(&records[pos]))
    }

    /// ID of the newest record.
    pub fn last_id(&self) -> Option<RecordId> {
        self.records.read().last().map(|r| r.id)
    }

    /// Drop all history. Returns how many records were removed.
    pub fn clear(&self) -> usize {
        std::mem::take(&mut *self.records.write()).len()
    }

    /// Bucketed counts of matching records over time.
    pub fn histogram(&self, filter: &RecordFilter) -> Vec<HistogramBucket> {
        histogram::build(&self.snapshot_filtered_by(filter, None))
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records ever appended (not reset by `clear`).
    pub fn total_appended(&self) -> u64 {
        self.total_appended.load(Ordering::Relaxed)
    }
}
