//! Record counts over time.
//!
//! Bucket width adapts to how much time the records span, so a short burst
//! and an hour of output both produce a readable number of bars.

use crate::types::LogRecord;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Count of records starting at `start`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramBucket {
    #[serde(rename = "startTime")]
    pub start: DateTime<Utc>,
    pub count: usize,
}

/// Bucket width for records spanning `span`.
pub fn bucket_width(span: Duration) -> Duration {
    if span > Duration::minutes(15) {
        Duration::seconds(60)
    } else if span > Duration::minutes(5) {
        Duration::seconds(30)
    } else if span > Duration::seconds(60) {
        Duration::seconds(10)
    } else {
        Duration::seconds(2)
    }
}

/// Bucket ordered records. A bucket starts at its first record's timestamp.
pub(crate) fn build(records: &[Arc<LogRecord>]) -> Vec<HistogramBucket> {
    let (Some(first), Some(last)) = (records.first(), records.last()) else {
        return Vec::new();
    };

    let width = bucket_width(last.timestamp - first.timestamp);
    let mut buckets: Vec<HistogramBucket> = Vec::new();

    for record in records {
        match buckets.last_mut() {
            Some(bucket) if record.timestamp - bucket.start < width => bucket.count += 1,
            _ => buckets.push(HistogramBucket {
                start: record.timestamp,
                count: 1,
            }),
        }
    }

    buckets
}
