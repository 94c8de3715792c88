//! Record assembler: groups physical lines into logical records.
//!
//! Pretty-printed payloads span many lines:
//!
//! ```text
//! request failed {
//!   "status": 503,
//!   "retry": [1, 2]
//! }
//! ```
//!
//! The assembler keeps a running nesting depth over `{`/`[` and `}`/`]` and
//! only closes a record once the depth returns to zero, so a payload like the
//! one above becomes a single [`LogRecord`].
//!
//! Lines are read with a blocking `read_until`, so a line that arrives in
//! fragments is only seen once the newline (or end of stream) is there.
//! Escape sequences are stripped per line before counting.
//!
//! # Example
//!
//! ```
//! use tailcast::{AssemblerConfig, RecordAssembler};
//!
//! let input: &[u8] = b"{\"a\":1,\n\"b\":2}\nplain line\n";
//! let mut assembler = RecordAssembler::new(input, AssemblerConfig::default());
//!
//! let first = assembler.next_record().unwrap().unwrap();
//! assert_eq!(first.record.message, "{\"a\":1,\n\"b\":2}");
//!
//! let second = assembler.next_record().unwrap().unwrap();
//! assert_eq!(second.record.message, "plain line");
//! assert!(assembler.next_record().unwrap().is_none());
//! ```

mod ansi;

pub use ansi::strip_ansi;

use crate::error::{Result, StreamError};
use crate::types::LogRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::BufRead;

/// Default cap on lines in one unbalanced group.
const DEFAULT_MAX_GROUP_LINES: usize = 1000;

/// Which characters count as nesting delimiters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delimiters {
    /// `{ [` open, `} ]` close.
    #[default]
    CurlyAndSquare,
    /// Only `{` and `}`.
    CurlyOnly,
}

impl Delimiters {
    /// Net depth change contributed by one line.
    fn depth_delta(self, line: &str) -> i64 {
        line.bytes().fold(0i64, |depth, b| match (self, b) {
            (_, b'{') => depth + 1,
            (_, b'}') => depth - 1,
            (Delimiters::CurlyAndSquare, b'[') => depth + 1,
            (Delimiters::CurlyAndSquare, b']') => depth - 1,
            _ => depth,
        })
    }
}

/// Assembler configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    /// Nesting delimiters.
    /// Default: curly and square
    pub delimiters: Delimiters,

    /// Lines after which an unbalanced group is flushed anyway.
    /// Default: 1000
    pub max_group_lines: usize,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            delimiters: Delimiters::default(),
            max_group_lines: DEFAULT_MAX_GROUP_LINES,
        }
    }
}

/// Why a group was flushed before it balanced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TruncationReason {
    /// The input ended mid-group.
    EndOfStream,
    /// The group hit `max_group_lines`.
    LineLimit,
}

/// How an emitted group was closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupOutcome {
    /// Depth returned to zero.
    Balanced,
    /// Flushed while still nested.
    Truncated {
        reason: TruncationReason,
        depth: i64,
    },
}

/// A record together with how its group was closed.
#[derive(Clone, Debug)]
pub struct Assembled {
    pub record: LogRecord,
    pub outcome: GroupOutcome,
    /// Physical lines in the group.
    pub lines: usize,
}

impl Assembled {
    pub fn is_truncated(&self) -> bool {
        matches!(self.outcome, GroupOutcome::Truncated { .. })
    }

    /// The truncation as an error value, for reporting.
    pub fn unbalanced(&self) -> Option<StreamError> {
        match self.outcome {
            GroupOutcome::Balanced => None,
            GroupOutcome::Truncated { depth, .. } => Some(StreamError::UnbalancedGroup {
                lines: self.lines,
                depth,
            }),
        }
    }
}

/// Turns a byte stream into grouped [`LogRecord`]s.
pub struct RecordAssembler<R> {
    reader: R,
    config: AssemblerConfig,
    /// Scratch buffer for one physical line.
    buf: Vec<u8>,
    /// Lines of the group being built.
    pending: Vec<String>,
    depth: i64,
    /// Arrival time of the pending group's first line.
    started_at: Option<DateTime<Utc>>,
    /// Timestamp of the last emitted record.
    last_timestamp: Option<DateTime<Utc>>,
    lines_read: u64,
}

impl<R: BufRead> RecordAssembler<R> {
    pub fn new(reader: R, config: AssemblerConfig) -> Self {
        Self {
            reader,
            config,
            buf: Vec::new(),
            pending: Vec::new(),
            depth: 0,
            started_at: None,
            last_timestamp: None,
            lines_read: 0,
        }
    }

    /// Read until the next record is complete.
    ///
    /// Returns `None` once the input is exhausted and nothing is pending.
    pub fn next_record(&mut self) -> Result<Option<Assembled>> {
        loop {
            let Some(line) = self.read_line()? else {
                if self.pending.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(self.finish(GroupOutcome::Truncated {
                    reason: TruncationReason::EndOfStream,
                    depth: self.depth,
                })));
            };

            if self.pending.is_empty() {
                self.started_at = Some(self.arrival_time());
            }

            self.depth += self.config.delimiters.depth_delta(&line);
            self.pending.push(line);

            if self.depth <= 0 {
                return Ok(Some(self.finish(GroupOutcome::Balanced)));
            }

            if self.pending.len() >= self.config.max_group_lines.max(1) {
                return Ok(Some(self.finish(GroupOutcome::Truncated {
                    reason: TruncationReason::LineLimit,
                    depth: self.depth,
                })));
            }
        }
    }

    /// Total physical lines consumed so far.
    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    /// Whether a group is waiting for more lines.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Read one physical line, without its terminator and escape sequences.
    fn read_line(&mut self) -> Result<Option<String>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }

        self.lines_read += 1;
        let raw = String::from_utf8_lossy(&self.buf);
        Ok(Some(strip_ansi(&raw).into_owned()))
    }

    /// Wall clock, never earlier than the previous record.
    fn arrival_time(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match self.last_timestamp {
            Some(last) if last > now => last,
            _ => now,
        }
    }

    fn finish(&mut self, outcome: GroupOutcome) -> Assembled {
        let lines = std::mem::take(&mut self.pending);
        let timestamp = self.started_at.take().unwrap_or_else(|| self.arrival_time());
        self.depth = 0;
        self.last_timestamp = Some(timestamp);

        Assembled {
            record: LogRecord::with_timestamp(lines.join("\n"), timestamp),
            outcome,
            lines: lines.len(),
        }
    }
}

impl<R: BufRead> Iterator for RecordAssembler<R> {
    type Item = Result<Assembled>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
