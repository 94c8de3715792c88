//! Record filters for viewer sessions
//!
//! `FilterParams` is what a viewer sends when it subscribes. `RecordFilter` is
//! the compiled form that the hub evaluates against every record.
//!
//! # Filter Logic
//!
//! - All clauses are optional (absent = match all)
//! - Clauses are AND'd
//! - Query: substring by default, regex when `use_regex` is set
//! - Case-insensitive unless `case_sensitive` is set (applies to regex too)
//! - `after` is exclusive, `before` is inclusive
//!
//! # Example
//!
//! ```
//! use tailcast::{FilterParams, LogRecord, RecordFilter};
//!
//! let filter = RecordFilter::from_params(&FilterParams::new().with_query("error"));
//! assert!(filter.matches(&LogRecord::new("ERROR disk full")));
//! assert!(!filter.matches(&LogRecord::new("INFO starting")));
//! ```

use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, StreamError};
use crate::types::{LogRecord, RecordId};

/// Filter parameters supplied by a viewer on subscribe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterParams {
    /// Text to look for (empty = match all)
    #[serde(alias = "filter")]
    pub query: String,
    /// Match case exactly
    pub case_sensitive: bool,
    /// Treat `query` as a regular expression
    #[serde(alias = "regex")]
    pub use_regex: bool,
    /// Only records strictly after this time
    pub after: Option<DateTime<Utc>>,
    /// Only records at or before this time
    pub before: Option<DateTime<Utc>>,
    /// Only replay records after this record
    pub after_record_id: Option<String>,
}

impl FilterParams {
    /// Parameters that match everything
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn with_regex(mut self, use_regex: bool) -> Self {
        self.use_regex = use_regex;
        self
    }

    pub fn with_after(mut self, after: DateTime<Utc>) -> Self {
        self.after = Some(after);
        self
    }

    pub fn with_before(mut self, before: DateTime<Utc>) -> Self {
        self.before = Some(before);
        self
    }

    pub fn with_after_record(mut self, id: RecordId) -> Self {
        self.after_record_id = Some(id.to_string());
        self
    }

    /// Parse the replay cursor. An unparsable ID is treated as absent.
    pub fn cursor(&self) -> Option<RecordId> {
        self.after_record_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .and_then(|s| s.parse().ok())
    }
}

/// How the text query is evaluated
#[derive(Debug, Clone)]
enum QueryMatcher {
    Any,
    Substring { needle: String, case_sensitive: bool },
    Pattern(Regex),
}

impl QueryMatcher {
    fn matches(&self, message: &str) -> bool {
        match self {
            QueryMatcher::Any => true,
            QueryMatcher::Substring {
                needle,
                case_sensitive: true,
            } => message.contains(needle.as_str()),
            // needle is stored lowercased
            QueryMatcher::Substring { needle, .. } => {
                message.to_lowercase().contains(needle.as_str())
            }
            QueryMatcher::Pattern(re) => re.is_match(message),
        }
    }
}

/// Compiled record predicate
#[derive(Debug, Clone)]
pub struct RecordFilter {
    query: QueryMatcher,
    after: Option<DateTime<Utc>>,
    before: Option<DateTime<Utc>>,
}

impl Default for RecordFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordFilter {
    /// A filter that matches every record
    pub fn new() -> Self {
        Self {
            query: QueryMatcher::Any,
            after: None,
            before: None,
        }
    }

    /// Compile parameters, failing on a malformed regex
    pub fn try_from_params(params: &FilterParams) -> Result<Self> {
        let query = if params.query.is_empty() {
            QueryMatcher::Any
        } else if params.use_regex {
            let re = RegexBuilder::new(&params.query)
                .case_insensitive(!params.case_sensitive)
                .build()
                .map_err(|e| StreamError::MalformedFilter {
                    pattern: params.query.clone(),
                    reason: e.to_string(),
                })?;
            QueryMatcher::Pattern(re)
        } else if params.case_sensitive {
            QueryMatcher::Substring {
                needle: params.query.clone(),
                case_sensitive: true,
            }
        } else {
            QueryMatcher::Substring {
                needle: params.query.to_lowercase(),
                case_sensitive: false,
            }
        };

        Ok(Self {
            query,
            after: params.after,
            before: params.before,
        })
    }

    /// Compile parameters. A malformed regex degrades to matching every message.
    pub fn from_params(params: &FilterParams) -> Self {
        match Self::try_from_params(params) {
            Ok(filter) => filter,
            Err(e) => {
                warn!(error = %e, "invalid query, matching all messages");
                Self {
                    query: QueryMatcher::Any,
                    after: params.after,
                    before: params.before,
                }
            }
        }
    }

    /// Check if filter is empty (matches everything)
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self.query, QueryMatcher::Any) && self.after.is_none() && self.before.is_none()
    }

    /// Check if a record matches this filter
    #[inline]
    pub fn matches(&self, record: &LogRecord) -> bool {
        if self.is_empty() {
            return true;
        }

        if let Some(after) = self.after {
            if record.timestamp <= after {
                return false;
            }
        }

        if let Some(before) = self.before {
            if record.timestamp > before {
                return false;
            }
        }

        self.query.matches(&record.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    // --- Query ---

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = RecordFilter::from_params(&FilterParams::new());
        assert!(filter.is_empty());
        assert!(filter.matches(&LogRecord::new("anything")));
        assert!(filter.matches(&LogRecord::new("")));
    }

    #[test]
    fn test_substring_case_insensitive_by_default() {
        let filter = RecordFilter::from_params(&FilterParams::new().with_query("Error"));
        assert!(filter.matches(&LogRecord::new("ERROR disk full")));
        assert!(filter.matches(&LogRecord::new("an error occurred")));
        assert!(!filter.matches(&LogRecord::new("INFO starting")));
    }

    #[test]
    fn test_substring_case_sensitive() {
        let params = FilterParams::new()
            .with_query("ERROR")
            .with_case_sensitive(true);
        let filter = RecordFilter::from_params(&params);
        assert!(filter.matches(&LogRecord::new("ERROR disk full")));
        assert!(!filter.matches(&LogRecord::new("error disk full")));
    }

    #[test]
    fn test_regex_query() {
        let params = FilterParams::new().with_query(r"^req-\d+ ").with_regex(true);
        let filter = RecordFilter::from_params(&params);
        assert!(filter.matches(&LogRecord::new("req-42 done")));
        assert!(filter.matches(&LogRecord::new("REQ-7 done")));
        assert!(!filter.matches(&LogRecord::new("a req-42 done")));
    }

    #[test]
    fn test_regex_respects_case_sensitivity() {
        let params = FilterParams::new()
            .with_query("warn")
            .with_regex(true)
            .with_case_sensitive(true);
        let filter = RecordFilter::from_params(&params);
        assert!(filter.matches(&LogRecord::new("warn: low disk")));
        assert!(!filter.matches(&LogRecord::new("WARN: low disk")));
    }

    #[test]
    fn test_regex_metacharacters_are_literal_without_regex_flag() {
        let filter = RecordFilter::from_params(&FilterParams::new().with_query("a.c"));
        assert!(filter.matches(&LogRecord::new("xa.cx")));
        assert!(!filter.matches(&LogRecord::new("abc")));
    }

    #[test]
    fn test_malformed_regex_matches_everything() {
        let params = FilterParams::new().with_query("(unclosed").with_regex(true);

        let err = RecordFilter::try_from_params(&params).unwrap_err();
        assert!(matches!(err, StreamError::MalformedFilter { .. }));

        let filter = RecordFilter::from_params(&params);
        assert!(filter.matches(&LogRecord::new("anything at all")));
    }

    #[test]
    fn test_malformed_regex_keeps_time_bounds() {
        let params = FilterParams::new()
            .with_query("[")
            .with_regex(true)
            .with_after(at(10));
        let filter = RecordFilter::from_params(&params);
        assert!(!filter.matches(&LogRecord::with_timestamp("x", at(5))));
        assert!(filter.matches(&LogRecord::with_timestamp("x", at(15))));
    }

    // --- Time bounds ---

    #[test]
    fn test_after_is_exclusive() {
        let filter = RecordFilter::from_params(&FilterParams::new().with_after(at(10)));
        assert!(!filter.matches(&LogRecord::with_timestamp("x", at(9))));
        assert!(!filter.matches(&LogRecord::with_timestamp("x", at(10))));
        assert!(filter.matches(&LogRecord::with_timestamp("x", at(11))));
    }

    #[test]
    fn test_before_is_inclusive() {
        let filter = RecordFilter::from_params(&FilterParams::new().with_before(at(10)));
        assert!(filter.matches(&LogRecord::with_timestamp("x", at(9))));
        assert!(filter.matches(&LogRecord::with_timestamp("x", at(10))));
        assert!(!filter.matches(&LogRecord::with_timestamp("x", at(11))));
    }

    #[test]
    fn test_all_clauses_combined() {
        let params = FilterParams::new()
            .with_query("db")
            .with_after(at(0))
            .with_before(at(0) + Duration::seconds(60));
        let filter = RecordFilter::from_params(&params);

        assert!(filter.matches(&LogRecord::with_timestamp("db connected", at(30))));
        assert!(!filter.matches(&LogRecord::with_timestamp("cache warm", at(30))));
        assert!(!filter.matches(&LogRecord::with_timestamp("db connected", at(90))));
    }

    // --- Params ---

    #[test]
    fn test_cursor_parsing() {
        assert_eq!(FilterParams::new().cursor(), None);
        assert_eq!(
            FilterParams::new().with_after_record(RecordId(12)).cursor(),
            Some(RecordId(12))
        );

        let params = FilterParams {
            after_record_id: Some("garbage".to_string()),
            ..Default::default()
        };
        assert_eq!(params.cursor(), None);
    }

    #[test]
    fn test_params_from_query_json() {
        let params: FilterParams = serde_json::from_str(
            r#"{"filter": "boot", "caseSensitive": true, "regex": false,
                "after": "2024-05-01T10:00:00Z", "afterRecordId": "5"}"#,
        )
        .unwrap();

        assert_eq!(params.query, "boot");
        assert!(params.case_sensitive);
        assert!(!params.use_regex);
        assert!(params.after.is_some());
        assert!(params.before.is_none());
        assert_eq!(params.cursor(), Some(RecordId(5)));
    }
}
