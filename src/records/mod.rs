//! In-memory record history.
//!
//! Records are kept in arrival order for the lifetime of the process. The
//! store is the base for replays and for the time histogram.

mod histogram;
mod store;

pub use histogram::{bucket_width, HistogramBucket};
pub use store::LogStore;
