//! Storage abstraction for Agent Activity.
//!
//! The [`LogStore`] trait is the single seam between the aggregation engine
//! and whatever persists operation records. The log is append-only: records
//! are never edited or deleted once accepted.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//!
//! # Read semantics
//!
//! - [`query`](LogStore::query) observes a consistent snapshot as of the
//!   moment the returned stream first executes. Records appended afterwards
//!   may or may not appear, but a record observed by an earlier query is
//!   never missing from a later one.
//! - The stream is finite and ordered by timestamp ascending, ties broken by
//!   record id. Calling `query` again with the same arguments restarts the
//!   scan.
//! - Dropping the stream aborts the scan. Nothing is published by a
//!   partially consumed stream.

pub mod memory;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::models::{LogRecord, NewLogRecord, TimeWindow};

/// Lazily produced records for one query.
pub type RecordStream<'a> = BoxStream<'a, Result<LogRecord>>;

/// Abstract append-only log backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`append`](LogStore::append) | Validate and persist one record |
/// | [`query`](LogStore::query) | Stream records in a window, optionally for one session |
/// | [`count`](LogStore::count) | Lifetime number of stored records |
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Validate and store a record, returning it with its assigned id.
    ///
    /// Fails with [`InvalidRecord`](crate::ActivityError::InvalidRecord)
    /// before touching storage when the shape check fails.
    async fn append(&self, record: NewLogRecord) -> Result<LogRecord>;

    /// Stream records with `timestamp` in `window`, optionally restricted to
    /// one session.
    fn query<'a>(&'a self, window: TimeWindow, session_id: Option<&'a str>) -> RecordStream<'a>;

    /// Lifetime number of records in the store.
    async fn count(&self) -> Result<u64>;
}
