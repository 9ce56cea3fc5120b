//! In-memory [`LogStore`] implementation for tests and embedding.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`. A query copies the
//! matching records out under the read lock and then yields them lazily, so
//! no lock is held while the caller consumes the stream.

use std::sync::RwLock;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use crate::error::{ActivityError, Result};
use crate::models::{LogRecord, NewLogRecord, TimeWindow};

use super::{LogStore, RecordStream};

/// In-memory append-only log.
pub struct InMemoryLogStore {
    records: RwLock<Vec<LogRecord>>,
}

impl InMemoryLogStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    fn snapshot(&self, window: TimeWindow, session_id: Option<&str>) -> Result<Vec<LogRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| ActivityError::StoreUnavailable("record lock poisoned".into()))?;
        let mut matching: Vec<LogRecord> = records
            .iter()
            .filter(|r| window.contains(r.timestamp))
            .filter(|r| session_id.map_or(true, |sid| r.session_id == sid))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        Ok(matching)
    }
}

impl Default for InMemoryLogStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LogStore for InMemoryLogStore {
    async fn append(&self, record: NewLogRecord) -> Result<LogRecord> {
        let mut records = self
            .records
            .write()
            .map_err(|_| ActivityError::StoreUnavailable("record lock poisoned".into()))?;
        let stored = record.into_record(records.len() as i64 + 1)?;
        records.push(stored.clone());
        Ok(stored)
    }

    fn query<'a>(&'a self, window: TimeWindow, session_id: Option<&'a str>) -> RecordStream<'a> {
        // Snapshot on first poll, then yield lazily.
        stream::once(async move { self.snapshot(window, session_id) })
            .flat_map(|snapshot| match snapshot {
                Ok(records) => stream::iter(records.into_iter().map(Ok)).boxed(),
                Err(e) => stream::iter(vec![Err(e)]).boxed(),
            })
            .boxed()
    }

    async fn count(&self) -> Result<u64> {
        let records = self
            .records
            .read()
            .map_err(|_| ActivityError::StoreUnavailable("record lock poisoned".into()))?;
        Ok(records.len() as u64)
    }
}
