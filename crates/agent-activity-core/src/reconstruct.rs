//! Session reconstruction.
//!
//! Sessions are never stored. Each query folds its record scope into one
//! accumulator per `session_id` and emits a [`Session`] per key:
//!
//! - `start_time` / `end_time` are the min / max timestamps seen. Records of
//!   one session may arrive out of timestamp order, so first / last is not
//!   used.
//! - `files_processed` follows the configured [`ProgressPolicy`].
//! - `phases` lists distinct phases ordered by their earliest record
//!   `(timestamp, id)`, which makes the output independent of arrival order.
//!
//! A session that straddles the scope boundary only reflects its in-scope
//! records.

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::models::{LogRecord, Phase, Session};
use crate::store::RecordStream;

/// How per-record `files_processed` values combine into a session total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProgressPolicy {
    /// Treat `files_processed` as a monotonically increasing counter.
    #[default]
    Max,
    /// Treat `files_processed` as a per-operation increment.
    Sum,
}

struct SessionAccumulator {
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    operation_count: u64,
    files_processed: u64,
    /// Phase with the `(timestamp, id)` of its earliest record.
    phases: Vec<(Phase, DateTime<Utc>, i64)>,
}

impl SessionAccumulator {
    fn new(record: &LogRecord) -> Self {
        Self {
            start_time: record.timestamp,
            end_time: record.timestamp,
            operation_count: 0,
            files_processed: 0,
            phases: Vec::new(),
        }
    }

    fn push(&mut self, record: &LogRecord, policy: ProgressPolicy) {
        self.start_time = self.start_time.min(record.timestamp);
        self.end_time = self.end_time.max(record.timestamp);
        self.operation_count += 1;

        if let Some(files) = record.files_processed {
            self.files_processed = match policy {
                ProgressPolicy::Max => self.files_processed.max(files),
                ProgressPolicy::Sum => self.files_processed.saturating_add(files),
            };
        }

        let key = (record.timestamp, record.id);
        match self.phases.iter_mut().find(|(p, _, _)| *p == record.phase) {
            Some(entry) => {
                if key < (entry.1, entry.2) {
                    entry.1 = key.0;
                    entry.2 = key.1;
                }
            }
            None => self.phases.push((record.phase.clone(), key.0, key.1)),
        }
    }

    fn finish(mut self, session_id: String) -> Session {
        self.phases.sort_by(|a, b| (a.1, a.2).cmp(&(b.1, b.2)));
        Session {
            session_id,
            start_time: self.start_time,
            end_time: self.end_time,
            operation_count: self.operation_count,
            files_processed: self.files_processed,
            phases: self.phases.into_iter().map(|(p, _, _)| p).collect(),
        }
    }
}

/// Incremental fold of records into sessions.
pub struct SessionReconstructor {
    policy: ProgressPolicy,
    sessions: BTreeMap<String, SessionAccumulator>,
}

impl SessionReconstructor {
    pub fn new(policy: ProgressPolicy) -> Self {
        Self {
            policy,
            sessions: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, record: &LogRecord) {
        let policy = self.policy;
        self.sessions
            .entry(record.session_id.clone())
            .or_insert_with(|| SessionAccumulator::new(record))
            .push(record, policy);
    }

    /// Number of distinct sessions folded so far.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Sessions ordered by `session_id`.
    pub fn finish(self) -> Vec<Session> {
        self.sessions
            .into_iter()
            .map(|(id, acc)| acc.finish(id))
            .collect()
    }
}

/// Reconstruct sessions from an in-memory record set.
pub fn reconstruct<'a, I>(records: I, policy: ProgressPolicy) -> Vec<Session>
where
    I: IntoIterator<Item = &'a LogRecord>,
{
    let mut reconstructor = SessionReconstructor::new(policy);
    for record in records {
        reconstructor.push(record);
    }
    reconstructor.finish()
}

/// Reconstruct sessions while draining a store query.
///
/// The first store error aborts the fold and is returned; no partial result
/// escapes.
pub async fn reconstruct_stream(
    mut records: RecordStream<'_>,
    policy: ProgressPolicy,
) -> Result<Vec<Session>> {
    let mut reconstructor = SessionReconstructor::new(policy);
    while let Some(record) = records.try_next().await? {
        reconstructor.push(&record);
    }
    Ok(reconstructor.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewLogRecord;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn rec(id: i64, sid: &str, t: i64, phase: Phase) -> LogRecord {
        NewLogRecord::new(sid, ts(t))
            .phase(phase)
            .into_record(id)
            .unwrap()
    }

    fn rec_files(id: i64, sid: &str, t: i64, files: i64) -> LogRecord {
        NewLogRecord::new(sid, ts(t))
            .progress(files, 100)
            .into_record(id)
            .unwrap()
    }

    #[test]
    fn test_single_session_three_records() {
        let records = vec![
            rec(1, "abc", 0, Phase::DataCollection),
            rec(2, "abc", 5, Phase::DataCollection),
            rec(3, "abc", 10, Phase::Generation),
        ];
        let sessions = reconstruct(&records, ProgressPolicy::Max);
        assert_eq!(sessions.len(), 1);
        let s = &sessions[0];
        assert_eq!(s.session_id, "abc");
        assert_eq!(s.start_time, ts(0));
        assert_eq!(s.end_time, ts(10));
        assert_eq!(s.operation_count, 3);
        assert_eq!(s.files_processed, 0);
        assert_eq!(s.phases, vec![Phase::DataCollection, Phase::Generation]);
    }

    #[test]
    fn test_out_of_order_records_use_min_max() {
        let records = vec![
            rec(1, "s", 50, Phase::Generation),
            rec(2, "s", 10, Phase::Analysis),
            rec(3, "s", 30, Phase::Generation),
        ];
        let s = &reconstruct(&records, ProgressPolicy::Max)[0];
        assert_eq!(s.start_time, ts(10));
        assert_eq!(s.end_time, ts(50));
        assert_eq!(s.phases, vec![Phase::Analysis, Phase::Generation]);
    }

    #[test]
    fn test_repeated_phase_not_duplicated() {
        let records = vec![
            rec(1, "s", 0, Phase::Analysis),
            rec(2, "s", 1, Phase::Generation),
            rec(3, "s", 2, Phase::Analysis),
        ];
        let s = &reconstruct(&records, ProgressPolicy::Max)[0];
        assert_eq!(s.phases, vec![Phase::Analysis, Phase::Generation]);
    }

    #[test]
    fn test_files_processed_policies() {
        let records = vec![
            rec_files(1, "s", 0, 3),
            rec_files(2, "s", 1, 7),
            rec_files(3, "s", 2, 5),
        ];
        assert_eq!(reconstruct(&records, ProgressPolicy::Max)[0].files_processed, 7);
        assert_eq!(reconstruct(&records, ProgressPolicy::Sum)[0].files_processed, 15);
    }

    #[test]
    fn test_counts_match_records_per_session() {
        let records = vec![
            rec(1, "a", 0, Phase::Analysis),
            rec(2, "b", 1, Phase::Analysis),
            rec(3, "a", 2, Phase::Analysis),
            rec(4, "c", 3, Phase::Error),
            rec(5, "a", 4, Phase::Analysis),
        ];
        let sessions = reconstruct(&records, ProgressPolicy::Max);
        for s in &sessions {
            let expected = records.iter().filter(|r| r.session_id == s.session_id).count();
            assert_eq!(s.operation_count as usize, expected);
            assert!(s.start_time <= s.end_time);
            assert!(s.operation_count >= 1);
        }
        assert_eq!(sessions.len(), 3);
    }

    #[test]
    fn test_idempotent_and_order_independent() {
        let records = vec![
            rec(1, "a", 5, Phase::Analysis),
            rec(2, "b", 1, Phase::Generation),
            rec(3, "a", 2, Phase::DataCollection),
            rec(4, "b", 9, Phase::Error),
        ];
        let first = reconstruct(&records, ProgressPolicy::Max);
        let second = reconstruct(&records, ProgressPolicy::Max);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );

        let reversed: Vec<LogRecord> = records.iter().rev().cloned().collect();
        assert_eq!(reconstruct(&reversed, ProgressPolicy::Max), first);
    }

    #[test]
    fn test_empty_scope() {
        let records: Vec<LogRecord> = Vec::new();
        assert!(reconstruct(&records, ProgressPolicy::Max).is_empty());
    }

    #[test]
    fn test_reconstruct_stream_matches_in_memory() {
        use futures::stream::{self, StreamExt};

        let records = vec![
            rec(1, "a", 0, Phase::Analysis),
            rec(2, "a", 3, Phase::Generation),
        ];
        let stream = stream::iter(records.clone().into_iter().map(Ok)).boxed();
        let streamed =
            futures::executor::block_on(reconstruct_stream(stream, ProgressPolicy::Max)).unwrap();
        assert_eq!(streamed, reconstruct(&records, ProgressPolicy::Max));
    }

    #[test]
    fn test_reconstruct_stream_propagates_store_error() {
        use crate::error::ActivityError;
        use futures::stream::{self, StreamExt};

        let items = vec![
            Ok(rec(1, "a", 0, Phase::Analysis)),
            Err(ActivityError::StoreUnavailable("disk".into())),
        ];
        let result = futures::executor::block_on(reconstruct_stream(
            stream::iter(items).boxed(),
            ProgressPolicy::Max,
        ));
        assert!(matches!(result, Err(ActivityError::StoreUnavailable(_))));
    }
}
