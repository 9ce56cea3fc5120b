//! SQLite-backed [`LogStore`] implementation.
//!
//! A query is a single `SELECT` streamed row by row with `sqlx::fetch`.
//! SQLite runs each statement against one read snapshot, which gives the
//! snapshot-read semantics the store contract asks for, and dropping the
//! stream finalizes the statement, which aborts the scan.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use agent_activity_core::error::{ActivityError, Result};
use agent_activity_core::models::{LogRecord, NewLogRecord, Phase, TimeWindow};
use agent_activity_core::store::{LogStore, RecordStream};

const SELECT_WINDOW: &str = r#"
    SELECT id, session_id, phase, operation, ts_secs, ts_nanos,
           files_processed, total_files, current_file
    FROM log_records
    WHERE (ts_secs, ts_nanos) >= (?, ?) AND (ts_secs, ts_nanos) < (?, ?)
    ORDER BY ts_secs ASC, ts_nanos ASC, id ASC
"#;

const SELECT_WINDOW_SESSION: &str = r#"
    SELECT id, session_id, phase, operation, ts_secs, ts_nanos,
           files_processed, total_files, current_file
    FROM log_records
    WHERE (ts_secs, ts_nanos) >= (?, ?) AND (ts_secs, ts_nanos) < (?, ?)
      AND session_id = ?
    ORDER BY ts_secs ASC, ts_nanos ASC, id ASC
"#;

// SQLite primary result codes that mean the file itself is damaged.
const SQLITE_CORRUPT: i64 = 11;
const SQLITE_NOTADB: i64 = 26;

/// SQLite implementation of the [`LogStore`] trait over the `log_records`
/// table created by [`crate::migrate`].
pub struct SqliteLogStore {
    pool: SqlitePool,
}

impl SqliteLogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Classify a driver error into the store's error kinds.
pub fn map_sqlx_error(err: sqlx::Error) -> ActivityError {
    match err {
        sqlx::Error::Database(ref db_err) => {
            let primary = db_err
                .code()
                .and_then(|c| c.parse::<i64>().ok())
                .map(|c| c & 0xff);
            match primary {
                Some(SQLITE_CORRUPT) | Some(SQLITE_NOTADB) => {
                    ActivityError::StoreCorrupt(err.to_string())
                }
                _ => ActivityError::StoreUnavailable(err.to_string()),
            }
        }
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::Decode(_)
        | sqlx::Error::TypeNotFound { .. } => ActivityError::StoreCorrupt(err.to_string()),
        other => ActivityError::StoreUnavailable(other.to_string()),
    }
}

/// Split an instant into the `(ts_secs, ts_nanos)` column pair.
fn split_instant(ts: DateTime<Utc>) -> (i64, i64) {
    (ts.timestamp(), i64::from(ts.timestamp_subsec_nanos()))
}

fn decode_record(row: &SqliteRow) -> Result<LogRecord> {
    let id: i64 = row.try_get("id").map_err(map_sqlx_error)?;
    let corrupt = |what: String| ActivityError::StoreCorrupt(format!("record {}: {}", id, what));

    let session_id: String = row.try_get("session_id").map_err(map_sqlx_error)?;
    if session_id.trim().is_empty() {
        return Err(corrupt("blank session_id".into()));
    }
    let phase: String = row.try_get("phase").map_err(map_sqlx_error)?;
    let ts_secs: i64 = row.try_get("ts_secs").map_err(map_sqlx_error)?;
    let ts_nanos: i64 = row.try_get("ts_nanos").map_err(map_sqlx_error)?;
    let timestamp = u32::try_from(ts_nanos)
        .ok()
        .and_then(|nanos| DateTime::from_timestamp(ts_secs, nanos))
        .ok_or_else(|| corrupt(format!("timestamp {}.{:09} out of range", ts_secs, ts_nanos)))?;

    let counter = |name: &str| -> Result<Option<u64>> {
        let value: Option<i64> = row.try_get(name).map_err(map_sqlx_error)?;
        match value {
            Some(v) if v < 0 => Err(corrupt(format!("negative {}", name))),
            Some(v) => Ok(Some(v as u64)),
            None => Ok(None),
        }
    };

    Ok(LogRecord {
        id,
        session_id,
        phase: Phase::parse(&phase),
        operation: row.try_get("operation").map_err(map_sqlx_error)?,
        timestamp,
        files_processed: counter("files_processed")?,
        total_files: counter("total_files")?,
        current_file: row.try_get("current_file").map_err(map_sqlx_error)?,
    })
}

#[async_trait]
impl LogStore for SqliteLogStore {
    async fn append(&self, record: NewLogRecord) -> Result<LogRecord> {
        // Shape check first; a rejected record never reaches the database.
        let mut stored = record.into_record(0)?;
        let (ts_secs, ts_nanos) = split_instant(stored.timestamp);

        let result = sqlx::query(
            r#"
            INSERT INTO log_records (session_id, phase, operation, ts_secs, ts_nanos,
                                     files_processed, total_files, current_file)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&stored.session_id)
        .bind(stored.phase.as_str())
        .bind(&stored.operation)
        .bind(ts_secs)
        .bind(ts_nanos)
        .bind(stored.files_processed.map(|v| v as i64))
        .bind(stored.total_files.map(|v| v as i64))
        .bind(&stored.current_file)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        stored.id = result.last_insert_rowid();
        Ok(stored)
    }

    fn query<'a>(&'a self, window: TimeWindow, session_id: Option<&'a str>) -> RecordStream<'a> {
        let (since_secs, since_nanos) = split_instant(window.since);
        let (until_secs, until_nanos) = split_instant(window.until);
        tracing::debug!(since = %window.since, until = %window.until, session_id, "scanning log_records");

        let rows = match session_id {
            Some(sid) => sqlx::query(SELECT_WINDOW_SESSION)
                .bind(since_secs)
                .bind(since_nanos)
                .bind(until_secs)
                .bind(until_nanos)
                .bind(sid)
                .fetch(&self.pool),
            None => sqlx::query(SELECT_WINDOW)
                .bind(since_secs)
                .bind(since_nanos)
                .bind(until_secs)
                .bind(until_nanos)
                .fetch(&self.pool),
        };

        rows.map(|row| row.map_err(map_sqlx_error).and_then(|r| decode_record(&r)))
            .boxed()
    }

    async fn count(&self) -> Result<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM log_records")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(total as u64)
    }
}
