//! JSON Lines ingestion into the activity log.
//!
//! Each non-blank line is one [`NewLogRecord`]. Lines that are not UTF-8,
//! do not parse or fail the shape check are counted as rejected and logged
//! with their line number; nothing from a rejected line is stored. A store failure aborts
//! the run, leaving every previously accepted line in place.

use anyhow::{Context, Result};
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use agent_activity_core::error::ActivityError;
use agent_activity_core::models::NewLogRecord;
use agent_activity_core::store::LogStore;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteLogStore;

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub accepted: u64,
    pub rejected: u64,
}

/// Append every record read from `reader`.
pub async fn ingest_reader<R, S>(reader: R, store: &S) -> Result<IngestReport>
where
    R: AsyncBufRead + Unpin,
    S: LogStore + ?Sized,
{
    let mut report = IngestReport::default();
    // Split on raw bytes so one badly encoded line cannot end the run.
    let mut lines = reader.split(b'\n');
    let mut line_no: u64 = 0;

    while let Some(raw) = lines.next_segment().await? {
        line_no += 1;
        let line = match std::str::from_utf8(&raw) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(line = line_no, error = %e, "rejected non-UTF-8 record");
                report.rejected += 1;
                continue;
            }
        };
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() {
            continue;
        }

        let record: NewLogRecord = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(line = line_no, error = %e, "rejected unparseable record");
                report.rejected += 1;
                continue;
            }
        };

        match store.append(record).await {
            Ok(_) => report.accepted += 1,
            Err(ActivityError::InvalidRecord(reason)) => {
                tracing::warn!(line = line_no, %reason, "rejected invalid record");
                report.rejected += 1;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("append failed at line {}", line_no));
            }
        }
    }

    Ok(report)
}

/// CLI entry point for `activity ingest <file>`.
pub async fn run_ingest(config: &Config, path: &Path) -> Result<()> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let pool = db::connect(config).await?;
    let store = SqliteLogStore::new(pool.clone());
    let report = ingest_reader(BufReader::new(file), &store).await?;
    pool.close().await;

    println!("ingest {}", path.display());
    println!("  accepted: {}", report.accepted);
    println!("  rejected: {}", report.rejected);
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_activity_core::models::TimeWindow;
    use agent_activity_core::store::memory::InMemoryLogStore;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn test_ingest_counts_accepted_and_rejected() {
        let input = concat!(
            r#"{"session_id":"a","phase":"analysis","operation":"grep: x","timestamp":"2024-05-01T10:00:00Z"}"#,
            "\n",
            "\n",
            r#"{"phase":"analysis","timestamp":"2024-05-01T10:00:01Z"}"#,
            "\n",
            "not json\n",
            r#"{"session_id":"a","timestamp":"2024-05-01T10:00:02Z","files_processed":2}"#,
            "\n",
        );
        let store = InMemoryLogStore::new();
        let report = ingest_reader(input.as_bytes(), &store).await.unwrap();
        assert_eq!(
            report,
            IngestReport {
                accepted: 2,
                rejected: 2
            }
        );

        let stored: Vec<_> = store
            .query(TimeWindow::all(), None)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|r| r.session_id == "a"));
    }

    #[tokio::test]
    async fn test_ingest_skips_non_utf8_line() {
        let mut input: Vec<u8> = Vec::new();
        input.extend_from_slice(
            br#"{"session_id":"a","timestamp":"2024-05-01T10:00:00Z"}"#,
        );
        input.extend_from_slice(b"\n\xff\xfe garbage\n");
        input.extend_from_slice(
            br#"{"session_id":"b","timestamp":"2024-05-01T10:00:01Z"}"#,
        );
        input.extend_from_slice(b"\r\n");

        let store = InMemoryLogStore::new();
        let report = ingest_reader(input.as_slice(), &store).await.unwrap();
        assert_eq!(
            report,
            IngestReport {
                accepted: 2,
                rejected: 1
            }
        );
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_ingest_rejects_negative_progress() {
        let input = r#"{"session_id":"a","timestamp":"2024-05-01T10:00:00Z","files_processed":-1}"#;
        let store = InMemoryLogStore::new();
        let report = ingest_reader(input.as_bytes(), &store).await.unwrap();
        assert_eq!(report.rejected, 1);
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
