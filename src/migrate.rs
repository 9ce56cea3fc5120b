//! Schema migrations. Every statement is idempotent, so `activity init` may
//! be run any number of times.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the schema on an already open pool.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // Timestamps are stored as Unix seconds plus the sub-second nanoseconds,
    // which keeps the full instant and covers chrono's whole range. Window
    // filters and ordering compare the `(ts_secs, ts_nanos)` pair.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS log_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL,
            phase TEXT NOT NULL,
            operation TEXT,
            ts_secs INTEGER NOT NULL,
            ts_nanos INTEGER NOT NULL,
            files_processed INTEGER,
            total_files INTEGER,
            current_file TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_log_records_ts ON log_records(ts_secs, ts_nanos, id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_log_records_session_ts ON log_records(session_id, ts_secs, ts_nanos, id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
