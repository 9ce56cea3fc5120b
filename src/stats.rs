//! `activity stats`: windowed statistics from the command line.
//!
//! Prints the same JSON document `GET /stats` returns, so the output can be
//! piped into `jq` or diffed against the HTTP API.

use anyhow::Result;
use chrono::Utc;

use crate::config::Config;
use crate::facade::open_sqlite;

pub async fn run_stats(config: &Config, hours: Option<i64>) -> Result<()> {
    let (facade, pool) = open_sqlite(config).await?;
    let stats = facade.stats(Utc::now(), hours).await;
    pool.close().await;

    println!("{}", serde_json::to_string_pretty(&stats?)?);
    Ok(())
}
