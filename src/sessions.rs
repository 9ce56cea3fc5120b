//! `activity sessions`: paginated session listing from the command line.
//!
//! Prints the same JSON document `GET /sessions` returns.

use anyhow::Result;

use crate::config::Config;
use crate::facade::{open_sqlite, SessionListRequest};

pub async fn run_sessions(config: &Config, page: Option<i64>, page_size: Option<i64>) -> Result<()> {
    let (facade, pool) = open_sqlite(config).await?;
    let req = SessionListRequest {
        page,
        page_size,
        ..Default::default()
    };
    let list = facade.list_sessions(&req).await;
    pool.close().await;

    println!("{}", serde_json::to_string_pretty(&list?)?);
    Ok(())
}
