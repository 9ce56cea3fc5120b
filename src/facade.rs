//! Query facade: the two read operations exposed to the transport.
//!
//! Every call re-derives its answer from the [`LogStore`]. The facade keeps
//! no state between calls apart from an optional statistics cache whose
//! entries expire purely by TTL; nothing ever invalidates them early.
//!
//! Argument validation happens before the store is touched. Reconstruction
//! and aggregation state is local to the call, so a call whose future is
//! dropped (timeout, client disconnect) leaves nothing behind.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use agent_activity_core::error::{ActivityError, Result};
use agent_activity_core::models::{Session, TimeWindow};
use agent_activity_core::pagination::PageRequest;
use agent_activity_core::reconstruct::{reconstruct_stream, ProgressPolicy};
use agent_activity_core::stats::aggregate_stream;
use agent_activity_core::store::LogStore;
use agent_activity_core::tools::ToolRule;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteLogStore;

/// Largest statistics window a caller may ask for (30 days).
pub const MAX_STATS_WINDOW_HOURS: i64 = 720;

/// Facade tuning, decoupled from the TOML config.
#[derive(Debug, Clone)]
pub struct FacadeSettings {
    pub default_page_size: i64,
    pub max_page_size: i64,
    pub stats_window_hours: i64,
    pub stats_cache_ttl: Option<Duration>,
    pub tool_rule: ToolRule,
    pub progress_policy: ProgressPolicy,
}

impl Default for FacadeSettings {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 500,
            stats_window_hours: 24,
            stats_cache_ttl: None,
            tool_rule: ToolRule::default(),
            progress_policy: ProgressPolicy::Max,
        }
    }
}

impl FacadeSettings {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let ttl = config.query.stats_cache_ttl_secs;
        Ok(Self {
            default_page_size: config.query.default_page_size,
            max_page_size: config.query.max_page_size,
            stats_window_hours: config.query.stats_window_hours,
            stats_cache_ttl: (ttl > 0).then(|| Duration::from_secs(ttl)),
            tool_rule: config.stats.tool_rule()?,
            progress_policy: config.stats.progress_policy()?,
        })
    }
}

/// Input for [`QueryFacade::list_sessions`]. Missing values take defaults.
#[derive(Debug, Clone, Default)]
pub struct SessionListRequest {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationInfo {
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
    pub total_count: u64,
}

/// `GET /sessions` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionList {
    pub sessions: Vec<Session>,
    pub pagination: PaginationInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowStats {
    pub operations: u64,
    pub phase_distribution: BTreeMap<String, u64>,
    pub operation_types: BTreeMap<String, u64>,
    pub avg_duration_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolUsage {
    pub tool_usage: BTreeMap<String, u64>,
    pub total_operations: u64,
}

/// `GET /stats` response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsResponse {
    pub total_logs: u64,
    pub last_24_hours: WindowStats,
    pub tool_usage: ToolUsage,
}

/// Window length in hours plus the TTL-sized bucket the window's upper
/// bound falls in. Calls whose `now` lands in the same bucket share an
/// entry; a `now` in another bucket never sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct StatsCacheKey {
    hours: i64,
    until_bucket: i64,
}

impl StatsCacheKey {
    fn new(hours: i64, now: DateTime<Utc>, ttl: Duration) -> Self {
        let bucket_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX).max(1);
        Self {
            hours,
            until_bucket: now.timestamp_millis().div_euclid(bucket_ms),
        }
    }
}

struct CachedStats {
    computed_at: Instant,
    response: StatsResponse,
}

/// Stateless orchestration over a [`LogStore`].
pub struct QueryFacade {
    store: Arc<dyn LogStore>,
    settings: FacadeSettings,
    stats_cache: RwLock<HashMap<StatsCacheKey, CachedStats>>,
}

impl QueryFacade {
    pub fn new(store: Arc<dyn LogStore>, settings: FacadeSettings) -> Self {
        Self {
            store,
            settings,
            stats_cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &FacadeSettings {
        &self.settings
    }

    /// List reconstructed sessions, most recent first.
    ///
    /// Fails with `InvalidArgument` for `page < 1`, `page_size < 1` or
    /// `since > until`. A `page_size` above the configured maximum is
    /// clamped, and the effective size is reported in `pagination`.
    pub async fn list_sessions(&self, req: &SessionListRequest) -> Result<SessionList> {
        let page_size = req.page_size.unwrap_or(self.settings.default_page_size);
        let mut page_req = PageRequest::new(req.page.unwrap_or(1), page_size)?;
        page_req.page_size = page_req.page_size.min(self.settings.max_page_size.max(1) as u64);
        let all = TimeWindow::all();
        let window = TimeWindow::new(req.since.unwrap_or(all.since), req.until.unwrap_or(all.until))?;

        let sessions =
            reconstruct_stream(self.store.query(window, None), self.settings.progress_policy)
                .await?;
        let page = page_req.paginate(sessions);
        tracing::debug!(
            page = page.page,
            total_count = page.total_count,
            "listed sessions"
        );

        Ok(SessionList {
            sessions: page.items,
            pagination: PaginationInfo {
                page: page.page,
                page_size: page.page_size,
                total_pages: page.total_pages,
                total_count: page.total_count,
            },
        })
    }

    /// Reconstruct one session over the whole log.
    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        if session_id.trim().is_empty() {
            return Err(ActivityError::InvalidArgument(
                "session_id must not be empty".into(),
            ));
        }
        let sessions = reconstruct_stream(
            self.store.query(TimeWindow::all(), Some(session_id)),
            self.settings.progress_policy,
        )
        .await?;
        Ok(sessions.into_iter().next())
    }

    /// Statistics over `[now - hours, now)` plus the lifetime record count.
    /// `hours` defaults to the configured window.
    pub async fn stats(&self, now: DateTime<Utc>, hours: Option<i64>) -> Result<StatsResponse> {
        let hours = hours.unwrap_or(self.settings.stats_window_hours);
        if !(1..=MAX_STATS_WINDOW_HOURS).contains(&hours) {
            return Err(ActivityError::InvalidArgument(format!(
                "hours must be in [1, {}], got {}",
                MAX_STATS_WINDOW_HOURS, hours
            )));
        }

        if let Some(ttl) = self.settings.stats_cache_ttl {
            let cache = self.stats_cache.read().await;
            if let Some(entry) = cache.get(&StatsCacheKey::new(hours, now, ttl)) {
                if entry.computed_at.elapsed() < ttl {
                    tracing::debug!(hours, "stats served from cache");
                    return Ok(entry.response.clone());
                }
            }
        }

        let response = self.compute_stats(now, hours).await?;

        if let Some(ttl) = self.settings.stats_cache_ttl {
            let mut cache = self.stats_cache.write().await;
            cache.retain(|_, entry| entry.computed_at.elapsed() < ttl);
            cache.insert(
                StatsCacheKey::new(hours, now, ttl),
                CachedStats {
                    computed_at: Instant::now(),
                    response: response.clone(),
                },
            );
        }

        Ok(response)
    }

    async fn compute_stats(&self, now: DateTime<Utc>, hours: i64) -> Result<StatsResponse> {
        let window = TimeWindow::last_hours(now, hours);
        let stats = aggregate_stream(
            self.store.query(window, None),
            window,
            &self.settings.tool_rule,
        )
        .await?;
        let total_logs = self.store.count().await?;
        tracing::debug!(
            hours,
            operations = stats.total_operations,
            total_logs,
            "computed stats"
        );

        Ok(StatsResponse {
            total_logs,
            last_24_hours: WindowStats {
                operations: stats.total_operations,
                phase_distribution: stats.phase_distribution,
                operation_types: stats.operation_type_distribution,
                avg_duration_ms: stats.avg_duration_ms,
            },
            tool_usage: ToolUsage {
                tool_usage: stats.tool_usage,
                total_operations: stats.total_operations,
            },
        })
    }
}

/// Open the configured SQLite database and wrap it in a facade. The pool is
/// returned so one-shot callers can close it when done.
pub async fn open_sqlite(config: &Config) -> anyhow::Result<(QueryFacade, sqlx::SqlitePool)> {
    let settings = FacadeSettings::from_config(config)?;
    let pool = db::connect(config).await?;
    let facade = QueryFacade::new(Arc::new(SqliteLogStore::new(pool.clone())), settings);
    Ok((facade, pool))
}
