//! HTTP API over the [`QueryFacade`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/sessions` | Paginated session list (`page`, `page_size`, `since`, `until`) |
//! | `GET`  | `/sessions/{id}` | One reconstructed session |
//! | `GET`  | `/stats` | Windowed statistics plus lifetime total (`hours`) |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! All endpoints are read-only and idempotent.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "page must be >= 1, got 0" } }
//! ```
//!
//! | Code | Status | Retry |
//! |------|--------|-------|
//! | `bad_request` | 400 | no |
//! | `not_found` | 404 | no |
//! | `store_unavailable` | 503 | yes |
//! | `timeout` | 503 | yes |
//! | `store_corrupt` | 500 | no |
//!
//! Retryable responses carry a `Retry-After` header.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

use agent_activity_core::error::ActivityError;
use agent_activity_core::models::Session;

use crate::config::Config;
use crate::facade::{open_sqlite, QueryFacade, SessionList, SessionListRequest, StatsResponse};
use crate::migrate;

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    facade: Arc<QueryFacade>,
    /// Deadline for one facade call.
    timeout: Duration,
}

impl AppState {
    pub fn new(facade: Arc<QueryFacade>, timeout: Duration) -> Self {
        Self { facade, timeout }
    }
}

/// Build the router. Exposed separately from [`run_server`] so callers can
/// serve it over a store of their choosing.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/sessions", get(handle_list_sessions))
        .route("/sessions/{id}", get(handle_get_session))
        .route("/stats", get(handle_stats))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Serve the API on `[server].bind` over the configured SQLite database.
/// Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let (facade, pool) = open_sqlite(config).await?;
    migrate::apply(&pool).await?;

    let state = AppState::new(
        Arc::new(facade),
        Duration::from_secs(config.query.timeout_secs),
    );

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, db = %config.db.path.display(), "activity server listening");
    println!("Activity server listening on http://{}", config.server.bind);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

/// Error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn retryable(&self) -> bool {
        self.status == StatusCode::SERVICE_UNAVAILABLE
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let retry = self.retryable();
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        if retry {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, header::HeaderValue::from_static("1"));
        }
        response
    }
}

impl From<ActivityError> for AppError {
    fn from(err: ActivityError) -> Self {
        let message = err.to_string();
        match err {
            ActivityError::InvalidArgument(_) | ActivityError::InvalidRecord(_) => AppError {
                status: StatusCode::BAD_REQUEST,
                code: "bad_request",
                message,
            },
            ActivityError::StoreUnavailable(_) => {
                tracing::warn!(error = %message, "store unavailable");
                AppError {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    code: "store_unavailable",
                    message,
                }
            }
            ActivityError::StoreCorrupt(_) => {
                tracing::error!(error = %message, "store corrupt");
                AppError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: "store_corrupt",
                    message,
                }
            }
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

/// Run a facade call under the request deadline. On expiry the call's
/// future is dropped, which aborts its store scan.
async fn with_deadline<T, F>(timeout: Duration, fut: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, ActivityError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(AppError::from),
        Err(_) => {
            tracing::warn!(timeout_secs = timeout.as_secs(), "query deadline exceeded");
            Err(AppError {
                status: StatusCode::SERVICE_UNAVAILABLE,
                code: "timeout",
                message: format!("query timed out after {:?}", timeout),
            })
        }
    }
}

fn parse_int(name: &str, raw: Option<&str>) -> Result<Option<i64>, AppError> {
    raw.map(|s| {
        s.trim()
            .parse::<i64>()
            .map_err(|_| bad_request(format!("{} must be an integer, got '{}'", name, s)))
    })
    .transpose()
}

fn parse_instant(name: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>, AppError> {
    raw.map(|s| {
        DateTime::parse_from_rfc3339(s.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| bad_request(format!("{} must be an ISO-8601 instant, got '{}'", name, s)))
    })
    .transpose()
}

// ============ GET /sessions ============

/// Raw query parameters; parsed by hand so malformed values produce the
/// JSON error body instead of Axum's plain-text rejection.
#[derive(Debug, Deserialize)]
struct SessionsParams {
    page: Option<String>,
    page_size: Option<String>,
    since: Option<String>,
    until: Option<String>,
}

async fn handle_list_sessions(
    State(state): State<AppState>,
    Query(params): Query<SessionsParams>,
) -> Result<Json<SessionList>, AppError> {
    let req = SessionListRequest {
        page: parse_int("page", params.page.as_deref())?,
        page_size: parse_int("page_size", params.page_size.as_deref())?,
        since: parse_instant("since", params.since.as_deref())?,
        until: parse_instant("until", params.until.as_deref())?,
    };
    let list = with_deadline(state.timeout, state.facade.list_sessions(&req)).await?;
    Ok(Json(list))
}

// ============ GET /sessions/{id} ============

async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Session>, AppError> {
    let session = with_deadline(state.timeout, state.facade.get_session(&id)).await?;
    session
        .map(Json)
        .ok_or_else(|| not_found(format!("no records for session: {}", id)))
}

// ============ GET /stats ============

#[derive(Debug, Deserialize)]
struct StatsParams {
    hours: Option<String>,
}

async fn handle_stats(
    State(state): State<AppState>,
    Query(params): Query<StatsParams>,
) -> Result<Json<StatsResponse>, AppError> {
    let hours = parse_int("hours", params.hours.as_deref())?;
    let stats = with_deadline(state.timeout, state.facade.stats(Utc::now(), hours)).await?;
    Ok(Json(stats))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
