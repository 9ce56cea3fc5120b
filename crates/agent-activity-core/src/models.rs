//! Core data models used throughout Agent Activity.
//!
//! [`LogRecord`]s are the only stored data. [`Session`], [`StatsWindow`] and
//! [`Page`] are derived on every query and never persisted.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ActivityError, Result};

/// Coarse stage label attached to a log record.
///
/// Labels outside the fixed set are kept verbatim in [`Phase::Unknown`], so
/// an unexpected phase never makes a record unreadable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Phase {
    DataCollection,
    FileExploration,
    Analysis,
    Generation,
    Error,
    Unknown(String),
}

impl Phase {
    /// Parse a phase label. Matching is case-insensitive and treats `-` and
    /// spaces like `_`. An empty label, or any casing of `unknown`, becomes
    /// `Unknown("unknown")`.
    pub fn parse(label: &str) -> Phase {
        let trimmed = label.trim();
        let normalized = trimmed.to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "data_collection" => Phase::DataCollection,
            "file_exploration" => Phase::FileExploration,
            "analysis" => Phase::Analysis,
            "generation" => Phase::Generation,
            "error" => Phase::Error,
            "" | "unknown" => Phase::default(),
            _ => Phase::Unknown(trimmed.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Phase::DataCollection => "data_collection",
            Phase::FileExploration => "file_exploration",
            Phase::Analysis => "analysis",
            Phase::Generation => "generation",
            Phase::Error => "error",
            Phase::Unknown(label) => label,
        }
    }
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Unknown("unknown".to_string())
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Phase {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Phase {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Phase::parse(&label))
    }
}

/// An immutable operation record as stored in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    /// Store-assigned, strictly increasing.
    pub id: i64,
    pub session_id: String,
    pub phase: Phase,
    /// Free-text label; may encode a tool name (see [`crate::tools::ToolRule`]).
    pub operation: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub files_processed: Option<u64>,
    pub total_files: Option<u64>,
    pub current_file: Option<String>,
}

impl LogRecord {
    /// Operation label used for distributions. Records without one are
    /// counted under `"unknown"`.
    pub fn operation_label(&self) -> &str {
        match self.operation.as_deref() {
            Some(op) if !op.trim().is_empty() => op,
            _ => "unknown",
        }
    }
}

/// An append request as produced by the agent runtime.
///
/// Every field is optional at this level so that the shape check in
/// [`NewLogRecord::into_record`] can reject incomplete input explicitly.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewLogRecord {
    pub session_id: Option<String>,
    pub phase: Option<Phase>,
    pub operation: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub files_processed: Option<i64>,
    pub total_files: Option<i64>,
    pub current_file: Option<String>,
}

impl NewLogRecord {
    pub fn new(session_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            timestamp: Some(timestamp),
            ..Default::default()
        }
    }

    pub fn phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn progress(mut self, files_processed: i64, total_files: i64) -> Self {
        self.files_processed = Some(files_processed);
        self.total_files = Some(total_files);
        self
    }

    pub fn current_file(mut self, path: impl Into<String>) -> Self {
        self.current_file = Some(path.into());
        self
    }

    /// Validate the record's shape and assign it `id`.
    ///
    /// Fails with [`ActivityError::InvalidRecord`] when `session_id` is
    /// missing or blank, when `timestamp` is missing, or when a progress
    /// counter is negative.
    pub fn into_record(self, id: i64) -> Result<LogRecord> {
        let session_id = match self.session_id {
            Some(s) if !s.trim().is_empty() => s,
            Some(_) => return Err(ActivityError::InvalidRecord("session_id is blank".into())),
            None => return Err(ActivityError::InvalidRecord("session_id is missing".into())),
        };
        let timestamp = self
            .timestamp
            .ok_or_else(|| ActivityError::InvalidRecord("timestamp is missing".into()))?;

        Ok(LogRecord {
            id,
            session_id,
            phase: self.phase.unwrap_or_default(),
            operation: self.operation,
            timestamp,
            files_processed: non_negative("files_processed", self.files_processed)?,
            total_files: non_negative("total_files", self.total_files)?,
            current_file: self.current_file,
        })
    }
}

fn non_negative(field: &str, value: Option<i64>) -> Result<Option<u64>> {
    match value {
        Some(v) if v < 0 => Err(ActivityError::InvalidRecord(format!(
            "{} must be >= 0, got {}",
            field, v
        ))),
        Some(v) => Ok(Some(v as u64)),
        None => Ok(None),
    }
}

/// A half-open time range `[since, until)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(since: DateTime<Utc>, until: DateTime<Utc>) -> Result<Self> {
        if since > until {
            return Err(ActivityError::InvalidArgument(format!(
                "window start {} is after window end {}",
                since.to_rfc3339(),
                until.to_rfc3339()
            )));
        }
        Ok(Self { since, until })
    }

    /// The whole representable timeline.
    pub fn all() -> Self {
        Self {
            since: DateTime::<Utc>::MIN_UTC,
            until: DateTime::<Utc>::MAX_UTC,
        }
    }

    /// `[now - hours, now)`.
    pub fn last_hours(now: DateTime<Utc>, hours: i64) -> Self {
        Self {
            since: now - Duration::hours(hours),
            until: now,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.since <= ts && ts < self.until
    }
}

/// Derived aggregate of all records sharing a session id within a scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub session_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub operation_count: u64,
    pub files_processed: u64,
    /// Distinct phases in order of first occurrence.
    pub phases: Vec<Phase>,
}

/// Usage statistics over one [`TimeWindow`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsWindow {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
    pub total_operations: u64,
    pub phase_distribution: BTreeMap<String, u64>,
    pub operation_type_distribution: BTreeMap<String, u64>,
    pub tool_usage: BTreeMap<String, u64>,
    pub avg_duration_ms: f64,
    /// Number of adjacent same-session record pairs averaged into
    /// `avg_duration_ms`.
    pub duration_samples: u64,
}

impl StatsWindow {
    pub fn empty(window: TimeWindow) -> Self {
        Self {
            since: window.since,
            until: window.until,
            total_operations: 0,
            phase_distribution: BTreeMap::new(),
            operation_type_distribution: BTreeMap::new(),
            tool_usage: BTreeMap::new(),
            avg_duration_ms: 0.0,
            duration_samples: 0,
        }
    }
}

/// One page of an ordered result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub page_size: u64,
    pub total_count: u64,
    pub total_pages: u64,
}
