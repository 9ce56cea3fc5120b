//! Windowed usage statistics.
//!
//! One pass over a record scope produces a [`StatsWindow`]:
//!
//! 1. Records outside `[since, until)` are skipped.
//! 2. Every in-window record counts once toward `total_operations`, once
//!    toward its phase and once toward its operation label, so both
//!    distributions always sum to `total_operations`.
//! 3. Labels that carry a tool name (per [`ToolRule`]) count toward
//!    `tool_usage`.
//! 4. `avg_duration_ms` is the mean gap between temporally adjacent records
//!    of the same session. A session with one in-window record contributes
//!    no samples; zero samples yields `0.0`.
//!
//! Timestamps are sorted per session before gaps are taken, so the result
//! does not depend on the order records are pushed in.

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use std::collections::{BTreeMap, HashMap};

use crate::error::Result;
use crate::models::{LogRecord, StatsWindow, TimeWindow};
use crate::store::RecordStream;
use crate::tools::ToolRule;

/// Incremental statistics fold over one window.
pub struct StatsAggregator<'r> {
    window: TimeWindow,
    tool_rule: &'r ToolRule,
    total_operations: u64,
    phase_distribution: BTreeMap<String, u64>,
    operation_type_distribution: BTreeMap<String, u64>,
    tool_usage: BTreeMap<String, u64>,
    session_times: HashMap<String, Vec<DateTime<Utc>>>,
}

impl<'r> StatsAggregator<'r> {
    pub fn new(window: TimeWindow, tool_rule: &'r ToolRule) -> Self {
        Self {
            window,
            tool_rule,
            total_operations: 0,
            phase_distribution: BTreeMap::new(),
            operation_type_distribution: BTreeMap::new(),
            tool_usage: BTreeMap::new(),
            session_times: HashMap::new(),
        }
    }

    pub fn push(&mut self, record: &LogRecord) {
        if !self.window.contains(record.timestamp) {
            return;
        }
        self.total_operations += 1;
        *self
            .phase_distribution
            .entry(record.phase.as_str().to_string())
            .or_insert(0) += 1;

        let label = record.operation_label();
        *self
            .operation_type_distribution
            .entry(label.to_string())
            .or_insert(0) += 1;
        if let Some(tool) = record.operation.as_deref().and_then(|op| self.tool_rule.extract(op)) {
            *self.tool_usage.entry(tool.to_string()).or_insert(0) += 1;
        }

        self.session_times
            .entry(record.session_id.clone())
            .or_default()
            .push(record.timestamp);
    }

    pub fn finish(self) -> StatsWindow {
        // Gaps are summed in nanoseconds so sub-millisecond spacing survives.
        let mut total_gap_ns: i128 = 0;
        let mut samples: u64 = 0;
        for mut times in self.session_times.into_values() {
            times.sort_unstable();
            for pair in times.windows(2) {
                let gap = pair[1] - pair[0];
                total_gap_ns += i128::from(gap.num_seconds()) * 1_000_000_000
                    + i128::from(gap.subsec_nanos());
                samples += 1;
            }
        }
        let avg_duration_ms = if samples == 0 {
            0.0
        } else {
            total_gap_ns as f64 / samples as f64 / 1_000_000.0
        };

        StatsWindow {
            since: self.window.since,
            until: self.window.until,
            total_operations: self.total_operations,
            phase_distribution: self.phase_distribution,
            operation_type_distribution: self.operation_type_distribution,
            tool_usage: self.tool_usage,
            avg_duration_ms,
            duration_samples: samples,
        }
    }
}

/// Aggregate an in-memory record set.
pub fn aggregate<'a, I>(records: I, window: TimeWindow, tool_rule: &ToolRule) -> StatsWindow
where
    I: IntoIterator<Item = &'a LogRecord>,
{
    let mut aggregator = StatsAggregator::new(window, tool_rule);
    for record in records {
        aggregator.push(record);
    }
    aggregator.finish()
}

/// Aggregate while draining a store query. The first store error aborts the
/// pass and discards the partial state.
pub async fn aggregate_stream(
    mut records: RecordStream<'_>,
    window: TimeWindow,
    tool_rule: &ToolRule,
) -> Result<StatsWindow> {
    let mut aggregator = StatsAggregator::new(window, tool_rule);
    while let Some(record) = records.try_next().await? {
        aggregator.push(&record);
    }
    Ok(aggregator.finish())
}
