//! Event filter predicates
//!
//! A `FilterCriteria` is five conjunctive gates: text query, kind set,
//! source set, confidence floor and relative time window. Empty sets and an
//! empty query are unrestricted. Windows are measured against the `now`
//! passed in, so the same snapshot can drop out of a window as time passes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::{Event, ObjectKind};

/// Relative time window, keyed on the wire as `all|1h|24h|7d|30d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeWindow {
    #[default]
    #[serde(rename = "all")]
    All,
    #[serde(rename = "1h")]
    LastHour,
    #[serde(rename = "24h")]
    LastDay,
    #[serde(rename = "7d")]
    LastWeek,
    #[serde(rename = "30d")]
    LastMonth,
}

impl TimeWindow {
    /// Unknown keys are unrestricted.
    pub fn from_key(key: &str) -> Self {
        match key {
            "1h" => TimeWindow::LastHour,
            "24h" => TimeWindow::LastDay,
            "7d" => TimeWindow::LastWeek,
            "30d" => TimeWindow::LastMonth,
            _ => TimeWindow::All,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            TimeWindow::All => "all",
            TimeWindow::LastHour => "1h",
            TimeWindow::LastDay => "24h",
            TimeWindow::LastWeek => "7d",
            TimeWindow::LastMonth => "30d",
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        match self {
            TimeWindow::All => None,
            TimeWindow::LastHour => Some(Duration::milliseconds(3_600_000)),
            TimeWindow::LastDay => Some(Duration::milliseconds(86_400_000)),
            TimeWindow::LastWeek => Some(Duration::milliseconds(604_800_000)),
            TimeWindow::LastMonth => Some(Duration::milliseconds(2_592_000_000)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub kinds: BTreeSet<String>,
    #[serde(default)]
    pub source_ids: BTreeSet<i64>,
    #[serde(default)]
    pub min_confidence_percent: u8,
    #[serde(default)]
    pub time_window: TimeWindow,
}

impl FilterCriteria {
    pub fn with_min_confidence(mut self, percent: u8) -> Self {
        self.min_confidence_percent = percent.min(100);
        self
    }

    pub fn toggle_kind(&mut self, kind: &ObjectKind) {
        let name = kind.as_str();
        if !self.kinds.remove(name) {
            self.kinds.insert(name.to_string());
        }
    }

    pub fn toggle_source(&mut self, source_id: i64) {
        if !self.source_ids.remove(&source_id) {
            self.source_ids.insert(source_id);
        }
    }

    pub fn clear(&mut self) {
        *self = FilterCriteria::default();
    }

    /// Number of non-text restrictions in effect. The query is not counted.
    pub fn active_filter_count(&self) -> usize {
        self.kinds.len()
            + self.source_ids.len()
            + usize::from(self.min_confidence_percent > 0)
            + usize::from(self.time_window != TimeWindow::All)
    }

    /// True when every gate is open.
    pub fn is_unrestricted(&self) -> bool {
        self.query.is_empty() && self.active_filter_count() == 0
    }
}

/// Decide whether `event` belongs in the feed for `criteria` at `now`.
pub fn matches(event: &Event, criteria: &FilterCriteria, now: DateTime<Utc>) -> bool {
    if !criteria.query.is_empty() {
        let query = criteria.query.to_lowercase();
        let in_kind = event.kind.as_str().contains(&query);
        let in_source = event.source_id.to_string().contains(&query);
        if !in_kind && !in_source {
            return false;
        }
    }

    if !criteria.kinds.is_empty() && !criteria.kinds.contains(event.kind.as_str()) {
        return false;
    }

    if !criteria.source_ids.is_empty() && !criteria.source_ids.contains(&event.source_id) {
        return false;
    }

    // Divide the floor instead of scaling the confidence: 0.29 * 100.0 is
    // 28.999999999999996, while 29.0 / 100.0 is exactly 0.29.
    let floor = f64::from(criteria.min_confidence_percent) / 100.0;
    if event.confidence < floor {
        return false;
    }

    if let Some(window) = criteria.time_window.duration() {
        if now - event.timestamp > window {
            return false;
        }
    }

    true
}

/// Order-preserving filter over a snapshot.
pub fn filter_events<'a>(
    events: &'a [Event],
    criteria: &FilterCriteria,
    now: DateTime<Utc>,
) -> Vec<&'a Event> {
    events
        .iter()
        .filter(|e| matches(e, criteria, now))
        .collect()
}
