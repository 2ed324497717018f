//! Timeline grouping
//!
//! Two modes:
//! - **by time**: five fixed recency buckets (`0-1`, `1-5`, `5-15`, `15-30`,
//!   `30-60` minutes), then one bucket per local hour (`HH:00`), newest hour
//!   key first
//! - **by camera**: one bucket per source id, in first-seen order
//!
//! Buckets only exist when at least one event maps to them.
//! `ExpansionState` tracks which buckets a viewer has opened.

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::models::Event;

/// Recency ranges, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecencyBucket {
    JustNow,
    LastFiveMinutes,
    LastFifteenMinutes,
    LastThirtyMinutes,
    LastHour,
}

impl RecencyBucket {
    pub const ALL: [RecencyBucket; 5] = [
        RecencyBucket::JustNow,
        RecencyBucket::LastFiveMinutes,
        RecencyBucket::LastFifteenMinutes,
        RecencyBucket::LastThirtyMinutes,
        RecencyBucket::LastHour,
    ];

    /// The bucket for an event `elapsed` old, or `None` past one hour.
    pub fn for_elapsed(elapsed: Duration) -> Option<Self> {
        let minutes = elapsed.num_minutes();
        // Negative ages (clock skew) count as just now.
        if elapsed < Duration::minutes(1) {
            Some(RecencyBucket::JustNow)
        } else if minutes < 5 {
            Some(RecencyBucket::LastFiveMinutes)
        } else if minutes < 15 {
            Some(RecencyBucket::LastFifteenMinutes)
        } else if minutes < 30 {
            Some(RecencyBucket::LastThirtyMinutes)
        } else if minutes < 60 {
            Some(RecencyBucket::LastHour)
        } else {
            None
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            RecencyBucket::JustNow => "0-1",
            RecencyBucket::LastFiveMinutes => "1-5",
            RecencyBucket::LastFifteenMinutes => "5-15",
            RecencyBucket::LastThirtyMinutes => "15-30",
            RecencyBucket::LastHour => "30-60",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RecencyBucket::JustNow => "Just Now",
            RecencyBucket::LastFiveMinutes => "Last 5 Minutes",
            RecencyBucket::LastFifteenMinutes => "Last 15 Minutes",
            RecencyBucket::LastThirtyMinutes => "Last 30 Minutes",
            RecencyBucket::LastHour => "Last Hour",
        }
    }
}

/// Identity of one timeline group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Recency(RecencyBucket),
    /// Local hour of day, 0..=23.
    Hour(u32),
    Source(i64),
}

impl GroupKey {
    pub fn label(&self) -> String {
        match self {
            GroupKey::Recency(bucket) => bucket.label().to_string(),
            GroupKey::Hour(_) => self.to_string(),
            GroupKey::Source(id) => format!("{:03}", id),
        }
    }

    /// Inverse of `Display` for the keys `mode` can produce.
    pub fn parse(key: &str, mode: GroupMode) -> Option<Self> {
        match mode {
            GroupMode::Time => {
                if let Some(bucket) = RecencyBucket::ALL.iter().find(|b| b.key() == key) {
                    return Some(GroupKey::Recency(*bucket));
                }
                let hour: u32 = key.strip_suffix(":00")?.parse().ok()?;
                (hour < 24).then_some(GroupKey::Hour(hour))
            }
            GroupMode::Camera => key.parse().ok().map(GroupKey::Source),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Recency(bucket) => f.write_str(bucket.key()),
            GroupKey::Hour(hour) => write!(f, "{:02}:00", hour),
            GroupKey::Source(id) => write!(f, "{}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupMode {
    #[default]
    #[serde(alias = "hour")]
    Time,
    Camera,
}

impl GroupMode {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "time" | "hour" => Some(GroupMode::Time),
            "camera" | "source" => Some(GroupMode::Camera),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventGroup<'a> {
    pub key: GroupKey,
    pub label: String,
    pub events: Vec<&'a Event>,
}

/// Recency/hour key for one event, with hours read in `tz`.
pub fn bucket_key<Tz: TimeZone>(event: &Event, now: DateTime<Utc>, tz: &Tz) -> GroupKey {
    match RecencyBucket::for_elapsed(now - event.timestamp) {
        Some(bucket) => GroupKey::Recency(bucket),
        None => GroupKey::Hour(local_hour(event, tz)),
    }
}

fn local_hour<Tz: TimeZone>(event: &Event, tz: &Tz) -> u32 {
    event.timestamp.with_timezone(tz).hour()
}

/// Group by recency, then by local hour. Events keep snapshot order inside
/// each group.
pub fn group_by_time<'a, Tz: TimeZone>(
    events: &'a [Event],
    now: DateTime<Utc>,
    tz: &Tz,
) -> Vec<EventGroup<'a>> {
    let mut groups = collect_groups(events, |event| bucket_key(event, now, tz));
    groups.sort_by_key(|group| time_rank(group.key));
    groups
}

/// Recency buckets in display order, then hours newest key first.
fn time_rank(key: GroupKey) -> (u8, i64) {
    match key {
        GroupKey::Recency(bucket) => (0, bucket as i64),
        GroupKey::Hour(hour) => (1, -i64::from(hour)),
        GroupKey::Source(id) => (2, id),
    }
}

/// Group by source id in order of first appearance.
pub fn group_by_source(events: &[Event]) -> Vec<EventGroup<'_>> {
    collect_groups(events, |event| GroupKey::Source(event.source_id))
}

/// One group per distinct key, in order of first appearance.
fn collect_groups<'a>(
    events: &'a [Event],
    key_of: impl Fn(&Event) -> GroupKey,
) -> Vec<EventGroup<'a>> {
    let mut groups: Vec<EventGroup<'a>> = Vec::new();

    for event in events {
        let key = key_of(event);
        match groups.iter_mut().find(|g| g.key == key) {
            Some(group) => group.events.push(event),
            None => groups.push(EventGroup {
                key,
                label: key.label(),
                events: vec![event],
            }),
        }
    }

    groups
}

pub fn group_events<'a, Tz: TimeZone>(
    events: &'a [Event],
    mode: GroupMode,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Vec<EventGroup<'a>> {
    match mode {
        GroupMode::Time => group_by_time(events, now, tz),
        GroupMode::Camera => group_by_source(events),
    }
}

// ============================================================================
// Expansion state
// ============================================================================

/// Which groups are open, for one grouping mode.
#[derive(Debug, Clone, Default)]
pub struct ExpansionState {
    mode: GroupMode,
    expanded: HashSet<GroupKey>,
}

impl ExpansionState {
    pub fn new(mode: GroupMode) -> Self {
        Self {
            mode,
            expanded: HashSet::new(),
        }
    }

    pub fn mode(&self) -> GroupMode {
        self.mode
    }

    /// Switching modes collapses everything.
    pub fn set_mode(&mut self, mode: GroupMode) {
        if self.mode != mode {
            self.mode = mode;
            self.expanded.clear();
        }
    }

    pub fn is_expanded(&self, key: &GroupKey) -> bool {
        self.expanded.contains(key)
    }

    pub fn toggle(&mut self, key: GroupKey) {
        if !self.expanded.remove(&key) {
            self.expanded.insert(key);
        }
    }

    /// True only when every existing group is open.
    pub fn all_expanded<'k, I>(&self, existing: I) -> bool
    where
        I: IntoIterator<Item = &'k GroupKey>,
    {
        existing.into_iter().all(|k| self.expanded.contains(k))
    }

    /// Open every existing group, or close all of them if they were all
    /// already open.
    pub fn toggle_all<'k, I>(&mut self, existing: I)
    where
        I: IntoIterator<Item = &'k GroupKey>,
    {
        let keys: Vec<GroupKey> = existing.into_iter().copied().collect();
        if self.all_expanded(&keys) {
            self.expanded.clear();
        } else {
            self.expanded = keys.into_iter().collect();
        }
    }

    pub fn expanded_count(&self) -> usize {
        self.expanded.len()
    }
}
