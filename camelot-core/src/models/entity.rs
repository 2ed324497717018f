use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{check_confidence, Event, GeoPoint, ObjectKind, Record};

/// A tracked object with a position and a time span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: i64,
    #[serde(rename = "entity_id")]
    pub external_id: String,
    #[serde(rename = "object_type")]
    pub kind: ObjectKind,
    #[serde(flatten)]
    pub position: GeoPoint,
    #[serde(rename = "camera_id")]
    pub source_id: i64,
    pub confidence: f64,
    #[serde(with = "crate::models::timestamp")]
    pub first_seen: DateTime<Utc>,
    #[serde(with = "crate::models::timestamp")]
    pub last_seen: DateTime<Utc>,
    #[serde(rename = "is_active")]
    pub active: bool,
    #[serde(rename = "is_recognized")]
    pub recognized: bool,
    #[serde(rename = "recognized_as", default)]
    pub recognized_label: Option<String>,
}

impl Entity {
    /// Whole seconds between first and last sighting.
    pub fn dwell_seconds(&self) -> i64 {
        (self.last_seen - self.first_seen).num_seconds()
    }

    /// Events raised by the source that saw this entity, in snapshot order.
    pub fn related_events<'a>(&self, events: &'a [Event]) -> Vec<&'a Event> {
        events
            .iter()
            .filter(|e| e.source_id == self.source_id)
            .collect()
    }
}

impl Record for Entity {
    fn id(&self) -> i64 {
        self.id
    }

    fn check(&self) -> Result<(), String> {
        check_confidence(self.confidence)?;
        if self.first_seen > self.last_seen {
            return Err(format!(
                "first_seen {} is after last_seen {}",
                self.first_seen, self.last_seen
            ));
        }
        Ok(())
    }
}
