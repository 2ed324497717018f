use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{check_confidence, ObjectKind, Record};

/// A discrete detection from one source at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    #[serde(rename = "camera_id")]
    pub source_id: i64,
    #[serde(rename = "event_type")]
    pub kind: ObjectKind,
    pub confidence: f64,
    #[serde(default, alias = "event_metadata")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(with = "crate::models::timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl Record for Event {
    fn id(&self) -> i64 {
        self.id
    }

    fn check(&self) -> Result<(), String> {
        check_confidence(self.confidence)
    }
}
