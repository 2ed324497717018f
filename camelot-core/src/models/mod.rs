pub mod entity;
pub mod event;
pub mod kind;
pub mod source;
pub mod timestamp;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub use entity::Entity;
pub use event::Event;
pub use kind::{KindDescriptor, ObjectKind};
pub use source::{Source, SourceCreate, SourceUpdate};

/// A position on the map, carried flat on the wire as `latitude`/`longitude`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// A record that arrives in a polled snapshot.
pub trait Record {
    fn id(&self) -> i64;

    /// Per-record invariants. Returns a description of the first violation.
    fn check(&self) -> Result<(), String> {
        Ok(())
    }
}

pub(crate) fn check_confidence(confidence: f64) -> Result<(), String> {
    if (0.0..=1.0).contains(&confidence) {
        Ok(())
    } else {
        Err(format!("confidence {} outside [0, 1]", confidence))
    }
}

/// Validate a whole snapshot: every record passes its own checks and no id
/// appears twice.
pub fn validate_snapshot<T: Record>(records: &[T]) -> Result<(), String> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        record
            .check()
            .map_err(|e| format!("record {}: {}", record.id(), e))?;
        if !seen.insert(record.id()) {
            return Err(format!("duplicate id {}", record.id()));
        }
    }
    Ok(())
}
