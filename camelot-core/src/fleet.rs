use serde::{Deserialize, Serialize};

use crate::models::{Entity, Source};

/// Counts shown in the dashboard header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetSummary {
    pub cameras_total: usize,
    pub cameras_online: usize,
    pub entities_total: usize,
    pub entities_active: usize,
    pub entities_recognized: usize,
}

impl FleetSummary {
    pub fn from_snapshots(cameras: &[Source], entities: &[Entity]) -> Self {
        Self {
            cameras_total: cameras.len(),
            cameras_online: cameras.iter().filter(|c| c.online).count(),
            entities_total: entities.len(),
            entities_active: entities.iter().filter(|e| e.active).count(),
            entities_recognized: entities.iter().filter(|e| e.recognized).count(),
        }
    }
}
