use camelot_core::{Entity, Event, FleetSummary, Source, SnapshotStore};

/// The three polled collections, shared by the poll jobs and the view API.
pub struct Stores {
    pub cameras: SnapshotStore<Source>,
    pub entities: SnapshotStore<Entity>,
    pub events: SnapshotStore<Event>,
}

impl Stores {
    pub fn new() -> Self {
        Self {
            cameras: SnapshotStore::new("cameras"),
            entities: SnapshotStore::new("entities"),
            events: SnapshotStore::new("events"),
        }
    }

    pub fn summary(&self) -> FleetSummary {
        let cameras = self.cameras.current();
        let entities = self.entities.current();
        FleetSummary::from_snapshots(cameras.records(), entities.records())
    }
}

impl Default for Stores {
    fn default() -> Self {
        Self::new()
    }
}
