pub mod config;
pub mod error;
pub mod filter;
pub mod fleet;
pub mod gateway;
pub mod models;
pub mod store;
pub mod timeline;

pub use config::CamelotConfig;
pub use error::CamelotError;
pub use filter::{filter_events, matches, FilterCriteria, TimeWindow};
pub use fleet::FleetSummary;
pub use gateway::{DataGateway, GatewayError, HttpGateway};
pub use models::{Entity, Event, GeoPoint, ObjectKind, Source, SourceCreate, SourceUpdate};
pub use store::{Snapshot, SnapshotStatus, SnapshotStore};
pub use timeline::{group_events, EventGroup, ExpansionState, GroupKey, GroupMode};
