//! Scripted in-memory gateway shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use camelot_core::models::{Entity, GeoPoint, ObjectKind, Source, SourceCreate, SourceUpdate};
use camelot_core::{DataGateway, Event, GatewayError};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Queue of canned replies for one endpoint. Each reply is delivered after
/// its delay. Once the queue is empty further calls never complete.
pub struct Script<T> {
    replies: Mutex<VecDeque<(Duration, Result<Vec<T>, GatewayError>)>>,
    calls: AtomicUsize,
}

impl<T> Script<T> {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn ok(self, delay_ms: u64, records: Vec<T>) -> Self {
        self.push(delay_ms, Ok(records))
    }

    pub fn err(self, delay_ms: u64, code: u16) -> Self {
        self.push(
            delay_ms,
            Err(GatewayError::Api {
                code,
                message: "scripted failure".to_string(),
            }),
        )
    }

    fn push(self, delay_ms: u64, reply: Result<Vec<T>, GatewayError>) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back((Duration::from_millis(delay_ms), reply));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn next(&self) -> Result<Vec<T>, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some((delay, reply)) => {
                tokio::time::sleep(delay).await;
                reply
            }
            None => std::future::pending().await,
        }
    }
}

pub struct FakeGateway {
    pub cameras: Script<Source>,
    pub entities: Script<Entity>,
    pub events: Script<Event>,
    pub deleted: Mutex<Vec<i64>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            cameras: Script::new(),
            entities: Script::new(),
            events: Script::new(),
            deleted: Mutex::new(Vec::new()),
        }
    }

    pub fn with_events(mut self, events: Script<Event>) -> Self {
        self.events = events;
        self
    }

    pub fn with_cameras(mut self, cameras: Script<Source>) -> Self {
        self.cameras = cameras;
        self
    }

    pub fn with_entities(mut self, entities: Script<Entity>) -> Self {
        self.entities = entities;
        self
    }
}

#[async_trait]
impl DataGateway for FakeGateway {
    async fn cameras(&self) -> Result<Vec<Source>, GatewayError> {
        self.cameras.next().await
    }

    async fn entities(&self) -> Result<Vec<Entity>, GatewayError> {
        self.entities.next().await
    }

    async fn events(&self) -> Result<Vec<Event>, GatewayError> {
        self.events.next().await
    }

    async fn create_camera(&self, camera: &SourceCreate) -> Result<Source, GatewayError> {
        let mut created = source(99, false);
        created.name = camera.name.clone();
        created.position = GeoPoint {
            latitude: camera.latitude,
            longitude: camera.longitude,
        };
        Ok(created)
    }

    async fn update_camera(&self, id: i64, update: &SourceUpdate) -> Result<Source, GatewayError> {
        if id != 1 {
            return Err(GatewayError::Api {
                code: 404,
                message: "Camera not found".to_string(),
            });
        }
        let mut updated = source(id, true);
        if let Some(name) = &update.name {
            updated.name = name.clone();
        }
        Ok(updated)
    }

    async fn delete_camera(&self, id: i64) -> Result<(), GatewayError> {
        self.deleted.lock().unwrap().push(id);
        Ok(())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

pub fn reference_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
}

pub fn event(id: i64, source_id: i64, kind: &str, confidence: f64) -> Event {
    Event {
        id,
        source_id,
        kind: ObjectKind::from(kind),
        confidence,
        metadata: Default::default(),
        timestamp: reference_now(),
    }
}

pub fn source(id: i64, online: bool) -> Source {
    Source {
        id,
        name: format!("Camera {}", id),
        description: None,
        position: GeoPoint {
            latitude: 40.7,
            longitude: -74.0,
        },
        active: true,
        online,
        config: Default::default(),
        created_at: None,
        updated_at: None,
    }
}

pub fn entity(id: i64, source_id: i64, active: bool) -> Entity {
    Entity {
        id,
        external_id: format!("trk-{}", id),
        kind: ObjectKind::Person,
        position: GeoPoint {
            latitude: 40.7,
            longitude: -74.0,
        },
        source_id,
        confidence: 0.9,
        first_seen: reference_now() - chrono::Duration::seconds(30),
        last_seen: reference_now(),
        active,
        recognized: false,
        recognized_label: None,
    }
}

pub fn ids<T, F: Fn(&T) -> i64>(records: &[T], id: F) -> Vec<i64> {
    records.iter().map(id).collect()
}
