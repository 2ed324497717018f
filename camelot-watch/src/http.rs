//! Camelot watch view API
//!
//! Axum-based HTTP server exposing the polled snapshots, already filtered
//! and grouped, to local clients such as `camelot-cli`.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to an
//! inner function taking the stores and an explicit `now`. The inner
//! functions are directly testable without axum dispatch machinery.
//!
//! Endpoints:
//! - GET    /health        - per-data-set load state and poll cadence
//! - GET    /summary       - fleet counts
//! - GET    /cameras       - camera snapshot
//! - POST   /cameras       - create a camera on the backend
//! - PATCH  /cameras/:id   - update a camera on the backend
//! - DELETE /cameras/:id   - delete a camera on the backend
//! - GET    /entities      - entity snapshot
//! - GET    /entities/:id  - one entity with dwell time and related events
//! - GET    /events        - filtered event feed
//! - GET    /timeline      - filtered events grouped by time or camera

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use camelot_core::config::PollingConfig;
use camelot_core::models::KindDescriptor;
use camelot_core::{
    filter_events, group_events, CamelotConfig, DataGateway, Event, FilterCriteria, GatewayError,
    GroupMode, Snapshot, SnapshotStatus, SourceCreate, SourceUpdate, TimeWindow,
};
use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::state::Stores;

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub stores: Arc<Stores>,
    pub gateway: Arc<dyn DataGateway>,
    pub config: CamelotConfig,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/summary", get(summary_handler))
        .route("/cameras", get(cameras_handler).post(create_camera_handler))
        .route(
            "/cameras/:id",
            axum::routing::patch(update_camera_handler).delete(delete_camera_handler),
        )
        .route("/entities", get(entities_handler))
        .route("/entities/:id", get(entity_handler))
        .route("/events", get(events_handler))
        .route("/timeline", get(timeline_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    stores: Arc<Stores>,
    gateway: Arc<dyn DataGateway>,
    config: CamelotConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.http.host, config.http.port);
    let state = Arc::new(HttpState {
        stores,
        gateway,
        config,
    });

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Camelot view API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

/// Query string shared by `/events` and `/timeline`.
///
/// `kinds` and `sources` are comma-separated lists.
#[derive(Debug, Deserialize, Default)]
pub struct FeedParams {
    pub q: Option<String>,
    pub kinds: Option<String>,
    pub sources: Option<String>,
    pub min_confidence: Option<String>,
    pub window: Option<String>,
    pub group_by: Option<String>,
}

impl FeedParams {
    pub fn criteria(&self) -> std::result::Result<FilterCriteria, String> {
        let kinds: BTreeSet<String> = split_list(self.kinds.as_deref())
            .map(|k| k.to_string())
            .collect();

        let source_ids = split_list(self.sources.as_deref())
            .map(|s| {
                s.parse::<i64>()
                    .map_err(|_| format!("invalid source id: {}", s))
            })
            .collect::<std::result::Result<BTreeSet<i64>, String>>()?;

        let min_confidence = match self.min_confidence.as_deref().map(str::trim) {
            None | Some("") => 0,
            Some(raw) => raw
                .parse::<u8>()
                .ok()
                .filter(|percent| *percent <= 100)
                .ok_or_else(|| format!("min_confidence must be 0-100, got {}", raw))?,
        };

        Ok(FilterCriteria {
            query: self.q.clone().unwrap_or_default(),
            kinds,
            source_ids,
            min_confidence_percent: min_confidence,
            time_window: TimeWindow::from_key(self.window.as_deref().unwrap_or("all")),
        })
    }
}

fn split_list(raw: Option<&str>) -> impl Iterator<Item = &str> {
    raw.unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// One feed row: the event as received plus its presentation descriptor.
#[derive(Debug, Serialize)]
pub struct FeedItem<'a> {
    #[serde(flatten)]
    pub event: &'a Event,
    pub descriptor: KindDescriptor,
}

impl<'a> From<&'a Event> for FeedItem<'a> {
    fn from(event: &'a Event) -> Self {
        Self {
            event,
            descriptor: event.kind.descriptor(),
        }
    }
}

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: "error".to_string(),
        }
    }
}

fn error_body(msg: impl Into<String>) -> serde_json::Value {
    serde_json::to_value(ErrorResponse::new(msg)).unwrap_or_default()
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

/// Inner health - load state of each snapshot and the poll cadence (pure, no IO).
pub fn health_inner(stores: &Stores, polling: &PollingConfig) -> serde_json::Value {
    serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "polling": {
            "events_interval_ms": polling.events_interval_ms,
            "fleet_interval_ms": polling.fleet_interval_ms,
        },
        "cameras": dataset_health(&stores.cameras.current()),
        "entities": dataset_health(&stores.entities.current()),
        "events": dataset_health(&stores.events.current()),
    })
}

fn dataset_health<T>(snapshot: &Snapshot<T>) -> serde_json::Value {
    serde_json::json!({
        "status": snapshot.status(),
        "count": snapshot.len(),
        "loaded_at": snapshot.loaded_at(),
        "last_error": snapshot.last_error(),
    })
}

/// The body a view should show for a snapshot that has never loaded.
fn unavailable(status: &SnapshotStatus) -> Option<(StatusCode, serde_json::Value)> {
    match status {
        SnapshotStatus::Loading => Some((
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({ "status": "loading" }),
        )),
        SnapshotStatus::Failed { error } => {
            Some((StatusCode::SERVICE_UNAVAILABLE, error_body(error.clone())))
        }
        SnapshotStatus::Ready { .. } => None,
    }
}

/// Inner events - filter the current events snapshot at `now`.
pub fn events_inner(
    stores: &Stores,
    params: &FeedParams,
    now: DateTime<Utc>,
) -> (StatusCode, serde_json::Value) {
    let criteria = match params.criteria() {
        Ok(c) => c,
        Err(e) => return (StatusCode::BAD_REQUEST, error_body(e)),
    };

    let snapshot = stores.events.current();
    if let Some(response) = unavailable(&snapshot.status()) {
        return response;
    }

    let visible = filter_events(snapshot.records(), &criteria, now);
    let items: Vec<FeedItem<'_>> = visible.iter().copied().map(FeedItem::from).collect();

    (
        StatusCode::OK,
        serde_json::json!({
            "events": items,
            "count": items.len(),
            "total": snapshot.len(),
            "stale": snapshot.is_stale(),
            "active_filters": criteria.active_filter_count(),
        }),
    )
}

/// Inner timeline - filter, then group by time (hours read in `tz`) or camera.
pub fn timeline_inner<Tz: TimeZone>(
    stores: &Stores,
    params: &FeedParams,
    now: DateTime<Utc>,
    tz: &Tz,
) -> (StatusCode, serde_json::Value) {
    let mode = match params.group_by.as_deref() {
        None => GroupMode::default(),
        Some(key) => match GroupMode::from_key(key) {
            Some(mode) => mode,
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    error_body(format!("unknown group_by: {}", key)),
                )
            }
        },
    };

    let criteria = match params.criteria() {
        Ok(c) => c,
        Err(e) => return (StatusCode::BAD_REQUEST, error_body(e)),
    };

    let snapshot = stores.events.current();
    if let Some(response) = unavailable(&snapshot.status()) {
        return response;
    }

    let visible: Vec<Event> = filter_events(snapshot.records(), &criteria, now)
        .into_iter()
        .cloned()
        .collect();
    let groups: Vec<serde_json::Value> = group_events(&visible, mode, now, tz)
        .into_iter()
        .map(|group| {
            let items: Vec<FeedItem<'_>> =
                group.events.iter().copied().map(FeedItem::from).collect();
            serde_json::json!({
                "key": group.key.to_string(),
                "label": group.label,
                "count": items.len(),
                "events": items,
            })
        })
        .collect();

    (
        StatusCode::OK,
        serde_json::json!({
            "group_by": mode,
            "groups": groups,
            "count": visible.len(),
            "stale": snapshot.is_stale(),
        }),
    )
}

/// Inner summary - fleet counts (pure, no IO).
pub fn summary_inner(stores: &Stores) -> serde_json::Value {
    serde_json::json!({
        "summary": stores.summary(),
        "stale": stores.cameras.current().is_stale() || stores.entities.current().is_stale(),
    })
}

pub fn cameras_inner(stores: &Stores) -> (StatusCode, serde_json::Value) {
    let snapshot = stores.cameras.current();
    if let Some(response) = unavailable(&snapshot.status()) {
        return response;
    }
    (
        StatusCode::OK,
        serde_json::json!({
            "cameras": snapshot.records(),
            "count": snapshot.len(),
            "stale": snapshot.is_stale(),
        }),
    )
}

pub fn entities_inner(stores: &Stores) -> (StatusCode, serde_json::Value) {
    let snapshot = stores.entities.current();
    if let Some(response) = unavailable(&snapshot.status()) {
        return response;
    }
    let entities: Vec<serde_json::Value> = snapshot
        .records()
        .iter()
        .map(|e| {
            serde_json::json!({
                "entity": e,
                "descriptor": e.kind.descriptor(),
            })
        })
        .collect();
    (
        StatusCode::OK,
        serde_json::json!({
            "entities": entities,
            "count": snapshot.len(),
            "stale": snapshot.is_stale(),
        }),
    )
}

/// Inner entity detail - 404 once the id has left the snapshot.
pub fn entity_inner(stores: &Stores, id: i64) -> (StatusCode, serde_json::Value) {
    let entities = stores.entities.current();
    let entity = match entities.find(id) {
        Some(e) => e,
        None => {
            return (
                StatusCode::NOT_FOUND,
                error_body(format!("entity {} not in current snapshot", id)),
            )
        }
    };

    let events = stores.events.current();
    let related: Vec<FeedItem<'_>> = entity
        .related_events(events.records())
        .into_iter()
        .map(FeedItem::from)
        .collect();

    (
        StatusCode::OK,
        serde_json::json!({
            "entity": entity,
            "descriptor": entity.kind.descriptor(),
            "dwell_seconds": entity.dwell_seconds(),
            "related_events": related,
        }),
    )
}

/// Map a backend failure on a camera mutation to an HTTP reply.
fn gateway_failure(e: GatewayError) -> (StatusCode, serde_json::Value) {
    let status = match &e {
        GatewayError::Api { code, .. } if (400..500).contains(code) => {
            StatusCode::from_u16(*code).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        _ => StatusCode::BAD_GATEWAY,
    };
    tracing::warn!(error = %e, "Camera mutation failed");
    (status, error_body(e.to_string()))
}

pub async fn create_camera_inner(
    gateway: &dyn DataGateway,
    camera: SourceCreate,
) -> (StatusCode, serde_json::Value) {
    if camera.name.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, error_body("name is required"));
    }
    match gateway.create_camera(&camera).await {
        Ok(created) => (StatusCode::CREATED, serde_json::json!({ "camera": created })),
        Err(e) => gateway_failure(e),
    }
}

pub async fn update_camera_inner(
    gateway: &dyn DataGateway,
    id: i64,
    update: SourceUpdate,
) -> (StatusCode, serde_json::Value) {
    if update.is_empty() {
        return (StatusCode::BAD_REQUEST, error_body("no fields to update"));
    }
    match gateway.update_camera(id, &update).await {
        Ok(updated) => (StatusCode::OK, serde_json::json!({ "camera": updated })),
        Err(e) => gateway_failure(e),
    }
}

pub async fn delete_camera_inner(
    gateway: &dyn DataGateway,
    id: i64,
) -> (StatusCode, serde_json::Value) {
    match gateway.delete_camera(id).await {
        Ok(()) => (StatusCode::OK, serde_json::json!({ "deleted": true, "id": id })),
        Err(e) => gateway_failure(e),
    }
}

// ============================================================================
// Axum handler wrappers (thin - delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(health_inner(&state.stores, &state.config.polling)))
}

pub async fn summary_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(summary_inner(&state.stores)))
}

pub async fn cameras_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = cameras_inner(&state.stores);
    (status, Json(body))
}

pub async fn create_camera_handler(
    State(state): State<Arc<HttpState>>,
    Json(camera): Json<SourceCreate>,
) -> impl IntoResponse {
    let (status, body) = create_camera_inner(state.gateway.as_ref(), camera).await;
    (status, Json(body))
}

pub async fn update_camera_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<i64>,
    Json(update): Json<SourceUpdate>,
) -> impl IntoResponse {
    let (status, body) = update_camera_inner(state.gateway.as_ref(), id, update).await;
    (status, Json(body))
}

pub async fn delete_camera_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let (status, body) = delete_camera_inner(state.gateway.as_ref(), id).await;
    (status, Json(body))
}

pub async fn entities_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = entities_inner(&state.stores);
    (status, Json(body))
}

pub async fn entity_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let (status, body) = entity_inner(&state.stores, id);
    (status, Json(body))
}

pub async fn events_handler(
    State(state): State<Arc<HttpState>>,
    Query(params): Query<FeedParams>,
) -> impl IntoResponse {
    let (status, body) = events_inner(&state.stores, &params, Utc::now());
    (status, Json(body))
}

pub async fn timeline_handler(
    State(state): State<Arc<HttpState>>,
    Query(params): Query<FeedParams>,
) -> impl IntoResponse {
    let (status, body) = timeline_inner(&state.stores, &params, Utc::now(), &Local);
    (status, Json(body))
}

// ============================================================================
// Unit Tests - call inner functions directly
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use camelot_core::models::{Entity, GeoPoint, ObjectKind};
    use chrono::Duration;
    use tokio_util::sync::CancellationToken;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
    }

    fn event(id: i64, source_id: i64, kind: &str, confidence: f64, age: Duration) -> Event {
        Event {
            id,
            source_id,
            kind: ObjectKind::from(kind),
            confidence,
            metadata: Default::default(),
            timestamp: now() - age,
        }
    }

    fn entity(id: i64, source_id: i64) -> Entity {
        Entity {
            id,
            external_id: format!("trk-{}", id),
            kind: ObjectKind::Vehicle,
            position: GeoPoint {
                latitude: 1.0,
                longitude: 2.0,
            },
            source_id,
            confidence: 0.8,
            first_seen: now() - Duration::seconds(45),
            last_seen: now(),
            active: true,
            recognized: false,
            recognized_label: None,
        }
    }

    fn loaded_stores() -> Stores {
        let stores = Stores::new();
        let token = CancellationToken::new();
        stores.events.replace(
            vec![
                event(1, 1, "person", 0.9, Duration::seconds(20)),
                event(2, 2, "vehicle", 0.6, Duration::minutes(3)),
                event(3, 1, "motion", 0.2, Duration::minutes(20)),
                event(4, 3, "animal", 0.7, Duration::hours(3)),
            ],
            &token,
        );
        stores.entities.replace(vec![entity(10, 1)], &token);
        stores
    }

    fn ids(body: &serde_json::Value, field: &str) -> Vec<i64> {
        body[field]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["id"].as_i64().unwrap())
            .collect()
    }

    #[test]
    fn test_events_inner_unfiltered() {
        let stores = loaded_stores();
        let (status, body) = events_inner(&stores, &FeedParams::default(), now());
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ids(&body, "events"), vec![1, 2, 3, 4]);
        assert_eq!(body["stale"], false);
        assert_eq!(body["events"][0]["camera_id"], 1);
        assert_eq!(body["events"][0]["event_type"], "person");
        assert_eq!(body["events"][0]["descriptor"]["color"], "yellow");
    }

    #[test]
    fn test_events_inner_applies_filters() {
        let stores = loaded_stores();
        let params = FeedParams {
            kinds: Some("person, motion,vehicle".to_string()),
            sources: Some("1".to_string()),
            min_confidence: Some("50".to_string()),
            ..Default::default()
        };
        let (status, body) = events_inner(&stores, &params, now());
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ids(&body, "events"), vec![1]);
        assert_eq!(body["active_filters"], 5);
        assert_eq!(body["total"], 4);
    }

    #[test]
    fn test_events_inner_rejects_bad_source() {
        let stores = loaded_stores();
        let params = FeedParams {
            sources: Some("1,abc".to_string()),
            ..Default::default()
        };
        let (status, body) = events_inner(&stores, &params, now());
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }

    #[test]
    fn test_events_inner_before_first_load() {
        let stores = Stores::new();
        let (status, body) = events_inner(&stores, &FeedParams::default(), now());
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "loading");

        stores
            .events
            .record_failure("connection refused", &CancellationToken::new());
        let (status, body) = events_inner(&stores, &FeedParams::default(), now());
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "connection refused");
    }

    #[test]
    fn test_events_inner_serves_stale_data_after_failure() {
        let stores = loaded_stores();
        stores
            .events
            .record_failure("timeout", &CancellationToken::new());
        let (status, body) = events_inner(&stores, &FeedParams::default(), now());
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 4);
        assert_eq!(body["stale"], true);
    }

    #[test]
    fn test_timeline_inner_by_time() {
        let stores = loaded_stores();
        let (status, body) = timeline_inner(&stores, &FeedParams::default(), now(), &Utc);
        assert_eq!(status, StatusCode::OK);

        let keys: Vec<&str> = body["groups"]
            .as_array()
            .unwrap()
            .iter()
            .map(|g| g["key"].as_str().unwrap())
            .collect();
        assert_eq!(keys, vec!["0-1", "1-5", "15-30", "09:00"]);
        assert_eq!(body["groups"][0]["label"], "Just Now");
        assert_eq!(body["group_by"], "time");
    }

    #[test]
    fn test_timeline_inner_by_camera() {
        let stores = loaded_stores();
        let params = FeedParams {
            group_by: Some("camera".to_string()),
            ..Default::default()
        };
        let (status, body) = timeline_inner(&stores, &params, now(), &Utc);
        assert_eq!(status, StatusCode::OK);
        let groups = body["groups"].as_array().unwrap();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0]["label"], "001");
        assert_eq!(groups[0]["count"], 2);
    }

    #[test]
    fn test_timeline_inner_unknown_group_by() {
        let stores = loaded_stores();
        let params = FeedParams {
            group_by: Some("weekday".to_string()),
            ..Default::default()
        };
        let (status, _) = timeline_inner(&stores, &params, now(), &Utc);
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_entity_inner_found_and_missing() {
        let stores = loaded_stores();
        let (status, body) = entity_inner(&stores, 10);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["dwell_seconds"], 45);
        assert_eq!(ids(&body, "related_events"), vec![1, 3]);

        let (status, _) = entity_inner(&stores, 11);
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_health_inner_reports_each_dataset() {
        let stores = loaded_stores();
        let polling = PollingConfig {
            events_interval_ms: 750,
            fleet_interval_ms: 4000,
        };
        let body = health_inner(&stores, &polling);
        assert_eq!(body["events"]["status"]["state"], "ready");
        assert_eq!(body["events"]["count"], 4);
        assert_eq!(body["cameras"]["status"]["state"], "loading");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["polling"]["events_interval_ms"], 750);
        assert_eq!(body["polling"]["fleet_interval_ms"], 4000);
    }

    #[test]
    fn test_summary_inner_counts() {
        let stores = loaded_stores();
        let body = summary_inner(&stores);
        assert_eq!(body["summary"]["entities_total"], 1);
        assert_eq!(body["summary"]["cameras_total"], 0);
    }

    #[test]
    fn test_params_min_confidence_out_of_range() {
        for raw in ["101", "300", "-1", "high"] {
            let params = FeedParams {
                min_confidence: Some(raw.to_string()),
                ..Default::default()
            };
            let err = params.criteria().unwrap_err();
            assert!(err.contains(raw), "{}", err);
        }

        let params = FeedParams {
            min_confidence: Some("100".to_string()),
            ..Default::default()
        };
        assert_eq!(params.criteria().unwrap().min_confidence_percent, 100);
    }

    #[test]
    fn test_params_unknown_window_is_unrestricted() {
        let params = FeedParams {
            window: Some("90d".to_string()),
            ..Default::default()
        };
        assert_eq!(params.criteria().unwrap().time_window, TimeWindow::All);
    }
}
