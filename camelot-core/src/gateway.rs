//! Remote data gateway for the camera backend
//!
//! Provides a `DataGateway` trait with one production implementation:
//! - **HttpGateway** - REST calls against `/cameras`, `/entities`, `/events`
//!
//! Every fetched snapshot is validated before it is handed out. A body that
//! does not decode, or that breaks a record invariant, is reported as an
//! error exactly like a transport failure so callers keep their last good
//! snapshot.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::config::BackendConfig;
use crate::models::{validate_snapshot, Entity, Event, Record, Source, SourceCreate, SourceUpdate};

// ============================================================================
// DataGateway trait
// ============================================================================

/// Abstraction over the backend the watch service polls.
#[async_trait]
pub trait DataGateway: Send + Sync {
    /// `GET /cameras`
    async fn cameras(&self) -> Result<Vec<Source>, GatewayError>;

    /// `GET /entities`
    async fn entities(&self) -> Result<Vec<Entity>, GatewayError>;

    /// `GET /events`
    async fn events(&self) -> Result<Vec<Event>, GatewayError>;

    /// `POST /cameras`
    async fn create_camera(&self, camera: &SourceCreate) -> Result<Source, GatewayError>;

    /// `PATCH /cameras/:id`
    async fn update_camera(&self, id: i64, update: &SourceUpdate) -> Result<Source, GatewayError>;

    /// `DELETE /cameras/:id`
    async fn delete_camera(&self, id: i64) -> Result<(), GatewayError>;

    /// Gateway name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

/// Gateway errors
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Malformed response from {path}: {reason}")]
    Malformed { path: String, reason: String },

    #[error("Invalid snapshot from {path}: {reason}")]
    InvalidSnapshot { path: String, reason: String },
}

/// FastAPI-style error body: `{"detail": "..."}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

// ============================================================================
// HttpGateway
// ============================================================================

/// Gateway backed by the REST API.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(config: &BackendConfig) -> Result<Self, GatewayError> {
        Self::with_timeout(config.base_url.clone(), config.timeout())
    }

    /// Create a gateway with an explicit base URL (for testing / integration)
    pub fn with_timeout(base_url: String, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
    }

    async fn fetch_snapshot<T>(&self, path: &str) -> Result<Vec<T>, GatewayError>
    where
        T: DeserializeOwned + Record,
    {
        let response = self.request(Method::GET, path).send().await?;
        let records: Vec<T> = decode(path, response).await?;

        validate_snapshot(&records).map_err(|reason| GatewayError::InvalidSnapshot {
            path: path.to_string(),
            reason,
        })?;

        tracing::debug!(path, count = records.len(), "Fetched snapshot");
        Ok(records)
    }
}

/// Check the status, then decode the body as `T`.
async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, GatewayError> {
    let response = check_status(response).await?;
    let body = response.text().await?;

    serde_json::from_str(&body).map_err(|e| GatewayError::Malformed {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

async fn check_status(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&error_body)
        .ok()
        .and_then(|e| e.detail)
        .map(|detail| match detail {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
        .unwrap_or(error_body);

    tracing::warn!(code = status.as_u16(), message = %message, "Backend API error");

    Err(GatewayError::Api {
        code: status.as_u16(),
        message,
    })
}

#[async_trait]
impl DataGateway for HttpGateway {
    async fn cameras(&self) -> Result<Vec<Source>, GatewayError> {
        self.fetch_snapshot("/cameras").await
    }

    async fn entities(&self) -> Result<Vec<Entity>, GatewayError> {
        self.fetch_snapshot("/entities").await
    }

    async fn events(&self) -> Result<Vec<Event>, GatewayError> {
        self.fetch_snapshot("/events").await
    }

    async fn create_camera(&self, camera: &SourceCreate) -> Result<Source, GatewayError> {
        let response = self
            .request(Method::POST, "/cameras")
            .json(camera)
            .send()
            .await?;
        decode("/cameras", response).await
    }

    async fn update_camera(&self, id: i64, update: &SourceUpdate) -> Result<Source, GatewayError> {
        let path = format!("/cameras/{}", id);
        let response = self
            .request(Method::PATCH, &path)
            .json(update)
            .send()
            .await?;
        decode(&path, response).await
    }

    async fn delete_camera(&self, id: i64) -> Result<(), GatewayError> {
        let path = format!("/cameras/{}", id);
        let response = self.request(Method::DELETE, &path).send().await?;
        check_status(response).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "http"
    }
}

// ============================================================================
// TESTS
// ============================================================================
