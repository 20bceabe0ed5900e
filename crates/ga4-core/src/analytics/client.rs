//! Data API Client
//!
//! Authenticated HTTP access to the GA4 Data API v1beta. Success bodies are
//! relayed verbatim as JSON; error bodies are reduced to a status plus
//! Google's message.

use std::sync::Arc;

use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::auth::{AuthError, TokenBroker};
use crate::http;

/// Base URL of the GA4 Data API.
pub const DATA_API_BASE: &str = "https://analyticsdata.googleapis.com/v1beta";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
    #[error("HTTP request failed: {0}")]
    Transport(String),
    #[error("Google API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("rate limited by the Data API; try again later")]
    RateLimited,
    #[error("failed to parse API response: {0}")]
    InvalidResponse(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ApiError {
    /// HTTP status of the upstream failure, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Query surface the tool layer depends on. `DataApiClient` implements it
/// against the live API; tests substitute a stub.
#[allow(async_fn_in_trait)]
pub trait AnalyticsData {
    /// POST `properties/{id}:runReport`.
    async fn run_report(&self, property_id: &str, body: &Value) -> Result<Value, ApiError>;
    /// POST `properties/{id}:runRealtimeReport`.
    async fn run_realtime_report(&self, property_id: &str, body: &Value) -> Result<Value, ApiError>;
    /// GET `properties/{id}/metadata`, the full dimension/metric catalog.
    async fn metadata(&self, property_id: &str) -> Result<Value, ApiError>;
}

/// Live Data API client. Tokens come from the broker per call, so refresh
/// stays invisible to callers.
pub struct DataApiClient {
    http: reqwest::Client,
    broker: Arc<TokenBroker>,
}

impl DataApiClient {
    pub fn new(broker: Arc<TokenBroker>) -> Result<Self, ApiError> {
        let http = http::build_client().map_err(|e| ApiError::ClientBuild(e.to_string()))?;
        Ok(Self { http, broker })
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value, ApiError> {
        let token = self.broker.access_token().await?;
        let builder = self.http.post(url).bearer_auth(token).json(body);
        execute(builder).await
    }

    async fn get(&self, url: &str) -> Result<Value, ApiError> {
        let token = self.broker.access_token().await?;
        let builder = self.http.get(url).bearer_auth(token);
        execute(builder).await
    }
}

impl AnalyticsData for DataApiClient {
    async fn run_report(&self, property_id: &str, body: &Value) -> Result<Value, ApiError> {
        debug!("runReport for property {}", property_id);
        self.post(&format!("{}/properties/{}:runReport", DATA_API_BASE, property_id), body)
            .await
    }

    async fn run_realtime_report(&self, property_id: &str, body: &Value) -> Result<Value, ApiError> {
        debug!("runRealtimeReport for property {}", property_id);
        self.post(
            &format!("{}/properties/{}:runRealtimeReport", DATA_API_BASE, property_id),
            body,
        )
        .await
    }

    async fn metadata(&self, property_id: &str) -> Result<Value, ApiError> {
        debug!("metadata fetch for property {}", property_id);
        self.get(&format!("{}/properties/{}/metadata", DATA_API_BASE, property_id))
            .await
    }
}

/// Execute a request and reduce Google's response patterns to a result.
async fn execute(builder: RequestBuilder) -> Result<Value, ApiError> {
    let response = builder
        .send()
        .await
        .map_err(|e| ApiError::Transport(e.to_string()))?;

    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        warn!("Rate limited by the Data API");
        return Err(ApiError::RateLimited);
    }

    let body = response
        .text()
        .await
        .map_err(|e| ApiError::Transport(format!("failed to read response body: {}", e)))?;

    if status.is_success() && body.is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }

    let parsed: Value = serde_json::from_str(&body)
        .map_err(|e| ApiError::InvalidResponse(format!("{} (body: {})", e, body)))?;

    if !status.is_success() {
        let message = extract_error_message(&parsed, status);
        error!("Data API error: {}", message);
        return Err(ApiError::Api {
            status: status.as_u16(),
            message,
        });
    }

    Ok(parsed)
}

/// Pull the human-readable message out of a Google error body:
/// `{"error": {"code": 403, "message": "...", "status": "PERMISSION_DENIED"}}`
fn extract_error_message(response: &Value, status: StatusCode) -> String {
    if let Some(error_obj) = response.get("error") {
        if let Some(message) = error_obj.get("message").and_then(|v| v.as_str()) {
            return message.to_string();
        }
    }
    format!("HTTP {} error", status)
}
