//! JSON-over-HTTP event transport.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use beacon_core::config::TransportConfig;
use beacon_core::error::{AppError, ErrorKind};
use beacon_core::result::AppResult;
use beacon_core::types::EventId;
use beacon_entity::event::{EventPayload, EventRecord};
use beacon_worker::{DeliveryOutcome, EventTransport};

/// Header carrying the application identifier.
pub const APP_ID_HEADER: &str = "x-beacon-app-id";

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    events: Vec<WireEvent<'a>>,
}

#[derive(Debug, Serialize)]
struct WireEvent<'a> {
    id: EventId,
    event_type: &'a str,
    event_name: &'a str,
    event_code: u16,
    payload: &'a EventPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_identity: Option<&'a str>,
    attempt: u32,
    created_at: DateTime<Utc>,
}

impl<'a> From<&'a EventRecord> for WireEvent<'a> {
    fn from(record: &'a EventRecord) -> Self {
        Self {
            id: record.id,
            event_type: record.event_type.as_str(),
            event_name: record.event_name.as_str(),
            event_code: record.code(),
            payload: &record.payload,
            user_identity: record.user_identity.as_deref(),
            attempt: record.attempts,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    #[serde(default)]
    results: Option<Vec<DeliveryOutcome>>,
}

/// Posts event batches to the configured endpoint.
///
/// A 2xx response may list one outcome per event under `results`; an
/// empty body accepts the whole batch. 408, 429 and 5xx responses make
/// the batch retryable and any other status rejects it.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    endpoint: String,
    app_id: String,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig, app_id: impl Into<String>) -> AppResult<Self> {
        let endpoint = config.endpoint.trim().to_string();
        if endpoint.is_empty() {
            return Err(AppError::configuration("transport.endpoint must not be empty"));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .build()
            .map_err(|e| {
                AppError::with_source(ErrorKind::Configuration, "Failed to build HTTP client", e)
            })?;
        Ok(Self {
            endpoint,
            app_id: app_id.into(),
            api_key: config.api_key.clone(),
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn is_retryable(status: StatusCode) -> bool {
        status.is_server_error()
            || status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
    }
}

#[async_trait]
impl EventTransport for HttpTransport {
    async fn send(&self, batch: &[EventRecord]) -> AppResult<Vec<DeliveryOutcome>> {
        let body = BatchRequest {
            events: batch.iter().map(WireEvent::from).collect(),
        };

        let mut request = self
            .http
            .post(&self.endpoint)
            .header(APP_ID_HEADER, &self.app_id)
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            AppError::with_source(ErrorKind::Transport, "Event batch request failed", e)
        })?;
        let status = response.status();

        if !status.is_success() {
            let reason = format!("backend responded {status}");
            warn!(status = %status, count = batch.len(), "Event batch not accepted");
            let outcome = if Self::is_retryable(status) {
                DeliveryOutcome::Retryable(reason)
            } else {
                DeliveryOutcome::Rejected(reason)
            };
            return Ok(vec![outcome; batch.len()]);
        }

        let bytes = response.bytes().await.map_err(|e| {
            AppError::with_source(ErrorKind::Transport, "Failed to read batch response", e)
        })?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            debug!(count = batch.len(), "Event batch accepted");
            return Ok(vec![DeliveryOutcome::Delivered; batch.len()]);
        }

        let parsed: BatchResponse = serde_json::from_slice(&bytes).map_err(|e| {
            AppError::with_source(ErrorKind::Transport, "Malformed batch response", e)
        })?;
        match parsed.results {
            Some(results) => Ok(results),
            None => Ok(vec![DeliveryOutcome::Delivered; batch.len()]),
        }
    }
}
