use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::alerts::{AlertNotification, RemediationRule};
use crate::remediation::{RemediationQueue, RemediationRecord};

/// Application state shared across handlers
pub struct AppState {
    pub rule: RemediationRule,
    pub queue: RemediationQueue,
}

impl AppState {
    pub fn new(rule: RemediationRule, queue: RemediationQueue) -> Self {
        Self { rule, queue }
    }
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub backend: &'static str,
    pub mode: String,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        backend: state.queue.backend(),
        mode: state.queue.mode().to_string(),
    })
}

// ============================================================================
// Alert Webhook
// ============================================================================

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AckResponse {
    pub status: String,
}

impl AckResponse {
    pub fn received() -> Self {
        Self {
            status: "received".to_string(),
        }
    }
}

/// Receive an alert notification.
///
/// Always acknowledges once the body is valid JSON; whether remediation
/// fired, and how it went, is only visible in the logs and `/remediations`.
pub async fn receive_alert(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<AckResponse>, ApiError> {
    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))?;

    let notification = AlertNotification::from_value(&payload);

    tracing::info!(
        receiver = notification.receiver.as_deref().unwrap_or("-"),
        status = notification.status.as_deref().unwrap_or("-"),
        group_key = notification.group_key.as_deref().unwrap_or("-"),
        alerts = notification.alerts.len(),
        payload = %payload,
        "Received alert"
    );

    for entry in state.rule.select(&notification) {
        tracing::warn!(
            alertname = %state.rule.alertname,
            severity = entry.severity().unwrap_or("unknown"),
            target = %state.rule.target,
            "Triggering self-healing"
        );

        state
            .queue
            .submit(
                state.rule.alertname.clone(),
                entry.fingerprint.clone(),
                state.rule.target.clone(),
            )
            .await;
    }

    Ok(Json(AckResponse::received()))
}

// ============================================================================
// Remediation History
// ============================================================================

#[derive(Deserialize)]
pub struct RemediationsQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct RemediationsResponse {
    pub remediations: Vec<RemediationRecord>,
    pub total: usize,
}

pub async fn list_remediations(
    State(state): State<Arc<AppState>>,
    params: Result<Query<RemediationsQuery>, QueryRejection>,
) -> Result<Json<RemediationsResponse>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let log = state.queue.log();
    let limit = params.limit.unwrap_or(50);

    Ok(Json(RemediationsResponse {
        remediations: log.recent(limit),
        total: log.len(),
    }))
}

pub async fn get_remediation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<RemediationRecord>, ApiError> {
    state
        .queue
        .log()
        .get(id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Remediation {} not found", id)))
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
