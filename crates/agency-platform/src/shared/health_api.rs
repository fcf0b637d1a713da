//! Health Check Endpoints
//!
//! - /health - Combined health status
//! - /health/live - Liveness probe

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Up,
    Down,
}

/// Individual health check result
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Full health response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<HealthCheck>,
}

/// Health service state
#[derive(Clone)]
pub struct HealthState {
    /// Database for connectivity check; absent for the in-memory store
    pub db: Option<mongodb::Database>,
    pub version: String,
}

impl HealthState {
    pub fn new(db: Option<mongodb::Database>, version: impl Into<String>) -> Self {
        Self {
            db,
            version: version.into(),
        }
    }
}

async fn check_mongo(db: &mongodb::Database) -> HealthCheck {
    let start = std::time::Instant::now();

    match db.run_command(mongodb::bson::doc! { "ping": 1 }).await {
        Ok(_) => HealthCheck {
            name: "mongodb".to_string(),
            status: HealthStatus::Up,
            message: None,
            duration_ms: Some(start.elapsed().as_millis() as u64),
        },
        Err(e) => {
            tracing::warn!(error = %e, "MongoDB health check failed");
            HealthCheck {
                name: "mongodb".to_string(),
                status: HealthStatus::Down,
                message: Some("Connection failed".to_string()),
                duration_ms: Some(start.elapsed().as_millis() as u64),
            }
        }
    }
}

/// Combined health check
pub async fn get_health(State(state): State<HealthState>) -> Response {
    let mut checks = Vec::new();
    let mut overall_status = HealthStatus::Up;

    if let Some(db) = &state.db {
        let check = check_mongo(db).await;
        if check.status == HealthStatus::Down {
            overall_status = HealthStatus::Down;
        }
        checks.push(check);
    }

    let response = HealthResponse {
        status: overall_status,
        timestamp: Utc::now(),
        version: state.version.clone(),
        checks,
    };

    let status_code = if overall_status == HealthStatus::Down {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status_code, Json(response)).into_response()
}

/// Liveness probe
pub async fn get_liveness() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": HealthStatus::Up }))
}

/// Create the health router
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/health/live", get(get_liveness))
        .with_state(state)
}
