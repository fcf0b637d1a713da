//! Service Request API

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::role::entity::RoleDefaults;
use crate::service_request::entity::{RequestStatus, ServiceRequest};
use crate::service_request::request_service::{RequestService, Submission};
use crate::shared::api_common::{optional, required, ApiResponse, JsonBody};
use crate::shared::authorization::checks;
use crate::shared::error::PlatformError;
use crate::shared::middleware::Authenticated;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServiceRequestBody {
    pub service_id: Option<String>,
    pub plan_id: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub form_data: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusBody {
    pub status: Option<RequestStatus>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequestResponse {
    pub id: String,
    pub service_id: String,
    pub plan_id: String,
    pub user_id: String,
    pub message: Option<String>,
    pub form_data: IndexMap<String, serde_json::Value>,
    pub status: RequestStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ServiceRequest> for ServiceRequestResponse {
    fn from(r: ServiceRequest) -> Self {
        Self {
            id: r.id,
            service_id: r.service_id,
            plan_id: r.plan_id,
            user_id: r.user_id,
            message: r.message,
            form_data: r.form_data,
            status: r.status,
            created_at: r.created_at.to_rfc3339(),
            updated_at: r.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Clone)]
pub struct ServiceRequestState {
    pub requests: Arc<RequestService>,
    pub roles: RoleDefaults,
}

fn responses(requests: Vec<ServiceRequest>) -> Vec<ServiceRequestResponse> {
    requests.into_iter().map(Into::into).collect()
}

pub async fn create_request(
    State(state): State<ServiceRequestState>,
    auth: Authenticated,
    JsonBody(body): JsonBody<CreateServiceRequestBody>,
) -> Result<(StatusCode, Json<ApiResponse<ServiceRequestResponse>>), PlatformError> {
    let submission = Submission {
        service_id: required(body.service_id, "Service")?,
        plan_id: required(body.plan_id, "Plan")?,
        message: optional(body.message),
        values: body.form_data,
    };

    let request = state.requests.submit(&auth.user_id, submission).await?;
    Ok(ApiResponse::created("Service request created", request.into()))
}

/// The caller's own requests
pub async fn list_my_requests(
    State(state): State<ServiceRequestState>,
    auth: Authenticated,
) -> Result<Json<ApiResponse<Vec<ServiceRequestResponse>>>, PlatformError> {
    let requests = state.requests.list_for_user(&auth.user_id).await?;
    Ok(ApiResponse::ok("Service requests fetched", responses(requests)))
}

pub async fn get_request(
    State(state): State<ServiceRequestState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ServiceRequestResponse>>, PlatformError> {
    let request = state.requests.get(&id).await?;
    checks::require_self_or_admin(&auth, &request.user_id, &state.roles)?;
    Ok(ApiResponse::ok("Service request fetched", request.into()))
}

pub async fn list_all_requests(
    State(state): State<ServiceRequestState>,
    auth: Authenticated,
) -> Result<Json<ApiResponse<Vec<ServiceRequestResponse>>>, PlatformError> {
    checks::require_admin(&auth, &state.roles)?;
    let requests = state.requests.list_all().await?;
    Ok(ApiResponse::ok("Service requests fetched", responses(requests)))
}

pub async fn update_request_status(
    State(state): State<ServiceRequestState>,
    auth: Authenticated,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<UpdateStatusBody>,
) -> Result<Json<ApiResponse<ServiceRequestResponse>>, PlatformError> {
    checks::require_admin(&auth, &state.roles)?;

    let status = body
        .status
        .ok_or_else(|| PlatformError::validation("Status is required"))?;
    let request = state.requests.update_status(&id, status).await?;
    Ok(ApiResponse::ok("Service request updated", request.into()))
}

pub fn service_requests_router(state: ServiceRequestState) -> Router {
    Router::new()
        .route("/api/service-requests", get(list_my_requests).post(create_request))
        .route("/api/service-requests/:id", get(get_request))
        .route("/api/admin/service-requests", get(list_all_requests))
        .route("/api/admin/service-requests/:id/status", patch(update_request_status))
        .with_state(state)
}
