//! Service Catalog API
//!
//! Browsing for signed-in users; editing for admins.

use axum::{
    extract::{Path, State},
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::catalog::catalog_service::{CatalogService, PlanInput, ServiceChanges};
use crate::catalog::entity::{Plan, Service};
use crate::catalog::form_schema::{FieldDefinition, FormStep};
use crate::role::entity::RoleDefaults;
use crate::shared::api_common::{optional, required, ApiResponse, JsonBody};
use crate::shared::authorization::checks;
use crate::shared::error::PlatformError;
use crate::shared::middleware::Authenticated;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    pub id: Option<String>,
    pub name: Option<String>,
    pub price_cents: Option<i64>,
    #[serde(default)]
    pub features: Vec<String>,
}

impl PlanRequest {
    fn into_input(self) -> Result<PlanInput, PlatformError> {
        Ok(PlanInput {
            id: self.id,
            name: required(self.name, "Plan name")?,
            price_cents: self
                .price_cents
                .ok_or_else(|| PlatformError::validation("Plan price is required"))?,
            features: self.features,
        })
    }
}

fn plan_inputs(plans: Vec<PlanRequest>) -> Result<Vec<PlanInput>, PlatformError> {
    plans.into_iter().map(PlanRequest::into_input).collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServiceRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub plans: Vec<PlanRequest>,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateServiceRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub plans: Option<Vec<PlanRequest>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub plans: Vec<Plan>,
    pub fields: Vec<FieldDefinition>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Service> for ServiceResponse {
    fn from(s: Service) -> Self {
        Self {
            id: s.id,
            name: s.name,
            description: s.description,
            plans: s.plans,
            fields: s.form.fields,
            created_at: s.created_at.to_rfc3339(),
            updated_at: s.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormResponse<'a> {
    pub service_id: &'a str,
    pub steps: Vec<FormStep<'a>>,
}

#[derive(Clone)]
pub struct CatalogState {
    pub catalog: Arc<CatalogService>,
    pub roles: RoleDefaults,
}

pub async fn list_services(
    State(state): State<CatalogState>,
    _auth: Authenticated,
) -> Result<Json<ApiResponse<Vec<ServiceResponse>>>, PlatformError> {
    let services = state.catalog.list().await?;
    Ok(ApiResponse::ok(
        "Services fetched",
        services.into_iter().map(Into::into).collect(),
    ))
}

pub async fn get_service(
    State(state): State<CatalogState>,
    _auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ServiceResponse>>, PlatformError> {
    let service = state.catalog.get(&id).await?;
    Ok(ApiResponse::ok("Service fetched", service.into()))
}

/// Form fields grouped for multi-step rendering
pub async fn get_service_form(
    State(state): State<CatalogState>,
    _auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, PlatformError> {
    let service = state.catalog.get(&id).await?;
    let form = FormResponse {
        service_id: &service.id,
        steps: service.form.steps(),
    };
    Ok(ApiResponse::ok("Service form fetched", serde_json::to_value(form)?))
}

pub async fn delete_service(
    State(state): State<CatalogState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, PlatformError> {
    checks::require_admin(&auth, &state.roles)?;
    state.catalog.delete(&id).await?;
    Ok(ApiResponse::ok("Service deleted", ()))
}

pub async fn create_service(
    State(state): State<CatalogState>,
    auth: Authenticated,
    JsonBody(req): JsonBody<CreateServiceRequest>,
) -> Result<(axum::http::StatusCode, Json<ApiResponse<ServiceResponse>>), PlatformError> {
    checks::require_admin(&auth, &state.roles)?;

    let name = required(req.name, "Name")?;
    let service = state
        .catalog
        .create(
            &name,
            optional(req.description),
            plan_inputs(req.plans)?,
            req.fields,
            &auth.user_id,
        )
        .await?;

    Ok(ApiResponse::created("Service created", service.into()))
}

pub async fn update_service(
    State(state): State<CatalogState>,
    auth: Authenticated,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateServiceRequest>,
) -> Result<Json<ApiResponse<ServiceResponse>>, PlatformError> {
    checks::require_admin(&auth, &state.roles)?;

    let changes = ServiceChanges {
        name: req.name,
        description: optional(req.description),
        plans: req.plans.map(plan_inputs).transpose()?,
    };
    let service = state.catalog.update(&id, changes).await?;
    Ok(ApiResponse::ok("Service updated", service.into()))
}

/// Add a form field, or replace the one whose id is supplied
pub async fn define_field(
    State(state): State<CatalogState>,
    auth: Authenticated,
    Path(id): Path<String>,
    JsonBody(field): JsonBody<FieldDefinition>,
) -> Result<Json<ApiResponse<FieldDefinition>>, PlatformError> {
    checks::require_admin(&auth, &state.roles)?;
    let field = state.catalog.define_field(&id, field).await?;
    Ok(ApiResponse::ok("Field saved", field))
}

pub async fn remove_field(
    State(state): State<CatalogState>,
    auth: Authenticated,
    Path((id, name)): Path<(String, String)>,
) -> Result<Json<ApiResponse<ServiceResponse>>, PlatformError> {
    checks::require_admin(&auth, &state.roles)?;
    let service = state.catalog.remove_field(&id, &name).await?;
    Ok(ApiResponse::ok("Field removed", service.into()))
}

pub fn catalog_router(state: CatalogState) -> Router {
    Router::new()
        .route("/api/services", get(list_services))
        .route("/api/services/:id", get(get_service).delete(delete_service))
        .route("/api/services/:id/form", get(get_service_form))
        .route("/api/admin/services", post(create_service))
        .route("/api/admin/services/:id", patch(update_service))
        .route("/api/admin/services/:id/fields", put(define_field))
        .route("/api/admin/services/:id/fields/:name", delete(remove_field))
        .with_state(state)
}
