//! Roles Admin API
//!
//! REST endpoints for role management.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::role::entity::{Role, RoleDefaults};
use crate::role::repository::RoleRepository;
use crate::shared::api_common::{optional, required, ApiResponse, JsonBody};
use crate::shared::authorization::checks;
use crate::shared::error::PlatformError;
use crate::shared::middleware::Authenticated;
use crate::user::repository::UserRepository;

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Role response DTO
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleResponse {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub created_by: Option<String>,
    /// Seeded role that cannot be deleted
    pub is_default: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl RoleResponse {
    fn from_role(r: Role, defaults: &RoleDefaults) -> Self {
        Self {
            is_default: defaults.is_default_role(&r.id),
            id: r.id,
            title: r.title,
            description: r.description,
            created_by: r.created_by,
            created_at: r.created_at.to_rfc3339(),
            updated_at: r.updated_at.to_rfc3339(),
        }
    }
}

/// Roles service state
#[derive(Clone)]
pub struct RolesState {
    pub role_repo: Arc<dyn RoleRepository>,
    pub user_repo: Arc<dyn UserRepository>,
    pub roles: RoleDefaults,
}

pub async fn list_roles(
    State(state): State<RolesState>,
    auth: Authenticated,
) -> Result<Json<ApiResponse<Vec<RoleResponse>>>, PlatformError> {
    checks::require_admin(&auth, &state.roles)?;

    let roles = state.role_repo.find_all().await?;
    let roles = roles
        .into_iter()
        .map(|r| RoleResponse::from_role(r, &state.roles))
        .collect();
    Ok(ApiResponse::ok("Roles fetched", roles))
}

pub async fn create_role(
    State(state): State<RolesState>,
    auth: Authenticated,
    JsonBody(req): JsonBody<CreateRoleRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RoleResponse>>), PlatformError> {
    checks::require_admin(&auth, &state.roles)?;

    let title = required(req.title, "Title")?;
    if state.role_repo.find_by_title(&title).await?.is_some() {
        return Err(PlatformError::duplicate("Role", "title", &title));
    }

    let mut role = Role::new(&title).with_created_by(&auth.user_id);
    role.description = optional(req.description);
    state.role_repo.insert(&role).await?;

    Ok(ApiResponse::created("Role created", RoleResponse::from_role(role, &state.roles)))
}

pub async fn update_role(
    State(state): State<RolesState>,
    auth: Authenticated,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateRoleRequest>,
) -> Result<Json<ApiResponse<RoleResponse>>, PlatformError> {
    checks::require_admin(&auth, &state.roles)?;

    let mut role = state
        .role_repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| PlatformError::not_found("Role", &id))?;

    if let Some(title) = optional(req.title) {
        if title != role.title {
            if state.roles.is_default_role(&role.id) {
                return Err(PlatformError::validation("Default roles cannot be renamed"));
            }
            if state.role_repo.find_by_title(&title).await?.is_some() {
                return Err(PlatformError::duplicate("Role", "title", &title));
            }
            role.title = title;
        }
    }
    if let Some(description) = req.description {
        role.description = optional(Some(description));
    }
    role.updated_at = Utc::now();

    state.role_repo.update(&role).await?;
    Ok(ApiResponse::ok("Role updated", RoleResponse::from_role(role, &state.roles)))
}

/// Soft delete a role. Default roles and roles still assigned to users stay.
pub async fn delete_role(
    State(state): State<RolesState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, PlatformError> {
    checks::require_admin(&auth, &state.roles)?;

    if state.roles.is_default_role(&id) {
        return Err(PlatformError::validation("Default roles cannot be deleted"));
    }

    let in_use = state
        .user_repo
        .find_all()
        .await?
        .iter()
        .any(|u| u.role_id == id);
    if in_use {
        return Err(PlatformError::validation("Role is assigned to users"));
    }

    if !state.role_repo.soft_delete(&id, Utc::now()).await? {
        return Err(PlatformError::not_found("Role", &id));
    }
    Ok(ApiResponse::ok("Role deleted", ()))
}

pub fn roles_router(state: RolesState) -> Router {
    Router::new()
        .route("/api/admin/roles", get(list_roles).post(create_role))
        .route("/api/admin/roles/:id", patch(update_role).delete(delete_role))
        .with_state(state)
}
