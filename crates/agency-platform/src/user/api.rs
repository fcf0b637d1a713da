//! Users API
//!
//! Self-service profile endpoints plus admin user management.

use axum::{
    extract::{Path, State},
    routing::{delete, get, patch},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::role::entity::RoleDefaults;
use crate::shared::api_common::{required, ApiResponse, JsonBody};
use crate::shared::authorization::checks;
use crate::shared::error::PlatformError;
use crate::shared::middleware::Authenticated;
use crate::user::entity::{User, UserStatus};
use crate::user::user_service::{ProfileChanges, UserService};

/// User as returned by the API. Never carries the password hash.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub role_id: String,
    pub status: UserStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            role_id: u.role_id,
            status: u.status,
            first_name: u.first_name,
            last_name: u.last_name,
            phone: u.phone,
            company_name: u.company_name,
            website: u.website,
            created_at: u.created_at.to_rfc3339(),
            updated_at: u.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub website: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRoleRequest {
    pub role_id: Option<String>,
}

#[derive(Clone)]
pub struct UsersState {
    pub users: Arc<UserService>,
    pub roles: RoleDefaults,
}

pub async fn get_me(
    State(state): State<UsersState>,
    auth: Authenticated,
) -> Result<Json<ApiResponse<UserResponse>>, PlatformError> {
    let user = state.users.get(&auth.user_id).await?;
    Ok(ApiResponse::ok("User fetched", user.into()))
}

/// Fill in or change profile details
pub async fn update_me(
    State(state): State<UsersState>,
    auth: Authenticated,
    JsonBody(req): JsonBody<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, PlatformError> {
    let changes = ProfileChanges {
        first_name: req.first_name,
        last_name: req.last_name,
        phone: req.phone,
        company_name: req.company_name,
        website: req.website,
    };
    let user = state.users.update_profile(&auth.user_id, changes).await?;
    Ok(ApiResponse::ok("Profile updated", user.into()))
}

pub async fn change_my_password(
    State(state): State<UsersState>,
    auth: Authenticated,
    JsonBody(req): JsonBody<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<()>>, PlatformError> {
    let current = req
        .current_password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| PlatformError::validation("Current password is required"))?;
    let new = req
        .new_password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| PlatformError::validation("New password is required"))?;

    state.users.change_password(&auth.user_id, &current, &new).await?;
    Ok(ApiResponse::ok("Password changed", ()))
}

pub async fn list_users(
    State(state): State<UsersState>,
    auth: Authenticated,
) -> Result<Json<ApiResponse<Vec<UserResponse>>>, PlatformError> {
    checks::require_admin(&auth, &state.roles)?;
    let users = state.users.list().await?;
    Ok(ApiResponse::ok(
        "Users fetched",
        users.into_iter().map(Into::into).collect(),
    ))
}

pub async fn assign_role(
    State(state): State<UsersState>,
    auth: Authenticated,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<AssignRoleRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, PlatformError> {
    checks::require_admin(&auth, &state.roles)?;
    let role_id = required(req.role_id, "Role")?;
    let user = state.users.assign_role(&id, &role_id).await?;
    Ok(ApiResponse::ok("Role assigned", user.into()))
}

pub async fn delete_user(
    State(state): State<UsersState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, PlatformError> {
    checks::require_admin(&auth, &state.roles)?;
    state.users.delete(&id).await?;
    Ok(ApiResponse::ok("User deleted", ()))
}

pub fn users_router(state: UsersState) -> Router {
    Router::new()
        .route("/api/users/me", get(get_me).patch(update_me))
        .route("/api/users/me/password", patch(change_my_password))
        .route("/api/users/:id", delete(delete_user))
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/:id/role", patch(assign_role))
        .with_state(state)
}
