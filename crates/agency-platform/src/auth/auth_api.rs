//! Authentication API
//!
//! - POST /api/auth/login
//! - POST /api/auth/register
//! - POST /api/auth/refresh-token
//! - POST /api/auth/forgot-password
//! - POST /api/auth/reset-password/:token/:id
//! - POST /api/auth/verify-email/:id
//! - POST /api/auth/resend-otp
//! - POST /api/auth/logout
//! - GET  /api/auth/me
//!
//! The refresh token only ever travels in an HTTP-only cookie.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::auth_flow::{AuthFlow, RegisterInput};
use crate::shared::api_common::{optional, required, ApiResponse, JsonBody};
use crate::shared::error::PlatformError;
use crate::shared::middleware::Authenticated;
use crate::user::api::UserResponse;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordRequest {
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OtpRequest {
    pub otp: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenResponse {
    pub access_token: String,
}

#[derive(Debug, Serialize)]
pub struct OtpResponse {
    pub user: UserResponse,
    pub otp: String,
}

#[derive(Debug, Serialize)]
pub struct ResetLinkResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub user: UserResponse,
}

/// Auth service state
#[derive(Clone)]
pub struct AuthState {
    pub flow: Arc<AuthFlow>,
    /// Refresh cookie name (default: "refreshToken")
    pub cookie_name: String,
    pub cookie_path: String,
    /// Set the Secure flag; on in production
    pub cookie_secure: bool,
    /// Cookie lifetime, matching the refresh token
    pub cookie_max_age_secs: i64,
}

impl AuthState {
    /// Create with default cookie settings
    pub fn new(flow: Arc<AuthFlow>) -> Self {
        let cookie_max_age_secs = flow.token_service().refresh_token_expiry_secs();
        Self {
            flow,
            cookie_name: "refreshToken".to_string(),
            cookie_path: "/".to_string(),
            cookie_secure: false,
            cookie_max_age_secs,
        }
    }

    /// Configure refresh cookie settings
    pub fn with_cookie_settings(mut self, name: &str, path: &str, secure: bool) -> Self {
        self.cookie_name = name.to_string();
        self.cookie_path = path.to_string();
        self.cookie_secure = secure;
        self
    }

    fn refresh_cookie(&self, value: String) -> Cookie<'static> {
        Cookie::build((self.cookie_name.clone(), value))
            .path(self.cookie_path.clone())
            .http_only(true)
            .secure(self.cookie_secure)
            .same_site(SameSite::Strict)
            .max_age(time::Duration::seconds(self.cookie_max_age_secs))
            .build()
    }
}

/// Login with email and password
///
/// Returns the access token and user, and sets the refresh cookie.
pub async fn login(
    State(state): State<AuthState>,
    jar: CookieJar,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, PlatformError> {
    let email = required(req.email, "Email")?;
    let password = req
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| PlatformError::validation("Password is required"))?;

    let outcome = state.flow.login(&email, &password).await?;

    let jar = jar.add(state.refresh_cookie(outcome.session.refresh_token));
    let body = LoginResponse {
        access_token: outcome.session.access_token,
        user: outcome.user.into(),
    };

    Ok((jar, ApiResponse::ok("Logged in successfully", body)))
}

pub async fn register(
    State(state): State<AuthState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OtpResponse>>), PlatformError> {
    let input = RegisterInput {
        email: required(req.email, "Email")?,
        password: req
            .password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| PlatformError::validation("Password is required"))?,
        first_name: optional(req.first_name),
        last_name: optional(req.last_name),
    };

    let registration = state.flow.register(input).await?;
    Ok(ApiResponse::created(
        "User registered, verify your email with the OTP",
        OtpResponse {
            user: registration.user.into(),
            otp: registration.otp,
        },
    ))
}

/// New access token from the refresh cookie
pub async fn refresh_token(
    State(state): State<AuthState>,
    jar: CookieJar,
) -> Result<Json<ApiResponse<AccessTokenResponse>>, PlatformError> {
    let token = jar
        .get(&state.cookie_name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PlatformError::validation("Refresh token is required"))?;

    let access_token = state.flow.refresh(&token).await?;
    Ok(ApiResponse::ok("Token refreshed", AccessTokenResponse { access_token }))
}

pub async fn forgot_password(
    State(state): State<AuthState>,
    JsonBody(req): JsonBody<EmailRequest>,
) -> Result<Json<ApiResponse<ResetLinkResponse>>, PlatformError> {
    let email = required(req.email, "Email")?;
    let token = state.flow.forgot_password(&email).await?;
    Ok(ApiResponse::ok("Password reset link generated", ResetLinkResponse { token }))
}

pub async fn reset_password(
    State(state): State<AuthState>,
    Path((token, id)): Path<(String, String)>,
    JsonBody(req): JsonBody<PasswordRequest>,
) -> Result<Json<ApiResponse<UserEnvelope>>, PlatformError> {
    let password = req
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| PlatformError::validation("Password is required"))?;

    let user = state.flow.reset_password(&token, &id, &password).await?;
    Ok(ApiResponse::ok("Password reset successfully", UserEnvelope { user: user.into() }))
}

pub async fn verify_email(
    State(state): State<AuthState>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<OtpRequest>,
) -> Result<Json<ApiResponse<UserEnvelope>>, PlatformError> {
    let otp = required(req.otp, "OTP")?;
    let user = state.flow.verify_email(&id, &otp).await?;
    Ok(ApiResponse::ok("Email verified", UserEnvelope { user: user.into() }))
}

pub async fn resend_otp(
    State(state): State<AuthState>,
    JsonBody(req): JsonBody<EmailRequest>,
) -> Result<Json<ApiResponse<OtpResponse>>, PlatformError> {
    let email = required(req.email, "Email")?;
    let reissued = state.flow.resend_otp(&email).await?;
    Ok(ApiResponse::ok(
        "OTP sent",
        OtpResponse {
            user: reissued.user.into(),
            otp: reissued.otp,
        },
    ))
}

/// Clear the refresh cookie
pub async fn logout(State(state): State<AuthState>, jar: CookieJar) -> impl IntoResponse {
    let cookie = Cookie::build((state.cookie_name.clone(), ""))
        .path(state.cookie_path.clone())
        .http_only(true)
        .secure(state.cookie_secure)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::ZERO)
        .build();

    (jar.add(cookie), ApiResponse::ok("Logged out", ()))
}

pub async fn me(
    State(state): State<AuthState>,
    auth: Authenticated,
) -> Result<Json<ApiResponse<UserEnvelope>>, PlatformError> {
    let user = state.flow.current_user(&auth.user_id).await?;
    Ok(ApiResponse::ok("Current user", UserEnvelope { user: user.into() }))
}

pub fn auth_router(state: AuthState) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/auth/refresh-token", post(refresh_token))
        .route("/api/auth/forgot-password", post(forgot_password))
        .route("/api/auth/reset-password/:token/:id", post(reset_password))
        .route("/api/auth/verify-email/:id", post(verify_email))
        .route("/api/auth/resend-otp", post(resend_otp))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
        .with_state(state)
}
