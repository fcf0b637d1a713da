//! API Middleware
//!
//! Bearer-token authentication for Axum.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::debug;

use crate::auth::token_service::{extract_bearer_token, TokenService};
use crate::shared::api_common::ApiError;
use crate::shared::authorization::AuthContext;

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub token_service: Arc<TokenService>,
}

/// Authenticated user extractor
/// Validates the access token and yields the caller's AuthContext
pub struct Authenticated(pub AuthContext);

impl std::ops::Deref for Authenticated {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Authentication failure. The reason is logged, never returned.
pub struct AuthError {
    pub status: StatusCode,
}

impl AuthError {
    fn unauthorized() -> Self {
        Self { status: StatusCode::UNAUTHORIZED }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (message, error) = if self.status == StatusCode::UNAUTHORIZED {
            ("Unauthorized", "UNAUTHORIZED")
        } else {
            ("Internal server error", "INTERNAL_ERROR")
        };
        let body = ApiError {
            success: false,
            message: message.to_string(),
            error: error.to_string(),
            details: None,
        };
        (self.status, Json(body)).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let app_state = parts.extensions.get::<AppState>().ok_or_else(|| {
            tracing::error!("AuthLayer missing: token service not in request extensions");
            AuthError { status: StatusCode::INTERNAL_SERVER_ERROR }
        })?;

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(extract_bearer_token)
            .ok_or_else(|| {
                debug!("Missing bearer token");
                AuthError::unauthorized()
            })?;

        let claims = app_state.token_service.verify_access(token).map_err(|e| {
            debug!(error = ?e, "Access token rejected");
            AuthError::unauthorized()
        })?;

        Ok(Authenticated(AuthContext::from_claims(claims)))
    }
}

/// Middleware layer that injects AppState into request extensions
/// so the Authenticated extractor can reach the token service.
#[derive(Clone)]
pub struct AuthLayer {
    state: AppState,
}

impl AuthLayer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            state: self.state.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    state: AppState,
}

impl<S, B> Service<axum::http::Request<B>> for AuthMiddleware<S>
where
    S: Service<axum::http::Request<B>, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: axum::http::Request<B>) -> Self::Future {
        req.extensions_mut().insert(self.state.clone());

        let future = self.inner.call(req);
        Box::pin(future)
    }
}
