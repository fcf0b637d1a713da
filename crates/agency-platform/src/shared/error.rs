//! Platform Error Types

use thiserror::Error;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response, Json},
};
use tracing::error;

use crate::catalog::form_schema::FieldError;
use crate::shared::api_common::ApiError;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("{entity_type} not found")]
    NotFound { entity_type: String, id: String },

    #[error("{entity_type} with {field} '{value}' already exists")]
    Duplicate { entity_type: String, field: String, value: String },

    #[error("{message}")]
    Validation { message: String },

    #[error("Form submission is invalid")]
    FormValidation { errors: Vec<FieldError> },

    /// Absent, expired, mismatched and already-used credentials all look the same.
    #[error("Invalid or expired token")]
    InvalidCredentialToken,

    #[error("{message}")]
    TooManyRequests { message: String },

    #[error("{message}")]
    Unauthorized { message: String },

    #[error("{message}")]
    Forbidden { message: String },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    /// `message` is for logs only
    #[error("Invalid token")]
    InvalidToken { message: String },

    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bson::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] bson::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl PlatformError {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(entity_type: impl Into<String>, field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Duplicate {
            entity_type: entity_type.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::TooManyRequests { message: message.into() }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized { message: message.into() }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// HTTP status and stable error code for this error.
    pub fn status(&self) -> (StatusCode, &'static str) {
        match self {
            PlatformError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            PlatformError::Duplicate { .. } => (StatusCode::BAD_REQUEST, "DUPLICATE"),
            PlatformError::Validation { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            PlatformError::FormValidation { .. } => (StatusCode::BAD_REQUEST, "FORM_VALIDATION_ERROR"),
            PlatformError::InvalidCredentialToken => (StatusCode::BAD_REQUEST, "INVALID_OR_EXPIRED_TOKEN"),
            PlatformError::TooManyRequests { .. } => (StatusCode::TOO_MANY_REQUESTS, "TOKEN_ALREADY_ACTIVE"),
            PlatformError::Unauthorized { .. } => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            PlatformError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            PlatformError::TokenExpired => (StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED"),
            PlatformError::InvalidToken { .. } => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
            PlatformError::Forbidden { .. } => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

pub type Result<T> = std::result::Result<T, PlatformError>;

impl IntoResponse for PlatformError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status();

        // Driver and library messages stay in the logs.
        let message = if status.is_server_error() {
            error!(error = %self, "Request failed with internal error");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let details = match &self {
            PlatformError::FormValidation { errors } => serde_json::to_value(errors).ok(),
            _ => None,
        };

        let body = ApiError {
            success: false,
            message,
            error: error_type.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
