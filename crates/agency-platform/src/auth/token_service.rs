//! Session Token Service
//!
//! Signs and verifies the access/refresh JWT pair. Both are HS256 with
//! separate secrets, so a refresh token can never pass as an access token.

use chrono::Duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::shared::clock::{Clock, SystemClock};
use crate::shared::error::{PlatformError, Result};
use crate::user::entity::User;

/// Access token payload: exactly `{id, email, role, iat, exp}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub id: String,
    pub email: String,
    /// Role title
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Refresh token payload: exactly `{id, iat, exp}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    pub id: String,
    pub iat: i64,
    pub exp: i64,
}

/// Configuration for the token service
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    /// Access token lifetime in seconds
    pub access_token_expiry_secs: i64,
    /// Refresh token lifetime in seconds
    pub refresh_token_expiry_secs: i64,
}

impl TokenConfig {
    pub fn new(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_token_expiry_secs: 3600,    // 1 hour
            refresh_token_expiry_secs: 604800, // 7 days
        }
    }
}

/// Freshly issued session pair
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct TokenService {
    config: TokenConfig,
    clock: Arc<dyn Clock>,
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
}

impl TokenService {
    pub fn new(config: TokenConfig) -> Self {
        let access_encoding = EncodingKey::from_secret(config.access_secret.as_bytes());
        let access_decoding = DecodingKey::from_secret(config.access_secret.as_bytes());
        let refresh_encoding = EncodingKey::from_secret(config.refresh_secret.as_bytes());
        let refresh_decoding = DecodingKey::from_secret(config.refresh_secret.as_bytes());

        info!("TokenService initialized with HS256");

        Self {
            config,
            clock: Arc::new(SystemClock),
            access_encoding,
            access_decoding,
            refresh_encoding,
            refresh_decoding,
        }
    }

    /// Issue and expire tokens against `clock` instead of the wall clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn refresh_token_expiry_secs(&self) -> i64 {
        self.config.refresh_token_expiry_secs
    }

    /// Sign an access/refresh pair for a verified user
    pub fn issue_session(&self, user: &User, role_title: &str) -> Result<SessionTokens> {
        Ok(SessionTokens {
            access_token: self.sign_access(user, role_title)?,
            refresh_token: self.sign_refresh(&user.id)?,
        })
    }

    pub fn sign_access(&self, user: &User, role_title: &str) -> Result<String> {
        let now = self.clock.now();
        let claims = AccessTokenClaims {
            id: user.id.clone(),
            email: user.email.clone(),
            role: role_title.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.config.access_token_expiry_secs)).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.access_encoding)
            .map_err(|e| PlatformError::internal(format!("Failed to encode access token: {}", e)))
    }

    pub fn sign_refresh(&self, user_id: &str) -> Result<String> {
        let now = self.clock.now();
        let claims = RefreshTokenClaims {
            id: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.config.refresh_token_expiry_secs)).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.refresh_encoding)
            .map_err(|e| PlatformError::internal(format!("Failed to encode refresh token: {}", e)))
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessTokenClaims> {
        let claims = decode::<AccessTokenClaims>(token, &self.access_decoding, &validation())
            .map_err(map_jwt_error)?
            .claims;
        self.check_expiry(claims.exp)?;
        Ok(claims)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshTokenClaims> {
        let claims = decode::<RefreshTokenClaims>(token, &self.refresh_decoding, &validation())
            .map_err(map_jwt_error)?
            .claims;
        self.check_expiry(claims.exp)?;
        Ok(claims)
    }

    /// Zero leeway: a token is dead from the second after `exp`.
    fn check_expiry(&self, exp: i64) -> Result<()> {
        if exp < self.clock.now().timestamp() {
            return Err(PlatformError::TokenExpired);
        }
        Ok(())
    }
}

/// Signature and claim presence only; expiry is checked against the clock.
fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.validate_exp = false;
    validation.set_required_spec_claims(&["exp", "iat"]);
    validation
}

fn map_jwt_error(e: jsonwebtoken::errors::Error) -> PlatformError {
    PlatformError::InvalidToken { message: e.to_string() }
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(TokenConfig::new("access-secret", "refresh-secret"))
    }

    fn user() -> User {
        User::new("a@b.com", "hash", "0000000000USR")
    }

    /// Decode a JWT payload without verifying it
    fn decode_payload(token: &str) -> serde_json::Value {
        use base64::Engine;
        let payload = token.split('.').nth(1).unwrap();
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(payload).unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_access_claims_shape() {
        let service = service();
        let user = user();
        let session = service.issue_session(&user, "user").unwrap();

        let payload = decode_payload(&session.access_token);
        let mut keys: Vec<_> = payload.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["email", "exp", "iat", "id", "role"]);

        let claims = service.verify_access(&session.access_token).unwrap();
        assert_eq!(claims.id, user.id);
        assert_eq!(claims.email, "a@b.com");
        assert_eq!(claims.role, "user");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_refresh_claims_shape() {
        let service = service();
        let user = user();
        let session = service.issue_session(&user, "user").unwrap();

        let payload = decode_payload(&session.refresh_token);
        let mut keys: Vec<_> = payload.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["exp", "iat", "id"]);

        let claims = service.verify_refresh(&session.refresh_token).unwrap();
        assert_eq!(claims.id, user.id);
        assert_eq!(claims.exp - claims.iat, 604800);
    }

    #[test]
    fn test_tokens_are_not_interchangeable() {
        let service = service();
        let session = service.issue_session(&user(), "user").unwrap();

        assert!(service.verify_access(&session.refresh_token).is_err());
        assert!(service.verify_refresh(&session.access_token).is_err());
    }

    #[test]
    fn test_foreign_secret_rejected() {
        let other = TokenService::new(TokenConfig::new("other-access", "other-refresh"));
        let token = other.sign_access(&user(), "admin").unwrap();

        let err = service().verify_access(&token).unwrap_err();
        assert!(matches!(err, PlatformError::InvalidToken { .. }));
    }

    #[test]
    fn test_expired_token_rejected() {
        let mut config = TokenConfig::new("access-secret", "refresh-secret");
        config.access_token_expiry_secs = -10;
        let service = TokenService::new(config);

        let token = service.sign_access(&user(), "user").unwrap();
        assert!(matches!(service.verify_access(&token), Err(PlatformError::TokenExpired)));
    }

    #[test]
    fn test_expiry_follows_injected_clock() {
        use crate::shared::clock::ManualClock;

        let clock = Arc::new(ManualClock::starting_now());
        let service = service().with_clock(clock.clone());
        let session = service.issue_session(&user(), "user").unwrap();

        clock.advance(Duration::seconds(3600));
        assert!(service.verify_access(&session.access_token).is_ok());

        clock.advance(Duration::seconds(1));
        assert!(matches!(
            service.verify_access(&session.access_token),
            Err(PlatformError::TokenExpired)
        ));
        assert!(service.verify_refresh(&session.refresh_token).is_ok());

        clock.advance(Duration::days(7));
        assert!(matches!(
            service.verify_refresh(&session.refresh_token),
            Err(PlatformError::TokenExpired)
        ));
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token("bearer abc123"), None);
        assert_eq!(extract_bearer_token("Basic abc123"), None);
    }
}
