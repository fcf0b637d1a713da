//! Authentication Aggregate
//!
//! Credentials, session tokens and the flows that use them.

// Single-use credentials
pub mod credential;
pub mod credential_repository;
pub mod credential_store;

// Sessions
pub mod token_service;
pub mod password_service;

// Flows
pub mod auth_flow;
pub mod auth_api;

// Re-export main types
pub use credential::{CredentialKind, CredentialToken, IssuedCredential};
pub use credential_repository::{CredentialTokenRepository, MongoCredentialTokenRepository};
pub use credential_store::{CredentialStore, CredentialTtl};
pub use token_service::{AccessTokenClaims, RefreshTokenClaims, SessionTokens, TokenConfig, TokenService};
pub use password_service::{Argon2Config, PasswordPolicy, PasswordService};
pub use auth_flow::AuthFlow;
pub use auth_api::{auth_router, AuthState};
