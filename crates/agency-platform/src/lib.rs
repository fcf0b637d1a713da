//! Agency Platform
//!
//! Core platform providing:
//! - Email/password accounts with email verification by OTP
//! - Password reset by single-use link token
//! - JWT access/refresh sessions
//! - Roles and admin guards
//! - A service catalog whose services carry dynamic intake forms
//! - Service requests validated against those forms
//!
//! ## Module Organization (Aggregate-based)
//!
//! Each aggregate contains:
//! - `entity` - Domain entities
//! - `repository` - Data access
//! - `api` - REST endpoints

// Core aggregates
pub mod user;
pub mod role;
pub mod catalog;
pub mod service_request;

// Authentication & credentials
pub mod auth;

// Shared infrastructure
pub mod shared;
pub mod store;

// Cross-cutting concerns
pub mod seed;
pub mod platform;

// Re-export common types from shared
pub use shared::error::{PlatformError, Result};
pub use shared::tsid::TsidGenerator;
pub use shared::clock::{Clock, ManualClock, SystemClock};

// Re-export main entity types for convenience
pub use user::entity::{User, UserStatus};
pub use role::entity::{Role, RoleDefaults};
pub use catalog::entity::{Plan, Service};
pub use catalog::form_schema::{FieldDefinition, FieldKind, FormSchema};
pub use service_request::entity::{RequestStatus, ServiceRequest};
pub use auth::credential::{CredentialKind, CredentialToken};

// Re-export repositories
pub use user::repository::UserRepository;
pub use role::repository::RoleRepository;
pub use catalog::repository::ServiceRepository;
pub use service_request::repository::ServiceRequestRepository;
pub use auth::credential_repository::CredentialTokenRepository;
pub use store::{MemoryStore, Repositories};

pub use platform::{Platform, PlatformConfig};
