//! Role Aggregate
//!
//! Named roles carried as the role claim of access tokens.

pub mod api;
pub mod entity;
pub mod repository;

pub use api::{roles_router, RolesState};
pub use entity::{Role, RoleDefaults};
pub use repository::{MongoRoleRepository, RoleRepository};
