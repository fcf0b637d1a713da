//! User Aggregate

pub mod api;
pub mod entity;
pub mod repository;
pub mod user_service;

pub use api::{users_router, UserResponse, UsersState};
pub use entity::{User, UserStatus};
pub use repository::{MongoUserRepository, UserRepository};
pub use user_service::{ProfileChanges, UserService};
