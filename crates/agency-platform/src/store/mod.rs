//! Persistence backends
//!
//! Every aggregate repository has a MongoDB implementation next to its
//! entity and an in-memory one in [`memory::MemoryStore`].

pub mod indexes;
pub mod memory;

use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::Database;
use std::sync::Arc;

use crate::auth::credential_repository::{CredentialTokenRepository, MongoCredentialTokenRepository};
use crate::catalog::repository::{MongoServiceRepository, ServiceRepository};
use crate::role::repository::{MongoRoleRepository, RoleRepository};
use crate::service_request::repository::{MongoServiceRequestRepository, ServiceRequestRepository};
use crate::user::repository::{MongoUserRepository, UserRepository};

pub use indexes::ensure_indexes;
pub use memory::MemoryStore;

/// Check if a MongoDB error is a duplicate key error (code 11000)
pub fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    match error.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == 11000,
        ErrorKind::Command(command_error) => command_error.code == 11000,
        _ => false,
    }
}

/// One handle per repository, all backed by the same store
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub roles: Arc<dyn RoleRepository>,
    pub credentials: Arc<dyn CredentialTokenRepository>,
    pub services: Arc<dyn ServiceRepository>,
    pub service_requests: Arc<dyn ServiceRequestRepository>,
}

impl Repositories {
    pub fn memory() -> Self {
        Self::from_memory(Arc::new(MemoryStore::new()))
    }

    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            users: store.clone(),
            roles: store.clone(),
            credentials: store.clone(),
            services: store.clone(),
            service_requests: store,
        }
    }

    pub fn mongo(db: &Database) -> Self {
        Self {
            users: Arc::new(MongoUserRepository::new(db)),
            roles: Arc::new(MongoRoleRepository::new(db)),
            credentials: Arc::new(MongoCredentialTokenRepository::new(db)),
            services: Arc::new(MongoServiceRepository::new(db)),
            service_requests: Arc::new(MongoServiceRequestRepository::new(db)),
        }
    }
}
