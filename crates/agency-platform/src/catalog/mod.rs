//! Service Catalog Aggregate
//!
//! Services, their priced plans and their dynamic intake forms.

pub mod api;
pub mod catalog_service;
pub mod entity;
pub mod form_schema;
pub mod repository;

pub use catalog_service::{CatalogService, PlanInput, ServiceChanges};
pub use entity::{Plan, Service};
pub use form_schema::{FieldDefinition, FieldError, FieldErrorCode, FieldKind, FormSchema, ProfileLookup};
pub use repository::{MongoServiceRepository, ServiceRepository};
pub use api::{catalog_router, CatalogState};
