//! Service Request Aggregate
//!
//! Customer orders against a service plan, carrying the answers to the
//! service's intake form.

pub mod api;
pub mod entity;
pub mod repository;
pub mod request_service;

pub use api::{service_requests_router, ServiceRequestState};
pub use entity::{RequestStatus, ServiceRequest};
pub use repository::{MongoServiceRequestRepository, ServiceRequestRepository};
pub use request_service::{RequestService, Submission};
