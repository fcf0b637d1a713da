//! Service Request Intake

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;

use crate::catalog::CatalogService;
use crate::service_request::entity::{RequestStatus, ServiceRequest};
use crate::service_request::repository::ServiceRequestRepository;
use crate::shared::error::{PlatformError, Result};
use crate::user::repository::UserRepository;

/// Fields of a new service request
#[derive(Debug, Clone)]
pub struct Submission {
    pub service_id: String,
    pub plan_id: String,
    pub message: Option<String>,
    pub values: Map<String, Value>,
}

pub struct RequestService {
    requests: Arc<dyn ServiceRequestRepository>,
    catalog: Arc<CatalogService>,
    users: Arc<dyn UserRepository>,
}

impl RequestService {
    pub fn new(
        requests: Arc<dyn ServiceRequestRepository>,
        catalog: Arc<CatalogService>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self { requests, catalog, users }
    }

    /// Validate the plan and the form answers, then record the request.
    ///
    /// `from_user` fields left out of the submission are taken from the
    /// submitter's profile.
    #[tracing::instrument(skip(self, submission), fields(service_id = %submission.service_id))]
    pub async fn submit(&self, user_id: &str, submission: Submission) -> Result<ServiceRequest> {
        let service = self.catalog.get(&submission.service_id).await?;

        if service.plan(&submission.plan_id).is_none() {
            return Err(PlatformError::validation("Plan does not belong to this service"));
        }

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| PlatformError::unauthorized("Unauthorized"))?;

        let form_data = service
            .form
            .validate_submission(&submission.values, &user)
            .map_err(|errors| PlatformError::FormValidation { errors })?;

        let request = ServiceRequest::new(&service.id, &submission.plan_id, user_id, form_data)
            .with_message(submission.message);
        self.requests.insert(&request).await?;

        info!(request_id = %request.id, user_id, "Service request submitted");
        Ok(request)
    }

    pub async fn get(&self, id: &str) -> Result<ServiceRequest> {
        self.requests
            .find_by_id(id)
            .await?
            .ok_or_else(|| PlatformError::not_found("Service request", id))
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<ServiceRequest>> {
        self.requests.find_by_user(user_id).await
    }

    pub async fn list_all(&self) -> Result<Vec<ServiceRequest>> {
        self.requests.find_all().await
    }

    /// Move an in-progress request to `status`. Completed and cancelled
    /// requests are final.
    pub async fn update_status(&self, id: &str, status: RequestStatus) -> Result<ServiceRequest> {
        let mut request = self.get(id).await?;

        if request.status.is_terminal() && request.status != status {
            return Err(PlatformError::validation(format!(
                "Request is already {}",
                status_label(request.status)
            )));
        }

        request.set_status(status);
        self.requests.update(&request).await?;
        info!(request_id = %id, status = status_label(status), "Service request status changed");
        Ok(request)
    }
}

fn status_label(status: RequestStatus) -> &'static str {
    match status {
        RequestStatus::InProgress => "in progress",
        RequestStatus::Completed => "completed",
        RequestStatus::Cancelled => "cancelled",
    }
}
