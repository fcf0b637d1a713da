//! Catalog Service
//!
//! Service lifecycle and form-field editing.

use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::catalog::entity::{Plan, Service};
use crate::catalog::form_schema::{FieldDefinition, FormSchema};
use crate::catalog::repository::ServiceRepository;
use crate::shared::error::{PlatformError, Result};

/// Plan as supplied by an admin
#[derive(Debug, Clone)]
pub struct PlanInput {
    /// Keeps the existing plan id when editing
    pub id: Option<String>,
    pub name: String,
    pub price_cents: i64,
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ServiceChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub plans: Option<Vec<PlanInput>>,
}

pub struct CatalogService {
    repo: Arc<dyn ServiceRepository>,
}

impl CatalogService {
    pub fn new(repo: Arc<dyn ServiceRepository>) -> Self {
        Self { repo }
    }

    pub async fn list(&self) -> Result<Vec<Service>> {
        self.repo.find_all().await
    }

    pub async fn get(&self, id: &str) -> Result<Service> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| PlatformError::not_found("Service", id))
    }

    #[tracing::instrument(skip(self, plans, fields))]
    pub async fn create(
        &self,
        name: &str,
        description: Option<String>,
        plans: Vec<PlanInput>,
        fields: Vec<FieldDefinition>,
        created_by: &str,
    ) -> Result<Service> {
        let name = name.trim();
        self.ensure_name_free(name, None).await?;

        let mut service = Service::new(name)
            .with_plans(build_plans(plans)?)
            .with_form(FormSchema::from_fields(fields)?)
            .with_created_by(created_by);
        service.description = description;

        self.repo.insert(&service).await?;
        info!(service_id = %service.id, "Service created");
        Ok(service)
    }

    #[tracing::instrument(skip(self, changes))]
    pub async fn update(&self, id: &str, changes: ServiceChanges) -> Result<Service> {
        let mut service = self.get(id).await?;

        if let Some(name) = changes.name {
            let name = name.trim().to_string();
            if name != service.name {
                self.ensure_name_free(&name, Some(id)).await?;
                service.name = name;
            }
        }
        if let Some(description) = changes.description {
            service.description = Some(description);
        }
        if let Some(plans) = changes.plans {
            service.plans = build_plans(plans)?;
        }

        service.touch();
        self.repo.update(&service).await?;
        Ok(service)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        if !self.repo.soft_delete(id, Utc::now()).await? {
            return Err(PlatformError::not_found("Service", id));
        }
        info!(service_id = %id, "Service deleted");
        Ok(())
    }

    /// Add a field to the service's form, or replace the one with the same id
    #[tracing::instrument(skip(self, field), fields(field_name = %field.name))]
    pub async fn define_field(&self, service_id: &str, field: FieldDefinition) -> Result<FieldDefinition> {
        let mut service = self.get(service_id).await?;
        let defined = service.form.define_field(field)?.clone();

        service.touch();
        self.repo.update(&service).await?;
        Ok(defined)
    }

    pub async fn remove_field(&self, service_id: &str, field_name: &str) -> Result<Service> {
        let mut service = self.get(service_id).await?;
        if !service.form.remove_field(field_name) {
            return Err(PlatformError::not_found("Field", field_name));
        }

        service.touch();
        self.repo.update(&service).await?;
        Ok(service)
    }

    async fn ensure_name_free(&self, name: &str, current_id: Option<&str>) -> Result<()> {
        if name.is_empty() {
            return Err(PlatformError::validation("Name is required"));
        }
        match self.repo.find_by_name(name).await? {
            Some(existing) if Some(existing.id.as_str()) != current_id => {
                Err(PlatformError::duplicate("Service", "name", name))
            }
            _ => Ok(()),
        }
    }
}

fn build_plans(inputs: Vec<PlanInput>) -> Result<Vec<Plan>> {
    if inputs.is_empty() {
        return Err(PlatformError::validation("At least one plan is required"));
    }

    let mut plans: Vec<Plan> = Vec::with_capacity(inputs.len());
    for input in inputs {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(PlatformError::validation("Plan name is required"));
        }
        if input.price_cents < 0 {
            return Err(PlatformError::validation("Plan price cannot be negative"));
        }
        if plans.iter().any(|p| p.name == name) {
            return Err(PlatformError::duplicate("Plan", "name", name));
        }

        let mut plan = Plan::new(name, input.price_cents).with_features(input.features);
        if let Some(id) = input.id.filter(|id| !id.is_empty()) {
            plan.id = id;
        }
        plans.push(plan);
    }
    Ok(plans)
}
