//! Service Request Repository

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{bson::doc, Collection, Database};

use crate::service_request::entity::ServiceRequest;
use crate::shared::error::Result;

#[async_trait]
pub trait ServiceRequestRepository: Send + Sync {
    async fn insert(&self, request: &ServiceRequest) -> Result<()>;
    async fn find_by_id(&self, id: &str) -> Result<Option<ServiceRequest>>;
    /// Newest first
    async fn find_by_user(&self, user_id: &str) -> Result<Vec<ServiceRequest>>;
    /// Newest first
    async fn find_all(&self) -> Result<Vec<ServiceRequest>>;
    async fn update(&self, request: &ServiceRequest) -> Result<()>;
}

pub struct MongoServiceRequestRepository {
    collection: Collection<ServiceRequest>,
}

impl MongoServiceRequestRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("service_requests"),
        }
    }
}

#[async_trait]
impl ServiceRequestRepository for MongoServiceRequestRepository {
    async fn insert(&self, request: &ServiceRequest) -> Result<()> {
        self.collection.insert_one(request).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<ServiceRequest>> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<ServiceRequest>> {
        let cursor = self.collection
            .find(doc! { "userId": user_id })
            .sort(doc! { "createdAt": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_all(&self) -> Result<Vec<ServiceRequest>> {
        let cursor = self.collection
            .find(doc! {})
            .sort(doc! { "createdAt": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update(&self, request: &ServiceRequest) -> Result<()> {
        self.collection
            .replace_one(doc! { "_id": &request.id }, request)
            .await?;
        Ok(())
    }
}
