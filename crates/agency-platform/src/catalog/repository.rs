//! Service Repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{bson::doc, Collection, Database};

use crate::catalog::entity::Service;
use crate::shared::error::Result;
use crate::store::is_duplicate_key;
use crate::PlatformError;

/// Service names are unique across every record, deleted ones included.
#[async_trait]
pub trait ServiceRepository: Send + Sync {
    /// Fails with `Duplicate` when the name is taken.
    async fn insert(&self, service: &Service) -> Result<()>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Service>>;
    async fn find_by_name(&self, name: &str) -> Result<Option<Service>>;
    async fn find_all(&self) -> Result<Vec<Service>>;
    async fn update(&self, service: &Service) -> Result<()>;
    async fn soft_delete(&self, id: &str, at: DateTime<Utc>) -> Result<bool>;
}

pub struct MongoServiceRepository {
    collection: Collection<Service>,
}

impl MongoServiceRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("services"),
        }
    }
}

#[async_trait]
impl ServiceRepository for MongoServiceRepository {
    async fn insert(&self, service: &Service) -> Result<()> {
        match self.collection.insert_one(service).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => {
                Err(PlatformError::duplicate("Service", "name", &service.name))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Service>> {
        Ok(self.collection
            .find_one(doc! { "_id": id, "deletedAt": null })
            .await?)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Service>> {
        Ok(self.collection
            .find_one(doc! { "name": name, "deletedAt": null })
            .await?)
    }

    async fn find_all(&self) -> Result<Vec<Service>> {
        let cursor = self.collection
            .find(doc! { "deletedAt": null })
            .sort(doc! { "name": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update(&self, service: &Service) -> Result<()> {
        match self.collection
            .replace_one(doc! { "_id": &service.id }, service)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => {
                Err(PlatformError::duplicate("Service", "name", &service.name))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn soft_delete(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
        let result = self.collection
            .update_one(
                doc! { "_id": id, "deletedAt": null },
                doc! { "$set": {
                    "deletedAt": bson::DateTime::from_chrono(at),
                    "updatedAt": bson::DateTime::from_chrono(at),
                } },
            )
            .await?;
        Ok(result.modified_count > 0)
    }
}
