//! Role Repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{bson::doc, Collection, Database};

use crate::role::entity::Role;
use crate::shared::error::Result;
use crate::store::is_duplicate_key;
use crate::PlatformError;

/// Roles lookups skip soft-deleted records.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn insert(&self, role: &Role) -> Result<()>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Role>>;
    async fn find_by_title(&self, title: &str) -> Result<Option<Role>>;
    async fn find_all(&self) -> Result<Vec<Role>>;
    async fn update(&self, role: &Role) -> Result<()>;
    async fn soft_delete(&self, id: &str, at: DateTime<Utc>) -> Result<bool>;
}

pub struct MongoRoleRepository {
    collection: Collection<Role>,
}

impl MongoRoleRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("roles"),
        }
    }
}

#[async_trait]
impl RoleRepository for MongoRoleRepository {
    async fn insert(&self, role: &Role) -> Result<()> {
        match self.collection.insert_one(role).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => {
                Err(PlatformError::duplicate("Role", "title", &role.title))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Role>> {
        Ok(self.collection
            .find_one(doc! { "_id": id, "deletedAt": null })
            .await?)
    }

    async fn find_by_title(&self, title: &str) -> Result<Option<Role>> {
        Ok(self.collection
            .find_one(doc! { "title": title, "deletedAt": null })
            .await?)
    }

    async fn find_all(&self) -> Result<Vec<Role>> {
        let cursor = self.collection
            .find(doc! { "deletedAt": null })
            .sort(doc! { "createdAt": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update(&self, role: &Role) -> Result<()> {
        match self.collection
            .replace_one(doc! { "_id": &role.id }, role)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => {
                Err(PlatformError::duplicate("Role", "title", &role.title))
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
