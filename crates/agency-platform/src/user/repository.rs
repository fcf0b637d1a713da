//! User Repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{bson::doc, Collection, Database};

use crate::shared::error::Result;
use crate::store::is_duplicate_key;
use crate::user::entity::User;
use crate::PlatformError;

/// User persistence. Every lookup excludes soft-deleted users.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Duplicate` when the email is taken.
    async fn insert(&self, user: &User) -> Result<()>;
    async fn find_by_id(&self, id: &str) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn find_all(&self) -> Result<Vec<User>>;
    async fn update(&self, user: &User) -> Result<()>;
    async fn soft_delete(&self, id: &str, at: DateTime<Utc>) -> Result<bool>;
}

pub struct MongoUserRepository {
    collection: Collection<User>,
}

impl MongoUserRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("users"),
        }
    }
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    async fn insert(&self, user: &User) -> Result<()> {
        match self.collection.insert_one(user).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => {
                Err(PlatformError::duplicate("User", "email", &user.email))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(self.collection
            .find_one(doc! { "_id": id, "deletedAt": null })
            .await?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.collection
            .find_one(doc! { "email": email, "deletedAt": null })
            .await?)
    }

    async fn find_all(&self) -> Result<Vec<User>> {
        let cursor = self.collection
            .find(doc! { "deletedAt": null })
            .sort(doc! { "createdAt": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update(&self, user: &User) -> Result<()> {
        match self.collection
            .replace_one(doc! { "_id": &user.id }, user)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => {
                Err(PlatformError::duplicate("User", "email", &user.email))
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
