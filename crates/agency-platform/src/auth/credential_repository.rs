//! Credential Token Repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::{bson::doc, Collection, Database};

use crate::auth::credential::{CredentialKind, CredentialToken};
use crate::shared::error::Result;
use crate::store::is_duplicate_key;

/// Storage for credential tokens.
///
/// Implementations must make `insert_if_no_active` and `mark_consumed`
/// atomic: concurrent callers can never both see success.
#[async_trait]
pub trait CredentialTokenRepository: Send + Sync {
    /// Store `token` unless the user already holds an active token of the
    /// same kind at `now`. Returns `false` when one exists.
    async fn insert_if_no_active(&self, token: &CredentialToken, now: DateTime<Utc>) -> Result<bool>;

    /// Most recent unexpired, unconsumed token of `kind` for the user
    async fn find_active(
        &self,
        user_id: &str,
        kind: CredentialKind,
        now: DateTime<Utc>,
    ) -> Result<Option<CredentialToken>>;

    /// Flag a token consumed. Returns `false` if it already was.
    async fn mark_consumed(&self, id: &str, at: DateTime<Utc>) -> Result<bool>;
}

/// MongoDB-backed credential tokens.
///
/// Relies on the unique `(userId, kind)` index from `store::indexes`: at most
/// one document per user and kind exists, so inserting over an active one
/// fails with a duplicate-key error.
pub struct MongoCredentialTokenRepository {
    collection: Collection<CredentialToken>,
}

impl MongoCredentialTokenRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("credential_tokens"),
        }
    }
}

#[async_trait]
impl CredentialTokenRepository for MongoCredentialTokenRepository {
    async fn insert_if_no_active(&self, token: &CredentialToken, now: DateTime<Utc>) -> Result<bool> {
        let now = bson::DateTime::from_chrono(now);

        // Clear out the expired or consumed slot, leaving an active one in place.
        self.collection
            .delete_many(doc! {
                "userId": &token.user_id,
                "kind": token.kind.as_str(),
                "$or": [
                    { "expiresAt": { "$lte": now } },
                    { "consumedAt": { "$ne": null } },
                ],
            })
            .await?;

        match self.collection.insert_one(token).await {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_active(
        &self,
        user_id: &str,
        kind: CredentialKind,
        now: DateTime<Utc>,
    ) -> Result<Option<CredentialToken>> {
        Ok(self.collection
            .find_one(doc! {
                "userId": user_id,
                "kind": kind.as_str(),
                "consumedAt": null,
                "expiresAt": { "$gt": bson::DateTime::from_chrono(now) },
            })
            .sort(doc! { "issuedAt": -1 })
            .await?)
    }

    async fn mark_consumed(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
        let result = self.collection
            .update_one(
                doc! { "_id": id, "consumedAt": null },
                doc! { "$set": { "consumedAt": bson::DateTime::from_chrono(at) } },
            )
            .await?;
        Ok(result.modified_count > 0)
    }
}
