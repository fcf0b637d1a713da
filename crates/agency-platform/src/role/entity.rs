//! Role Entity

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::TsidGenerator;

/// A named role. Users reference exactly one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    #[serde(rename = "_id")]
    pub id: String,

    /// Unique title carried in the access token's role claim
    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// User who created the role; `None` for seeded roles
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none", default, with = "bson::serde_helpers::chrono_datetime_as_bson_datetime_optional")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Role {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: TsidGenerator::generate(),
            title: title.into(),
            description: None,
            created_by: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_created_by(mut self, user_id: impl Into<String>) -> Self {
        self.created_by = Some(user_id.into());
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Ids and titles of the two roles every deployment starts with.
///
/// Loaded from configuration and handed to the services that assign or
/// check roles.
#[derive(Debug, Clone)]
pub struct RoleDefaults {
    pub user_role_id: String,
    pub admin_role_id: String,
    pub user_title: String,
    pub admin_title: String,
}

impl Default for RoleDefaults {
    fn default() -> Self {
        Self {
            user_role_id: "0000000000USR".to_string(),
            admin_role_id: "0000000000ADM".to_string(),
            user_title: "user".to_string(),
            admin_title: "admin".to_string(),
        }
    }
}

impl RoleDefaults {
    pub fn is_default_role(&self, role_id: &str) -> bool {
        role_id == self.user_role_id || role_id == self.admin_role_id
    }

    /// Seed records for the default roles
    pub fn seed_roles(&self) -> Vec<Role> {
        vec![
            Role::new(&self.user_title)
                .with_id(&self.user_role_id)
                .with_description("Default role for registered customers"),
            Role::new(&self.admin_title)
                .with_id(&self.admin_role_id)
                .with_description("Agency administrators"),
        ]
    }
}
