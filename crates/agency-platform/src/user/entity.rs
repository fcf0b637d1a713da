//! User Entity

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::catalog::form_schema::ProfileLookup;
use crate::TsidGenerator;

/// Email verification status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Unverified,
    Verified,
}

impl Default for UserStatus {
    fn default() -> Self {
        Self::Unverified
    }
}

/// Platform user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,

    /// Lower-cased and unique
    pub email: String,

    /// Argon2id PHC string
    pub password_hash: String,

    pub role_id: String,

    #[serde(default)]
    pub status: UserStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none", default, with = "bson::serde_helpers::chrono_datetime_as_bson_datetime_optional")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(email: impl Into<String>, password_hash: impl Into<String>, role_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: TsidGenerator::generate(),
            email: normalize_email(&email.into()),
            password_hash: password_hash.into(),
            role_id: role_id.into(),
            status: UserStatus::Unverified,
            first_name: None,
            last_name: None,
            phone: None,
            company_name: None,
            website: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn with_name(mut self, first_name: Option<String>, last_name: Option<String>) -> Self {
        self.first_name = first_name;
        self.last_name = last_name;
        self
    }

    pub fn is_verified(&self) -> bool {
        self.status == UserStatus::Verified
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn mark_verified(&mut self) {
        self.status = UserStatus::Verified;
        self.updated_at = Utc::now();
    }

    pub fn set_password_hash(&mut self, hash: String) {
        self.password_hash = hash;
        self.updated_at = Utc::now();
    }

    pub fn full_name(&self) -> Option<String> {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
            (Some(first), None) => Some(first.clone()),
            (None, Some(last)) => Some(last.clone()),
            (None, None) => None,
        }
    }
}

impl ProfileLookup for User {
    fn profile_value(&self, field: &str) -> Option<String> {
        match field {
            "email" => Some(self.email.clone()),
            "first_name" => self.first_name.clone(),
            "last_name" => self.last_name.clone(),
            "full_name" | "name" => self.full_name(),
            "phone" => self.phone.clone(),
            "company_name" | "company" => self.company_name.clone(),
            "website" => self.website.clone(),
            _ => None,
        }
    }
}

/// Email validation pattern
fn email_pattern() -> &'static Regex {
    static PATTERN: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap()
    })
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    email_pattern().is_match(email)
}
