//! Service Request Entity

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::TsidGenerator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

/// A customer's order for one plan of a service, with the intake form answers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    #[serde(rename = "_id")]
    pub id: String,

    pub service_id: String,

    pub plan_id: String,

    pub user_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Normalized form values in field declaration order
    #[serde(default)]
    pub form_data: IndexMap<String, serde_json::Value>,

    pub status: RequestStatus,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl ServiceRequest {
    pub fn new(
        service_id: impl Into<String>,
        plan_id: impl Into<String>,
        user_id: impl Into<String>,
        form_data: IndexMap<String, serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TsidGenerator::generate(),
            service_id: service_id.into(),
            plan_id: plan_id.into(),
            user_id: user_id.into(),
            message: None,
            form_data,
            status: RequestStatus::InProgress,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_message(mut self, message: Option<String>) -> Self {
        self.message = message;
        self
    }

    pub fn set_status(&mut self, status: RequestStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}
