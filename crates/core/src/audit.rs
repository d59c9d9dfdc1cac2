use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::application::ApplicationStatus;

pub const DEFAULT_ADMIN_ACTOR: &str = "Admin DGM";
pub const APPLICANT_ACTOR: &str = "Applicant";
pub const PAYMENT_ACTOR: &str = "Payment Gateway";

pub const ENTITY_APPLICATION: &str = "APPLICATION";
pub const ENTITY_PAYMENT: &str = "PAYMENT";

pub const ACTION_DRAFT_CREATED: &str = "APPLICATION_DRAFT_CREATED";
pub const ACTION_SUBMITTED: &str = "APPLICATION_SUBMITTED";
pub const ACTION_PAYMENT_CONFIRMED: &str = "PAYMENT_CONFIRMED";

/// `APPLICATION_<STATUS>` action recorded by a review decision.
pub fn status_action(requested: ApplicationStatus) -> String {
    format!("APPLICATION_{requested}")
}

/// Append-only trail of who did what to which record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    pub actor_id: Option<String>,
    pub actor_name: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub metadata: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        actor_name: impl Into<String>,
        action: impl Into<String>,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            actor_id: None,
            actor_name: actor_name.into(),
            action: action.into(),
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            metadata: Map::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_actor_id(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
