use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Actor name used when the core acts on its own behalf.
pub const SYSTEM_ACTOR: &str = "SYSTEM";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable audit trail entry.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: Uuid,
    pub action_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub actor_name: String,
    pub payload: serde_json::Value,
    #[sqlx(rename = "recorded_at")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: String,
    pub actor_name: String,
    pub payload: serde_json::Value,
}

impl NewAuditEntry {
    pub fn into_log(self) -> AuditLog {
        AuditLog {
            id: Uuid::now_v7(),
            action_type: self.action.as_str().to_string(),
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            actor_name: self.actor_name,
            payload: self.payload,
            timestamp: Utc::now(),
        }
    }
}

/// Optional filters for audit queries.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditFilter {
    pub entity_type: Option<String>,
    pub actor_name: Option<String>,
}

impl AuditFilter {
    pub fn matches(&self, log: &AuditLog) -> bool {
        self.entity_type.as_ref().is_none_or(|t| *t == log.entity_type)
            && self.actor_name.as_ref().is_none_or(|a| *a == log.actor_name)
    }
}
