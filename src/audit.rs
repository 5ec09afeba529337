//! Best-effort audit trail.
//!
//! Services record an entry after every successful mutation. Recording can
//! fail (the payload may not serialize, the store may be down); callers log
//! the failure and keep the result of the mutation.

use std::sync::Arc;

use serde::Serialize;

use crate::db::{AuditRecorder, StoreError};
use crate::models::{AuditAction, NewAuditEntry};

#[derive(Debug)]
pub enum AuditError {
    Serialization(serde_json::Error),
    Store(StoreError),
}

impl std::fmt::Display for AuditError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditError::Serialization(e) => write!(f, "Failed to serialize audit payload: {e}"),
            AuditError::Store(e) => write!(f, "Failed to persist audit entry: {e}"),
        }
    }
}

impl std::error::Error for AuditError {}

#[derive(Clone)]
pub struct AuditTrail {
    recorder: Arc<dyn AuditRecorder>,
}

impl AuditTrail {
    pub fn new(recorder: Arc<dyn AuditRecorder>) -> Self {
        Self { recorder }
    }

    /// Serializes `snapshot` and appends one entry.
    pub async fn record<T: Serialize + ?Sized>(
        &self,
        action: AuditAction,
        entity_type: &str,
        entity_id: impl ToString,
        snapshot: &T,
        actor_name: &str,
    ) -> Result<(), AuditError> {
        let payload = serde_json::to_value(snapshot).map_err(AuditError::Serialization)?;
        self.recorder
            .record(NewAuditEntry {
                action,
                entity_type: entity_type.to_string(),
                entity_id: entity_id.to_string(),
                actor_name: actor_name.to_string(),
                payload,
            })
            .await
            .map_err(AuditError::Store)
    }
}

/// Records an entry and logs, rather than returns, any failure.
pub async fn log_action<T: Serialize + ?Sized>(
    trail: &AuditTrail,
    action: AuditAction,
    entity_type: &str,
    entity_id: impl ToString,
    snapshot: &T,
    actor_name: &str,
) {
    let entity_id = entity_id.to_string();
    if let Err(e) = trail
        .record(action, entity_type, &entity_id, snapshot, actor_name)
        .await
    {
        tracing::error!(
            action = %action,
            entity_type,
            entity_id = %entity_id,
            actor = actor_name,
            "Audit entry dropped: {e}"
        );
    }
}
