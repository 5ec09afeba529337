use axum::Json;
use axum::extract::State;
use serde::Deserialize;

use crate::auth::Actor;
use crate::error::AppError;
use crate::models::{AuditFilter, AuditLog, Page, PageQuery, PageRequest};
use crate::policy::{self, Operation};
use crate::routes::{ApiResponse, AppQuery};
use crate::state::SharedState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogQuery {
    pub entity_type: Option<String>,
    pub actor_name: Option<String>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl AuditLogQuery {
    fn filter(&self) -> AuditFilter {
        AuditFilter {
            entity_type: self.entity_type.clone(),
            actor_name: self.actor_name.clone(),
        }
    }
}

pub async fn list(
    actor: Actor,
    State(state): State<SharedState>,
    AppQuery(query): AppQuery<AuditLogQuery>,
) -> Result<Json<ApiResponse<Vec<AuditLog>>>, AppError> {
    policy::require(&actor, Operation::ReadAuditLogs)?;
    let logs = state.audit_log.list_audit_logs(&query.filter()).await?;
    Ok(ApiResponse::ok("Audit logs retrieved", logs))
}

pub async fn list_paged(
    actor: Actor,
    State(state): State<SharedState>,
    AppQuery(query): AppQuery<AuditLogQuery>,
) -> Result<Json<ApiResponse<Page<AuditLog>>>, AppError> {
    policy::require(&actor, Operation::ReadAuditLogs)?;
    let page = PageRequest::try_from(PageQuery {
        page: query.page,
        size: query.size,
    })?;
    let logs = state
        .audit_log
        .list_audit_logs_paged(&query.filter(), page)
        .await?;
    Ok(ApiResponse::ok("Audit logs retrieved", logs))
}
