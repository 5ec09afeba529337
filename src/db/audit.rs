use sqlx::PgPool;

use crate::models::{AuditFilter, AuditLog, Page, PageRequest};

pub async fn insert(pool: &PgPool, log: &AuditLog) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO audit_logs (id, action_type, entity_type, entity_id, actor_name, payload, recorded_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(log.id)
    .bind(&log.action_type)
    .bind(&log.entity_type)
    .bind(&log.entity_id)
    .bind(&log.actor_name)
    .bind(&log.payload)
    .bind(log.timestamp)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list(pool: &PgPool, filter: &AuditFilter) -> Result<Vec<AuditLog>, sqlx::Error> {
    sqlx::query_as::<_, AuditLog>(
        "SELECT * FROM audit_logs
         WHERE ($1::text IS NULL OR entity_type = $1)
           AND ($2::text IS NULL OR actor_name = $2)
         ORDER BY recorded_at DESC, id DESC",
    )
    .bind(&filter.entity_type)
    .bind(&filter.actor_name)
    .fetch_all(pool)
    .await
}

pub async fn list_paged(
    pool: &PgPool,
    filter: &AuditFilter,
    page: PageRequest,
) -> Result<Page<AuditLog>, sqlx::Error> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM audit_logs
         WHERE ($1::text IS NULL OR entity_type = $1)
           AND ($2::text IS NULL OR actor_name = $2)",
    )
    .bind(&filter.entity_type)
    .bind(&filter.actor_name)
    .fetch_one(pool)
    .await?;

    let content = sqlx::query_as::<_, AuditLog>(
        "SELECT * FROM audit_logs
         WHERE ($1::text IS NULL OR entity_type = $1)
           AND ($2::text IS NULL OR actor_name = $2)
         ORDER BY recorded_at DESC, id DESC
         LIMIT $3 OFFSET $4",
    )
    .bind(&filter.entity_type)
    .bind(&filter.actor_name)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    Ok(Page::new(content, page, total.max(0) as u64))
}
