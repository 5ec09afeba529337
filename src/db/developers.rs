use sqlx::PgPool;

use crate::models::{Developer, NewDeveloper, Page, PageRequest};

pub async fn create(pool: &PgPool, developer: &NewDeveloper) -> Result<Developer, sqlx::Error> {
    sqlx::query_as::<_, Developer>(
        "INSERT INTO developers (name, email, skills) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(&developer.name)
    .bind(&developer.email)
    .bind(&developer.skills)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Developer>, sqlx::Error> {
    sqlx::query_as::<_, Developer>("SELECT * FROM developers WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn update(
    pool: &PgPool,
    id: i64,
    developer: &NewDeveloper,
) -> Result<Option<Developer>, sqlx::Error> {
    sqlx::query_as::<_, Developer>(
        "UPDATE developers SET name = $2, email = $3, skills = $4 WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&developer.name)
    .bind(&developer.email)
    .bind(&developer.skills)
    .fetch_optional(pool)
    .await
}

/// Unassigns the developer's tasks, then deletes the developer.
pub async fn delete(pool: &PgPool, id: i64) -> Result<Option<Developer>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE tasks SET developer_id = NULL, updated_at = now() WHERE developer_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let deleted =
        sqlx::query_as::<_, Developer>("DELETE FROM developers WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

    tx.commit().await?;
    Ok(deleted)
}

pub async fn list(pool: &PgPool, page: PageRequest) -> Result<Page<Developer>, sqlx::Error> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM developers")
        .fetch_one(pool)
        .await?;

    let content = sqlx::query_as::<_, Developer>(
        "SELECT * FROM developers ORDER BY id ASC LIMIT $1 OFFSET $2",
    )
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    Ok(Page::new(content, page, total.max(0) as u64))
}
