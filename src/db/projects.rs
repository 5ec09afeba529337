use sqlx::PgPool;

use crate::models::{NewProject, Page, PageRequest, Project};

pub async fn create(pool: &PgPool, project: &NewProject) -> Result<Project, sqlx::Error> {
    sqlx::query_as::<_, Project>(
        "INSERT INTO projects (name, description, deadline, status)
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(&project.name)
    .bind(&project.description)
    .bind(project.deadline)
    .bind(project.status)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Project>, sqlx::Error> {
    sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn update(
    pool: &PgPool,
    id: i64,
    project: &NewProject,
) -> Result<Option<Project>, sqlx::Error> {
    sqlx::query_as::<_, Project>(
        "UPDATE projects SET name = $2, description = $3, deadline = $4, status = $5,
                updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&project.name)
    .bind(&project.description)
    .bind(project.deadline)
    .bind(project.status)
    .fetch_optional(pool)
    .await
}

/// Deletes the project's tasks and then the project, in one transaction.
pub async fn delete_cascade(pool: &PgPool, id: i64) -> Result<Option<Project>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    // Lock the project row so no task can be added under it mid-delete.
    let existing = sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
    if existing.is_none() {
        return Ok(None);
    }

    sqlx::query("DELETE FROM tasks WHERE project_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let deleted = sqlx::query_as::<_, Project>("DELETE FROM projects WHERE id = $1 RETURNING *")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(deleted)
}

pub async fn list(pool: &PgPool, page: PageRequest) -> Result<Page<Project>, sqlx::Error> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects")
        .fetch_one(pool)
        .await?;

    let content = sqlx::query_as::<_, Project>(
        "SELECT * FROM projects ORDER BY id ASC LIMIT $1 OFFSET $2",
    )
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    Ok(Page::new(content, page, total.max(0) as u64))
}
