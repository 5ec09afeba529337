use chrono::NaiveDate;
use sqlx::PgPool;

use crate::models::{NewTask, SortField, Task, TaskChanges, TaskStatus};

pub const PROJECT_FK: &str = "tasks_project_id_fkey";
pub const DEVELOPER_FK: &str = "tasks_developer_id_fkey";

pub async fn create(pool: &PgPool, task: &NewTask) -> Result<Task, sqlx::Error> {
    sqlx::query_as::<_, Task>(
        "INSERT INTO tasks (title, description, due_date, status, project_id, developer_id)
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
    )
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.due_date)
    .bind(task.status)
    .bind(task.project_id)
    .bind(task.developer_id)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Applies only the supplied fields. A single statement, so concurrent
/// writers to the same row serialize on its row lock.
pub async fn update(
    pool: &PgPool,
    id: i64,
    changes: &TaskChanges,
) -> Result<Option<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(
        "UPDATE tasks SET
            title = COALESCE($2, title),
            description = COALESCE($3, description),
            due_date = COALESCE($4, due_date),
            status = COALESCE($5, status),
            updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&changes.title)
    .bind(&changes.description)
    .bind(changes.due_date)
    .bind(changes.status)
    .fetch_optional(pool)
    .await
}

pub async fn assign(
    pool: &PgPool,
    id: i64,
    developer_id: i64,
) -> Result<Option<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(
        "UPDATE tasks SET developer_id = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(developer_id)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: i64) -> Result<Option<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>("DELETE FROM tasks WHERE id = $1 RETURNING *")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list(pool: &PgPool) -> Result<Vec<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>("SELECT * FROM tasks ORDER BY id ASC")
        .fetch_all(pool)
        .await
}

pub async fn list_by_project(pool: &PgPool, project_id: i64) -> Result<Vec<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE project_id = $1 ORDER BY id ASC")
        .bind(project_id)
        .fetch_all(pool)
        .await
}

pub async fn list_by_developer(
    pool: &PgPool,
    developer_id: i64,
) -> Result<Vec<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE developer_id = $1 ORDER BY id ASC")
        .bind(developer_id)
        .fetch_all(pool)
        .await
}

pub async fn list_by_assignee_email(pool: &PgPool, email: &str) -> Result<Vec<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(
        "SELECT t.* FROM tasks t
         JOIN developers d ON d.id = t.developer_id
         WHERE lower(d.email) = lower($1)
         ORDER BY t.id ASC",
    )
    .bind(email)
    .fetch_all(pool)
    .await
}

pub async fn list_overdue(pool: &PgPool, today: NaiveDate) -> Result<Vec<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks WHERE due_date < $1 AND status <> $2 ORDER BY id ASC",
    )
    .bind(today)
    .bind(TaskStatus::Done)
    .fetch_all(pool)
    .await
}

pub async fn list_sorted(pool: &PgPool, field: SortField) -> Result<Vec<Task>, sqlx::Error> {
    // `order_by` only ever yields one of a fixed set of clauses.
    let sql = format!("SELECT * FROM tasks ORDER BY {}", field.order_by());
    sqlx::query_as::<_, Task>(&sql).fetch_all(pool).await
}

pub async fn assignee_email(
    pool: &PgPool,
    task_id: i64,
) -> Result<Option<Option<String>>, sqlx::Error> {
    let row: Option<(Option<String>,)> = sqlx::query_as(
        "SELECT d.email FROM tasks t
         LEFT JOIN developers d ON d.id = t.developer_id
         WHERE t.id = $1",
    )
    .bind(task_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(email,)| email))
}
