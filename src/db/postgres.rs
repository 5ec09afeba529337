use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;

use super::{
    AuditQuery, AuditRecorder, DeveloperStore, ProjectStore, StoreError, TaskStore, UserStore,
    audit, developers, missing_reference, projects, tasks, users,
};
use crate::models::{
    AuditFilter, AuditLog, Developer, NewAuditEntry, NewDeveloper, NewProject, NewTask, NewUser,
    Page, PageRequest, Project, Role, SortField, Task, TaskChanges, User,
};

/// Relational store backed by PostgreSQL.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProjectStore for PgStore {
    async fn create_project(&self, project: &NewProject) -> Result<Project, StoreError> {
        Ok(projects::create(&self.pool, project).await?)
    }

    async fn find_project(&self, id: i64) -> Result<Option<Project>, StoreError> {
        Ok(projects::find_by_id(&self.pool, id).await?)
    }

    async fn update_project(
        &self,
        id: i64,
        project: &NewProject,
    ) -> Result<Option<Project>, StoreError> {
        Ok(projects::update(&self.pool, id, project).await?)
    }

    async fn delete_project(&self, id: i64) -> Result<Option<Project>, StoreError> {
        Ok(projects::delete_cascade(&self.pool, id).await?)
    }

    async fn list_projects(&self, page: PageRequest) -> Result<Page<Project>, StoreError> {
        Ok(projects::list(&self.pool, page).await?)
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn create_task(&self, task: &NewTask) -> Result<Task, StoreError> {
        tasks::create(&self.pool, task).await.map_err(|e| {
            let developer_fk = matches!(
                &e,
                sqlx::Error::Database(db_err) if db_err.constraint() == Some(tasks::DEVELOPER_FK)
            );
            match task.developer_id {
                Some(developer_id) if developer_fk => {
                    missing_reference(e, tasks::DEVELOPER_FK, "Developer", developer_id)
                }
                _ => missing_reference(e, tasks::PROJECT_FK, "Project", task.project_id),
            }
        })
    }

    async fn find_task(&self, id: i64) -> Result<Option<Task>, StoreError> {
        Ok(tasks::find_by_id(&self.pool, id).await?)
    }

    async fn update_task(
        &self,
        id: i64,
        changes: &TaskChanges,
    ) -> Result<Option<Task>, StoreError> {
        Ok(tasks::update(&self.pool, id, changes).await?)
    }

    async fn assign_task(&self, id: i64, developer_id: i64) -> Result<Option<Task>, StoreError> {
        tasks::assign(&self.pool, id, developer_id)
            .await
            .map_err(|e| missing_reference(e, tasks::DEVELOPER_FK, "Developer", developer_id))
    }

    async fn delete_task(&self, id: i64) -> Result<Option<Task>, StoreError> {
        Ok(tasks::delete(&self.pool, id).await?)
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        Ok(tasks::list(&self.pool).await?)
    }

    async fn tasks_by_project(&self, project_id: i64) -> Result<Vec<Task>, StoreError> {
        Ok(tasks::list_by_project(&self.pool, project_id).await?)
    }

    async fn tasks_by_developer(&self, developer_id: i64) -> Result<Vec<Task>, StoreError> {
        Ok(tasks::list_by_developer(&self.pool, developer_id).await?)
    }

    async fn tasks_by_assignee_email(&self, email: &str) -> Result<Vec<Task>, StoreError> {
        Ok(tasks::list_by_assignee_email(&self.pool, email).await?)
    }

    async fn overdue_tasks(&self, today: NaiveDate) -> Result<Vec<Task>, StoreError> {
        Ok(tasks::list_overdue(&self.pool, today).await?)
    }

    async fn tasks_sorted(&self, field: SortField) -> Result<Vec<Task>, StoreError> {
        Ok(tasks::list_sorted(&self.pool, field).await?)
    }

    async fn assignee_email(&self, task_id: i64) -> Result<Option<Option<String>>, StoreError> {
        Ok(tasks::assignee_email(&self.pool, task_id).await?)
    }
}

#[async_trait]
impl DeveloperStore for PgStore {
    async fn create_developer(&self, developer: &NewDeveloper) -> Result<Developer, StoreError> {
        Ok(developers::create(&self.pool, developer).await?)
    }

    async fn find_developer(&self, id: i64) -> Result<Option<Developer>, StoreError> {
        Ok(developers::find_by_id(&self.pool, id).await?)
    }

    async fn update_developer(
        &self,
        id: i64,
        developer: &NewDeveloper,
    ) -> Result<Option<Developer>, StoreError> {
        Ok(developers::update(&self.pool, id, developer).await?)
    }

    async fn delete_developer(&self, id: i64) -> Result<Option<Developer>, StoreError> {
        Ok(developers::delete(&self.pool, id).await?)
    }

    async fn list_developers(&self, page: PageRequest) -> Result<Page<Developer>, StoreError> {
        Ok(developers::list(&self.pool, page).await?)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn seed_roles(&self) -> Result<(), StoreError> {
        Ok(users::seed_roles(&self.pool).await?)
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, StoreError> {
        Ok(users::create(&self.pool, user).await?)
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(users::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(users::find_by_username(&self.pool, username).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(users::find_by_email(&self.pool, email).await?)
    }

    async fn count_users(&self) -> Result<i64, StoreError> {
        Ok(users::count_all(&self.pool).await?)
    }

    async fn set_user_roles(&self, id: i64, roles: &[Role]) -> Result<Option<User>, StoreError> {
        Ok(users::set_roles(&self.pool, id, roles).await?)
    }
}

/// Audit log table. Kept apart from [`PgStore`] so the audit trail can live
/// on its own pool.
#[derive(Clone)]
pub struct PgAuditLog {
    pool: PgPool,
}

impl PgAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRecorder for PgAuditLog {
    async fn record(&self, entry: NewAuditEntry) -> Result<(), StoreError> {
        Ok(audit::insert(&self.pool, &entry.into_log()).await?)
    }
}

#[async_trait]
impl AuditQuery for PgAuditLog {
    async fn list_audit_logs(&self, filter: &AuditFilter) -> Result<Vec<AuditLog>, StoreError> {
        Ok(audit::list(&self.pool, filter).await?)
    }

    async fn list_audit_logs_paged(
        &self,
        filter: &AuditFilter,
        page: PageRequest,
    ) -> Result<Page<AuditLog>, StoreError> {
        Ok(audit::list_paged(&self.pool, filter, page).await?)
    }
}
