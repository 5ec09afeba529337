//! Entity store seams.
//!
//! Every store operation is expressed as a trait so the task services can run
//! against PostgreSQL in production and against [`memory::MemoryStore`] in
//! tests. The SQL lives in one module per table, as free functions over a
//! [`sqlx::PgExecutor`]; [`postgres::PgStore`] wires those into the traits.

pub mod audit;
pub mod developers;
pub mod memory;
pub mod postgres;
pub mod projects;
pub mod tasks;
pub mod users;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::{
    AuditFilter, AuditLog, Developer, NewAuditEntry, NewDeveloper, NewProject, NewTask, NewUser,
    Page, PageRequest, Project, Role, SortField, Task, TaskChanges, User,
};

#[derive(Debug)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    UniqueViolation(String),
    /// A foreign key pointed at a row that no longer exists.
    MissingReference { resource: &'static str, id: String },
    /// The backend could not be reached in time.
    Unavailable(String),
    Backend(String),
    Database(sqlx::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::UniqueViolation(msg) => write!(f, "Unique violation: {msg}"),
            StoreError::MissingReference { resource, id } => {
                write!(f, "Missing reference: {resource} {id}")
            }
            StoreError::Unavailable(msg) => write!(f, "Store unavailable: {msg}"),
            StoreError::Backend(msg) => write!(f, "Store error: {msg}"),
            StoreError::Database(err) => write!(f, "Database error: {err}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::UniqueViolation(unique_message(db_err.constraint()));
            }
        }
        if matches!(
            err,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
        ) {
            return StoreError::Unavailable(err.to_string());
        }
        StoreError::Database(err)
    }
}

fn unique_message(constraint: Option<&str>) -> String {
    match constraint {
        Some("developers_email_key") => "A developer with this email already exists".to_string(),
        Some("users_username_key") => "Username already taken".to_string(),
        Some("users_email_key") => "An account with this email already exists".to_string(),
        Some(other) => format!("Duplicate value violates {other}"),
        None => "Duplicate value".to_string(),
    }
}

/// Turns a foreign-key violation on `constraint` into a not-found for `resource`.
pub(crate) fn missing_reference(
    err: sqlx::Error,
    constraint: &str,
    resource: &'static str,
    id: i64,
) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_foreign_key_violation() && db_err.constraint() == Some(constraint) {
            return StoreError::MissingReference {
                resource,
                id: id.to_string(),
            };
        }
    }
    StoreError::from(err)
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn create_project(&self, project: &NewProject) -> Result<Project, StoreError>;
    async fn find_project(&self, id: i64) -> Result<Option<Project>, StoreError>;
    async fn update_project(
        &self,
        id: i64,
        project: &NewProject,
    ) -> Result<Option<Project>, StoreError>;
    /// Deletes the project and every task it owns in one transaction.
    async fn delete_project(&self, id: i64) -> Result<Option<Project>, StoreError>;
    async fn list_projects(&self, page: PageRequest) -> Result<Page<Project>, StoreError>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create_task(&self, task: &NewTask) -> Result<Task, StoreError>;
    async fn find_task(&self, id: i64) -> Result<Option<Task>, StoreError>;
    async fn update_task(&self, id: i64, changes: &TaskChanges)
    -> Result<Option<Task>, StoreError>;
    /// Replaces the assignee. `None` when the task does not exist.
    async fn assign_task(&self, id: i64, developer_id: i64) -> Result<Option<Task>, StoreError>;
    async fn delete_task(&self, id: i64) -> Result<Option<Task>, StoreError>;
    async fn list_tasks(&self) -> Result<Vec<Task>, StoreError>;
    async fn tasks_by_project(&self, project_id: i64) -> Result<Vec<Task>, StoreError>;
    async fn tasks_by_developer(&self, developer_id: i64) -> Result<Vec<Task>, StoreError>;
    async fn tasks_by_assignee_email(&self, email: &str) -> Result<Vec<Task>, StoreError>;
    async fn overdue_tasks(&self, today: NaiveDate) -> Result<Vec<Task>, StoreError>;
    async fn tasks_sorted(&self, field: SortField) -> Result<Vec<Task>, StoreError>;
    /// `None` if the task is missing, `Some(None)` if it is unassigned.
    async fn assignee_email(&self, task_id: i64) -> Result<Option<Option<String>>, StoreError>;
}

#[async_trait]
pub trait DeveloperStore: Send + Sync {
    async fn create_developer(&self, developer: &NewDeveloper) -> Result<Developer, StoreError>;
    async fn find_developer(&self, id: i64) -> Result<Option<Developer>, StoreError>;
    async fn update_developer(
        &self,
        id: i64,
        developer: &NewDeveloper,
    ) -> Result<Option<Developer>, StoreError>;
    /// Deletes the developer and clears it from every task it was assigned to.
    async fn delete_developer(&self, id: i64) -> Result<Option<Developer>, StoreError>;
    async fn list_developers(&self, page: PageRequest) -> Result<Page<Developer>, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts any of the fixed roles that are missing.
    async fn seed_roles(&self) -> Result<(), StoreError>;
    async fn create_user(&self, user: &NewUser) -> Result<User, StoreError>;
    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn count_users(&self) -> Result<i64, StoreError>;
    async fn set_user_roles(&self, id: i64, roles: &[Role]) -> Result<Option<User>, StoreError>;
}

/// The full relational store.
pub trait EntityStore: ProjectStore + TaskStore + DeveloperStore + UserStore {}

impl<T> EntityStore for T where T: ProjectStore + TaskStore + DeveloperStore + UserStore {}

/// Append-only sink for audit entries. Entries are never updated.
#[async_trait]
pub trait AuditRecorder: Send + Sync {
    async fn record(&self, entry: NewAuditEntry) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AuditQuery: Send + Sync {
    /// Newest first.
    async fn list_audit_logs(&self, filter: &AuditFilter) -> Result<Vec<AuditLog>, StoreError>;
    async fn list_audit_logs_paged(
        &self,
        filter: &AuditFilter,
        page: PageRequest,
    ) -> Result<Page<AuditLog>, StoreError>;
}
