//! In-process store used by the test suite and by `TRACKER_STORAGE=memory`.
//!
//! All tables sit behind one mutex, so every write is atomic with respect to
//! every other write, including the project cascade and developer unassign.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use super::{
    AuditQuery, AuditRecorder, DeveloperStore, ProjectStore, StoreError, TaskStore, UserStore,
};
use crate::models::{
    AuditFilter, AuditLog, Developer, NewAuditEntry, NewDeveloper, NewProject, NewTask, NewUser,
    Page, PageRequest, Project, Role, SortField, Task, TaskChanges, User,
};

#[derive(Default)]
struct Tables {
    projects: BTreeMap<i64, Project>,
    tasks: BTreeMap<i64, Task>,
    developers: BTreeMap<i64, Developer>,
    users: BTreeMap<i64, User>,
    roles: BTreeSet<Role>,
    last_project_id: i64,
    last_task_id: i64,
    last_developer_id: i64,
    last_user_id: i64,
}

impl Tables {
    fn require_developer(&self, id: i64) -> Result<(), StoreError> {
        if self.developers.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::MissingReference {
                resource: "Developer",
                id: id.to_string(),
            })
        }
    }

    fn developer_email_taken(&self, email: &str, except: Option<i64>) -> bool {
        self.developers
            .values()
            .any(|d| Some(d.id) != except && d.email.eq_ignore_ascii_case(email))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }
}

fn paginate<T: Clone>(items: impl Iterator<Item = T>, total: usize, page: PageRequest) -> Page<T> {
    let content = items
        .skip(page.offset() as usize)
        .take(page.size as usize)
        .collect();
    Page::new(content, page, total as u64)
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn create_project(&self, project: &NewProject) -> Result<Project, StoreError> {
        let mut t = self.tables()?;
        t.last_project_id += 1;
        let now = Utc::now();
        let created = Project {
            id: t.last_project_id,
            name: project.name.clone(),
            description: project.description.clone(),
            deadline: project.deadline,
            status: project.status,
            created_at: now,
            updated_at: now,
        };
        t.projects.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_project(&self, id: i64) -> Result<Option<Project>, StoreError> {
        Ok(self.tables()?.projects.get(&id).cloned())
    }

    async fn update_project(
        &self,
        id: i64,
        project: &NewProject,
    ) -> Result<Option<Project>, StoreError> {
        let mut t = self.tables()?;
        let Some(existing) = t.projects.get_mut(&id) else {
            return Ok(None);
        };
        existing.name = project.name.clone();
        existing.description = project.description.clone();
        existing.deadline = project.deadline;
        existing.status = project.status;
        existing.updated_at = Utc::now();
        Ok(Some(existing.clone()))
    }

    async fn delete_project(&self, id: i64) -> Result<Option<Project>, StoreError> {
        let mut t = self.tables()?;
        let Some(project) = t.projects.remove(&id) else {
            return Ok(None);
        };
        t.tasks.retain(|_, task| task.project_id != id);
        Ok(Some(project))
    }

    async fn list_projects(&self, page: PageRequest) -> Result<Page<Project>, StoreError> {
        let t = self.tables()?;
        Ok(paginate(t.projects.values().cloned(), t.projects.len(), page))
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn create_task(&self, task: &NewTask) -> Result<Task, StoreError> {
        let mut t = self.tables()?;
        if !t.projects.contains_key(&task.project_id) {
            return Err(StoreError::MissingReference {
                resource: "Project",
                id: task.project_id.to_string(),
            });
        }
        if let Some(developer_id) = task.developer_id {
            t.require_developer(developer_id)?;
        }
        t.last_task_id += 1;
        let now = Utc::now();
        let created = Task {
            id: t.last_task_id,
            title: task.title.clone(),
            description: task.description.clone(),
            due_date: task.due_date,
            status: task.status,
            project_id: task.project_id,
            developer_id: task.developer_id,
            created_at: now,
            updated_at: now,
        };
        t.tasks.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_task(&self, id: i64) -> Result<Option<Task>, StoreError> {
        Ok(self.tables()?.tasks.get(&id).cloned())
    }

    async fn update_task(
        &self,
        id: i64,
        changes: &TaskChanges,
    ) -> Result<Option<Task>, StoreError> {
        let mut t = self.tables()?;
        let Some(task) = t.tasks.get_mut(&id) else {
            return Ok(None);
        };
        changes.apply(task);
        task.updated_at = Utc::now();
        Ok(Some(task.clone()))
    }

    async fn assign_task(&self, id: i64, developer_id: i64) -> Result<Option<Task>, StoreError> {
        let mut t = self.tables()?;
        if !t.tasks.contains_key(&id) {
            return Ok(None);
        }
        t.require_developer(developer_id)?;
        let Some(task) = t.tasks.get_mut(&id) else {
            return Ok(None);
        };
        task.developer_id = Some(developer_id);
        task.updated_at = Utc::now();
        Ok(Some(task.clone()))
    }

    async fn delete_task(&self, id: i64) -> Result<Option<Task>, StoreError> {
        Ok(self.tables()?.tasks.remove(&id))
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self.tables()?.tasks.values().cloned().collect())
    }

    async fn tasks_by_project(&self, project_id: i64) -> Result<Vec<Task>, StoreError> {
        Ok(self
            .tables()?
            .tasks
            .values()
            .filter(|t| t.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn tasks_by_developer(&self, developer_id: i64) -> Result<Vec<Task>, StoreError> {
        Ok(self
            .tables()?
            .tasks
            .values()
            .filter(|t| t.developer_id == Some(developer_id))
            .cloned()
            .collect())
    }

    async fn tasks_by_assignee_email(&self, email: &str) -> Result<Vec<Task>, StoreError> {
        let t = self.tables()?;
        let ids: BTreeSet<i64> = t
            .developers
            .values()
            .filter(|d| d.email.eq_ignore_ascii_case(email))
            .map(|d| d.id)
            .collect();
        Ok(t.tasks
            .values()
            .filter(|task| task.developer_id.is_some_and(|id| ids.contains(&id)))
            .cloned()
            .collect())
    }

    async fn overdue_tasks(&self, today: NaiveDate) -> Result<Vec<Task>, StoreError> {
        Ok(self
            .tables()?
            .tasks
            .values()
            .filter(|t| t.is_overdue(today))
            .cloned()
            .collect())
    }

    async fn tasks_sorted(&self, field: SortField) -> Result<Vec<Task>, StoreError> {
        let mut tasks: Vec<Task> = self.tables()?.tasks.values().cloned().collect();
        field.sort(&mut tasks);
        Ok(tasks)
    }

    async fn assignee_email(&self, task_id: i64) -> Result<Option<Option<String>>, StoreError> {
        let t = self.tables()?;
        Ok(t.tasks.get(&task_id).map(|task| {
            task.developer_id
                .and_then(|id| t.developers.get(&id))
                .map(|d| d.email.clone())
        }))
    }
}

#[async_trait]
impl DeveloperStore for MemoryStore {
    async fn create_developer(&self, developer: &NewDeveloper) -> Result<Developer, StoreError> {
        let mut t = self.tables()?;
        if t.developer_email_taken(&developer.email, None) {
            return Err(StoreError::UniqueViolation(
                "A developer with this email already exists".to_string(),
            ));
        }
        t.last_developer_id += 1;
        let created = Developer {
            id: t.last_developer_id,
            name: developer.name.clone(),
            email: developer.email.clone(),
            skills: developer.skills.clone(),
            created_at: Utc::now(),
        };
        t.developers.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_developer(&self, id: i64) -> Result<Option<Developer>, StoreError> {
        Ok(self.tables()?.developers.get(&id).cloned())
    }

    async fn update_developer(
        &self,
        id: i64,
        developer: &NewDeveloper,
    ) -> Result<Option<Developer>, StoreError> {
        let mut t = self.tables()?;
        if !t.developers.contains_key(&id) {
            return Ok(None);
        }
        if t.developer_email_taken(&developer.email, Some(id)) {
            return Err(StoreError::UniqueViolation(
                "A developer with this email already exists".to_string(),
            ));
        }
        let Some(existing) = t.developers.get_mut(&id) else {
            return Ok(None);
        };
        existing.name = developer.name.clone();
        existing.email = developer.email.clone();
        existing.skills = developer.skills.clone();
        Ok(Some(existing.clone()))
    }

    async fn delete_developer(&self, id: i64) -> Result<Option<Developer>, StoreError> {
        let mut t = self.tables()?;
        let Some(developer) = t.developers.remove(&id) else {
            return Ok(None);
        };
        let now = Utc::now();
        for task in t.tasks.values_mut().filter(|task| task.developer_id == Some(id)) {
            task.developer_id = None;
            task.updated_at = now;
        }
        Ok(Some(developer))
    }

    async fn list_developers(&self, page: PageRequest) -> Result<Page<Developer>, StoreError> {
        let t = self.tables()?;
        Ok(paginate(t.developers.values().cloned(), t.developers.len(), page))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn seed_roles(&self) -> Result<(), StoreError> {
        let mut t = self.tables()?;
        for role in Role::ALL {
            if t.roles.insert(role) {
                tracing::info!("Seeded role {role}");
            }
        }
        Ok(())
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, StoreError> {
        let mut t = self.tables()?;
        if let Some(missing) = user.roles.iter().find(|r| !t.roles.contains(*r)) {
            return Err(StoreError::MissingReference {
                resource: "Role",
                id: missing.to_string(),
            });
        }
        if t.users.values().any(|u| u.username.eq_ignore_ascii_case(&user.username)) {
            return Err(StoreError::UniqueViolation("Username already taken".to_string()));
        }
        if t.users.values().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(StoreError::UniqueViolation(
                "An account with this email already exists".to_string(),
            ));
        }
        t.last_user_id += 1;
        let mut roles = user.roles.clone();
        roles.sort();
        roles.dedup();
        let created = User {
            id: t.last_user_id,
            username: user.username.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            oauth_user: user.oauth_user,
            roles,
            created_at: Utc::now(),
        };
        t.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.tables()?.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .tables()?
            .users
            .values()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .tables()?
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn count_users(&self) -> Result<i64, StoreError> {
        Ok(self.tables()?.users.len() as i64)
    }

    async fn set_user_roles(&self, id: i64, roles: &[Role]) -> Result<Option<User>, StoreError> {
        let mut t = self.tables()?;
        if let Some(missing) = roles.iter().find(|r| !t.roles.contains(*r)) {
            return Err(StoreError::MissingReference {
                resource: "Role",
                id: missing.to_string(),
            });
        }
        let Some(user) = t.users.get_mut(&id) else {
            return Ok(None);
        };
        let mut roles = roles.to_vec();
        roles.sort();
        roles.dedup();
        user.roles = roles;
        Ok(Some(user.clone()))
    }
}

/// Audit trail kept in memory. Entries are only ever appended.
#[derive(Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<AuditLog>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry in the order it was recorded.
    pub fn entries(&self) -> Vec<AuditLog> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    fn filtered(&self, filter: &AuditFilter) -> Result<Vec<AuditLog>, StoreError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Backend("audit log lock poisoned".to_string()))?;
        Ok(entries
            .iter()
            .rev()
            .filter(|log| filter.matches(log))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AuditRecorder for MemoryAuditLog {
    async fn record(&self, entry: NewAuditEntry) -> Result<(), StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Backend("audit log lock poisoned".to_string()))?
            .push(entry.into_log());
        Ok(())
    }
}

#[async_trait]
impl AuditQuery for MemoryAuditLog {
    async fn list_audit_logs(&self, filter: &AuditFilter) -> Result<Vec<AuditLog>, StoreError> {
        self.filtered(filter)
    }

    async fn list_audit_logs_paged(
        &self,
        filter: &AuditFilter,
        page: PageRequest,
    ) -> Result<Page<AuditLog>, StoreError> {
        let logs = self.filtered(filter)?;
        let total = logs.len();
        Ok(paginate(logs.into_iter(), total, page))
    }
}
