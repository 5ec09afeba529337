use std::sync::Arc;

use validator::Validate;

use crate::audit::{self, AuditTrail};
use crate::auth::Actor;
use crate::cache::{Namespace, ResultCache};
use crate::db::EntityStore;
use crate::error::AppError;
use crate::models::{AuditAction, CreateTask, NewTask, SortField, Task, TaskChanges, UpdateTask};
use crate::policy::{self, Operation};
use crate::services::{EntityLocks, today};

const ENTITY: &str = "Task";

#[derive(Clone)]
pub struct TaskService {
    store: Arc<dyn EntityStore>,
    audit: AuditTrail,
    cache: ResultCache,
    locks: EntityLocks,
}

impl TaskService {
    pub fn new(
        store: Arc<dyn EntityStore>,
        audit: AuditTrail,
        cache: ResultCache,
        locks: EntityLocks,
    ) -> Self {
        Self {
            store,
            audit,
            cache,
            locks,
        }
    }

    pub async fn create_task(&self, actor: &Actor, req: CreateTask) -> Result<Task, AppError> {
        policy::require(actor, Operation::CreateTask)?;
        let req = req.normalized();
        req.validate()?;

        let project_id = req
            .project_id
            .ok_or_else(|| AppError::InvalidArgument("Project ID is required".to_string()))?;
        if self.store.find_project(project_id).await?.is_none() {
            return Err(AppError::not_found("Project", project_id));
        }
        if let Some(developer_id) = req.developer_id {
            if self.store.find_developer(developer_id).await?.is_none() {
                return Err(AppError::not_found("Developer", developer_id));
            }
        }

        let _creating = self.locks.lock_new(ENTITY).await;
        let task = self
            .store
            .create_task(&NewTask {
                title: req.title,
                description: req.description,
                due_date: req.due_date,
                status: req.status.unwrap_or_default(),
                project_id,
                developer_id: req.developer_id,
            })
            .await?;

        self.cache.evict(Namespace::TASK_READS);
        audit::log_action(
            &self.audit,
            AuditAction::Create,
            ENTITY,
            task.id,
            &task,
            &actor.username,
        )
        .await;

        tracing::info!(task_id = task.id, project_id, actor = %actor.username, "Task created");
        Ok(task)
    }

    /// Makes `developer_id` the task's sole assignee.
    pub async fn assign_task(
        &self,
        actor: &Actor,
        task_id: i64,
        developer_id: i64,
    ) -> Result<Task, AppError> {
        policy::require(actor, Operation::AssignTask)?;

        let _guard = self.locks.lock(ENTITY, task_id).await;
        if self.store.find_task(task_id).await?.is_none() {
            return Err(AppError::not_found(ENTITY, task_id));
        }
        if self.store.find_developer(developer_id).await?.is_none() {
            return Err(AppError::not_found("Developer", developer_id));
        }

        let task = self
            .store
            .assign_task(task_id, developer_id)
            .await?
            .ok_or_else(|| AppError::not_found(ENTITY, task_id))?;

        self.cache.evict(Namespace::TASK_READS);
        audit::log_action(
            &self.audit,
            AuditAction::Update,
            ENTITY,
            task.id,
            &task,
            &actor.username,
        )
        .await;

        tracing::info!(task_id, developer_id, actor = %actor.username, "Task assigned");
        Ok(task)
    }

    /// Applies the supplied fields. Admins may update any task; developers
    /// only the tasks assigned to them.
    pub async fn update_task(
        &self,
        actor: &Actor,
        task_id: i64,
        req: UpdateTask,
    ) -> Result<Task, AppError> {
        policy::authorize(actor, Operation::UpdateTask, move || {
            self.is_assignee(actor, task_id)
        })
        .await?;
        let req = req.normalized();
        req.validate()?;

        let _guard = self.locks.lock(ENTITY, task_id).await;
        let changes = TaskChanges::from(req);
        let task = self
            .store
            .update_task(task_id, &changes)
            .await?
            .ok_or_else(|| AppError::not_found(ENTITY, task_id))?;

        self.cache.evict(Namespace::TASK_READS);
        audit::log_action(
            &self.audit,
            AuditAction::Update,
            ENTITY,
            task.id,
            &task,
            &actor.username,
        )
        .await;

        Ok(task)
    }

    pub async fn delete_task(&self, actor: &Actor, task_id: i64) -> Result<(), AppError> {
        policy::require(actor, Operation::DeleteTask)?;

        let _guard = self.locks.lock(ENTITY, task_id).await;
        // The returned row is the pre-deletion snapshot.
        let removed = self
            .store
            .delete_task(task_id)
            .await?
            .ok_or_else(|| AppError::not_found(ENTITY, task_id))?;

        self.cache.evict(Namespace::TASK_READS);
        audit::log_action(
            &self.audit,
            AuditAction::Delete,
            ENTITY,
            removed.id,
            &removed,
            &actor.username,
        )
        .await;

        tracing::info!(task_id, actor = %actor.username, "Task deleted");
        Ok(())
    }

    pub async fn get_task(&self, actor: &Actor, task_id: i64) -> Result<Task, AppError> {
        policy::require(actor, Operation::ReadTask)?;
        self.store
            .find_task(task_id)
            .await?
            .ok_or_else(|| AppError::not_found(ENTITY, task_id))
    }

    pub async fn get_all_tasks(&self, actor: &Actor) -> Result<Vec<Task>, AppError> {
        policy::require(actor, Operation::ListTasks)?;
        self.cache
            .get_or_load(Namespace::Tasks, "all", move || async move {
                Ok(self.store.list_tasks().await?)
            })
            .await
    }

    pub async fn get_tasks_by_project(
        &self,
        actor: &Actor,
        project_id: i64,
    ) -> Result<Vec<Task>, AppError> {
        policy::require(actor, Operation::ReadTasksByProject)?;
        self.cache
            .get_or_load(
                Namespace::TasksByProject,
                &project_id.to_string(),
                move || async move { Ok(self.store.tasks_by_project(project_id).await?) },
            )
            .await
    }

    pub async fn get_tasks_by_developer(
        &self,
        actor: &Actor,
        developer_id: i64,
    ) -> Result<Vec<Task>, AppError> {
        policy::require(actor, Operation::ReadTasksByDeveloper)?;
        self.cache
            .get_or_load(
                Namespace::TasksByDeveloper,
                &developer_id.to_string(),
                move || async move { Ok(self.store.tasks_by_developer(developer_id).await?) },
            )
            .await
    }

    /// Tasks assigned to the developer record sharing the actor's email.
    pub async fn get_my_tasks(&self, actor: &Actor) -> Result<Vec<Task>, AppError> {
        policy::require(actor, Operation::ReadMyTasks)?;
        let email = actor.email.to_lowercase();
        self.cache
            .get_or_load(
                Namespace::TasksByDeveloper,
                &format!("email:{email}"),
                move || async move { Ok(self.store.tasks_by_assignee_email(&email).await?) },
            )
            .await
    }

    pub async fn get_overdue_tasks(&self, actor: &Actor) -> Result<Vec<Task>, AppError> {
        policy::require(actor, Operation::ReadOverdueTasks)?;
        let today = today();
        self.cache
            .get_or_load(Namespace::OverdueTasks, &today.to_string(), move || async move {
                Ok(self.store.overdue_tasks(today).await?)
            })
            .await
    }

    pub async fn get_tasks_sorted(&self, actor: &Actor, sort_by: &str) -> Result<Vec<Task>, AppError> {
        policy::require(actor, Operation::ReadSortedTasks)?;
        let field: SortField = sort_by.parse().map_err(AppError::InvalidArgument)?;
        self.cache
            .get_or_load(Namespace::TasksSorted, field.as_str(), move || async move {
                Ok(self.store.tasks_sorted(field).await?)
            })
            .await
    }

    /// A missing task counts as not owned.
    async fn is_assignee(&self, actor: &Actor, task_id: i64) -> Result<bool, AppError> {
        let owner = self.store.assignee_email(task_id).await?;
        Ok(matches!(
            owner,
            Some(Some(email)) if email.eq_ignore_ascii_case(&actor.email)
        ))
    }
}
