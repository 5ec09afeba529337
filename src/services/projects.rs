use std::sync::Arc;

use validator::Validate;

use crate::audit::{self, AuditTrail};
use crate::auth::Actor;
use crate::cache::{Namespace, ResultCache};
use crate::db::EntityStore;
use crate::error::AppError;
use crate::models::{
    AuditAction, CreateProject, NewProject, Page, PageRequest, Project, UpdateProject,
};
use crate::policy::{self, Operation};
use crate::services::EntityLocks;

const ENTITY: &str = "Project";

#[derive(Clone)]
pub struct ProjectService {
    store: Arc<dyn EntityStore>,
    audit: AuditTrail,
    cache: ResultCache,
    locks: EntityLocks,
}

impl ProjectService {
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

    pub async fn create_project(
        &self,
        actor: &Actor,
        req: CreateProject,
    ) -> Result<Project, AppError> {
        policy::require(actor, Operation::CreateProject)?;
        let new = validated(req)?;

        let _creating = self.locks.lock_new(ENTITY).await;
        let project = self.store.create_project(&new).await?;

        self.cache.evict(Namespace::PROJECT_READS);
        audit::log_action(
            &self.audit,
            AuditAction::Create,
            ENTITY,
            project.id,
            &project,
            &actor.username,
        )
        .await;

        Ok(project)
    }

    /// Full replacement of the editable fields.
    pub async fn update_project(
        &self,
        actor: &Actor,
        id: i64,
        req: UpdateProject,
    ) -> Result<Project, AppError> {
        policy::require(actor, Operation::UpdateProject)?;
        let new = validated(req)?;

        let _guard = self.locks.lock(ENTITY, id).await;
        let project = self
            .store
            .update_project(id, &new)
            .await?
            .ok_or_else(|| AppError::not_found(ENTITY, id))?;

        self.cache.evict(Namespace::PROJECT_READS);
        audit::log_action(
            &self.audit,
            AuditAction::Update,
            ENTITY,
            project.id,
            &project,
            &actor.username,
        )
        .await;

        Ok(project)
    }

    /// Removes the project together with all of its tasks.
    pub async fn delete_project(&self, actor: &Actor, id: i64) -> Result<(), AppError> {
        policy::require(actor, Operation::DeleteProject)?;

        let _guard = self.locks.lock(ENTITY, id).await;
        let removed = self
            .store
            .delete_project(id)
            .await?
            .ok_or_else(|| AppError::not_found(ENTITY, id))?;

        self.cache.evict(Namespace::PROJECT_READS);
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

        tracing::info!(project_id = id, actor = %actor.username, "Project deleted");
        Ok(())
    }

    pub async fn get_project(&self, actor: &Actor, id: i64) -> Result<Project, AppError> {
        policy::require(actor, Operation::ReadProjects)?;
        let project: Option<Project> = self
            .cache
            .get_or_load(Namespace::Projects, &id.to_string(), move || async move {
                Ok(self.store.find_project(id).await?)
            })
            .await?;
        project.ok_or_else(|| AppError::not_found(ENTITY, id))
    }

    pub async fn list_projects(
        &self,
        actor: &Actor,
        page: PageRequest,
    ) -> Result<Page<Project>, AppError> {
        policy::require(actor, Operation::ReadProjects)?;
        self.cache
            .get_or_load(Namespace::ProjectsPage, &page.cache_key(), move || async move {
                Ok(self.store.list_projects(page).await?)
            })
            .await
    }
}

fn validated(req: CreateProject) -> Result<NewProject, AppError> {
    let req = req.normalized();
    req.validate()?;
    let deadline = req
        .deadline
        .ok_or_else(|| AppError::InvalidArgument("Deadline is required".to_string()))?;
    Ok(NewProject {
        name: req.name,
        description: req.description,
        deadline,
        status: req.status.unwrap_or_default(),
    })
}
