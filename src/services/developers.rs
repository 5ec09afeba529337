use std::sync::Arc;

use validator::Validate;

use crate::audit::{self, AuditTrail};
use crate::auth::Actor;
use crate::cache::{Namespace, ResultCache};
use crate::db::EntityStore;
use crate::error::AppError;
use crate::models::{
    AuditAction, CreateDeveloper, Developer, NewDeveloper, Page, PageRequest, UpdateDeveloper,
};
use crate::policy::{self, Operation};
use crate::services::EntityLocks;

const ENTITY: &str = "Developer";

#[derive(Clone)]
pub struct DeveloperService {
    store: Arc<dyn EntityStore>,
    audit: AuditTrail,
    cache: ResultCache,
    locks: EntityLocks,
}

impl DeveloperService {
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

    pub async fn create_developer(
        &self,
        actor: &Actor,
        req: CreateDeveloper,
    ) -> Result<Developer, AppError> {
        policy::require(actor, Operation::CreateDeveloper)?;
        let req = req.normalized();
        req.validate()?;

        let _creating = self.locks.lock_new(ENTITY).await;
        let developer = self.store.create_developer(&NewDeveloper::from(req)).await?;

        self.cache.evict(Namespace::DEVELOPER_READS);
        audit::log_action(
            &self.audit,
            AuditAction::Create,
            ENTITY,
            developer.id,
            &developer,
            &actor.username,
        )
        .await;

        Ok(developer)
    }

    pub async fn update_developer(
        &self,
        actor: &Actor,
        id: i64,
        req: UpdateDeveloper,
    ) -> Result<Developer, AppError> {
        policy::require(actor, Operation::UpdateDeveloper)?;
        let req = req.normalized();
        req.validate()?;

        let _guard = self.locks.lock(ENTITY, id).await;
        let developer = self
            .store
            .update_developer(id, &NewDeveloper::from(req))
            .await?
            .ok_or_else(|| AppError::not_found(ENTITY, id))?;

        // An email change moves ownership of the developer's tasks.
        self.cache.evict(Namespace::DEVELOPER_READS);
        self.cache.evict(&[Namespace::TasksByDeveloper]);
        audit::log_action(
            &self.audit,
            AuditAction::Update,
            ENTITY,
            developer.id,
            &developer,
            &actor.username,
        )
        .await;

        Ok(developer)
    }

    /// Removes the developer and leaves its tasks unassigned.
    pub async fn delete_developer(&self, actor: &Actor, id: i64) -> Result<(), AppError> {
        policy::require(actor, Operation::DeleteDeveloper)?;

        let _guard = self.locks.lock(ENTITY, id).await;
        let removed = self
            .store
            .delete_developer(id)
            .await?
            .ok_or_else(|| AppError::not_found(ENTITY, id))?;

        self.cache.evict(Namespace::DEVELOPER_READS);
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

        Ok(())
    }

    pub async fn get_developer(&self, actor: &Actor, id: i64) -> Result<Developer, AppError> {
        policy::require(actor, Operation::ReadDevelopers)?;
        let developer: Option<Developer> = self
            .cache
            .get_or_load(Namespace::Developers, &id.to_string(), move || async move {
                Ok(self.store.find_developer(id).await?)
            })
            .await?;
        developer.ok_or_else(|| AppError::not_found(ENTITY, id))
    }

    pub async fn list_developers(
        &self,
        actor: &Actor,
        page: PageRequest,
    ) -> Result<Page<Developer>, AppError> {
        policy::require(actor, Operation::ReadDevelopers)?;
        self.cache
            .get_or_load(Namespace::DevelopersPage, &page.cache_key(), move || async move {
                Ok(self.store.list_developers(page).await?)
            })
            .await
    }
}
