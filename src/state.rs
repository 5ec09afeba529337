use std::sync::Arc;

use crate::cache::ResultCache;
use crate::config::Config;
use crate::db::{AuditQuery, EntityStore};
use crate::services::{AuthService, DeveloperService, ProjectService, TaskService};

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn EntityStore>,
    pub audit_log: Arc<dyn AuditQuery>,
    pub cache: ResultCache,
    pub auth: AuthService,
    pub projects: ProjectService,
    pub developers: DeveloperService,
    pub tasks: TaskService,
}
