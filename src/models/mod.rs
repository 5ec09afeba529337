pub mod audit_log;
pub mod developer;
pub mod page;
pub mod project;
pub mod role;
pub mod task;
pub mod user;

pub use audit_log::{AuditAction, AuditFilter, AuditLog, NewAuditEntry, SYSTEM_ACTOR};
pub use developer::{CreateDeveloper, Developer, NewDeveloper, UpdateDeveloper};
pub use page::{Page, PageQuery, PageRequest};
pub use project::{CreateProject, NewProject, Project, ProjectStatus, UpdateProject};
pub use role::Role;
pub use task::{CreateTask, NewTask, SortField, Task, TaskChanges, TaskStatus, UpdateTask};
pub use user::{ExternalIdentity, GrantRoles, LoginRequest, NewUser, RegisterUser, User};
