//! Business operations. Each one authorizes the actor first, then touches the
//! store, evicts affected cache namespaces and records an audit entry.

pub mod auth;
pub mod developers;
pub mod locks;
pub mod projects;
pub mod tasks;

pub use auth::{AuthService, LoginResponse};
pub use developers::DeveloperService;
pub use locks::EntityLocks;
pub use projects::ProjectService;
pub use tasks::TaskService;

use chrono::{NaiveDate, Utc};

/// The calendar date overdue checks compare against.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}
