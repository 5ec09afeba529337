//! Role-based authorization.
//!
//! Every protected operation has exactly one entry in [`rule`]. Services call
//! [`authorize`] before doing any work, so a denial never leaves a write, an
//! audit entry or a cache eviction behind.

use std::future::Future;

use crate::auth::Actor;
use crate::error::AppError;
use crate::models::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListTasks,
    ReadTask,
    CreateTask,
    AssignTask,
    UpdateTask,
    DeleteTask,
    ReadMyTasks,
    ReadTasksByProject,
    ReadTasksByDeveloper,
    ReadOverdueTasks,
    ReadSortedTasks,
    ReadProjects,
    CreateProject,
    UpdateProject,
    DeleteProject,
    ReadDevelopers,
    CreateDeveloper,
    UpdateDeveloper,
    DeleteDeveloper,
    ReadAuditLogs,
    ManageUserRoles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Any authenticated identity.
    Authenticated,
    /// At least one of the listed roles.
    AnyRole(&'static [Role]),
    /// One of `roles`, or `owner_role` together with ownership of the resource.
    RoleOrOwner {
        roles: &'static [Role],
        owner_role: Role,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

const ADMIN: &[Role] = &[Role::Admin];
const ADMIN_OR_MANAGER: &[Role] = &[Role::Admin, Role::Manager];
const DEVELOPER: &[Role] = &[Role::Developer];

pub fn rule(op: Operation) -> Rule {
    use Operation::*;
    match op {
        ListTasks | CreateTask | AssignTask => Rule::AnyRole(ADMIN_OR_MANAGER),
        DeleteTask => Rule::AnyRole(ADMIN),
        ReadMyTasks => Rule::AnyRole(DEVELOPER),
        UpdateTask => Rule::RoleOrOwner {
            roles: ADMIN,
            owner_role: Role::Developer,
        },
        ReadTask | ReadTasksByProject | ReadOverdueTasks | ReadSortedTasks => Rule::Authenticated,
        ReadTasksByDeveloper => Rule::AnyRole(ADMIN),
        ReadProjects | ReadDevelopers => Rule::Authenticated,
        CreateProject | UpdateProject | CreateDeveloper | UpdateDeveloper => {
            Rule::AnyRole(ADMIN_OR_MANAGER)
        }
        DeleteProject | DeleteDeveloper => Rule::AnyRole(ADMIN),
        ReadAuditLogs | ManageUserRoles => Rule::AnyRole(ADMIN),
    }
}

fn has_any(roles: &[Role], wanted: &[Role]) -> bool {
    wanted.iter().any(|w| roles.contains(w))
}

/// True when the decision for `roles` hinges on resource ownership.
pub fn needs_ownership(roles: &[Role], op: Operation) -> bool {
    match rule(op) {
        Rule::RoleOrOwner {
            roles: granted,
            owner_role,
        } => !has_any(roles, granted) && roles.contains(&owner_role),
        _ => false,
    }
}

/// Pure policy evaluation. `owns` is only consulted for owner-gated rules.
pub fn decide(roles: &[Role], op: Operation, owns: impl FnOnce() -> bool) -> Decision {
    let allowed = match rule(op) {
        Rule::Authenticated => true,
        Rule::AnyRole(granted) => has_any(roles, granted),
        Rule::RoleOrOwner {
            roles: granted,
            owner_role,
        } => has_any(roles, granted) || (roles.contains(&owner_role) && owns()),
    };
    if allowed {
        Decision::Allow
    } else {
        Decision::Deny
    }
}

fn forbidden(op: Operation) -> AppError {
    AppError::Forbidden(format!("Access denied for {op:?}"))
}

/// Checks an operation whose rule does not involve ownership.
pub fn require(actor: &Actor, op: Operation) -> Result<(), AppError> {
    match decide(&actor.roles, op, || false) {
        Decision::Allow => Ok(()),
        Decision::Deny => {
            tracing::debug!("Denied {op:?} for {}", actor.username);
            Err(forbidden(op))
        }
    }
}

/// Checks an operation, running the ownership lookup only when the actor's
/// roles alone cannot settle it.
pub async fn authorize<F, Fut>(actor: &Actor, op: Operation, owns: F) -> Result<(), AppError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<bool, AppError>>,
{
    let owner = if needs_ownership(&actor.roles, op) {
        owns().await?
    } else {
        false
    };
    match decide(&actor.roles, op, || owner) {
        Decision::Allow => Ok(()),
        Decision::Deny => {
            tracing::debug!("Denied {op:?} for {}", actor.username);
            Err(forbidden(op))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn developer_cannot_delete_tasks_even_as_owner() {
        let roles = [Role::Developer];
        assert_eq!(decide(&roles, Operation::DeleteTask, || true), Decision::Deny);
    }

    #[test]
    fn developer_updates_only_owned_tasks() {
        let roles = [Role::Developer];
        assert_eq!(decide(&roles, Operation::UpdateTask, || true), Decision::Allow);
        assert_eq!(decide(&roles, Operation::UpdateTask, || false), Decision::Deny);
    }

    #[test]
    fn admin_update_skips_ownership_lookup() {
        let roles = [Role::Admin];
        assert!(!needs_ownership(&roles, Operation::UpdateTask));
        assert_eq!(
            decide(&roles, Operation::UpdateTask, || panic!("ownership consulted")),
            Decision::Allow
        );
    }

    #[test]
    fn manager_cannot_update_tasks() {
        let roles = [Role::Manager];
        assert!(!needs_ownership(&roles, Operation::UpdateTask));
        assert_eq!(decide(&roles, Operation::UpdateTask, || true), Decision::Deny);
    }

    #[test]
    fn manager_creates_and_assigns_but_cannot_delete() {
        let roles = [Role::Manager];
        assert_eq!(decide(&roles, Operation::CreateTask, || false), Decision::Allow);
        assert_eq!(decide(&roles, Operation::AssignTask, || false), Decision::Allow);
        assert_eq!(decide(&roles, Operation::DeleteTask, || false), Decision::Deny);
        assert_eq!(decide(&roles, Operation::ReadTasksByDeveloper, || false), Decision::Deny);
    }

    #[test]
    fn my_tasks_requires_developer_role() {
        assert_eq!(decide(&[Role::Admin], Operation::ReadMyTasks, || false), Decision::Deny);
        assert_eq!(
            decide(&[Role::Developer], Operation::ReadMyTasks, || false),
            Decision::Allow
        );
    }

    #[test]
    fn authenticated_reads_allow_any_role() {
        for op in [
            Operation::ReadTasksByProject,
            Operation::ReadOverdueTasks,
            Operation::ReadSortedTasks,
        ] {
            assert_eq!(decide(&[Role::Contractor], op, || false), Decision::Allow);
            assert_eq!(decide(&[], op, || false), Decision::Allow);
        }
    }
}
