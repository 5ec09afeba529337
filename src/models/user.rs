use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::Role;

static USERNAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").unwrap());

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Provisioned by an external identity provider; cannot log in with a password.
    pub oauth_user: bool,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub oauth_user: bool,
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RegisterUser {
    #[validate(
        length(min = 3, max = 50, message = "Username must be between 3 and 50 characters"),
        regex(path = *USERNAME_PATTERN, message = "Username may only contain letters, digits, '.', '_' and '-'")
    )]
    pub username: String,
    #[validate(email(message = "Must be a valid email"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "Password must be between 8 and 128 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Replaces a user's role set.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GrantRoles {
    #[validate(length(min = 1, message = "At least one role is required"))]
    pub roles: Vec<Role>,
}

/// Identity asserted by an external provider after a successful sign-in.
#[derive(Debug, Clone)]
pub struct ExternalIdentity {
    pub email: String,
    pub display_name: Option<String>,
}
