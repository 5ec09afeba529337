use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use validator::Validate;

use crate::audit::{self, AuditTrail};
use crate::auth::{Actor, jwt, password};
use crate::db::EntityStore;
use crate::error::AppError;
use crate::models::{
    AuditAction, ExternalIdentity, GrantRoles, LoginRequest, NewUser, RegisterUser, Role,
    SYSTEM_ACTOR, User,
};
use crate::policy::{self, Operation};
use crate::rate_limit::LoginRateLimiter;

const ENTITY: &str = "User";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub username: String,
    pub roles: Vec<Role>,
    pub expires_at: DateTime<Utc>,
}

pub struct AuthService {
    store: Arc<dyn EntityStore>,
    audit: AuditTrail,
    login_limiter: LoginRateLimiter,
    jwt_secret: String,
    token_ttl: chrono::Duration,
    /// Serializes registration so only one account can be the first.
    registration: Mutex<()>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn EntityStore>,
        audit: AuditTrail,
        jwt_secret: String,
        token_ttl: chrono::Duration,
    ) -> Self {
        Self {
            store,
            audit,
            login_limiter: LoginRateLimiter::new(),
            jwt_secret,
            token_ttl,
            registration: Mutex::new(()),
        }
    }

    pub fn login_limiter(&self) -> &LoginRateLimiter {
        &self.login_limiter
    }

    pub async fn seed_roles(&self) -> Result<(), AppError> {
        self.store.seed_roles().await?;
        Ok(())
    }

    pub async fn register(&self, req: RegisterUser) -> Result<User, AppError> {
        req.validate()?;
        let password_hash = password::hash_blocking(req.password)
            .await
            .map_err(AppError::Internal)?;

        let _registration = self.registration.lock().await;
        let mut roles = vec![Role::Developer];
        if self.store.count_users().await? == 0 {
            roles.insert(0, Role::Admin);
        }

        let user = self
            .store
            .create_user(&NewUser {
                username: req.username.trim().to_string(),
                email: req.email.trim().to_lowercase(),
                password_hash,
                oauth_user: false,
                roles,
            })
            .await?;

        audit::log_action(
            &self.audit,
            AuditAction::Create,
            ENTITY,
            user.id,
            &user,
            &user.username,
        )
        .await;

        tracing::info!(user_id = user.id, username = %user.username, roles = ?user.roles, "User registered");
        Ok(user)
    }

    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse, AppError> {
        let username = req.username.trim();
        if let Err(retry_after) = self.login_limiter.check(username) {
            return Err(AppError::RateLimited(format!(
                "Too many failed login attempts. Try again in {retry_after} seconds."
            )));
        }

        let invalid = || AppError::Unauthenticated("Invalid username or password".to_string());

        let Some(user) = self.store.find_user_by_username(username).await? else {
            self.login_limiter.record_failure(username);
            return Err(invalid());
        };

        if user.oauth_user {
            tracing::debug!(username, "Password login refused for externally provisioned user");
            return Err(AppError::Unauthenticated(
                "This account signs in through an external provider".to_string(),
            ));
        }

        let valid = password::verify_blocking(req.password, user.password_hash.clone())
            .await
            .map_err(AppError::Internal)?;
        if !valid {
            self.login_limiter.record_failure(username);
            tracing::debug!(username, "Failed login attempt");
            return Err(invalid());
        }
        self.login_limiter.reset(username);

        self.issue_token(&user)
    }

    pub fn issue_token(&self, user: &User) -> Result<LoginResponse, AppError> {
        let claims = jwt::Claims::new(user, self.token_ttl);
        let expires_at = DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now);
        let token = jwt::encode_token(&claims, &self.jwt_secret).map_err(AppError::Internal)?;
        Ok(LoginResponse {
            token,
            token_type: "Bearer",
            username: user.username.clone(),
            roles: user.roles.clone(),
            expires_at,
        })
    }

    pub async fn me(&self, actor: &Actor) -> Result<User, AppError> {
        self.store
            .find_user_by_id(actor.user_id)
            .await?
            .ok_or_else(|| AppError::Unauthenticated("Account no longer exists".to_string()))
    }

    /// Replaces the role set of `user_id`. Takes effect at the user's next login.
    pub async fn grant_roles(
        &self,
        actor: &Actor,
        user_id: i64,
        req: GrantRoles,
    ) -> Result<User, AppError> {
        policy::require(actor, Operation::ManageUserRoles)?;
        req.validate()?;

        let mut roles = req.roles;
        roles.sort();
        roles.dedup();

        let user = self
            .store
            .set_user_roles(user_id, &roles)
            .await?
            .ok_or_else(|| AppError::not_found(ENTITY, user_id))?;

        audit::log_action(
            &self.audit,
            AuditAction::Update,
            ENTITY,
            user.id,
            &user,
            &actor.username,
        )
        .await;

        tracing::info!(user_id, roles = ?user.roles, actor = %actor.username, "Roles replaced");
        Ok(user)
    }

    /// Finds or creates the account for an identity asserted by an external
    /// provider. New accounts get CONTRACTOR and no usable password.
    pub async fn provision_external_user(
        &self,
        identity: ExternalIdentity,
    ) -> Result<User, AppError> {
        let email = identity.email.trim().to_lowercase();
        if email.is_empty() {
            return Err(AppError::InvalidArgument(
                "External identity has no email".to_string(),
            ));
        }
        if let Some(existing) = self.store.find_user_by_email(&email).await? {
            return Ok(existing);
        }

        let _registration = self.registration.lock().await;
        let username = self.free_username(&identity, &email).await?;
        let user = self
            .store
            .create_user(&NewUser {
                username,
                email,
                password_hash: String::new(),
                oauth_user: true,
                roles: vec![Role::Contractor],
            })
            .await?;

        audit::log_action(
            &self.audit,
            AuditAction::Create,
            ENTITY,
            user.id,
            &user,
            SYSTEM_ACTOR,
        )
        .await;

        tracing::info!(user_id = user.id, username = %user.username, "External user provisioned");
        Ok(user)
    }

    async fn free_username(
        &self,
        identity: &ExternalIdentity,
        email: &str,
    ) -> Result<String, AppError> {
        let base: String = identity
            .display_name
            .as_deref()
            .unwrap_or_else(|| email.split('@').next().unwrap_or(email))
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
            .take(40)
            .collect();
        let base = if base.len() < 3 {
            format!("user-{base}")
        } else {
            base
        };

        let mut candidate = base.clone();
        for n in 1.. {
            if self.store.find_user_by_username(&candidate).await?.is_none() {
                break;
            }
            candidate = format!("{base}-{n}");
        }
        Ok(candidate)
    }
}
