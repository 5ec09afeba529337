use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;

use crate::auth::jwt::{self, Claims};
use crate::error::AppError;
use crate::models::Role;
use crate::state::SharedState;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub roles: Vec<Role>,
}

impl Actor {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

impl From<Claims> for Actor {
    fn from(claims: Claims) -> Self {
        Actor {
            user_id: claims.uid,
            username: claims.sub,
            email: claims.email,
            roles: claims.roles,
        }
    }
}

impl FromRequestParts<SharedState> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let secret = &state.config.jwt_secret;

        // Bearer token takes precedence over the cookie
        if let Some(auth_header) = parts.headers.get("authorization") {
            let auth_str = auth_header.to_str().map_err(|_| {
                AppError::Unauthenticated("Invalid authorization header".to_string())
            })?;

            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                let claims = jwt::decode_token(token.trim(), secret).map_err(|e| {
                    tracing::debug!("Rejected bearer token: {e}");
                    AppError::Unauthenticated("Invalid or expired token".to_string())
                })?;
                return Ok(claims.into());
            }
        }

        let jar = CookieJar::from_headers(&parts.headers);
        if let Some(cookie) = jar.get(ACCESS_TOKEN_COOKIE) {
            let claims = jwt::decode_token(cookie.value(), secret).map_err(|e| {
                tracing::debug!("Rejected token cookie: {e}");
                AppError::Unauthenticated("Invalid or expired token".to_string())
            })?;
            return Ok(claims.into());
        }

        Err(AppError::Unauthenticated(
            "Missing authentication token".to_string(),
        ))
    }
}
