use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};

use crate::auth::Actor;
use crate::auth::extractor::ACCESS_TOKEN_COOKIE;
use crate::error::AppError;
use crate::models::{GrantRoles, LoginRequest, RegisterUser, User};
use crate::routes::{ApiResponse, AppJson, AppPath};
use crate::services::LoginResponse;
use crate::state::SharedState;

fn access_cookie(token: &str, ttl: chrono::Duration) -> CookieJar {
    let access = Cookie::build((ACCESS_TOKEN_COOKIE, token.to_string()))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(ttl.num_seconds()))
        .build();
    CookieJar::new().add(access)
}

pub async fn register(
    State(state): State<SharedState>,
    AppJson(req): AppJson<RegisterUser>,
) -> Result<(StatusCode, Json<ApiResponse<User>>), AppError> {
    let user = state.auth.register(req).await?;
    Ok(ApiResponse::created("User registered", user))
}

pub async fn login(
    State(state): State<SharedState>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<(CookieJar, Json<ApiResponse<LoginResponse>>), AppError> {
    let login = state.auth.login(req).await?;
    let jar = access_cookie(&login.token, state.config.token_ttl);
    Ok((jar, ApiResponse::ok("Login successful", login)))
}

pub async fn me(
    actor: Actor,
    State(state): State<SharedState>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    let user = state.auth.me(&actor).await?;
    Ok(ApiResponse::ok("Current user", user))
}

pub async fn grant_roles(
    actor: Actor,
    State(state): State<SharedState>,
    AppPath(user_id): AppPath<i64>,
    AppJson(req): AppJson<GrantRoles>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    let user = state.auth.grant_roles(&actor, user_id, req).await?;
    Ok(ApiResponse::ok("Roles updated", user))
}
