use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::auth::Actor;
use crate::error::AppError;
use crate::models::{CreateDeveloper, Developer, Page, PageQuery, PageRequest, UpdateDeveloper};
use crate::routes::{ApiResponse, AppJson, AppPath, AppQuery};
use crate::state::SharedState;

pub async fn list(
    actor: Actor,
    State(state): State<SharedState>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<ApiResponse<Page<Developer>>>, AppError> {
    let page = PageRequest::try_from(query)?;
    let developers = state.developers.list_developers(&actor, page).await?;
    Ok(ApiResponse::ok("Developers retrieved", developers))
}

pub async fn create(
    actor: Actor,
    State(state): State<SharedState>,
    AppJson(req): AppJson<CreateDeveloper>,
) -> Result<(StatusCode, Json<ApiResponse<Developer>>), AppError> {
    let developer = state.developers.create_developer(&actor, req).await?;
    Ok(ApiResponse::created("Developer created", developer))
}

pub async fn get(
    actor: Actor,
    State(state): State<SharedState>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<ApiResponse<Developer>>, AppError> {
    let developer = state.developers.get_developer(&actor, id).await?;
    Ok(ApiResponse::ok("Developer retrieved", developer))
}

pub async fn update(
    actor: Actor,
    State(state): State<SharedState>,
    AppPath(id): AppPath<i64>,
    AppJson(req): AppJson<UpdateDeveloper>,
) -> Result<Json<ApiResponse<Developer>>, AppError> {
    let developer = state.developers.update_developer(&actor, id, req).await?;
    Ok(ApiResponse::ok("Developer updated", developer))
}

pub async fn delete(
    actor: Actor,
    State(state): State<SharedState>,
    AppPath(id): AppPath<i64>,
) -> Result<StatusCode, AppError> {
    state.developers.delete_developer(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
