use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::auth::Actor;
use crate::error::AppError;
use crate::models::{CreateProject, Page, PageQuery, PageRequest, Project, UpdateProject};
use crate::routes::{ApiResponse, AppJson, AppPath, AppQuery};
use crate::state::SharedState;

pub async fn list(
    actor: Actor,
    State(state): State<SharedState>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<ApiResponse<Page<Project>>>, AppError> {
    let page = PageRequest::try_from(query)?;
    let projects = state.projects.list_projects(&actor, page).await?;
    Ok(ApiResponse::ok("Projects retrieved", projects))
}

pub async fn create(
    actor: Actor,
    State(state): State<SharedState>,
    AppJson(req): AppJson<CreateProject>,
) -> Result<(StatusCode, Json<ApiResponse<Project>>), AppError> {
    let project = state.projects.create_project(&actor, req).await?;
    Ok(ApiResponse::created("Project created", project))
}

pub async fn get(
    actor: Actor,
    State(state): State<SharedState>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<ApiResponse<Project>>, AppError> {
    let project = state.projects.get_project(&actor, id).await?;
    Ok(ApiResponse::ok("Project retrieved", project))
}

pub async fn update(
    actor: Actor,
    State(state): State<SharedState>,
    AppPath(id): AppPath<i64>,
    AppJson(req): AppJson<UpdateProject>,
) -> Result<Json<ApiResponse<Project>>, AppError> {
    let project = state.projects.update_project(&actor, id, req).await?;
    Ok(ApiResponse::ok("Project updated", project))
}

pub async fn delete(
    actor: Actor,
    State(state): State<SharedState>,
    AppPath(id): AppPath<i64>,
) -> Result<StatusCode, AppError> {
    state.projects.delete_project(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
