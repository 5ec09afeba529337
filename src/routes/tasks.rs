use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;

use crate::auth::Actor;
use crate::error::AppError;
use crate::models::{CreateTask, Task, UpdateTask};
use crate::routes::{ApiResponse, AppJson, AppPath, AppQuery};
use crate::state::SharedState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortQuery {
    pub sort_by: Option<String>,
}

pub async fn list(
    actor: Actor,
    State(state): State<SharedState>,
) -> Result<Json<ApiResponse<Vec<Task>>>, AppError> {
    let tasks = state.tasks.get_all_tasks(&actor).await?;
    Ok(ApiResponse::ok("Tasks retrieved", tasks))
}

pub async fn create(
    actor: Actor,
    State(state): State<SharedState>,
    AppJson(req): AppJson<CreateTask>,
) -> Result<(StatusCode, Json<ApiResponse<Task>>), AppError> {
    let task = state.tasks.create_task(&actor, req).await?;
    Ok(ApiResponse::created("Task created", task))
}

pub async fn get(
    actor: Actor,
    State(state): State<SharedState>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<ApiResponse<Task>>, AppError> {
    let task = state.tasks.get_task(&actor, id).await?;
    Ok(ApiResponse::ok("Task retrieved", task))
}

pub async fn update(
    actor: Actor,
    State(state): State<SharedState>,
    AppPath(id): AppPath<i64>,
    AppJson(req): AppJson<UpdateTask>,
) -> Result<Json<ApiResponse<Task>>, AppError> {
    let task = state.tasks.update_task(&actor, id, req).await?;
    Ok(ApiResponse::ok("Task updated", task))
}

pub async fn delete(
    actor: Actor,
    State(state): State<SharedState>,
    AppPath(id): AppPath<i64>,
) -> Result<StatusCode, AppError> {
    state.tasks.delete_task(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn assign(
    actor: Actor,
    State(state): State<SharedState>,
    AppPath((task_id, developer_id)): AppPath<(i64, i64)>,
) -> Result<Json<ApiResponse<Task>>, AppError> {
    let task = state.tasks.assign_task(&actor, task_id, developer_id).await?;
    Ok(ApiResponse::ok("Task assigned", task))
}

pub async fn mine(
    actor: Actor,
    State(state): State<SharedState>,
) -> Result<Json<ApiResponse<Vec<Task>>>, AppError> {
    let tasks = state.tasks.get_my_tasks(&actor).await?;
    Ok(ApiResponse::ok("Assigned tasks retrieved", tasks))
}

pub async fn overdue(
    actor: Actor,
    State(state): State<SharedState>,
) -> Result<Json<ApiResponse<Vec<Task>>>, AppError> {
    let tasks = state.tasks.get_overdue_tasks(&actor).await?;
    Ok(ApiResponse::ok("Overdue tasks retrieved", tasks))
}

pub async fn sorted(
    actor: Actor,
    State(state): State<SharedState>,
    AppQuery(query): AppQuery<SortQuery>,
) -> Result<Json<ApiResponse<Vec<Task>>>, AppError> {
    let sort_by = query.sort_by.unwrap_or_default();
    let tasks = state.tasks.get_tasks_sorted(&actor, &sort_by).await?;
    Ok(ApiResponse::ok(format!("Tasks fetched sorted by {sort_by}"), tasks))
}

pub async fn by_project(
    actor: Actor,
    State(state): State<SharedState>,
    AppPath(project_id): AppPath<i64>,
) -> Result<Json<ApiResponse<Vec<Task>>>, AppError> {
    let tasks = state.tasks.get_tasks_by_project(&actor, project_id).await?;
    Ok(ApiResponse::ok("Project tasks retrieved", tasks))
}

pub async fn by_developer(
    actor: Actor,
    State(state): State<SharedState>,
    AppPath(developer_id): AppPath<i64>,
) -> Result<Json<ApiResponse<Vec<Task>>>, AppError> {
    let tasks = state.tasks.get_tasks_by_developer(&actor, developer_id).await?;
    Ok(ApiResponse::ok("Developer tasks retrieved", tasks))
}
