pub mod audit_logs;
pub mod auth;
pub mod developers;
pub mod projects;
pub mod tasks;

use axum::Json;
use axum::Router;
use axum::extract::FromRequest;
use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use serde::Serialize;

use crate::error::AppError;
use crate::state::SharedState;

/// `Json` whose rejections use the API error body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

/// Success envelope shared by every JSON endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            status: StatusCode::OK.as_u16(),
            message: message.into(),
            data: Some(data),
        })
    }

    pub fn created(message: impl Into<String>, data: T) -> (StatusCode, Json<Self>) {
        (
            StatusCode::CREATED,
            Json(Self {
                status: StatusCode::CREATED.as_u16(),
                message: message.into(),
                data: Some(data),
            }),
        )
    }
}

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        // Auth
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        .route("/api/users/{id}/roles", put(auth::grant_roles))
        // Projects
        .route("/api/projects", get(projects::list).post(projects::create))
        .route(
            "/api/projects/{id}",
            get(projects::get)
                .put(projects::update)
                .delete(projects::delete),
        )
        // Developers
        .route(
            "/api/developers",
            get(developers::list).post(developers::create),
        )
        .route(
            "/api/developers/{id}",
            get(developers::get)
                .put(developers::update)
                .delete(developers::delete),
        )
        // Tasks
        .route("/api/tasks", get(tasks::list).post(tasks::create))
        .route("/api/tasks/me", get(tasks::mine))
        .route("/api/tasks/overdue", get(tasks::overdue))
        .route("/api/tasks/sorted", get(tasks::sorted))
        .route("/api/tasks/project/{project_id}", get(tasks::by_project))
        .route(
            "/api/tasks/developer/{developer_id}",
            get(tasks::by_developer),
        )
        .route(
            "/api/tasks/{task_id}/assign/{developer_id}",
            post(tasks::assign),
        )
        .route(
            "/api/tasks/{id}",
            get(tasks::get).put(tasks::update).delete(tasks::delete),
        )
        // Audit logs
        .route("/api/logs", get(audit_logs::list))
        .route("/api/logs/paged", get(audit_logs::list_paged))
}
