pub mod audit;
pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod policy;
pub mod rate_limit;
pub mod routes;
pub mod services;
pub mod state;
pub mod worker;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue};
use sqlx::PgPool;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::audit::AuditTrail;
use crate::cache::{CacheProvider, InMemoryCache, NoCache, ResultCache};
use crate::config::{CacheMode, Config};
use crate::db::memory::{MemoryAuditLog, MemoryStore};
use crate::db::postgres::{PgAuditLog, PgStore};
use crate::db::{AuditQuery, AuditRecorder, EntityStore};
use crate::services::{AuthService, DeveloperService, EntityLocks, ProjectService, TaskService};
use crate::state::{AppState, SharedState};

/// The storage the services run against.
#[derive(Clone)]
pub struct Backend {
    pub store: Arc<dyn EntityStore>,
    pub audit_recorder: Arc<dyn AuditRecorder>,
    pub audit_query: Arc<dyn AuditQuery>,
}

impl Backend {
    pub fn postgres(pool: PgPool) -> Self {
        let audit = Arc::new(PgAuditLog::new(pool.clone()));
        Self {
            store: Arc::new(PgStore::new(pool)),
            audit_recorder: audit.clone(),
            audit_query: audit,
        }
    }

    pub fn memory() -> Self {
        let audit = Arc::new(MemoryAuditLog::new());
        Self {
            store: Arc::new(MemoryStore::new()),
            audit_recorder: audit.clone(),
            audit_query: audit,
        }
    }
}

pub fn build_state(backend: Backend, config: Config) -> SharedState {
    let provider: Arc<dyn CacheProvider> = match config.cache {
        CacheMode::Memory => Arc::new(InMemoryCache::new(config.cache_ttl)),
        CacheMode::Disabled => Arc::new(NoCache),
    };
    let cache = ResultCache::new(provider);
    let trail = AuditTrail::new(backend.audit_recorder);
    let locks = EntityLocks::new();

    Arc::new(AppState {
        auth: AuthService::new(
            backend.store.clone(),
            trail.clone(),
            config.jwt_secret.clone(),
            config.token_ttl,
        ),
        projects: ProjectService::new(
            backend.store.clone(),
            trail.clone(),
            cache.clone(),
            locks.clone(),
        ),
        developers: DeveloperService::new(
            backend.store.clone(),
            trail.clone(),
            cache.clone(),
            locks.clone(),
        ),
        tasks: TaskService::new(backend.store.clone(), trail, cache.clone(), locks),
        store: backend.store,
        audit_log: backend.audit_query,
        cache,
        config,
    })
}

pub fn build_app(backend: Backend, config: Config) -> (Router, SharedState) {
    let state = build_state(backend, config);
    (router(state.clone()), state)
}

pub fn router(state: SharedState) -> Router {
    let max_body_size = state.config.max_body_size;

    Router::new()
        .merge(routes::api_routes())
        .route("/health", axum::routing::get(health))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
