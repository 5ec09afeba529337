#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use project_tracker::Backend;
use project_tracker::config::{CacheMode, Config, StorageBackend};
use project_tracker::db::memory::{MemoryAuditLog, MemoryStore};
use project_tracker::state::SharedState;

pub const PASSWORD: &str = "password123";

/// A running test server backed by the in-memory store.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub state: SharedState,
    pub audit: Arc<MemoryAuditLog>,
}

pub fn test_config() -> Config {
    Config {
        database_url: None,
        jwt_secret: "test-jwt-secret-that-is-long-enough".to_string(),
        host: "127.0.0.1".parse().unwrap(),
        port: 0, // unused, we bind to random port
        storage: StorageBackend::Memory,
        cache: CacheMode::Memory,
        cache_ttl: Duration::from_secs(900),
        token_ttl: chrono::Duration::hours(30),
        max_body_size: 1_048_576,
        log_level: "warn".to_string(),
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&json!({ "username": username, "email": email, "password": password }))
            .send()
            .await
            .expect("register request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn login(&self, username: &str, password: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("login request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Register and log in the first account (ADMIN), return its token.
    pub async fn bootstrap(&self) -> String {
        let (body, status) = self.register("admin", "admin@test.com", PASSWORD).await;
        assert_eq!(status, StatusCode::CREATED, "bootstrap register failed: {body}");
        self.token("admin").await
    }

    pub async fn token(&self, username: &str) -> String {
        let (body, status) = self.login(username, PASSWORD).await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["data"]["token"].as_str().unwrap().to_string()
    }

    /// Register a user, replace its roles via the admin token, return a fresh token.
    pub async fn user_with_roles(
        &self,
        admin_token: &str,
        username: &str,
        email: &str,
        roles: &[&str],
    ) -> String {
        let (body, status) = self.register(username, email, PASSWORD).await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        let id = body["data"]["id"].as_i64().unwrap();

        let (body, status) = self
            .put_auth(
                &format!("/api/users/{id}/roles"),
                admin_token,
                &json!({ "roles": roles }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "grant roles failed: {body}");

        self.token(username).await
    }

    pub async fn create_project(&self, token: &str, name: &str) -> Value {
        let (body, status) = self
            .post_auth(
                "/api/projects",
                token,
                &json!({ "name": name, "deadline": "2030-12-31" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create project failed: {body}");
        body["data"].clone()
    }

    pub async fn create_developer(&self, token: &str, name: &str, email: &str) -> Value {
        let (body, status) = self
            .post_auth(
                "/api/developers",
                token,
                &json!({ "name": name, "email": email, "skills": ["rust"] }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create developer failed: {body}");
        body["data"].clone()
    }

    pub async fn create_task(&self, token: &str, body: &Value) -> Value {
        let (resp, status) = self.post_auth("/api/tasks", token, body).await;
        assert_eq!(status, StatusCode::CREATED, "create task failed: {resp}");
        resp["data"].clone()
    }

    /// Make an authenticated GET request.
    pub async fn get_auth(&self, path: &str, token: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Make an authenticated POST request with JSON body.
    pub async fn post_auth(&self, path: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Make an authenticated PUT request with JSON body.
    pub async fn put_auth(&self, path: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .put(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("put request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Make an authenticated DELETE request.
    pub async fn delete_auth(&self, path: &str, token: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("delete request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Audit entries for one entity type, oldest first.
    pub fn audit_entries(&self, entity_type: &str) -> Vec<project_tracker::models::AuditLog> {
        self.audit
            .entries()
            .into_iter()
            .filter(|e| e.entity_type == entity_type)
            .collect()
    }
}

/// Spawn a test app on a fresh in-memory store with roles seeded.
pub async fn spawn_app() -> TestApp {
    let audit = Arc::new(MemoryAuditLog::new());
    let backend = Backend {
        store: Arc::new(MemoryStore::new()),
        audit_recorder: audit.clone(),
        audit_query: audit.clone(),
    };

    let (app, state) = project_tracker::build_app(backend, test_config());
    state.auth.seed_roles().await.expect("Failed to seed roles");

    // Bind to random port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        addr,
        client,
        state,
        audit,
    }
}
