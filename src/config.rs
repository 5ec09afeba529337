use std::net::IpAddr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Required only for the postgres backend.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub host: IpAddr,
    pub port: u16,
    pub storage: StorageBackend,
    pub cache: CacheMode,
    pub cache_ttl: Duration,
    pub token_ttl: chrono::Duration,
    pub max_body_size: usize,
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    Memory,
    Disabled,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let jwt_secret = env_required("JWT_SECRET")?;
        if jwt_secret.len() < 32 {
            return Err("JWT_SECRET must be at least 32 bytes".to_string());
        }

        let storage = match env_or("TRACKER_STORAGE", "postgres").as_str() {
            "postgres" => StorageBackend::Postgres,
            "memory" => StorageBackend::Memory,
            other => return Err(format!("Invalid TRACKER_STORAGE '{other}'")),
        };

        let database_url = match storage {
            StorageBackend::Postgres => Some(env_required("DATABASE_URL")?),
            StorageBackend::Memory => std::env::var("DATABASE_URL").ok(),
        };

        let host: IpAddr = env_or("TRACKER_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid TRACKER_HOST: {e}"))?;

        let port: u16 = env_or("TRACKER_PORT", "8080")
            .parse()
            .map_err(|e| format!("Invalid TRACKER_PORT: {e}"))?;

        let cache = match env_or("TRACKER_CACHE", "memory").as_str() {
            "memory" => CacheMode::Memory,
            "none" => CacheMode::Disabled,
            other => return Err(format!("Invalid TRACKER_CACHE '{other}'")),
        };

        let cache_ttl_secs: u64 = env_or("TRACKER_CACHE_TTL_SECS", "900")
            .parse()
            .map_err(|e| format!("Invalid TRACKER_CACHE_TTL_SECS: {e}"))?;

        let token_ttl_hours: i64 = env_or("TRACKER_TOKEN_TTL_HOURS", "30")
            .parse()
            .map_err(|e| format!("Invalid TRACKER_TOKEN_TTL_HOURS: {e}"))?;
        if token_ttl_hours <= 0 {
            return Err("TRACKER_TOKEN_TTL_HOURS must be positive".to_string());
        }

        let max_body_size: usize = env_or("TRACKER_MAX_BODY_SIZE", "1048576")
            .parse()
            .map_err(|e| format!("Invalid TRACKER_MAX_BODY_SIZE: {e}"))?;

        let log_level = env_or("TRACKER_LOG_LEVEL", "info");

        Ok(Config {
            database_url,
            jwt_secret,
            host,
            port,
            storage,
            cache,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            token_ttl: chrono::Duration::hours(token_ttl_hours),
            max_body_size,
            log_level,
        })
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
