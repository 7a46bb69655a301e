//! 应用运行配置加载。

use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 记录存储后端。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres,
}

/// 缓存后端。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Memory,
    Redis,
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    pub public_url: String,
    pub storage: StorageBackend,
    pub database_url: Option<String>,
    pub cache: CacheBackend,
    pub redis_url: String,
    pub cache_ttl_seconds: Option<u64>,
    pub session_ttl_seconds: u64,
    pub remote_timeout_ms: u64,
    pub sync_reassert_updated: bool,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_addr =
            env::var("LPWAN_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let public_url = env::var("LPWAN_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://{}", http_addr))
            .trim_end_matches('/')
            .to_string();
        let storage = match read_optional("LPWAN_STORAGE").as_deref() {
            None | Some("memory") => StorageBackend::Memory,
            Some("postgres") => StorageBackend::Postgres,
            Some(other) => {
                return Err(ConfigError::Invalid(
                    "LPWAN_STORAGE".to_string(),
                    other.to_string(),
                ));
            }
        };
        let database_url = read_optional("LPWAN_DATABASE_URL");
        if storage == StorageBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("LPWAN_DATABASE_URL".to_string()));
        }
        let cache = match read_optional("LPWAN_CACHE").as_deref() {
            None | Some("memory") => CacheBackend::Memory,
            Some("redis") => CacheBackend::Redis,
            Some(other) => {
                return Err(ConfigError::Invalid(
                    "LPWAN_CACHE".to_string(),
                    other.to_string(),
                ));
            }
        };
        let redis_url =
            env::var("LPWAN_REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let cache_ttl_seconds =
            read_optional_u64("LPWAN_CACHE_TTL_SECONDS")?.filter(|value| *value > 0);
        let session_ttl_seconds = read_u64_with_default("LPWAN_SESSION_TTL_SECONDS", 3600)?;
        let remote_timeout_ms = read_u64_with_default("LPWAN_REMOTE_TIMEOUT_MS", 10_000)?;
        let sync_reassert_updated = read_bool_with_default("LPWAN_SYNC_REASSERT_UPDATED", false);

        Ok(Self {
            http_addr,
            public_url,
            storage,
            database_url,
            cache,
            redis_url,
            cache_ttl_seconds,
            session_ttl_seconds,
            remote_timeout_ms,
            sync_reassert_updated,
        })
    }
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_optional_u64(key: &str) -> Result<Option<u64>, ConfigError> {
    match env::var(key) {
        Ok(value) if value.is_empty() => Ok(None),
        Ok(value) => value
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(key.to_string(), value)),
        Err(_) => Ok(None),
    }
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        Err(_) => default,
    }
}
