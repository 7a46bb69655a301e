//! 应用状态与启动装配
//!
//! 启动顺序：
//! 1. 按配置选择缓存（内存 / Redis）与记录存储（内存 / PostgreSQL）
//! 2. 登记网络类型（LoRa、IP）与 LoRa Server v1 / v2 协议
//! 3. 按登记得到的协议 ID 构建处理器注册表
//! 4. 组装同步引擎

use lpwan_config::{AppConfig, CacheBackend, ConfigError, StorageBackend};
use lpwan_protocol::{HttpReportingSink, LoraServerHandler, ProtocolRegistry, SessionCache};
use lpwan_storage::{CacheClient, InMemoryCacheClient, RedisCacheClient, Stores, connect_pool};
use lpwan_sync::{SyncConfig, SyncEngine, ensure_network_type, register_network_protocol};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub type BootstrapError = Box<dyn std::error::Error + Send + Sync>;

/// LoRa Server 协议族名称
pub const LORA_SERVER: &str = "LoRa Server";

#[derive(Clone)]
pub struct AppState {
    pub engine: SyncEngine,
}

/// 按配置装配存储、协议注册表与同步引擎。
pub async fn build_state(config: &AppConfig) -> Result<AppState, BootstrapError> {
    let cache: Arc<dyn CacheClient> = match config.cache {
        CacheBackend::Memory => Arc::new(InMemoryCacheClient::new()),
        CacheBackend::Redis => Arc::new(RedisCacheClient::connect(&config.redis_url)?),
    };
    let stores = match config.storage {
        StorageBackend::Memory => Stores::in_memory(cache.clone(), config.cache_ttl_seconds),
        StorageBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .ok_or_else(|| ConfigError::Missing("LPWAN_DATABASE_URL".to_string()))?;
            let pool = connect_pool(database_url).await?;
            Stores::postgres(pool, cache.clone(), config.cache_ttl_seconds).await?
        }
    };
    let stores = Arc::new(stores);

    let lora = ensure_network_type(&stores, "LoRa").await?;
    ensure_network_type(&stores, "IP").await?;
    let v1 = register_network_protocol(&stores, LORA_SERVER, "1.0", "lora-server-v1", lora.id).await?;
    let v2 = register_network_protocol(&stores, LORA_SERVER, "2.0", "lora-server-v2", lora.id).await?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(config.remote_timeout_ms))
        .build()?;
    let sessions = SessionCache::new(cache, config.session_ttl_seconds);
    let mut registry = ProtocolRegistry::new();
    registry.register(
        v1.id,
        Arc::new(LoraServerHandler::v1(
            client.clone(),
            sessions.clone(),
            config.public_url.clone(),
        )),
    );
    registry.register(
        v2.id,
        Arc::new(LoraServerHandler::v2(
            client.clone(),
            sessions.clone(),
            config.public_url.clone(),
        )),
    );
    info!(
        target: "lpwan.api",
        handlers = registry.len(),
        storage = ?config.storage,
        cache = ?config.cache,
        "protocol_registry_ready"
    );

    let engine = SyncEngine::new(
        stores,
        registry,
        Arc::new(HttpReportingSink::new(client)),
        sessions,
        SyncConfig {
            reassert_updated: config.sync_reassert_updated,
        },
    );
    Ok(AppState { engine })
}
