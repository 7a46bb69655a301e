//! 各实体缓存优先存储的集合

use crate::cache::CacheClient;
use crate::cached::CachedStore;
use crate::error::StorageError;
use crate::in_memory::InMemoryRecordStore;
use crate::models::*;
use crate::postgres::PgRecordStore;
use crate::traits::{Record, RecordStore};
use sqlx::PgPool;
use std::sync::Arc;

pub struct Stores {
    pub network_types: CachedStore<NetworkTypeRecord>,
    pub network_protocols: CachedStore<NetworkProtocolRecord>,
    pub networks: CachedStore<NetworkRecord>,
    pub applications: CachedStore<ApplicationRecord>,
    pub application_links: CachedStore<ApplicationNetworkTypeLinkRecord>,
    pub device_profiles: CachedStore<DeviceProfileRecord>,
    pub devices: CachedStore<DeviceRecord>,
    pub device_links: CachedStore<DeviceNetworkTypeLinkRecord>,
    pub deployments: CachedStore<NetworkDeploymentRecord>,
    pub protocol_data: CachedStore<ProtocolDataRecord>,
    cache: Arc<dyn CacheClient>,
}

impl Stores {
    /// 内存后端（测试和本地演示）。
    pub fn in_memory(cache: Arc<dyn CacheClient>, ttl_seconds: Option<u64>) -> Self {
        Self {
            network_types: CachedStore::new(memory_backing(), cache.clone(), ttl_seconds),
            network_protocols: CachedStore::new(memory_backing(), cache.clone(), ttl_seconds),
            networks: CachedStore::new(memory_backing(), cache.clone(), ttl_seconds),
            applications: CachedStore::new(memory_backing(), cache.clone(), ttl_seconds),
            application_links: CachedStore::new(memory_backing(), cache.clone(), ttl_seconds),
            device_profiles: CachedStore::new(memory_backing(), cache.clone(), ttl_seconds),
            devices: CachedStore::new(memory_backing(), cache.clone(), ttl_seconds),
            device_links: CachedStore::new(memory_backing(), cache.clone(), ttl_seconds),
            deployments: CachedStore::new(memory_backing(), cache.clone(), ttl_seconds),
            protocol_data: CachedStore::new(memory_backing(), cache.clone(), ttl_seconds),
            cache,
        }
    }

    /// PostgreSQL 后端；启动时确保各实体表存在。
    pub async fn postgres(
        pool: PgPool,
        cache: Arc<dyn CacheClient>,
        ttl_seconds: Option<u64>,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            network_types: CachedStore::new(pg_backing(&pool).await?, cache.clone(), ttl_seconds),
            network_protocols: CachedStore::new(pg_backing(&pool).await?, cache.clone(), ttl_seconds),
            networks: CachedStore::new(pg_backing(&pool).await?, cache.clone(), ttl_seconds),
            applications: CachedStore::new(pg_backing(&pool).await?, cache.clone(), ttl_seconds),
            application_links: CachedStore::new(pg_backing(&pool).await?, cache.clone(), ttl_seconds),
            device_profiles: CachedStore::new(pg_backing(&pool).await?, cache.clone(), ttl_seconds),
            devices: CachedStore::new(pg_backing(&pool).await?, cache.clone(), ttl_seconds),
            device_links: CachedStore::new(pg_backing(&pool).await?, cache.clone(), ttl_seconds),
            deployments: CachedStore::new(pg_backing(&pool).await?, cache.clone(), ttl_seconds),
            protocol_data: CachedStore::new(pg_backing(&pool).await?, cache.clone(), ttl_seconds),
            cache,
        })
    }

    pub fn cache(&self) -> Arc<dyn CacheClient> {
        self.cache.clone()
    }
}

fn memory_backing<R: Record>() -> Arc<dyn RecordStore<R>> {
    Arc::new(InMemoryRecordStore::<R>::new())
}

async fn pg_backing<R: Record>(pool: &PgPool) -> Result<Arc<dyn RecordStore<R>>, StorageError> {
    let store = PgRecordStore::<R>::new(pool.clone());
    store.ensure_table().await?;
    Ok(Arc::new(store))
}
