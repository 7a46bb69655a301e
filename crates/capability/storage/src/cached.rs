//! 缓存优先的数据访问
//!
//! 每类实体一个 `CachedStore`，包装后端记录存储：
//! - `load`：以过滤条件的稳定哈希为键读缓存（`<entity>:load:<hash>`），
//!   未命中时读后端并回填，同时把哈希登记到 `<entity>:loadIndex:<id>`
//! - `update` / `remove`：先解析主键，按索引集合删除该记录的全部 load 键，再修改后端
//! - `clear_model_from_cache`：扫描并删除该实体命名空间下的全部键（管理用途）
//!
//! 缓存不可用时退化为直接访问后端；回填失败只记录日志。

use crate::cache::{CacheClient, SCAN_COUNT};
use crate::error::StorageError;
use crate::traits::{ListQuery, Record, RecordFilter, RecordStore};
use crate::validation::{ensure_identifier, ensure_page};
use domain::Id;
use lpwan_telemetry::{
    record_cache_error, record_cache_hit, record_cache_invalidation, record_cache_miss,
};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct CachedStore<R: Record> {
    backing: Arc<dyn RecordStore<R>>,
    cache: Arc<dyn CacheClient>,
    ttl_seconds: Option<u64>,
}

/// 过滤条件的稳定哈希（字段顺序由结构体定义固定）。
pub fn query_hash<F: serde::Serialize>(filter: &F) -> Result<String, StorageError> {
    let data = serde_json::to_string(filter)?;
    let digest = Sha256::digest(data.as_bytes());
    Ok(hex::encode(digest))
}

impl<R: Record> CachedStore<R> {
    pub fn new(
        backing: Arc<dyn RecordStore<R>>,
        cache: Arc<dyn CacheClient>,
        ttl_seconds: Option<u64>,
    ) -> Self {
        Self {
            backing,
            cache,
            ttl_seconds,
        }
    }

    pub fn load_key(hash: &str) -> String {
        format!("{}:load:{}", R::ENTITY, hash)
    }

    pub fn index_key(id: Id) -> String {
        format!("{}:loadIndex:{}", R::ENTITY, id)
    }

    pub async fn create(&self, record: R) -> Result<R, StorageError> {
        self.backing.create(record).await
    }

    pub async fn list(&self, query: &ListQuery<R::Filter>) -> Result<Vec<R>, StorageError> {
        ensure_page(query)?;
        self.backing.list(query).await
    }

    /// 按过滤条件列出全部记录（不分页）。
    pub async fn list_where(&self, filter: R::Filter) -> Result<Vec<R>, StorageError> {
        self.list(&ListQuery::filter(filter)).await
    }

    pub async fn load_by_id(&self, id: Id) -> Result<Option<R>, StorageError> {
        self.load(&R::Filter::by_id(id)).await
    }

    pub async fn load(&self, filter: &R::Filter) -> Result<Option<R>, StorageError> {
        let hash = query_hash(filter)?;
        let key = Self::load_key(&hash);
        match self.cache.get(&key).await {
            Ok(Some(data)) => match serde_json::from_str::<R>(&data) {
                Ok(record) => {
                    record_cache_hit();
                    return Ok(Some(record));
                }
                Err(err) => {
                    record_cache_error();
                    warn!(target: "lpwan.storage", entity = R::ENTITY, key = %key, error = %err, "cache_entry_invalid");
                }
            },
            Ok(None) => record_cache_miss(),
            Err(err) => {
                record_cache_error();
                warn!(target: "lpwan.storage", entity = R::ENTITY, key = %key, error = %err, "cache_read_failed");
            }
        }

        let record = self.backing.load(filter).await?;
        if let Some(record) = &record {
            self.fill(&key, &hash, record).await;
        }
        Ok(record)
    }

    /// 回填缓存并登记索引；失败只记录日志。
    async fn fill(&self, key: &str, hash: &str, record: &R) {
        let data = match serde_json::to_string(record) {
            Ok(data) => data,
            Err(err) => {
                warn!(target: "lpwan.storage", entity = R::ENTITY, error = %err, "cache_fill_serialize_failed");
                return;
            }
        };
        if let Err(err) = self.cache.set(key, &data, self.ttl_seconds).await {
            record_cache_error();
            warn!(target: "lpwan.storage", entity = R::ENTITY, key = %key, error = %err, "cache_fill_failed");
            return;
        }
        let index = Self::index_key(record.id());
        if let Err(err) = self.cache.sadd(&index, hash).await {
            record_cache_error();
            warn!(target: "lpwan.storage", entity = R::ENTITY, key = %index, error = %err, "cache_index_failed");
        }
    }

    /// 删除某条记录关联的全部 load 键及其索引集合，返回删除的键数。
    pub async fn invalidate(&self, id: Id) -> Result<u64, StorageError> {
        let index = Self::index_key(id);
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next_cursor, members) = self.cache.sscan(&index, cursor, SCAN_COUNT).await?;
            keys.extend(members.iter().map(|hash| Self::load_key(hash)));
            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }
        keys.push(index);
        let deleted = self.cache.del(&keys).await?;
        record_cache_invalidation(deleted);
        debug!(target: "lpwan.storage", entity = R::ENTITY, record_id = id, deleted, "cache_invalidated");
        Ok(deleted)
    }

    /// 解析定位条件对应的主键；条件不含主键时先从后端查找。
    async fn resolve_id(&self, identifier: &R::Filter) -> Result<Option<Id>, StorageError> {
        if let Some(id) = identifier.id() {
            return Ok(Some(id));
        }
        let record = self.backing.load(identifier).await?;
        Ok(record.map(|record| record.id()))
    }

    async fn invalidate_or_warn(&self, id: Id) {
        if let Err(err) = self.invalidate(id).await {
            record_cache_error();
            warn!(target: "lpwan.storage", entity = R::ENTITY, record_id = id, error = %err, "cache_invalidate_failed");
        }
    }

    /// 先失效缓存，再更新后端。
    pub async fn update(
        &self,
        identifier: &R::Filter,
        data: &R::Update,
    ) -> Result<Option<R>, StorageError> {
        ensure_identifier(identifier)?;
        let Some(id) = self.resolve_id(identifier).await? else {
            return Ok(None);
        };
        self.invalidate_or_warn(id).await;
        self.backing.update(id, data).await
    }

    pub async fn update_by_id(&self, id: Id, data: &R::Update) -> Result<Option<R>, StorageError> {
        self.update(&R::Filter::by_id(id), data).await
    }

    /// 先失效缓存，再删除后端记录。
    pub async fn remove(&self, identifier: &R::Filter) -> Result<bool, StorageError> {
        ensure_identifier(identifier)?;
        let Some(id) = self.resolve_id(identifier).await? else {
            return Ok(false);
        };
        self.invalidate_or_warn(id).await;
        self.backing.remove(id).await
    }

    pub async fn remove_by_id(&self, id: Id) -> Result<bool, StorageError> {
        self.remove(&R::Filter::by_id(id)).await
    }

    /// 清空该实体命名空间下的全部缓存键，返回删除数量。
    pub async fn clear_model_from_cache(&self) -> Result<u64, StorageError> {
        let prefix = format!("{}:", R::ENTITY);
        let pattern = format!("{}*", prefix);
        let mut cursor: u64 = 0;
        let mut deleted: u64 = 0;
        loop {
            let (next_cursor, keys) = self.cache.scan(cursor, &pattern, SCAN_COUNT).await?;
            let keys: Vec<String> = keys
                .into_iter()
                .filter(|key| key.starts_with(&prefix))
                .collect();
            if !keys.is_empty() {
                deleted += self.cache.del(&keys).await?;
            }
            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }
        debug!(target: "lpwan.storage", entity = R::ENTITY, deleted, "cache_model_cleared");
        Ok(deleted)
    }
}
