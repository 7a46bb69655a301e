//! 通用记录内存存储实现
//!
//! 仅用于本地演示和测试。
//!
//! 功能：
//! - 主键自增
//! - 过滤条件按 JSON 包含关系匹配（与 Postgres 的 `@>` 一致）
//! - 更新按字段合并

use crate::error::StorageError;
use crate::traits::{ListQuery, Record, RecordStore};
use domain::Id;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};

/// 记录内存存储
///
/// 使用 RwLock + BTreeMap 提供线程安全、按主键有序的内存存储。
pub struct InMemoryRecordStore<R: Record> {
    records: RwLock<BTreeMap<Id, R>>,
    next_id: AtomicI64,
}

impl<R: Record> InMemoryRecordStore<R> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl<R: Record> Default for InMemoryRecordStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// `candidate` 是否包含 `filter` 的全部字段。
pub(crate) fn json_contains(candidate: &Value, filter: &Value) -> bool {
    match (candidate, filter) {
        (Value::Object(candidate), Value::Object(filter)) => filter.iter().all(|(key, expected)| {
            candidate
                .get(key)
                .is_some_and(|actual| json_contains(actual, expected))
        }),
        _ => candidate == filter,
    }
}

fn matches<R: Record>(record: &R, filter: &Value) -> bool {
    match serde_json::to_value(record) {
        Ok(candidate) => json_contains(&candidate, filter),
        Err(_) => false,
    }
}

#[async_trait::async_trait]
impl<R: Record> RecordStore<R> for InMemoryRecordStore<R> {
    async fn create(&self, mut record: R) -> Result<R, StorageError> {
        let mut map = self
            .records
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        record.set_id(id);
        map.insert(id, record.clone());
        Ok(record)
    }

    async fn load(&self, filter: &R::Filter) -> Result<Option<R>, StorageError> {
        let filter = serde_json::to_value(filter)?;
        let map = self
            .records
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(map.values().find(|item| matches(*item, &filter)).cloned())
    }

    async fn list(&self, query: &ListQuery<R::Filter>) -> Result<Vec<R>, StorageError> {
        let filter = serde_json::to_value(&query.filter)?;
        let offset = query.offset.unwrap_or(0).max(0) as usize;
        let limit = query.limit.map(|value| value.max(0) as usize).unwrap_or(usize::MAX);
        let map = self
            .records
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let items = map
            .values()
            .filter(|item| matches(*item, &filter))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        Ok(items)
    }

    async fn update(&self, id: Id, update: &R::Update) -> Result<Option<R>, StorageError> {
        let patch = serde_json::to_value(update)?;
        let mut map = self
            .records
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let record = match map.get_mut(&id) {
            Some(record) => record,
            None => return Ok(None),
        };
        let mut data = serde_json::to_value(&*record)?;
        if let (Value::Object(target), Value::Object(patch)) = (&mut data, patch) {
            for (key, value) in patch {
                target.insert(key, value);
            }
        }
        let mut updated: R = serde_json::from_value(data)?;
        updated.set_id(id);
        *record = updated.clone();
        Ok(Some(updated))
    }

    async fn remove(&self, id: Id) -> Result<bool, StorageError> {
        let mut map = self
            .records
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(map.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::json_contains;
    use serde_json::json;

    #[test]
    fn containment_matches_nested_objects() {
        let record = json!({"id": 3, "meta": {"remoteId": "r-1", "isOrigin": true}});
        assert!(json_contains(&record, &json!({})));
        assert!(json_contains(&record, &json!({"meta": {"remoteId": "r-1"}})));
        assert!(!json_contains(&record, &json!({"meta": {"remoteId": "r-2"}})));
        assert!(!json_contains(&record, &json!({"name": "x"})));
    }
}
