//! 网络会话缓存
//!
//! 远端登录得到的会话令牌按网络保存在共享缓存中：
//! - `session:<networkId>`：网络级会话
//! - `session:<networkId>:app:<remoteApplicationId>`：按远端应用划分凭据的协议使用
//!
//! 令牌过期由处理器在收到 401 时检测并重新登录。

use domain::Id;
use lpwan_storage::{CacheClient, SCAN_COUNT, StorageError};
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct SessionCache {
    cache: Arc<dyn CacheClient>,
    ttl_seconds: u64,
}

impl SessionCache {
    pub fn new(cache: Arc<dyn CacheClient>, ttl_seconds: u64) -> Self {
        Self {
            cache,
            ttl_seconds: ttl_seconds.max(1),
        }
    }

    pub fn key(network_id: Id, scope: Option<&str>) -> String {
        match scope {
            Some(scope) => format!("session:{}:app:{}", network_id, scope),
            None => format!("session:{}", network_id),
        }
    }

    /// 读取会话；缓存不可用时按未命中处理。
    pub async fn get(&self, network_id: Id, scope: Option<&str>) -> Option<String> {
        let key = Self::key(network_id, scope);
        match self.cache.get(&key).await {
            Ok(value) => value,
            Err(err) => {
                warn!(target: "lpwan.protocol", network_id, error = %err, "session_read_failed");
                None
            }
        }
    }

    pub async fn put(&self, network_id: Id, scope: Option<&str>, token: &str) {
        let key = Self::key(network_id, scope);
        if let Err(err) = self.cache.set(&key, token, Some(self.ttl_seconds)).await {
            warn!(target: "lpwan.protocol", network_id, error = %err, "session_write_failed");
        }
    }

    pub async fn invalidate(&self, network_id: Id, scope: Option<&str>) {
        let key = Self::key(network_id, scope);
        if let Err(err) = self.cache.del(&[key]).await {
            warn!(target: "lpwan.protocol", network_id, error = %err, "session_invalidate_failed");
        }
    }

    /// 删除网络的全部会话（含按应用划分的会话），返回删除数量。
    pub async fn invalidate_network(&self, network_id: Id) -> Result<u64, StorageError> {
        let mut deleted = self.cache.del(&[Self::key(network_id, None)]).await?;
        let pattern = format!("session:{}:*", network_id);
        let mut cursor: u64 = 0;
        loop {
            let (next_cursor, keys) = self.cache.scan(cursor, &pattern, SCAN_COUNT).await?;
            if !keys.is_empty() {
                deleted += self.cache.del(&keys).await?;
            }
            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lpwan_storage::InMemoryCacheClient;

    #[tokio::test]
    async fn invalidate_network_keeps_other_networks() {
        let sessions = SessionCache::new(Arc::new(InMemoryCacheClient::new()), 60);
        sessions.put(1, None, "t-1").await;
        sessions.put(1, Some("app-7"), "t-1-app").await;
        sessions.put(12, None, "t-12").await;

        assert_eq!(sessions.invalidate_network(1).await.expect("invalidate"), 2);
        assert!(sessions.get(1, None).await.is_none());
        assert!(sessions.get(1, Some("app-7")).await.is_none());
        assert_eq!(sessions.get(12, None).await.as_deref(), Some("t-12"));
    }
}
