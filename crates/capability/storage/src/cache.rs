//! 缓存客户端接口
//!
//! 缓存只需要几种原语：
//! - 字符串读写（可带过期时间）与删除
//! - 集合添加与游标扫描（SSCAN）
//! - 键空间游标扫描（SCAN）
//!
//! 游标语义与 Redis 一致：从 0 开始，返回 0 表示扫描结束。

use crate::error::StorageError;
use async_trait::async_trait;

/// 每次游标扫描的建议批量。
pub const SCAN_COUNT: usize = 100;

#[async_trait]
pub trait CacheClient: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// 写入字符串；`ttl_seconds` 为空时不过期
    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<(), StorageError>;

    /// 删除若干键，返回实际删除的数量
    async fn del(&self, keys: &[String]) -> Result<u64, StorageError>;

    async fn sadd(&self, key: &str, member: &str) -> Result<(), StorageError>;

    async fn sscan(
        &self,
        key: &str,
        cursor: u64,
        count: usize,
    ) -> Result<(u64, Vec<String>), StorageError>;

    /// 扫描键空间；`pattern` 支持 `*` 通配
    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), StorageError>;
}
