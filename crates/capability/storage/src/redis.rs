//! Redis 缓存客户端实现

use crate::cache::CacheClient;
use crate::error::StorageError;
use redis::AsyncCommands;

/// Redis 缓存客户端
///
/// 每次调用获取一个 multiplexed 连接。
pub struct RedisCacheClient {
    client: redis::Client,
}

impl RedisCacheClient {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    pub fn connect(redis_url: &str) -> Result<Self, StorageError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self::new(client))
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, StorageError> {
        let connection = self.client.get_multiplexed_tokio_connection().await?;
        Ok(connection)
    }
}

#[async_trait::async_trait]
impl CacheClient for RedisCacheClient {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut connection = self.connection().await?;
        let data: Option<String> = connection.get(key).await?;
        Ok(data)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<(), StorageError> {
        let mut connection = self.connection().await?;
        match ttl_seconds {
            Some(ttl) if ttl > 0 => connection.set_ex::<_, _, ()>(key, value, ttl).await?,
            _ => connection.set::<_, _, ()>(key, value).await?,
        }
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<u64, StorageError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut connection = self.connection().await?;
        let deleted: u64 = connection.del(keys).await?;
        Ok(deleted)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<(), StorageError> {
        let mut connection = self.connection().await?;
        connection.sadd::<_, _, ()>(key, member).await?;
        Ok(())
    }

    async fn sscan(
        &self,
        key: &str,
        cursor: u64,
        count: usize,
    ) -> Result<(u64, Vec<String>), StorageError> {
        let mut connection = self.connection().await?;
        let (next_cursor, members): (u64, Vec<String>) = redis::cmd("SSCAN")
            .arg(key)
            .arg(cursor)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut connection)
            .await?;
        Ok((next_cursor, members))
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), StorageError> {
        let mut connection = self.connection().await?;
        let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut connection)
            .await?;
        Ok((next_cursor, keys))
    }
}
