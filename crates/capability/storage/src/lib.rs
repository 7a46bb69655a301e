//! # LPWAN Storage 模块
//!
//! 提供本地记录存储与缓存优先访问层。
//!
//! ## 架构设计
//!
//! 1. **接口抽象层** (`traits.rs`)：通用记录存储接口 `RecordStore<R>`，`where` 风格过滤 + `limit` / `offset`
//! 2. **数据模型层** (`models.rs`)：各实体的记录、过滤和更新结构
//! 3. **缓存接口层** (`cache.rs`)：`CacheClient`（get / set / del、集合 sadd / sscan、键空间 scan）
//! 4. **缓存优先访问层** (`cached.rs`)：读穿透、写前失效
//! 5. **错误处理层** (`error.rs`)：统一的存储错误类型
//! 6. **实现层**：
//!    - `in_memory/`：内存记录存储与内存缓存（测试和演示）
//!    - `postgres/`：PostgreSQL jsonb 记录存储
//!    - `redis.rs`：Redis 缓存客户端
//!
//! ## 缓存键约定
//!
//! - `<entity>:load:<sha256(filter)>`：load 结果
//! - `<entity>:loadIndex:<id>`：记录 id → 关联的 load 哈希集合
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use lpwan_storage::{InMemoryCacheClient, Stores};
//! use std::sync::Arc;
//!
//! let stores = Stores::in_memory(Arc::new(InMemoryCacheClient::new()), None);
//! let network = stores.networks.load_by_id(1).await?;
//! ```

pub mod cache;
pub mod cached;
pub mod connection;
pub mod error;
pub mod in_memory;
pub mod models;
pub mod postgres;
pub mod redis;
pub mod stores;
pub mod traits;
pub mod validation;

pub use cache::*;
pub use cached::*;
pub use connection::*;
pub use error::*;
pub use models::*;
pub use self::redis::RedisCacheClient;
pub use stores::Stores;
pub use traits::*;
pub use validation::*;

pub use in_memory::{InMemoryCacheClient, InMemoryRecordStore};
pub use postgres::PgRecordStore;
