//! 内存存储实现模块
//!
//! 仅用于本地演示和测试。
//!
//! 包含以下实现：
//! - RecordStore: InMemoryRecordStore
//! - CacheClient: InMemoryCacheClient

pub mod cache;
pub mod record;

pub use cache::*;
pub use record::*;
