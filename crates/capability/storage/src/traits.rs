//! 存储接口 Trait 定义
//!
//! 所有实体共用一套记录存储接口（create / load / list / update / remove），
//! 查询参数为 `where` 风格的过滤结构加 `limit` / `offset`。
//!
//! 设计原则：
//! - 过滤结构按字段精确匹配，未设置的字段不参与匹配
//! - 更新结构只携带需要修改的字段
//! - 使用 async_trait 支持动态分发

use crate::error::StorageError;
use async_trait::async_trait;
use domain::Id;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// 记录过滤条件。
pub trait RecordFilter: Serialize + Clone + Default + std::fmt::Debug + Send + Sync + 'static {
    /// 按主键过滤。
    fn by_id(id: Id) -> Self;

    /// 过滤条件中的主键（若有）。
    fn id(&self) -> Option<Id>;
}

/// 可存储的记录。
pub trait Record:
    Clone + std::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// 缓存命名空间（`<entity>:load:<hash>`）。
    const ENTITY: &'static str;
    /// PostgreSQL 表名。
    const TABLE: &'static str;

    type Filter: RecordFilter;
    type Update: Serialize + Clone + std::fmt::Debug + Send + Sync + 'static;

    fn id(&self) -> Id;
    fn set_id(&mut self, id: Id);
}

/// 列表查询参数。
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListQuery<F> {
    #[serde(rename = "where")]
    pub filter: F,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
}

impl<F: Default> ListQuery<F> {
    /// 不过滤、不分页。
    pub fn all() -> Self {
        Self {
            filter: F::default(),
            limit: None,
            offset: None,
        }
    }
}

impl<F> ListQuery<F> {
    pub fn filter(filter: F) -> Self {
        Self {
            filter,
            limit: None,
            offset: None,
        }
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// 记录存储接口（后端记录库）。
#[async_trait]
pub trait RecordStore<R: Record>: Send + Sync {
    /// 创建记录，由存储分配主键
    async fn create(&self, record: R) -> Result<R, StorageError>;

    /// 按过滤条件查找一条记录（主键最小者）
    async fn load(&self, filter: &R::Filter) -> Result<Option<R>, StorageError>;

    /// 按过滤条件列出记录（按主键升序）
    async fn list(&self, query: &ListQuery<R::Filter>) -> Result<Vec<R>, StorageError>;

    /// 按主键更新记录
    async fn update(&self, id: Id, update: &R::Update) -> Result<Option<R>, StorageError>;

    /// 按主键删除记录
    async fn remove(&self, id: Id) -> Result<bool, StorageError>;
}
