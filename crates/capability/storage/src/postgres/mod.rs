//! # PostgreSQL 存储实现模块
//!
//! 提供通用记录存储接口的 PostgreSQL 实现，用于生产环境。
//!
//! ## 表结构
//!
//! 每类实体一张 jsonb 表（表名见各记录的 `Record::TABLE`）：
//!
//! ```sql
//! create table if not exists networks (id bigserial primary key, data jsonb not null);
//! create index if not exists idx_networks_data on networks using gin (data jsonb_path_ops);
//! ```
//!
//! `where` 风格过滤条件映射为 `data @> $1`，与内存实现的匹配语义一致。
//!
//! ## 事务支持
//!
//! 当前实现不支持事务；同步引擎的一致性依赖部署状态机而非数据库事务。

pub mod record;

pub use record::*;
