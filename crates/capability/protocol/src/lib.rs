//! # 网络协议能力模块
//!
//! 同步引擎与各类远端网络之间的边界：
//! - **处理器契约**（`ProtocolHandler`）：每种远端网络实现一次
//! - **注册表**（`ProtocolRegistry`）：启动时按 networkProtocolId 注册处理器
//! - **数据访问上下文**（`NetworkDataAccess`）：单次操作内的记忆化读取与按网络聚合的日志
//! - **会话缓存**（`SessionCache`）：远端登录令牌按网络缓存在共享缓存中
//! - **上报**（`ReportingSink`）：上行数据投递到应用的上报地址
//! - **LoRa Server 参考处理器**（`LoraServerHandler`）：v1 / v2 差异由 `DeviceTranslator` 承担
//!
//! ## 架构设计
//!
//! ```text
//! SyncEngine
//!     │  (networkProtocolId)
//!     ▼
//! ProtocolRegistry ──► Arc<dyn ProtocolHandler>
//!                          │
//!                          ├── LoraServerHandler + LoraServerV1
//!                          └── LoraServerHandler + LoraServerV2
//! ```

mod data_access;
mod error;
mod handler;
mod lora;
mod registry;
mod reporting;
mod session;
mod translate;

pub use data_access::{LogEntry, NetworkDataAccess, NetworkLog};
pub use error::ProtocolError;
pub use handler::*;
pub use lora::{DeviceTranslator, LoraServerHandler, LoraServerV1, LoraServerV2};
pub use registry::ProtocolRegistry;
pub use reporting::{HttpReportingSink, NoopReportingSink, ReportingSink};
pub use session::SessionCache;
pub use translate::{translate_error, translate_value};
