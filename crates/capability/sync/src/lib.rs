//! # 同步能力模块
//!
//! 在本地实体（应用、device profile、设备）与远端网络之间双向同步：
//! - **部署状态机**（`state`）：CREATED / UPDATED / REMOVED 到远端动作的映射
//! - **拉取**（`pull_network`）：远端实体落地为本地实体并记录来源部署
//! - **推送**（`push_network`）：按部署状态在远端创建 / 更新 / 删除
//! - **分发**（`for_all_networks_of_type`）：同一网络类型下的网络并发执行
//! - **网络生命周期**：创建、授权、删除，securityData 加密保存
//! - **运行期数据流**：上行转发与下行下发
//!
//! ## 使用示例
//!
//! ```ignore
//! let engine = SyncEngine::new(stores, registry, reporter, sessions, SyncConfig::default());
//! let logs = engine.push_networks(lora_type_id).await?;
//! ```

mod engine;
mod error;
mod fanout;
mod network;
mod protocols;
mod pull;
mod push;
mod runtime;
pub mod security;
pub mod state;

pub use engine::{PushSummary, SyncConfig, SyncEngine};
pub use error::SyncError;
pub use fanout::NetworkLogs;
pub use network::{NetworkOutcome, NewNetwork};
pub use protocols::{ensure_network_type, register_network_protocol};
pub use pull::PullSummary;
pub use push::NetworkPushSummary;
pub use state::SyncAction;
