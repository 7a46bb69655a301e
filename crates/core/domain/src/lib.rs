pub mod deployment;
pub mod network;

pub use deployment::{DeploymentMeta, DeploymentStatus, DeploymentType, RemoteIdConflict};
pub use network::{Network, SecurityData};

/// 所有本地记录共用的主键类型。
pub type Id = i64;

/// 日志桶中代表“该类型下全部网络”的网络 ID。
pub const ALL_NETWORKS: Id = 0;
