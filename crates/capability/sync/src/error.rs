//! 同步错误类型定义

use domain::{DeploymentType, Id, RemoteIdConflict};
use lpwan_protocol::{LogEntry, ProtocolError};
use lpwan_storage::StorageError;

/// 同步链路错误
///
/// 单个实体的错误记入所属网络的日志桶，单个网络的错误记入汇总日志；
/// 只有调用方参数问题（网络不存在、请求不合法）会返回到 REST 层。
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// 远端调用失败
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("network {0} not found")]
    NetworkNotFound(Id),

    /// 网络凭据未通过验证，重新授权前不执行任何同步
    #[error("network {network_id} is not authorized: {message}")]
    Unauthorized { network_id: Id, message: String },

    #[error("{entity} {id} not found")]
    MissingEntity { entity: &'static str, id: Id },

    /// 依赖的实体在该网络上还没有远端 ID
    #[error("{entity} {id} has no remote id on network {network_id}")]
    UnresolvedRemoteId {
        entity: DeploymentType,
        id: Id,
        network_id: Id,
    },

    /// 远端对象引用了本地未知的远端 ID
    #[error("unknown remote {entity} {remote_id}")]
    UnknownRemoteReference {
        entity: DeploymentType,
        remote_id: String,
    },

    #[error(transparent)]
    RemoteIdConflict(#[from] RemoteIdConflict),

    #[error("security data error: {0}")]
    Security(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl SyncError {
    pub fn missing(entity: &'static str, id: Id) -> Self {
        SyncError::MissingEntity { entity, id }
    }
}

impl From<&SyncError> for LogEntry {
    fn from(err: &SyncError) -> Self {
        match err {
            SyncError::Protocol(err) => LogEntry::from(err),
            other => LogEntry::Error(other.to_string()),
        }
    }
}

impl From<SyncError> for LogEntry {
    fn from(err: SyncError) -> Self {
        LogEntry::from(&err)
    }
}
