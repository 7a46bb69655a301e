//! 协议错误类型定义

use lpwan_storage::StorageError;

/// 协议调用错误
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// 远端拒绝连接（或 DNS / TLS 失败）
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    /// 远端响应超时
    #[error("timeout: {0}")]
    Timeout(String),

    /// 远端返回非 2xx 状态
    #[error("http status {status}: {message}")]
    Http { status: u16, message: String },

    /// 凭据缺失或被远端拒绝
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// 处理器不支持该操作
    #[error("not supported: {0}")]
    NotSupported(String),

    /// 远端数据或本地参数不符合预期
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// 远端或本地记录不存在
    #[error("not found: {0}")]
    NotFound(String),

    /// 其他传输层错误
    #[error("transport error: {0}")]
    Transport(String),

    /// 本地存储错误
    #[error("storage error: {0}")]
    Storage(String),
}

impl ProtocolError {
    /// 远端 HTTP 状态码（若有）。
    pub fn status(&self) -> Option<u16> {
        match self {
            ProtocolError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProtocolError {
    fn from(err: reqwest::Error) -> Self {
        let target = err
            .url()
            .map(|url| url.to_string())
            .unwrap_or_else(|| err.to_string());
        if err.is_timeout() {
            return ProtocolError::Timeout(target);
        }
        if err.is_connect() {
            return ProtocolError::ConnectionRefused(target);
        }
        if let Some(status) = err.status() {
            return ProtocolError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            };
        }
        if err.is_decode() {
            return ProtocolError::InvalidData(err.to_string());
        }
        ProtocolError::Transport(err.to_string())
    }
}

impl From<StorageError> for ProtocolError {
    fn from(err: StorageError) -> Self {
        ProtocolError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::InvalidData(err.to_string())
    }
}
