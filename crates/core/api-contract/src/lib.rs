//! 稳定的 DTO 与 API 响应契约。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 网络创建请求体。
///
/// `securityData` 为远端凭据（如 username / password），只在加密后落库。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNetworkRequest {
    pub name: String,
    pub network_type_id: i64,
    pub network_protocol_id: i64,
    pub base_url: String,
    pub enabled: Option<bool>,
    #[serde(default, alias = "credentials")]
    pub security_data: Map<String, Value>,
}

/// 重新授权请求体；不带凭据时用已保存的凭据重新验证。
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeNetworkRequest {
    #[serde(default, alias = "credentials")]
    pub security_data: Option<Map<String, Value>>,
}

/// 网络返回结构（不含凭据）。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDto {
    pub id: i64,
    pub name: String,
    pub network_type_id: i64,
    pub network_protocol_id: i64,
    pub base_url: String,
    pub enabled: bool,
    pub authorized: bool,
    pub message: Option<String>,
}

/// 单个网络的日志桶。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkLogDto {
    pub network_name: String,
    pub network_type_name: String,
    pub logs: Vec<String>,
}

/// 按网络 ID 聚合的日志；`0` 表示该类型下全部网络。
pub type NetworkLogsDto = BTreeMap<i64, NetworkLogDto>;

/// 网络操作结果：网络本身与执行过程中的日志。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkOutcomeDto {
    pub network: NetworkDto,
    pub logs: NetworkLogsDto,
}

/// 下行数据请求体。
#[derive(Debug, Deserialize)]
pub struct DownlinkRequest {
    pub data: Value,
}

/// 上行转发结果。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UplinkAckDto {
    pub reported: bool,
}

/// 同步与缓存计数快照。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshotDto {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_errors: u64,
    pub cache_invalidations: u64,
    pub remote_creates: u64,
    pub remote_updates: u64,
    pub remote_removes: u64,
    pub pulled_entities: u64,
    pub sync_failures: u64,
    pub uplinks_relayed: u64,
}
