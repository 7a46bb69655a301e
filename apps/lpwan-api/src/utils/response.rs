//! HTTP 响应辅助函数和 DTO 转换
//!
//! - 错误响应：bad_request_error, not_found_error, sync_error
//! - DTO 转换：network_to_dto, logs_to_dto, outcome_to_dto

use api_contract::{ApiResponse, NetworkDto, NetworkLogDto, NetworkLogsDto, NetworkOutcomeDto};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::Network;
use lpwan_sync::{NetworkLogs, NetworkOutcome, SyncError};
use serde::Serialize;
use tracing::warn;

/// 成功响应
pub fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// 错误请求响应
pub fn bad_request_error(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error("INVALID.REQUEST", message.into())),
    )
        .into_response()
}

/// 资源未找到错误响应
pub fn not_found_error(message: impl Into<String>) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::error("RESOURCE.NOT_FOUND", message.into())),
    )
        .into_response()
}

/// 同步错误响应
///
/// 状态码：
/// - 网络 / 实体 / 远端引用不存在 → 404
/// - 请求不合法 → 400
/// - 网络未授权 → 409（需先重新授权）
/// - 远端调用失败 → 502
/// - 其余 → 500
pub fn sync_error(err: SyncError) -> Response {
    let (status, code) = match &err {
        SyncError::NetworkNotFound(_)
        | SyncError::MissingEntity { .. }
        | SyncError::UnknownRemoteReference { .. } => {
            return not_found_error(err.to_string());
        }
        SyncError::InvalidRequest(message) => return bad_request_error(message.clone()),
        SyncError::Unauthorized { .. } => (StatusCode::CONFLICT, "NETWORK.UNAUTHORIZED"),
        SyncError::Protocol(_) => (StatusCode::BAD_GATEWAY, "REMOTE.ERROR"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL.ERROR"),
    };
    let message = match &err {
        SyncError::Protocol(protocol) => lpwan_protocol::translate_error(protocol),
        other => other.to_string(),
    };
    if status.is_server_error() {
        warn!(target: "lpwan.api", status = status.as_u16(), error = %message, "request_failed");
    }
    (status, Json(ApiResponse::<()>::error(code, message))).into_response()
}

/// Network 转 NetworkDto（凭据不出现在响应中）
pub fn network_to_dto(network: &Network) -> NetworkDto {
    NetworkDto {
        id: network.id,
        name: network.name.clone(),
        network_type_id: network.network_type_id,
        network_protocol_id: network.network_protocol_id,
        base_url: network.base_url.clone(),
        enabled: network.enabled,
        authorized: network.security_data.authorized,
        message: network.security_data.message.clone(),
    }
}

/// 按网络聚合的日志转 DTO
pub fn logs_to_dto(logs: NetworkLogs) -> NetworkLogsDto {
    logs.into_iter()
        .map(|(network_id, bucket)| {
            (
                network_id,
                NetworkLogDto {
                    network_name: bucket.network_name,
                    network_type_name: bucket.network_type_name,
                    logs: bucket.logs,
                },
            )
        })
        .collect()
}

pub fn outcome_to_dto(outcome: NetworkOutcome) -> NetworkOutcomeDto {
    NetworkOutcomeDto {
        network: network_to_dto(&outcome.network),
        logs: logs_to_dto(outcome.logs),
    }
}
