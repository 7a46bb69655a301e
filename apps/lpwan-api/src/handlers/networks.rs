//! 网络 handlers
//!
//! - POST /networks - 创建网络（加密保存凭据、验证，通过后先拉取再推送）
//! - GET /networks/{id} - 获取网络（不含凭据）
//! - DELETE /networks/{id} - 删除网络及其部署、协议数据和会话
//! - POST /networks/{id}/authorize - 重新授权
//! - POST /networks/{id}/pull - 从远端拉取
//! - POST /networks/{id}/push - 推送到远端
//!
//! 单个实体或网络的同步失败写在返回的日志里，HTTP 状态仍为 200；
//! 只有网络不存在、请求不合法等调用方问题返回错误状态。

use crate::AppState;
use crate::utils::{logs_to_dto, network_to_dto, ok, outcome_to_dto, sync_error};
use api_contract::{AuthorizeNetworkRequest, CreateNetworkRequest};
use axum::{
    Json,
    extract::{Path, State},
    response::Response,
};
use domain::Id;
use lpwan_sync::NewNetwork;

#[derive(serde::Deserialize)]
pub struct NetworkPath {
    network_id: Id,
}

/// 创建网络
pub async fn create_network(
    State(state): State<AppState>,
    Json(req): Json<CreateNetworkRequest>,
) -> Response {
    let request = NewNetwork {
        name: req.name,
        network_type_id: req.network_type_id,
        network_protocol_id: req.network_protocol_id,
        base_url: req.base_url,
        enabled: req.enabled.unwrap_or(true),
        credentials: req.security_data,
    };
    match state.engine.create_network(request).await {
        Ok(outcome) => ok(outcome_to_dto(outcome)),
        Err(err) => sync_error(err),
    }
}

/// 获取网络
pub async fn get_network(State(state): State<AppState>, Path(path): Path<NetworkPath>) -> Response {
    match state.engine.load_network(path.network_id).await {
        Ok(network) => ok(network_to_dto(&network)),
        Err(err) => sync_error(err),
    }
}

/// 删除网络
pub async fn delete_network(
    State(state): State<AppState>,
    Path(path): Path<NetworkPath>,
) -> Response {
    match state.engine.remove_network(path.network_id).await {
        Ok(()) => ok(()),
        Err(err) => sync_error(err),
    }
}

/// 重新授权；请求体可省略
pub async fn authorize_network(
    State(state): State<AppState>,
    Path(path): Path<NetworkPath>,
    body: Option<Json<AuthorizeNetworkRequest>>,
) -> Response {
    let credentials = body.and_then(|Json(req)| req.security_data);
    match state
        .engine
        .reauthorize_network(path.network_id, credentials)
        .await
    {
        Ok(outcome) => ok(outcome_to_dto(outcome)),
        Err(err) => sync_error(err),
    }
}

/// 从远端拉取
pub async fn pull_network(
    State(state): State<AppState>,
    Path(path): Path<NetworkPath>,
) -> Response {
    match state.engine.pull_network_by_id(path.network_id).await {
        Ok(logs) => ok(logs_to_dto(logs)),
        Err(err) => sync_error(err),
    }
}

/// 推送到远端
pub async fn push_network(
    State(state): State<AppState>,
    Path(path): Path<NetworkPath>,
) -> Response {
    match state.engine.push_network_by_id(path.network_id).await {
        Ok(logs) => ok(logs_to_dto(logs)),
        Err(err) => sync_error(err),
    }
}
