//! 按网络类型分发的 handlers
//!
//! - POST /network-types/{id}/pull
//! - POST /network-types/{id}/push
//!
//! 该类型下的已启用网络并发执行，返回按网络 ID 聚合的日志；没有网络时返回空对象。

use crate::AppState;
use crate::utils::{logs_to_dto, ok, sync_error};
use axum::{
    extract::{Path, State},
    response::Response,
};
use domain::Id;

#[derive(serde::Deserialize)]
pub struct NetworkTypePath {
    network_type_id: Id,
}

pub async fn pull_network_type(
    State(state): State<AppState>,
    Path(path): Path<NetworkTypePath>,
) -> Response {
    match state.engine.pull_networks(path.network_type_id).await {
        Ok(logs) => ok(logs_to_dto(logs)),
        Err(err) => sync_error(err),
    }
}

pub async fn push_network_type(
    State(state): State<AppState>,
    Path(path): Path<NetworkTypePath>,
) -> Response {
    match state.engine.push_networks(path.network_type_id).await {
        Ok(logs) => ok(logs_to_dto(logs)),
        Err(err) => sync_error(err),
    }
}
