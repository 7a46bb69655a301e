//! 运行期数据流 handlers
//!
//! - POST /uplinks/{network_id}/{remote_application_id} - 远端网络推送的上行数据
//! - POST /devices/{device_id}/downlink - 向设备下发数据

use crate::AppState;
use crate::utils::{logs_to_dto, ok, sync_error};
use api_contract::{DownlinkRequest, UplinkAckDto};
use axum::{
    Json,
    extract::{Path, State},
    response::Response,
};
use domain::Id;
use serde_json::Value;

#[derive(serde::Deserialize)]
pub struct UplinkPath {
    network_id: Id,
    remote_application_id: String,
}

#[derive(serde::Deserialize)]
pub struct DevicePath {
    device_id: Id,
}

/// 上行转发：解码后上报到设备所属应用的上报地址
pub async fn relay_uplink(
    State(state): State<AppState>,
    Path(path): Path<UplinkPath>,
    Json(payload): Json<Value>,
) -> Response {
    match state
        .engine
        .relay_uplink(path.network_id, &path.remote_application_id, &payload)
        .await
    {
        Ok(reported) => ok(UplinkAckDto { reported }),
        Err(err) => sync_error(err),
    }
}

/// 下行下发：经设备部署所在的每个网络发送
pub async fn pass_data_to_device(
    State(state): State<AppState>,
    Path(path): Path<DevicePath>,
    Json(req): Json<DownlinkRequest>,
) -> Response {
    match state
        .engine
        .pass_data_to_device(path.device_id, &req.data)
        .await
    {
        Ok(logs) => ok(logs_to_dto(logs)),
        Err(err) => sync_error(err),
    }
}
