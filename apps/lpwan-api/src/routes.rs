//! 路由定义
//!
//! 集中管理所有 API 路由，将路径映射到对应的 handlers。
//! 路由包括：
//! - 健康检查与计数：/health, /metrics
//! - 网络：/networks, /networks/{id}, /networks/{id}/authorize, /networks/{id}/pull, /networks/{id}/push
//! - 网络类型分发：/network-types/{id}/pull, /network-types/{id}/push
//! - 运行期数据流：/uplinks/{network_id}/{remote_application_id}, /devices/{id}/downlink

use super::AppState;
use super::handlers::*;
use axum::{
    Router,
    routing::{get, post},
};

/// 创建 API 路由
///
/// 由 `build_app` 同时挂载在 / 和 /api/ 两种前缀下
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .route("/networks", post(create_network))
        .route(
            "/networks/:network_id",
            get(get_network).delete(delete_network),
        )
        .route("/networks/:network_id/authorize", post(authorize_network))
        .route("/networks/:network_id/pull", post(pull_network))
        .route("/networks/:network_id/push", post(push_network))
        .route(
            "/network-types/:network_type_id/pull",
            post(pull_network_type),
        )
        .route(
            "/network-types/:network_type_id/push",
            post(push_network_type),
        )
        .route(
            "/uplinks/:network_id/:remote_application_id",
            post(relay_uplink),
        )
        .route("/devices/:device_id/downlink", post(pass_data_to_device))
}
