//! LPWAN 同步 HTTP API
//!
//! 在同步引擎之上暴露 REST 接口，并为每个请求注入追踪 ID。

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod utils;

pub use state::{AppState, BootstrapError, build_state};

use axum::{Router, middleware::from_fn};
use tower_http::trace::TraceLayer;

/// 组装完整的应用路由（/ 与 /api 两种前缀）。
pub fn build_app(state: AppState) -> Router {
    let api = routes::create_api_router();
    Router::new()
        .merge(api.clone())
        .nest("/api", api)
        .with_state(state)
        .layer(from_fn(middleware::request_context))
        .layer(TraceLayer::new_for_http())
}
