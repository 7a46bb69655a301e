//! LPWAN 同步服务入口。

use lpwan_api::{build_app, build_state};
use lpwan_config::AppConfig;
use lpwan_telemetry::init_tracing;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 初始化结构化日志
    init_tracing();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;

    let state = build_state(&config).await?;
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(
        target: "lpwan.api",
        http_addr = %config.http_addr,
        public_url = %config.public_url,
        "api_listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}
