//! 上行数据上报
//!
//! 把远端网络转发来的上行数据投递到应用的上报地址；失败只记录，不重试。

use crate::error::ProtocolError;
use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

#[async_trait]
pub trait ReportingSink: Send + Sync {
    async fn report(&self, data: &Value, url: &str, app_name: &str) -> Result<(), ProtocolError>;
}

/// 通过 HTTP POST 上报（JSON 请求体）。
pub struct HttpReportingSink {
    client: reqwest::Client,
}

impl HttpReportingSink {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReportingSink for HttpReportingSink {
    async fn report(&self, data: &Value, url: &str, app_name: &str) -> Result<(), ProtocolError> {
        let response = self
            .client
            .post(url)
            .header("x-application-name", app_name)
            .json(data)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProtocolError::Http {
                status: status.as_u16(),
                message,
            });
        }
        info!(target: "lpwan.protocol", url = %url, app_name = %app_name, "uplink_reported");
        Ok(())
    }
}

/// 丢弃上报（应用未配置上报地址时使用）。
pub struct NoopReportingSink;

#[async_trait]
impl ReportingSink for NoopReportingSink {
    async fn report(&self, _data: &Value, url: &str, app_name: &str) -> Result<(), ProtocolError> {
        info!(target: "lpwan.protocol", url = %url, app_name = %app_name, "uplink_report_skipped");
        Ok(())
    }
}
