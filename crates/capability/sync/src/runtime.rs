//! 运行期数据流：上行转发与下行下发。

use crate::engine::{SyncEngine, ensure_authorized};
use crate::error::SyncError;
use crate::fanout::NetworkLogs;
use domain::{DeploymentStatus, DeploymentType, Id};
use lpwan_protocol::translate_error;
use lpwan_storage::NetworkDeploymentFilter;
use lpwan_telemetry::record_uplink_relayed;
use serde_json::{Value, json};
use tracing::{info, warn};

impl SyncEngine {
    /// 解码远端推送的上行数据并上报到所属应用。
    ///
    /// 返回是否已上报；应用未配置上报地址时丢弃，上报失败只记录日志。
    pub async fn relay_uplink(
        &self,
        network_id: Id,
        remote_application_id: &str,
        payload: &Value,
    ) -> Result<bool, SyncError> {
        let network = self.load_network(network_id).await?;
        ensure_authorized(&network)?;
        let handler = self.handler(&network)?;
        let ctx = self.context("Relay uplink");
        let uplink = handler
            .handle_uplink(&ctx, &network, remote_application_id, payload)
            .await?;

        let deployment = self
            .deployment_by_remote_id(network.id, DeploymentType::Device, &uplink.remote_device_id)
            .await?
            .ok_or_else(|| SyncError::UnknownRemoteReference {
                entity: DeploymentType::Device,
                remote_id: uplink.remote_device_id.clone(),
            })?;
        let device = ctx
            .get_device_by_id(deployment.entity_id)
            .await?
            .ok_or_else(|| SyncError::missing("device", deployment.entity_id))?;
        let application = ctx
            .get_application_by_id(device.application_id)
            .await?
            .ok_or_else(|| SyncError::missing("application", device.application_id))?;

        let Some(url) = application.base_url.as_deref() else {
            info!(
                target: "lpwan.sync",
                network_id,
                application_id = application.id,
                device_id = device.id,
                "uplink_dropped_without_reporting_url"
            );
            return Ok(false);
        };
        let data = json!({
            "networkId": network.id,
            "applicationId": application.id,
            "deviceId": device.id,
            "deviceName": device.name,
            "data": uplink.data,
        });
        match self.reporter.report(&data, url, &application.name).await {
            Ok(()) => {
                record_uplink_relayed();
                info!(
                    target: "lpwan.sync",
                    network_id,
                    application_id = application.id,
                    device_id = device.id,
                    "uplink_relayed"
                );
                Ok(true)
            }
            Err(err) => {
                warn!(
                    target: "lpwan.sync",
                    network_id,
                    application_id = application.id,
                    url = %url,
                    error = %translate_error(&err),
                    "uplink_report_failed"
                );
                Ok(false)
            }
        }
    }

    /// 通过设备部署所在的每个网络下发数据，返回按网络聚合的日志。
    pub async fn pass_data_to_device(&self, device_id: Id, data: &Value) -> Result<NetworkLogs, SyncError> {
        let device = self
            .stores
            .devices
            .load_by_id(device_id)
            .await?
            .ok_or_else(|| SyncError::missing("device", device_id))?;
        let ctx = self.context("Pass data to device");
        let filter = NetworkDeploymentFilter {
            deployment_type: Some(DeploymentType::Device),
            entity_id: Some(device_id),
            ..NetworkDeploymentFilter::default()
        };
        for deployment in self.stores.deployments.list_where(filter).await? {
            if deployment.status == DeploymentStatus::Removed {
                continue;
            }
            let Some(remote_id) = deployment.meta.remote_id else {
                continue;
            };
            let network = match self.load_network(deployment.network_id).await {
                Ok(network) => network,
                Err(err) => {
                    warn!(
                        target: "lpwan.sync",
                        network_id = deployment.network_id,
                        device_id,
                        error = %err,
                        "downlink_network_unavailable"
                    );
                    continue;
                }
            };
            if let Some(network_type) = ctx.get_network_type_by_id(network.network_type_id).await? {
                ctx.init_log(&network_type, Some(&network));
            }
            let sent = async {
                ensure_authorized(&network)?;
                let handler = self.handler(&network)?;
                handler
                    .pass_data_to_device(&ctx, &network, &remote_id, data)
                    .await?;
                Ok::<(), SyncError>(())
            }
            .await;
            match sent {
                Ok(()) => ctx.add_log(Some(&network), format!("Data sent to device {}", device.name)),
                Err(err) => self.log_failure(&ctx, &network, &err),
            }
        }
        Ok(ctx.get_logs())
    }
}
