//! 推送到网络
//!
//! 1. 为该网络上还没有部署记录的本地实体补建 `CREATED` 部署
//! 2. 按部署状态对远端执行创建 / 更新 / 删除
//!
//! 应用与 device profile 并发推送，设备在两者都完成后推送（设备参数依赖它们的远端 ID）。
//! 单个部署失败记入网络日志，其余部署继续。

use crate::engine::{PushSummary, SyncEngine, ensure_authorized};
use crate::error::SyncError;
use crate::state::{SyncAction, after_remote_update, enabled_change, on_local_remove, on_local_update, plan};
use domain::{DeploymentMeta, DeploymentStatus, DeploymentType, Id, Network};
use lpwan_protocol::{
    ApplicationArgs, DeviceArgs, DeviceProfileArgs, NetworkDataAccess, ProtocolHandler,
};
use lpwan_storage::{
    ApplicationFilter, DeviceFilter, DeviceNetworkTypeLinkFilter, DeviceProfileFilter,
    NetworkDeploymentFilter, NetworkDeploymentRecord,
};
use lpwan_telemetry::{record_remote_create, record_remote_remove, record_remote_update};
use serde_json::json;
use std::collections::HashSet;
use tracing::info;

/// 单个网络的推送计数。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkPushSummary {
    pub applications: PushSummary,
    pub device_profiles: PushSummary,
    pub devices: PushSummary,
}

/// 远端动作执行后的部署状态。
struct Applied {
    status: DeploymentStatus,
    meta: DeploymentMeta,
    /// 部署记录已删除
    dropped: bool,
}

impl SyncEngine {
    /// 推送单个网络的全部部署。
    pub async fn push_network(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
    ) -> Result<NetworkPushSummary, SyncError> {
        ensure_authorized(network)?;
        let handler = self.handler(network)?;
        handler.connect(ctx, network).await?;
        let handler = handler.as_ref();

        let (applications, device_profiles) = tokio::join!(
            self.push_applications(ctx, network, handler),
            self.push_device_profiles(ctx, network, handler),
        );
        let summary = NetworkPushSummary {
            applications: applications?,
            device_profiles: device_profiles?,
            devices: self.push_devices(ctx, network, handler).await?,
        };

        ctx.add_log(Some(network), format!("Applications: {}", summary.applications));
        ctx.add_log(Some(network), format!("Device profiles: {}", summary.device_profiles));
        ctx.add_log(Some(network), format!("Devices: {}", summary.devices));
        info!(
            target: "lpwan.sync",
            network_id = network.id,
            applications = %summary.applications,
            device_profiles = %summary.device_profiles,
            devices = %summary.devices,
            "push_completed"
        );
        Ok(summary)
    }

    /// 推送应用；新建的部署数据接收默认关闭。
    pub async fn push_applications(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
        handler: &dyn ProtocolHandler,
    ) -> Result<PushSummary, SyncError> {
        let local: Vec<Id> = self
            .stores
            .applications
            .list_where(ApplicationFilter::default())
            .await?
            .iter()
            .map(|application| application.id)
            .collect();
        let meta = DeploymentMeta {
            enabled: Some(false),
            ..DeploymentMeta::default()
        };
        self.ensure_deployments(network, DeploymentType::Application, local, meta)
            .await?;

        let mut summary = PushSummary::default();
        for deployment in self.deployments_of(network.id, DeploymentType::Application).await? {
            if let Err(err) = self
                .sync_application(ctx, network, handler, deployment, &mut summary)
                .await
            {
                summary.failed += 1;
                self.log_failure(ctx, network, &err);
            }
        }
        Ok(summary)
    }

    /// 推送与该网络同类型的 device profile。
    pub async fn push_device_profiles(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
        handler: &dyn ProtocolHandler,
    ) -> Result<PushSummary, SyncError> {
        let filter = DeviceProfileFilter {
            network_type_id: Some(network.network_type_id),
            ..DeviceProfileFilter::default()
        };
        let local: Vec<Id> = self
            .stores
            .device_profiles
            .list_where(filter)
            .await?
            .iter()
            .map(|profile| profile.id)
            .collect();
        self.ensure_deployments(network, DeploymentType::DeviceProfile, local, DeploymentMeta::default())
            .await?;

        let mut summary = PushSummary::default();
        for deployment in self.deployments_of(network.id, DeploymentType::DeviceProfile).await? {
            if let Err(err) = self
                .sync_device_profile(ctx, network, handler, deployment, &mut summary)
                .await
            {
                summary.failed += 1;
                self.log_failure(ctx, network, &err);
            }
        }
        Ok(summary)
    }

    /// 推送在该网络类型上有关联的设备。
    pub async fn push_devices(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
        handler: &dyn ProtocolHandler,
    ) -> Result<PushSummary, SyncError> {
        let devices: HashSet<Id> = self
            .stores
            .devices
            .list_where(DeviceFilter::default())
            .await?
            .iter()
            .map(|device| device.id)
            .collect();
        let filter = DeviceNetworkTypeLinkFilter {
            network_type_id: Some(network.network_type_id),
            ..DeviceNetworkTypeLinkFilter::default()
        };
        let local: Vec<Id> = self
            .stores
            .device_links
            .list_where(filter)
            .await?
            .iter()
            .map(|link| link.device_id)
            .filter(|device_id| devices.contains(device_id))
            .collect();
        self.ensure_deployments(network, DeploymentType::Device, local, DeploymentMeta::default())
            .await?;

        let mut summary = PushSummary::default();
        for deployment in self.deployments_of(network.id, DeploymentType::Device).await? {
            if let Err(err) = self
                .sync_device(ctx, network, handler, deployment, &mut summary)
                .await
            {
                summary.failed += 1;
                self.log_failure(ctx, network, &err);
            }
        }
        Ok(summary)
    }

    /// 为缺少部署记录的实体补建 `CREATED` 部署，返回新建数量。
    async fn ensure_deployments(
        &self,
        network: &Network,
        deployment_type: DeploymentType,
        entity_ids: Vec<Id>,
        meta: DeploymentMeta,
    ) -> Result<usize, SyncError> {
        let existing: HashSet<Id> = self
            .deployments_of(network.id, deployment_type)
            .await?
            .iter()
            .map(|deployment| deployment.entity_id)
            .collect();
        let mut created = 0;
        for entity_id in entity_ids {
            if existing.contains(&entity_id) {
                continue;
            }
            self.create_deployment(network.id, deployment_type, entity_id, meta.clone())
                .await?;
            created += 1;
        }
        Ok(created)
    }

    async fn sync_application(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
        handler: &dyn ProtocolHandler,
        deployment: NetworkDeploymentRecord,
        summary: &mut PushSummary,
    ) -> Result<(), SyncError> {
        let deployment_id = deployment.id;
        let application_id = deployment.entity_id;
        let action = plan(deployment.status, &deployment.meta);
        let applied = match action {
            SyncAction::Create | SyncAction::Update => {
                let application = ctx
                    .get_application_by_id(application_id)
                    .await?
                    .ok_or_else(|| SyncError::missing("application", application_id))?;
                let link = ctx
                    .get_application_link(application_id, network.network_type_id)
                    .await?;
                let args = ApplicationArgs {
                    application,
                    network_settings: link
                        .map(|link| link.network_settings)
                        .unwrap_or_else(|| json!({})),
                    remote_id: deployment.meta.remote_id.clone(),
                };
                if action == SyncAction::Create {
                    let remote_id = handler.create_application(ctx, network, &args).await?;
                    self.record_created(deployment, remote_id, summary).await?
                } else {
                    handler.update_application(ctx, network, &args).await?;
                    self.record_updated(deployment, summary).await?
                }
            }
            SyncAction::Remove => {
                if let Some(remote_id) = &deployment.meta.remote_id {
                    handler.remove_application(ctx, network, remote_id).await?;
                }
                self.record_removed(deployment, true, summary).await?
            }
            SyncAction::DropRow => self.record_removed(deployment, false, summary).await?,
            SyncAction::Noop | SyncAction::SkipOriginCreate => Applied {
                status: deployment.status,
                meta: deployment.meta,
                dropped: false,
            },
        };
        if applied.dropped {
            return Ok(());
        }

        // 数据接收开关与状态无关，只比较关联上的 enabled 与已记录的开关
        let Some(remote_id) = applied.meta.remote_id.clone() else {
            return Ok(());
        };
        let link_enabled = ctx
            .get_application_link(application_id, network.network_type_id)
            .await?
            .is_some_and(|link| link.enabled);
        let Some(enabled) = enabled_change(link_enabled, &applied.meta) else {
            return Ok(());
        };
        if enabled {
            handler.start_application(ctx, network, &remote_id).await?;
            summary.started += 1;
        } else {
            handler.stop_application(ctx, network, &remote_id).await?;
            summary.stopped += 1;
        }
        let mut meta = applied.meta;
        meta.enabled = Some(enabled);
        self.save_deployment(deployment_id, applied.status, &meta).await?;
        info!(
            target: "lpwan.sync",
            network_id = network.id,
            deployment_id,
            remote_id = %remote_id,
            enabled,
            "application_receive_toggled"
        );
        Ok(())
    }

    async fn sync_device_profile(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
        handler: &dyn ProtocolHandler,
        deployment: NetworkDeploymentRecord,
        summary: &mut PushSummary,
    ) -> Result<(), SyncError> {
        let action = plan(deployment.status, &deployment.meta);
        match action {
            SyncAction::Create | SyncAction::Update => {
                let device_profile = ctx
                    .get_device_profile_by_id(deployment.entity_id)
                    .await?
                    .ok_or_else(|| SyncError::missing("device profile", deployment.entity_id))?;
                let args = DeviceProfileArgs {
                    device_profile,
                    remote_id: deployment.meta.remote_id.clone(),
                };
                if action == SyncAction::Create {
                    let remote_id = handler.create_device_profile(ctx, network, &args).await?;
                    self.record_created(deployment, remote_id, summary).await?;
                } else {
                    handler.update_device_profile(ctx, network, &args).await?;
                    self.record_updated(deployment, summary).await?;
                }
            }
            SyncAction::Remove => {
                if let Some(remote_id) = &deployment.meta.remote_id {
                    handler.remove_device_profile(ctx, network, remote_id).await?;
                }
                self.record_removed(deployment, true, summary).await?;
            }
            SyncAction::DropRow => {
                self.record_removed(deployment, false, summary).await?;
            }
            SyncAction::Noop | SyncAction::SkipOriginCreate => {}
        }
        Ok(())
    }

    async fn sync_device(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
        handler: &dyn ProtocolHandler,
        deployment: NetworkDeploymentRecord,
        summary: &mut PushSummary,
    ) -> Result<(), SyncError> {
        let action = plan(deployment.status, &deployment.meta);
        match action {
            SyncAction::Create | SyncAction::Update => {
                let args = self
                    .device_args(ctx, network, deployment.entity_id, deployment.meta.remote_id.clone())
                    .await?;
                if action == SyncAction::Create {
                    let remote_id = handler.create_device(ctx, network, &args).await?;
                    self.record_created(deployment, remote_id, summary).await?;
                } else {
                    handler.update_device(ctx, network, &args).await?;
                    self.record_updated(deployment, summary).await?;
                }
            }
            SyncAction::Remove => {
                if let Some(remote_id) = &deployment.meta.remote_id {
                    handler.remove_device(ctx, network, remote_id).await?;
                }
                self.record_removed(deployment, true, summary).await?;
            }
            SyncAction::DropRow => {
                self.record_removed(deployment, false, summary).await?;
            }
            SyncAction::Noop | SyncAction::SkipOriginCreate => {}
        }
        Ok(())
    }

    /// 设备参数：所属应用与 device profile 解析为该网络上的远端 ID。
    async fn device_args(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
        device_id: Id,
        remote_id: Option<String>,
    ) -> Result<DeviceArgs, SyncError> {
        let device = ctx
            .get_device_by_id(device_id)
            .await?
            .ok_or_else(|| SyncError::missing("device", device_id))?;
        let link = ctx
            .get_device_link(device_id, network.network_type_id)
            .await?
            .ok_or_else(|| SyncError::missing("device network type link", device_id))?;
        let device_profile = ctx
            .get_device_profile_by_id(link.device_profile_id)
            .await?
            .ok_or_else(|| SyncError::missing("device profile", link.device_profile_id))?;
        let remote_application_id = self
            .remote_id_of(network, DeploymentType::Application, device.application_id)
            .await?;
        let remote_device_profile_id = self
            .remote_id_of(network, DeploymentType::DeviceProfile, device_profile.id)
            .await?;
        Ok(DeviceArgs {
            device,
            network_settings: link.network_settings,
            device_profile,
            remote_application_id,
            remote_device_profile_id,
            remote_id,
        })
    }

    async fn record_created(
        &self,
        deployment: NetworkDeploymentRecord,
        remote_id: String,
        summary: &mut PushSummary,
    ) -> Result<Applied, SyncError> {
        let mut meta = deployment.meta;
        meta.assign_remote_id(remote_id.clone())?;
        let status = DeploymentStatus::Created;
        self.save_deployment(deployment.id, status, &meta).await?;
        record_remote_create();
        summary.created += 1;
        info!(
            target: "lpwan.sync",
            network_id = deployment.network_id,
            deployment_id = deployment.id,
            deployment_type = %deployment.deployment_type,
            entity_id = deployment.entity_id,
            remote_id = %remote_id,
            "remote_created"
        );
        Ok(Applied {
            status,
            meta,
            dropped: false,
        })
    }

    async fn record_updated(
        &self,
        deployment: NetworkDeploymentRecord,
        summary: &mut PushSummary,
    ) -> Result<Applied, SyncError> {
        let status = after_remote_update(self.config.reassert_updated);
        self.save_deployment(deployment.id, status, &deployment.meta).await?;
        record_remote_update();
        summary.updated += 1;
        info!(
            target: "lpwan.sync",
            network_id = deployment.network_id,
            deployment_id = deployment.id,
            deployment_type = %deployment.deployment_type,
            entity_id = deployment.entity_id,
            "remote_updated"
        );
        Ok(Applied {
            status,
            meta: deployment.meta,
            dropped: false,
        })
    }

    /// 删除部署记录；`remote` 表示远端删除已执行。
    async fn record_removed(
        &self,
        deployment: NetworkDeploymentRecord,
        remote: bool,
        summary: &mut PushSummary,
    ) -> Result<Applied, SyncError> {
        self.stores.deployments.remove_by_id(deployment.id).await?;
        if remote {
            record_remote_remove();
            summary.removed += 1;
        }
        info!(
            target: "lpwan.sync",
            network_id = deployment.network_id,
            deployment_id = deployment.id,
            deployment_type = %deployment.deployment_type,
            entity_id = deployment.entity_id,
            remote,
            "deployment_dropped"
        );
        Ok(Applied {
            status: DeploymentStatus::Removed,
            meta: deployment.meta,
            dropped: true,
        })
    }

    /// 本地实体被修改：该实体在所有网络上的部署转为 `UPDATED`，返回变更数量。
    pub async fn mark_updated(
        &self,
        deployment_type: DeploymentType,
        entity_id: Id,
    ) -> Result<usize, SyncError> {
        self.transition_all(deployment_type, entity_id, None, on_local_update)
            .await
    }

    /// 拉取改写了本地实体：其余网络上的部署转为 `UPDATED`，来源网络保持不变。
    pub(crate) async fn mark_updated_elsewhere(
        &self,
        deployment_type: DeploymentType,
        entity_id: Id,
        source_network_id: Id,
    ) -> Result<usize, SyncError> {
        self.transition_all(deployment_type, entity_id, Some(source_network_id), on_local_update)
            .await
    }

    /// 本地实体被删除：该实体在所有网络上的部署转为 `REMOVED`，返回变更数量。
    pub async fn mark_removed(
        &self,
        deployment_type: DeploymentType,
        entity_id: Id,
    ) -> Result<usize, SyncError> {
        self.transition_all(deployment_type, entity_id, None, on_local_remove)
            .await
    }

    async fn transition_all(
        &self,
        deployment_type: DeploymentType,
        entity_id: Id,
        skip_network_id: Option<Id>,
        transition: fn(DeploymentStatus) -> DeploymentStatus,
    ) -> Result<usize, SyncError> {
        let filter = NetworkDeploymentFilter {
            deployment_type: Some(deployment_type),
            entity_id: Some(entity_id),
            ..NetworkDeploymentFilter::default()
        };
        let mut changed = 0;
        for deployment in self.stores.deployments.list_where(filter).await? {
            if skip_network_id == Some(deployment.network_id) {
                continue;
            }
            let next = transition(deployment.status);
            if next == deployment.status {
                continue;
            }
            self.save_deployment(deployment.id, next, &deployment.meta).await?;
            changed += 1;
        }
        info!(
            target: "lpwan.sync",
            deployment_type = %deployment_type,
            entity_id,
            changed,
            "local_change_recorded"
        );
        Ok(changed)
    }
}
