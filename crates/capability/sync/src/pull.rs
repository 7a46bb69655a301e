//! 从网络拉取
//!
//! 顺序：应用 → device profile → 各拉取到的应用下的设备。
//! 远端对象先按部署上的 remoteId 匹配本地实体，再按名称匹配，都没有时新建；
//! 拉取产生的部署一律带 `isOrigin`。已有的 remoteId 不会被覆盖。
//! 匹配到的本地实体按远端改写名称、描述与网络参数，有改动时该实体在其余网络上的部署转为 `UPDATED`。

use crate::engine::{SyncEngine, ensure_authorized};
use crate::error::SyncError;
use domain::{DeploymentMeta, DeploymentStatus, DeploymentType, Id, Network};
use lpwan_protocol::{NetworkDataAccess, ProtocolHandler};
use lpwan_storage::{
    ApplicationFilter, ApplicationNetworkTypeLinkFilter, ApplicationNetworkTypeLinkRecord,
    ApplicationNetworkTypeLinkUpdate, ApplicationRecord, ApplicationUpdate, DeviceFilter,
    DeviceNetworkTypeLinkFilter, DeviceNetworkTypeLinkRecord, DeviceNetworkTypeLinkUpdate,
    DeviceProfileFilter, DeviceProfileRecord, DeviceProfileUpdate, DeviceRecord, DeviceUpdate,
    NetworkDeploymentRecord,
};
use lpwan_telemetry::record_pulled_entity;
use serde_json::Value;
use tracing::info;

/// 拉取计数。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullSummary {
    pub applications: usize,
    pub device_profiles: usize,
    pub devices: usize,
    pub failed: usize,
}

enum Matched {
    /// 已有部署指向的本地实体
    Deployed(Id),
    /// 部署待删除，不再导入
    PendingRemoval,
    NotFound,
}

/// 远端值与本地不同时返回远端值。
fn changed_value<T: PartialEq + Clone>(local: &T, remote: &T) -> Option<T> {
    (local != remote).then(|| remote.clone())
}

/// 远端没有描述时保留本地描述。
fn changed_description(local: Option<&str>, remote: Option<&str>) -> Option<String> {
    remote.filter(|remote| local != Some(*remote)).map(str::to_string)
}

fn matched(deployment: Option<NetworkDeploymentRecord>) -> Matched {
    match deployment {
        Some(deployment) if deployment.status == DeploymentStatus::Removed => Matched::PendingRemoval,
        Some(deployment) => Matched::Deployed(deployment.entity_id),
        None => Matched::NotFound,
    }
}

impl SyncEngine {
    /// 拉取单个网络上的全部实体。
    pub async fn pull_network(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
    ) -> Result<PullSummary, SyncError> {
        ensure_authorized(network)?;
        let handler = self.handler(network)?;
        handler.connect(ctx, network).await?;
        let handler = handler.as_ref();
        let mut summary = PullSummary::default();

        let mut applications = Vec::new();
        for raw in handler.list_all_applications(ctx, network).await? {
            match self.pull_application(network, handler, &raw).await {
                Ok(Some(pulled)) => applications.push(pulled),
                Ok(None) => {}
                Err(err) => {
                    summary.failed += 1;
                    self.log_failure(ctx, network, &err);
                }
            }
        }
        summary.applications = applications.len();

        for raw in handler.list_all_device_profiles(ctx, network).await? {
            match self.pull_device_profile(network, handler, &raw).await {
                Ok(true) => summary.device_profiles += 1,
                Ok(false) => {}
                Err(err) => {
                    summary.failed += 1;
                    self.log_failure(ctx, network, &err);
                }
            }
        }

        for (application_id, remote_application_id) in &applications {
            let devices = match handler
                .list_all_devices(ctx, network, remote_application_id)
                .await
            {
                Ok(devices) => devices,
                Err(err) => {
                    summary.failed += 1;
                    self.log_failure(ctx, network, &SyncError::from(err));
                    continue;
                }
            };
            for raw in devices {
                match self
                    .pull_device(network, handler, *application_id, &raw)
                    .await
                {
                    Ok(true) => summary.devices += 1,
                    Ok(false) => {}
                    Err(err) => {
                        summary.failed += 1;
                        self.log_failure(ctx, network, &err);
                    }
                }
            }
        }

        let mut message = format!(
            "Pulled {} applications, {} device profiles and {} devices",
            summary.applications, summary.device_profiles, summary.devices
        );
        if summary.failed > 0 {
            message.push_str(&format!(" ({} failed)", summary.failed));
        }
        ctx.add_log(Some(network), message);
        info!(
            target: "lpwan.sync",
            network_id = network.id,
            applications = summary.applications,
            device_profiles = summary.device_profiles,
            devices = summary.devices,
            failed = summary.failed,
            "pull_completed"
        );
        Ok(summary)
    }

    /// 返回 (本地应用 ID, 远端应用 ID)；待删除的应用返回 None。
    async fn pull_application(
        &self,
        network: &Network,
        handler: &dyn ProtocolHandler,
        raw: &Value,
    ) -> Result<Option<(Id, String)>, SyncError> {
        let remote = handler.build_application(raw)?;
        let deployment = self
            .deployment_by_remote_id(network.id, DeploymentType::Application, &remote.remote_id)
            .await?;
        let existing = match matched(deployment) {
            Matched::PendingRemoval => return Ok(None),
            Matched::Deployed(id) => Some(
                self.stores
                    .applications
                    .load_by_id(id)
                    .await?
                    .ok_or_else(|| SyncError::missing("application", id))?,
            ),
            Matched::NotFound => {
                let filter = ApplicationFilter {
                    name: Some(remote.name.clone()),
                    ..ApplicationFilter::default()
                };
                self.stores.applications.load(&filter).await?
            }
        };
        let application_id = match &existing {
            Some(local) => local.id,
            None => {
                self.stores
                    .applications
                    .create(ApplicationRecord {
                        id: 0,
                        name: remote.name.clone(),
                        description: remote.description.clone(),
                        base_url: None,
                        reporting_protocol_id: None,
                    })
                    .await?
                    .id
            }
        };
        self.adopt_origin(network, DeploymentType::Application, application_id, &remote.remote_id)
            .await?;

        let mut changed = false;
        if let Some(local) = &existing {
            let update = ApplicationUpdate {
                name: changed_value(&local.name, &remote.name),
                description: changed_description(
                    local.description.as_deref(),
                    remote.description.as_deref(),
                ),
                ..ApplicationUpdate::default()
            };
            if update.name.is_some() || update.description.is_some() {
                self.stores.applications.update_by_id(local.id, &update).await?;
                changed = true;
            }
        }
        changed |= self
            .sync_application_link(application_id, network.network_type_id, &remote.network_settings)
            .await?;
        if changed {
            self.mark_updated_elsewhere(DeploymentType::Application, application_id, network.id)
                .await?;
        }
        record_pulled_entity();
        Ok(Some((application_id, remote.remote_id)))
    }

    async fn pull_device_profile(
        &self,
        network: &Network,
        handler: &dyn ProtocolHandler,
        raw: &Value,
    ) -> Result<bool, SyncError> {
        let remote = handler.build_device_profile(raw)?;
        let deployment = self
            .deployment_by_remote_id(network.id, DeploymentType::DeviceProfile, &remote.remote_id)
            .await?;
        let existing = match matched(deployment) {
            Matched::PendingRemoval => return Ok(false),
            Matched::Deployed(id) => Some(
                self.stores
                    .device_profiles
                    .load_by_id(id)
                    .await?
                    .ok_or_else(|| SyncError::missing("device profile", id))?,
            ),
            Matched::NotFound => {
                let filter = DeviceProfileFilter {
                    network_type_id: Some(network.network_type_id),
                    name: Some(remote.name.clone()),
                    ..DeviceProfileFilter::default()
                };
                self.stores.device_profiles.load(&filter).await?
            }
        };
        let device_profile_id = match &existing {
            Some(local) => local.id,
            None => {
                self.stores
                    .device_profiles
                    .create(DeviceProfileRecord {
                        id: 0,
                        network_type_id: network.network_type_id,
                        name: remote.name.clone(),
                        description: remote.description.clone(),
                        network_settings: remote.network_settings.clone(),
                    })
                    .await?
                    .id
            }
        };
        self.adopt_origin(network, DeploymentType::DeviceProfile, device_profile_id, &remote.remote_id)
            .await?;

        if let Some(local) = &existing {
            let update = DeviceProfileUpdate {
                name: changed_value(&local.name, &remote.name),
                description: changed_description(
                    local.description.as_deref(),
                    remote.description.as_deref(),
                ),
                network_settings: changed_value(&local.network_settings, &remote.network_settings),
            };
            if update.name.is_some() || update.description.is_some() || update.network_settings.is_some() {
                self.stores
                    .device_profiles
                    .update_by_id(local.id, &update)
                    .await?;
                self.mark_updated_elsewhere(DeploymentType::DeviceProfile, local.id, network.id)
                    .await?;
            }
        }
        record_pulled_entity();
        Ok(true)
    }

    async fn pull_device(
        &self,
        network: &Network,
        handler: &dyn ProtocolHandler,
        application_id: Id,
        raw: &Value,
    ) -> Result<bool, SyncError> {
        let remote = handler.build_device(raw)?;
        let device_profile_id = match matched(
            self.deployment_by_remote_id(
                network.id,
                DeploymentType::DeviceProfile,
                &remote.remote_device_profile_id,
            )
            .await?,
        ) {
            Matched::Deployed(id) => id,
            _ => {
                return Err(SyncError::UnknownRemoteReference {
                    entity: DeploymentType::DeviceProfile,
                    remote_id: remote.remote_device_profile_id,
                });
            }
        };

        let deployment = self
            .deployment_by_remote_id(network.id, DeploymentType::Device, &remote.remote_id)
            .await?;
        let existing = match matched(deployment) {
            Matched::PendingRemoval => return Ok(false),
            Matched::Deployed(id) => Some(
                self.stores
                    .devices
                    .load_by_id(id)
                    .await?
                    .ok_or_else(|| SyncError::missing("device", id))?,
            ),
            Matched::NotFound => {
                let filter = DeviceFilter {
                    application_id: Some(application_id),
                    name: Some(remote.name.clone()),
                    ..DeviceFilter::default()
                };
                self.stores.devices.load(&filter).await?
            }
        };
        let device_id = match &existing {
            Some(local) => local.id,
            None => {
                self.stores
                    .devices
                    .create(DeviceRecord {
                        id: 0,
                        application_id,
                        name: remote.name.clone(),
                        description: remote.description.clone(),
                        device_model: None,
                    })
                    .await?
                    .id
            }
        };
        self.adopt_origin(network, DeploymentType::Device, device_id, &remote.remote_id)
            .await?;

        let mut changed = false;
        if let Some(local) = &existing {
            let update = DeviceUpdate {
                name: changed_value(&local.name, &remote.name),
                description: changed_description(
                    local.description.as_deref(),
                    remote.description.as_deref(),
                ),
                ..DeviceUpdate::default()
            };
            if update.name.is_some() || update.description.is_some() {
                self.stores.devices.update_by_id(local.id, &update).await?;
                changed = true;
            }
        }
        changed |= self
            .sync_device_link(
                device_id,
                network.network_type_id,
                device_profile_id,
                &remote.network_settings,
            )
            .await?;
        if changed {
            self.mark_updated_elsewhere(DeploymentType::Device, device_id, network.id)
                .await?;
        }
        record_pulled_entity();
        Ok(true)
    }

    /// 关联不存在时以远端参数新建（数据接收默认关闭）；已存在时只改写网络参数。
    /// 返回已有关联是否被改写。
    async fn sync_application_link(
        &self,
        application_id: Id,
        network_type_id: Id,
        network_settings: &Value,
    ) -> Result<bool, SyncError> {
        let filter = ApplicationNetworkTypeLinkFilter {
            application_id: Some(application_id),
            network_type_id: Some(network_type_id),
            ..ApplicationNetworkTypeLinkFilter::default()
        };
        if let Some(link) = self.stores.application_links.load(&filter).await? {
            let Some(network_settings) = changed_value(&link.network_settings, network_settings) else {
                return Ok(false);
            };
            let update = ApplicationNetworkTypeLinkUpdate {
                network_settings: Some(network_settings),
                ..ApplicationNetworkTypeLinkUpdate::default()
            };
            self.stores
                .application_links
                .update_by_id(link.id, &update)
                .await?;
            return Ok(true);
        }
        self.stores
            .application_links
            .create(ApplicationNetworkTypeLinkRecord {
                id: 0,
                application_id,
                network_type_id,
                enabled: false,
                network_settings: network_settings.clone(),
            })
            .await?;
        Ok(false)
    }

    /// 设备关联跟随远端的 device profile 与网络参数；返回已有关联是否被改写。
    async fn sync_device_link(
        &self,
        device_id: Id,
        network_type_id: Id,
        device_profile_id: Id,
        network_settings: &Value,
    ) -> Result<bool, SyncError> {
        let filter = DeviceNetworkTypeLinkFilter {
            device_id: Some(device_id),
            network_type_id: Some(network_type_id),
            ..DeviceNetworkTypeLinkFilter::default()
        };
        if let Some(link) = self.stores.device_links.load(&filter).await? {
            let update = DeviceNetworkTypeLinkUpdate {
                device_profile_id: changed_value(&link.device_profile_id, &device_profile_id),
                network_settings: changed_value(&link.network_settings, network_settings),
            };
            if update.device_profile_id.is_none() && update.network_settings.is_none() {
                return Ok(false);
            }
            self.stores.device_links.update_by_id(link.id, &update).await?;
            return Ok(true);
        }
        self.stores
            .device_links
            .create(DeviceNetworkTypeLinkRecord {
                id: 0,
                device_id,
                network_type_id,
                device_profile_id,
                network_settings: network_settings.clone(),
            })
            .await?;
        Ok(false)
    }

    /// 记录实体在该网络上来自远端；已有不同的 remoteId 时报冲突。
    async fn adopt_origin(
        &self,
        network: &Network,
        deployment_type: DeploymentType,
        entity_id: Id,
        remote_id: &str,
    ) -> Result<(), SyncError> {
        let Some(mut deployment) = self.deployment(network.id, deployment_type, entity_id).await? else {
            self.create_deployment(
                network.id,
                deployment_type,
                entity_id,
                DeploymentMeta::origin(remote_id),
            )
            .await?;
            return Ok(());
        };
        if deployment.meta.remote_id.as_deref() == Some(remote_id) {
            return Ok(());
        }
        deployment.meta.assign_remote_id(remote_id)?;
        deployment.meta.is_origin = true;
        self.save_deployment(deployment.id, deployment.status, &deployment.meta)
            .await
    }
}
