//! 网络生命周期
//!
//! - 创建：生成网络密钥、加密保存凭据、验证凭据，验证通过后先拉取再推送
//! - 读取：解密 securityData 得到网络视图
//! - 重新授权：替换凭据并重新验证
//! - 删除：依次删除部署、协议数据、缓存的会话，最后删除网络本身
//!
//! 凭据未通过验证的网络 `authorized = false`，原因写在 `securityData.message`，
//! 重新授权前拒绝一切同步操作。

use crate::engine::SyncEngine;
use crate::error::SyncError;
use crate::fanout::NetworkLogs;
use crate::security;
use domain::{Id, Network, SecurityData};
use lpwan_protocol::{NetworkDataAccess, translate_error};
use lpwan_storage::{
    NetworkDeploymentFilter, NetworkFilter, NetworkRecord, NetworkTypeRecord, NetworkUpdate,
    ProtocolDataFilter, ProtocolDataRecord,
};
use serde_json::{Map, Value};
use tracing::{info, warn};

/// 创建网络请求。
#[derive(Debug, Clone)]
pub struct NewNetwork {
    pub name: String,
    pub network_type_id: Id,
    pub network_protocol_id: Id,
    pub base_url: String,
    pub enabled: bool,
    /// 远端凭据（明文，仅在内存中）
    pub credentials: Map<String, Value>,
}

/// 网络操作结果。
#[derive(Debug, Clone)]
pub struct NetworkOutcome {
    pub network: Network,
    pub logs: NetworkLogs,
}

/// 由存储记录和已解密的 securityData 组成网络视图。
pub(crate) fn network_view(record: &NetworkRecord, security_data: SecurityData) -> Network {
    Network {
        id: record.id,
        name: record.name.clone(),
        network_type_id: record.network_type_id,
        network_protocol_id: record.network_protocol_id,
        base_url: record.base_url.clone(),
        enabled: record.enabled,
        security_data,
    }
}

fn key_filter(network_id: Id, network_protocol_id: Id) -> ProtocolDataFilter {
    ProtocolDataFilter {
        network_id: Some(network_id),
        network_protocol_id: Some(network_protocol_id),
        data_identifier: Some(security::key_identifier(network_id)),
        ..ProtocolDataFilter::default()
    }
}

impl SyncEngine {
    pub async fn create_network(&self, request: NewNetwork) -> Result<NetworkOutcome, SyncError> {
        if request.name.trim().is_empty() {
            return Err(SyncError::InvalidRequest("network name is required".to_string()));
        }
        if request.base_url.trim().is_empty() {
            return Err(SyncError::InvalidRequest("network baseUrl is required".to_string()));
        }
        let network_type = self.network_type(request.network_type_id).await?;
        let protocol = self
            .stores
            .network_protocols
            .load_by_id(request.network_protocol_id)
            .await?
            .ok_or_else(|| SyncError::missing("network protocol", request.network_protocol_id))?;
        if protocol.network_type_id != network_type.id {
            return Err(SyncError::InvalidRequest(format!(
                "network protocol {} does not serve network type {}",
                protocol.name, network_type.name
            )));
        }
        self.registry.handler(protocol.id)?;

        let record = self
            .stores
            .networks
            .create(NetworkRecord {
                id: 0,
                name: request.name.trim().to_string(),
                network_type_id: network_type.id,
                network_protocol_id: protocol.id,
                base_url: request.base_url.trim().to_string(),
                enabled: request.enabled,
                security_data: None,
            })
            .await?;
        self.stores
            .protocol_data
            .create(ProtocolDataRecord {
                id: 0,
                network_id: record.id,
                network_protocol_id: record.network_protocol_id,
                data_identifier: security::key_identifier(record.id),
                data_value: security::generate_key(),
            })
            .await?;
        info!(
            target: "lpwan.sync",
            network_id = record.id,
            network_type_id = record.network_type_id,
            network_protocol_id = record.network_protocol_id,
            "network_created"
        );

        let mut network = network_view(&record, SecurityData::with_credentials(request.credentials));
        let ctx = self.context("Create network");
        ctx.init_log(&network_type, Some(&network));
        self.authorize(&ctx, &mut network).await?;

        if network.security_data.authorized && network.enabled {
            if let Err(err) = self.pull_network(&ctx, &network).await {
                self.log_failure(&ctx, &network, &err);
            }
            if let Err(err) = self.push_network(&ctx, &network).await {
                self.log_failure(&ctx, &network, &err);
            }
        }
        Ok(NetworkOutcome {
            network,
            logs: ctx.get_logs(),
        })
    }

    /// 读取并解密网络。
    pub async fn load_network(&self, network_id: Id) -> Result<Network, SyncError> {
        let record = self.network_record(network_id).await?;
        self.open_network(&record).await
    }

    /// 替换凭据（可选）并重新验证。
    pub async fn reauthorize_network(
        &self,
        network_id: Id,
        credentials: Option<Map<String, Value>>,
    ) -> Result<NetworkOutcome, SyncError> {
        let mut network = self.load_network(network_id).await?;
        if let Some(credentials) = credentials {
            network.security_data = SecurityData::with_credentials(credentials);
        }
        if let Err(err) = self.sessions.invalidate_network(network_id).await {
            warn!(target: "lpwan.sync", network_id, error = %err, "session_invalidate_failed");
        }
        let network_type = self.network_type(network.network_type_id).await?;
        let ctx = self.context("Authorize network");
        ctx.init_log(&network_type, Some(&network));
        self.authorize(&ctx, &mut network).await?;
        Ok(NetworkOutcome {
            network,
            logs: ctx.get_logs(),
        })
    }

    /// 删除网络及其本地附属数据（远端实体保持不变）。
    pub async fn remove_network(&self, network_id: Id) -> Result<(), SyncError> {
        let record = self.network_record(network_id).await?;

        let deployments = self
            .stores
            .deployments
            .list_where(NetworkDeploymentFilter {
                network_id: Some(network_id),
                ..NetworkDeploymentFilter::default()
            })
            .await?;
        for deployment in &deployments {
            self.stores.deployments.remove_by_id(deployment.id).await?;
        }

        let protocol_data = self
            .stores
            .protocol_data
            .list_where(ProtocolDataFilter {
                network_id: Some(network_id),
                ..ProtocolDataFilter::default()
            })
            .await?;
        for item in &protocol_data {
            self.stores.protocol_data.remove_by_id(item.id).await?;
        }

        let sessions = match self.sessions.invalidate_network(network_id).await {
            Ok(deleted) => deleted,
            Err(err) => {
                warn!(target: "lpwan.sync", network_id, error = %err, "session_invalidate_failed");
                0
            }
        };
        self.stores.networks.remove_by_id(record.id).await?;
        info!(
            target: "lpwan.sync",
            network_id,
            deployments = deployments.len(),
            protocol_data = protocol_data.len(),
            sessions,
            "network_removed"
        );
        Ok(())
    }

    /// 某网络类型下的全部已启用网络记录。
    pub async fn networks_of_type(&self, network_type_id: Id) -> Result<Vec<NetworkRecord>, SyncError> {
        let filter = NetworkFilter {
            network_type_id: Some(network_type_id),
            enabled: Some(true),
            ..NetworkFilter::default()
        };
        Ok(self.stores.networks.list_where(filter).await?)
    }

    pub(crate) async fn network_record(&self, network_id: Id) -> Result<NetworkRecord, SyncError> {
        self.stores
            .networks
            .load_by_id(network_id)
            .await?
            .ok_or(SyncError::NetworkNotFound(network_id))
    }

    pub(crate) async fn network_type(&self, network_type_id: Id) -> Result<NetworkTypeRecord, SyncError> {
        self.stores
            .network_types
            .load_by_id(network_type_id)
            .await?
            .ok_or_else(|| SyncError::missing("network type", network_type_id))
    }

    pub(crate) async fn open_network(&self, record: &NetworkRecord) -> Result<Network, SyncError> {
        let security_data = match &record.security_data {
            Some(ciphertext) => {
                let key = self.network_key(record.id, record.network_protocol_id).await?;
                security::decrypt(&key, ciphertext)?
            }
            None => SecurityData::default(),
        };
        Ok(network_view(record, security_data))
    }

    async fn network_key(&self, network_id: Id, network_protocol_id: Id) -> Result<String, SyncError> {
        self.stores
            .protocol_data
            .load(&key_filter(network_id, network_protocol_id))
            .await?
            .map(|item| item.data_value)
            .ok_or_else(|| SyncError::Security(format!("network {} has no key", network_id)))
    }

    /// 登录并验证凭据，把结果写回加密的 securityData。
    async fn authorize(&self, ctx: &NetworkDataAccess, network: &mut Network) -> Result<(), SyncError> {
        let handler = self.handler(network)?;
        let verified = match handler.connect(ctx, network).await {
            Ok(()) => handler.test(ctx, network).await,
            Err(err) => Err(err),
        };
        match verified {
            Ok(()) => {
                network.security_data.authorized = true;
                network.security_data.message = None;
                ctx.add_log(Some(&*network), "Network credentials verified");
            }
            Err(err) => {
                network.security_data.authorized = false;
                network.security_data.message = Some(translate_error(&err));
                ctx.add_log(Some(&*network), &err);
                self.sessions.invalidate(network.id, None).await;
            }
        }
        info!(
            target: "lpwan.sync",
            network_id = network.id,
            authorized = network.security_data.authorized,
            "network_authorization_checked"
        );
        self.save_security_data(network).await
    }

    async fn save_security_data(&self, network: &Network) -> Result<(), SyncError> {
        let key = self.network_key(network.id, network.network_protocol_id).await?;
        let update = NetworkUpdate {
            security_data: Some(security::encrypt(&key, &network.security_data)?),
            ..NetworkUpdate::default()
        };
        self.stores
            .networks
            .update_by_id(network.id, &update)
            .await?
            .ok_or(SyncError::NetworkNotFound(network.id))?;
        Ok(())
    }
}
