//! 同步引擎
//!
//! 持有存储集合、协议注册表、上报出口与会话缓存，按网络执行拉取与推送。
//! 引擎本身无状态，单次操作的状态全部在 `NetworkDataAccess` 上下文中。

use crate::error::SyncError;
use domain::{DeploymentMeta, DeploymentStatus, DeploymentType, Id, Network};
use lpwan_protocol::{
    NetworkDataAccess, ProtocolHandler, ProtocolRegistry, ReportingSink, SessionCache,
};
use lpwan_storage::{
    NetworkDeploymentFilter, NetworkDeploymentRecord, NetworkDeploymentUpdate, Stores,
};
use lpwan_telemetry::record_sync_failure;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// 同步参数。
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncConfig {
    /// 远端更新成功后保持 `UPDATED`，每次推送重新下发
    pub reassert_updated: bool,
}

/// 单类实体的推送计数。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushSummary {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    pub started: usize,
    pub stopped: usize,
    pub failed: usize,
}

impl PushSummary {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for PushSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} removed",
            self.created, self.updated, self.removed
        )?;
        if self.started > 0 || self.stopped > 0 {
            write!(f, ", {} started, {} stopped", self.started, self.stopped)?;
        }
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct SyncEngine {
    pub(crate) stores: Arc<Stores>,
    pub(crate) registry: ProtocolRegistry,
    pub(crate) reporter: Arc<dyn ReportingSink>,
    pub(crate) sessions: SessionCache,
    pub(crate) config: SyncConfig,
}

impl SyncEngine {
    pub fn new(
        stores: Arc<Stores>,
        registry: ProtocolRegistry,
        reporter: Arc<dyn ReportingSink>,
        sessions: SessionCache,
        config: SyncConfig,
    ) -> Self {
        Self {
            stores,
            registry,
            reporter,
            sessions,
            config,
        }
    }

    pub fn stores(&self) -> &Arc<Stores> {
        &self.stores
    }

    pub fn registry(&self) -> &ProtocolRegistry {
        &self.registry
    }

    pub fn config(&self) -> SyncConfig {
        self.config
    }

    /// 新建单次操作的数据访问上下文。
    pub fn context(&self, description: &str) -> NetworkDataAccess {
        NetworkDataAccess::new(description, self.stores.clone())
    }

    pub(crate) fn handler(&self, network: &Network) -> Result<Arc<dyn ProtocolHandler>, SyncError> {
        Ok(self.registry.handler(network.network_protocol_id)?)
    }

    pub(crate) async fn deployment(
        &self,
        network_id: Id,
        deployment_type: DeploymentType,
        entity_id: Id,
    ) -> Result<Option<NetworkDeploymentRecord>, SyncError> {
        let filter = NetworkDeploymentFilter::entity(network_id, deployment_type, entity_id);
        Ok(self.stores.deployments.load(&filter).await?)
    }

    pub(crate) async fn deployment_by_remote_id(
        &self,
        network_id: Id,
        deployment_type: DeploymentType,
        remote_id: &str,
    ) -> Result<Option<NetworkDeploymentRecord>, SyncError> {
        let filter = NetworkDeploymentFilter::remote(network_id, deployment_type, remote_id);
        Ok(self.stores.deployments.load(&filter).await?)
    }

    pub(crate) async fn deployments_of(
        &self,
        network_id: Id,
        deployment_type: DeploymentType,
    ) -> Result<Vec<NetworkDeploymentRecord>, SyncError> {
        let filter = NetworkDeploymentFilter {
            network_id: Some(network_id),
            deployment_type: Some(deployment_type),
            ..NetworkDeploymentFilter::default()
        };
        Ok(self.stores.deployments.list_where(filter).await?)
    }

    pub(crate) async fn create_deployment(
        &self,
        network_id: Id,
        deployment_type: DeploymentType,
        entity_id: Id,
        meta: DeploymentMeta,
    ) -> Result<NetworkDeploymentRecord, SyncError> {
        let record = self
            .stores
            .deployments
            .create(NetworkDeploymentRecord {
                id: 0,
                network_id,
                deployment_type,
                entity_id,
                status: DeploymentStatus::Created,
                meta,
            })
            .await?;
        debug!(
            target: "lpwan.sync",
            network_id,
            deployment_id = record.id,
            deployment_type = %deployment_type,
            entity_id,
            "deployment_created"
        );
        Ok(record)
    }

    pub(crate) async fn save_deployment(
        &self,
        deployment_id: Id,
        status: DeploymentStatus,
        meta: &DeploymentMeta,
    ) -> Result<(), SyncError> {
        let update = NetworkDeploymentUpdate {
            status: Some(status),
            meta: Some(meta.clone()),
        };
        self.stores
            .deployments
            .update_by_id(deployment_id, &update)
            .await?
            .ok_or_else(|| SyncError::missing("network deployment", deployment_id))?;
        Ok(())
    }

    /// 失败记入网络日志桶，同级实体继续处理。
    pub(crate) fn log_failure(&self, ctx: &NetworkDataAccess, network: &Network, err: &SyncError) {
        record_sync_failure();
        ctx.add_log(Some(network), err);
    }

    /// 依赖实体在该网络上的远端 ID。
    pub(crate) async fn remote_id_of(
        &self,
        network: &Network,
        deployment_type: DeploymentType,
        entity_id: Id,
    ) -> Result<String, SyncError> {
        self.deployment(network.id, deployment_type, entity_id)
            .await?
            .filter(|deployment| deployment.status != DeploymentStatus::Removed)
            .and_then(|deployment| deployment.meta.remote_id)
            .ok_or(SyncError::UnresolvedRemoteId {
                entity: deployment_type,
                id: entity_id,
                network_id: network.id,
            })
    }
}

/// 网络凭据未通过验证时拒绝同步。
pub(crate) fn ensure_authorized(network: &Network) -> Result<(), SyncError> {
    if network.security_data.authorized {
        return Ok(());
    }
    Err(SyncError::Unauthorized {
        network_id: network.id,
        message: network
            .security_data
            .message
            .clone()
            .unwrap_or_else(|| "credentials have not been verified".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_lists_optional_counts_only_when_present() {
        let mut summary = PushSummary {
            created: 3,
            ..PushSummary::default()
        };
        assert_eq!(summary.to_string(), "3 created, 0 updated, 0 removed");
        summary.started = 1;
        summary.failed = 2;
        assert_eq!(
            summary.to_string(),
            "3 created, 0 updated, 0 removed, 1 started, 0 stopped, 2 failed"
        );
        assert!(!summary.is_empty());
        assert!(PushSummary::default().is_empty());
    }
}
