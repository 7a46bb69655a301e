//! 按网络类型并发分发
//!
//! 对某网络类型下的每个已启用网络并发执行同一操作，共享一个日志上下文；
//! 用剩余计数跟踪完成情况，任何一个网络失败都不会掩盖其他网络的结果。

use crate::engine::SyncEngine;
use crate::error::SyncError;
use crate::network::network_view;
use domain::{Id, Network, SecurityData};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use lpwan_protocol::{NetworkDataAccess, NetworkLog};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

/// 按网络 ID 聚合的日志（`0` 表示该类型下的全部网络）。
pub type NetworkLogs = BTreeMap<Id, NetworkLog>;

impl SyncEngine {
    /// 对网络类型下的全部已启用网络执行操作，返回汇总日志。
    pub async fn for_all_networks_of_type<F, Fut>(
        &self,
        operation: &str,
        network_type_id: Id,
        run: F,
    ) -> Result<NetworkLogs, SyncError>
    where
        F: Fn(Arc<NetworkDataAccess>, Network) -> Fut,
        Fut: Future<Output = Result<(), SyncError>>,
    {
        let network_type = self.network_type(network_type_id).await?;
        let ctx = Arc::new(self.context(operation));
        ctx.init_log(&network_type, None);

        let records = self.networks_of_type(network_type_id).await?;
        if records.is_empty() {
            return Ok(ctx.get_logs());
        }

        let mut pending = FuturesUnordered::new();
        for record in records {
            let network = match self.open_network(&record).await {
                Ok(network) => network,
                Err(err) => {
                    let network = network_view(&record, SecurityData::default());
                    ctx.init_log(&network_type, Some(&network));
                    self.log_failure(&ctx, &network, &err);
                    continue;
                }
            };
            ctx.init_log(&network_type, Some(&network));
            let task = run(ctx.clone(), network.clone());
            pending.push(async move { (network, task.await) });
        }

        let mut remaining = pending.len();
        info!(
            target: "lpwan.sync",
            operation = %operation,
            network_type_id,
            networks = remaining,
            "fanout_started"
        );
        while let Some((network, result)) = pending.next().await {
            remaining -= 1;
            if let Err(err) = result {
                self.log_failure(&ctx, &network, &err);
            }
            debug!(
                target: "lpwan.sync",
                operation = %operation,
                network_id = network.id,
                remaining,
                "fanout_network_done"
            );
        }
        Ok(ctx.get_logs())
    }

    /// 对单个网络执行操作，返回与分发相同结构的日志。
    async fn for_network<F, Fut>(
        &self,
        operation: &str,
        network_id: Id,
        run: F,
    ) -> Result<NetworkLogs, SyncError>
    where
        F: FnOnce(Arc<NetworkDataAccess>, Network) -> Fut,
        Fut: Future<Output = Result<(), SyncError>>,
    {
        let record = self.network_record(network_id).await?;
        let network_type = self.network_type(record.network_type_id).await?;
        let ctx = Arc::new(self.context(operation));
        let network = match self.open_network(&record).await {
            Ok(network) => network,
            Err(err) => {
                let network = network_view(&record, SecurityData::default());
                ctx.init_log(&network_type, Some(&network));
                self.log_failure(&ctx, &network, &err);
                return Ok(ctx.get_logs());
            }
        };
        ctx.init_log(&network_type, Some(&network));
        if !network.enabled {
            ctx.add_log(Some(&network), "Network is disabled");
            return Ok(ctx.get_logs());
        }
        if let Err(err) = run(ctx.clone(), network.clone()).await {
            self.log_failure(&ctx, &network, &err);
        }
        Ok(ctx.get_logs())
    }

    pub async fn pull_networks(&self, network_type_id: Id) -> Result<NetworkLogs, SyncError> {
        self.for_all_networks_of_type("Pull", network_type_id, |ctx, network| async move {
            self.pull_network(&ctx, &network).await.map(|_| ())
        })
        .await
    }

    pub async fn push_networks(&self, network_type_id: Id) -> Result<NetworkLogs, SyncError> {
        self.for_all_networks_of_type("Push", network_type_id, |ctx, network| async move {
            self.push_network(&ctx, &network).await.map(|_| ())
        })
        .await
    }

    pub async fn pull_network_by_id(&self, network_id: Id) -> Result<NetworkLogs, SyncError> {
        self.for_network("Pull", network_id, |ctx, network| async move {
            self.pull_network(&ctx, &network).await.map(|_| ())
        })
        .await
    }

    pub async fn push_network_by_id(&self, network_id: Id) -> Result<NetworkLogs, SyncError> {
        self.for_network("Push", network_id, |ctx, network| async move {
            self.push_network(&ctx, &network).await.map(|_| ())
        })
        .await
    }
}
