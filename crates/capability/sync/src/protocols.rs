//! 网络类型与网络协议登记
//!
//! 启动时先登记参考数据，再按登记得到的协议 ID 构建处理器注册表。

use crate::error::SyncError;
use domain::Id;
use lpwan_storage::{
    NetworkProtocolFilter, NetworkProtocolRecord, NetworkProtocolUpdate, NetworkTypeFilter,
    NetworkTypeRecord, Stores,
};
use tracing::info;

/// 按名称查找网络类型，不存在时创建。
pub async fn ensure_network_type(stores: &Stores, name: &str) -> Result<NetworkTypeRecord, SyncError> {
    let filter = NetworkTypeFilter {
        name: Some(name.to_string()),
        ..NetworkTypeFilter::default()
    };
    if let Some(existing) = stores.network_types.load(&filter).await? {
        return Ok(existing);
    }
    let created = stores
        .network_types
        .create(NetworkTypeRecord {
            id: 0,
            name: name.to_string(),
        })
        .await?;
    info!(target: "lpwan.sync", network_type_id = created.id, name = %name, "network_type_registered");
    Ok(created)
}

/// 登记网络协议版本（重复登记返回已有记录）。
///
/// 同名协议的第一个版本以自身为 master，后续版本指向第一个版本。
pub async fn register_network_protocol(
    stores: &Stores,
    name: &str,
    version: &str,
    protocol_handler: &str,
    network_type_id: Id,
) -> Result<NetworkProtocolRecord, SyncError> {
    let filter = NetworkProtocolFilter {
        name: Some(name.to_string()),
        version: Some(version.to_string()),
        network_type_id: Some(network_type_id),
        ..NetworkProtocolFilter::default()
    };
    if let Some(existing) = stores.network_protocols.load(&filter).await? {
        return Ok(existing);
    }

    let created = stores
        .network_protocols
        .create(NetworkProtocolRecord {
            id: 0,
            name: name.to_string(),
            version: version.to_string(),
            protocol_handler: protocol_handler.to_string(),
            network_type_id,
            master_protocol_id: None,
        })
        .await?;
    let first = stores
        .network_protocols
        .load(&NetworkProtocolFilter {
            name: Some(name.to_string()),
            ..NetworkProtocolFilter::default()
        })
        .await?;
    let master_protocol_id = first
        .map(|first| first.master_protocol_id.unwrap_or(first.id))
        .unwrap_or(created.id);
    let update = NetworkProtocolUpdate {
        master_protocol_id: Some(master_protocol_id),
    };
    let registered = stores
        .network_protocols
        .update_by_id(created.id, &update)
        .await?
        .ok_or_else(|| SyncError::missing("network protocol", created.id))?;
    info!(
        target: "lpwan.sync",
        network_protocol_id = registered.id,
        name = %name,
        version = %version,
        master_protocol_id,
        "network_protocol_registered"
    );
    Ok(registered)
}
