//! 网络协议数据访问上下文
//!
//! 每次操作（一次拉取、一次推送、一次按类型分发）创建一个上下文：
//! - 按网络 ID 聚合日志（`0` 表示该类型下的全部网络）
//! - 本地实体的只读访问按 (类型, ID) 记忆，生命周期与上下文一致
//! - 协议私有数据（ProtocolData）的读写
//!
//! 上下文只在单次操作内共享，不跨操作复用。

use crate::error::ProtocolError;
use crate::translate::{translate_error, translate_value};
use domain::{ALL_NETWORKS, Id, Network};
use lpwan_storage::{
    ApplicationNetworkTypeLinkFilter, ApplicationNetworkTypeLinkRecord, ApplicationRecord,
    DeviceNetworkTypeLinkFilter, DeviceNetworkTypeLinkRecord, DeviceProfileRecord, DeviceRecord,
    NetworkTypeRecord, ProtocolDataFilter, ProtocolDataRecord, ProtocolDataUpdate, StorageError,
    Stores,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

/// 单个网络的日志桶。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkLog {
    pub network_name: String,
    pub network_type_name: String,
    pub logs: Vec<String>,
}

/// 待写入日志的消息。
#[derive(Debug, Clone)]
pub enum LogEntry {
    Text(String),
    /// 已翻译的错误文字
    Error(String),
    Json(Value),
}

impl From<String> for LogEntry {
    fn from(value: String) -> Self {
        LogEntry::Text(value)
    }
}

impl From<&str> for LogEntry {
    fn from(value: &str) -> Self {
        LogEntry::Text(value.to_string())
    }
}

impl From<Value> for LogEntry {
    fn from(value: Value) -> Self {
        LogEntry::Json(value)
    }
}

impl From<&ProtocolError> for LogEntry {
    fn from(err: &ProtocolError) -> Self {
        LogEntry::Error(translate_error(err))
    }
}

impl From<ProtocolError> for LogEntry {
    fn from(err: ProtocolError) -> Self {
        LogEntry::from(&err)
    }
}

type Memo<K, V> = Mutex<HashMap<K, Option<V>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn memoized<K, V, F, Fut>(memo: &Memo<K, V>, key: K, load: F) -> Result<Option<V>, ProtocolError>
where
    K: Eq + Hash,
    V: Clone,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<V>, StorageError>>,
{
    let hit = lock(memo).get(&key).cloned();
    if let Some(hit) = hit {
        return Ok(hit);
    }
    let value = load().await?;
    lock(memo).insert(key, value.clone());
    Ok(value)
}

pub struct NetworkDataAccess {
    description: String,
    stores: Arc<Stores>,
    logs: Mutex<BTreeMap<Id, NetworkLog>>,
    network_types: Memo<Id, NetworkTypeRecord>,
    applications: Memo<Id, ApplicationRecord>,
    device_profiles: Memo<Id, DeviceProfileRecord>,
    devices: Memo<Id, DeviceRecord>,
    application_links: Memo<(Id, Id), ApplicationNetworkTypeLinkRecord>,
    device_links: Memo<(Id, Id), DeviceNetworkTypeLinkRecord>,
}

impl NetworkDataAccess {
    pub fn new(description: impl Into<String>, stores: Arc<Stores>) -> Self {
        Self {
            description: description.into(),
            stores,
            logs: Mutex::new(BTreeMap::new()),
            network_types: Mutex::new(HashMap::new()),
            applications: Mutex::new(HashMap::new()),
            device_profiles: Mutex::new(HashMap::new()),
            devices: Mutex::new(HashMap::new()),
            application_links: Mutex::new(HashMap::new()),
            device_links: Mutex::new(HashMap::new()),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn stores(&self) -> &Arc<Stores> {
        &self.stores
    }

    /// 打开日志桶（已存在时保留已有消息）。
    pub fn init_log(&self, network_type: &NetworkTypeRecord, network: Option<&Network>) {
        let key = network.map(|item| item.id).unwrap_or(ALL_NETWORKS);
        let network_name = match network {
            Some(network) => network.name.clone(),
            None => format!("All {} networks", network_type.name),
        };
        lock(&self.logs).entry(key).or_insert_with(|| NetworkLog {
            network_name,
            network_type_name: network_type.name.clone(),
            logs: Vec::new(),
        });
    }

    /// 追加日志；非文本消息先翻译。
    pub fn add_log(&self, network: Option<&Network>, entry: impl Into<LogEntry>) {
        let key = network.map(|item| item.id).unwrap_or(ALL_NETWORKS);
        let entry = entry.into();
        let (message, is_error) = match entry {
            LogEntry::Text(text) => (text, false),
            LogEntry::Error(text) => (text, true),
            LogEntry::Json(value) => (translate_value(&value), false),
        };
        if is_error {
            warn!(target: "lpwan.protocol", operation = %self.description, network_id = key, message = %message, "network_log");
        } else {
            info!(target: "lpwan.protocol", operation = %self.description, network_id = key, message = %message, "network_log");
        }
        let mut logs = lock(&self.logs);
        let bucket = logs.entry(key).or_insert_with(|| NetworkLog {
            network_name: network.map(|item| item.name.clone()).unwrap_or_default(),
            network_type_name: String::new(),
            logs: Vec::new(),
        });
        bucket.logs.push(message);
    }

    /// 只返回至少有一条消息的日志桶。
    pub fn get_logs(&self) -> BTreeMap<Id, NetworkLog> {
        lock(&self.logs)
            .iter()
            .filter(|(_, bucket)| !bucket.logs.is_empty())
            .map(|(key, bucket)| (*key, bucket.clone()))
            .collect()
    }

    pub async fn get_network_type_by_id(&self, id: Id) -> Result<Option<NetworkTypeRecord>, ProtocolError> {
        memoized(&self.network_types, id, || self.stores.network_types.load_by_id(id)).await
    }

    pub async fn get_application_by_id(&self, id: Id) -> Result<Option<ApplicationRecord>, ProtocolError> {
        memoized(&self.applications, id, || self.stores.applications.load_by_id(id)).await
    }

    pub async fn get_device_profile_by_id(&self, id: Id) -> Result<Option<DeviceProfileRecord>, ProtocolError> {
        memoized(&self.device_profiles, id, || self.stores.device_profiles.load_by_id(id)).await
    }

    pub async fn get_device_by_id(&self, id: Id) -> Result<Option<DeviceRecord>, ProtocolError> {
        memoized(&self.devices, id, || self.stores.devices.load_by_id(id)).await
    }

    pub async fn get_application_link(
        &self,
        application_id: Id,
        network_type_id: Id,
    ) -> Result<Option<ApplicationNetworkTypeLinkRecord>, ProtocolError> {
        let filter = ApplicationNetworkTypeLinkFilter {
            application_id: Some(application_id),
            network_type_id: Some(network_type_id),
            ..ApplicationNetworkTypeLinkFilter::default()
        };
        memoized(&self.application_links, (application_id, network_type_id), || {
            self.stores.application_links.load(&filter)
        })
        .await
    }

    pub async fn get_device_link(
        &self,
        device_id: Id,
        network_type_id: Id,
    ) -> Result<Option<DeviceNetworkTypeLinkRecord>, ProtocolError> {
        let filter = DeviceNetworkTypeLinkFilter {
            device_id: Some(device_id),
            network_type_id: Some(network_type_id),
            ..DeviceNetworkTypeLinkFilter::default()
        };
        memoized(&self.device_links, (device_id, network_type_id), || {
            self.stores.device_links.load(&filter)
        })
        .await
    }

    /// 设备在某网络类型上使用的 device profile。
    pub async fn get_device_profile_by_device_id_network_type_id(
        &self,
        device_id: Id,
        network_type_id: Id,
    ) -> Result<Option<DeviceProfileRecord>, ProtocolError> {
        let Some(link) = self.get_device_link(device_id, network_type_id).await? else {
            return Ok(None);
        };
        self.get_device_profile_by_id(link.device_profile_id).await
    }

    fn protocol_data_filter(network: &Network, identifier: &str) -> ProtocolDataFilter {
        ProtocolDataFilter {
            network_id: Some(network.id),
            network_protocol_id: Some(network.network_protocol_id),
            data_identifier: Some(identifier.to_string()),
            ..ProtocolDataFilter::default()
        }
    }

    pub async fn get_protocol_data(
        &self,
        network: &Network,
        identifier: &str,
    ) -> Result<Option<String>, ProtocolError> {
        let record = self
            .stores
            .protocol_data
            .load(&Self::protocol_data_filter(network, identifier))
            .await?;
        Ok(record.map(|item| item.data_value))
    }

    /// 写入协议私有数据（存在则覆盖）。
    pub async fn put_protocol_data(
        &self,
        network: &Network,
        identifier: &str,
        value: &str,
    ) -> Result<(), ProtocolError> {
        let filter = Self::protocol_data_filter(network, identifier);
        let update = ProtocolDataUpdate {
            data_value: Some(value.to_string()),
        };
        if self.stores.protocol_data.update(&filter, &update).await?.is_some() {
            return Ok(());
        }
        self.stores
            .protocol_data
            .create(ProtocolDataRecord {
                id: 0,
                network_id: network.id,
                network_protocol_id: network.network_protocol_id,
                data_identifier: identifier.to_string(),
                data_value: value.to_string(),
            })
            .await?;
        Ok(())
    }

    pub async fn delete_protocol_data(&self, network: &Network, identifier: &str) -> Result<bool, ProtocolError> {
        let removed = self
            .stores
            .protocol_data
            .remove(&Self::protocol_data_filter(network, identifier))
            .await?;
        Ok(removed)
    }
}
