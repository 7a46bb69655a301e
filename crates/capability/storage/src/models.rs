//! 存储数据模型
//!
//! 定义各实体的记录结构、过滤结构与更新结构：
//! - NetworkTypeRecord / NetworkProtocolRecord：网络类型与协议（参考数据）
//! - NetworkRecord：网络（securityData 以密文保存）
//! - ApplicationRecord / DeviceProfileRecord / DeviceRecord：本地实体
//! - ApplicationNetworkTypeLinkRecord / DeviceNetworkTypeLinkRecord：实体与网络类型的关联及网络参数
//! - NetworkDeploymentRecord：实体在某个网络上的部署状态
//! - ProtocolDataRecord：协议私有键值数据
//!
//! 序列化字段统一使用 camelCase，过滤结构中未设置的字段不参与匹配。

use crate::traits::{Record, RecordFilter};
use domain::{DeploymentMeta, DeploymentStatus, DeploymentType, Id};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 网络类型记录（"LoRa"、"IP"）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkTypeRecord {
    #[serde(default)]
    pub id: Id,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkTypeFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkTypeUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// 网络协议记录
///
/// 同名协议的第一个版本以自身为 master，后续版本指向它。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkProtocolRecord {
    #[serde(default)]
    pub id: Id,
    pub name: String,
    pub version: String,
    pub protocol_handler: String,
    pub network_type_id: Id,
    #[serde(default)]
    pub master_protocol_id: Option<Id>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkProtocolFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_handler: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_type_id: Option<Id>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkProtocolUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_protocol_id: Option<Id>,
}

/// 网络记录（securityData 为密文）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRecord {
    #[serde(default)]
    pub id: Id,
    pub name: String,
    pub network_type_id: Id,
    pub network_protocol_id: Id,
    pub base_url: String,
    pub enabled: bool,
    #[serde(default)]
    pub security_data: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_type_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_protocol_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_data: Option<String>,
}

/// 应用记录
///
/// `base_url` 为上行数据的上报地址。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRecord {
    #[serde(default)]
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub reporting_protocol_id: Option<Id>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// 应用与网络类型的关联
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationNetworkTypeLinkRecord {
    #[serde(default)]
    pub id: Id,
    pub application_id: Id,
    pub network_type_id: Id,
    pub enabled: bool,
    #[serde(default)]
    pub network_settings: Value,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationNetworkTypeLinkFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_type_id: Option<Id>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationNetworkTypeLinkUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_settings: Option<Value>,
}

/// 设备配置（device profile），隶属于单个网络类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProfileRecord {
    #[serde(default)]
    pub id: Id,
    pub network_type_id: Id,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub network_settings: Value,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProfileFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_type_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_settings: Option<Value>,
}

/// 设备记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    #[serde(default)]
    pub id: Id,
    pub application_id: Id,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub device_model: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_model: Option<String>,
}

/// 设备与网络类型的关联（决定设备在该类型网络上使用哪个 device profile）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceNetworkTypeLinkRecord {
    #[serde(default)]
    pub id: Id,
    pub device_id: Id,
    pub network_type_id: Id,
    pub device_profile_id: Id,
    #[serde(default)]
    pub network_settings: Value,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceNetworkTypeLinkFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_type_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_profile_id: Option<Id>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceNetworkTypeLinkUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_profile_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_settings: Option<Value>,
}

/// 网络部署记录：键为（network, type, entity）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDeploymentRecord {
    #[serde(default)]
    pub id: Id,
    pub network_id: Id,
    #[serde(rename = "type")]
    pub deployment_type: DeploymentType,
    pub entity_id: Id,
    pub status: DeploymentStatus,
    #[serde(default)]
    pub meta: DeploymentMeta,
}

/// 部署过滤条件。`meta` 按 JSON 包含关系匹配（例如 `{"remoteId": "..."}`）。
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDeploymentFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_id: Option<Id>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub deployment_type: Option<DeploymentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DeploymentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl NetworkDeploymentFilter {
    /// 某网络上某实体的部署。
    pub fn entity(network_id: Id, deployment_type: DeploymentType, entity_id: Id) -> Self {
        Self {
            network_id: Some(network_id),
            deployment_type: Some(deployment_type),
            entity_id: Some(entity_id),
            ..Self::default()
        }
    }

    /// 某网络上按远端 ID 查找部署。
    pub fn remote(network_id: Id, deployment_type: DeploymentType, remote_id: &str) -> Self {
        Self {
            network_id: Some(network_id),
            deployment_type: Some(deployment_type),
            meta: Some(serde_json::json!({ "remoteId": remote_id })),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDeploymentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DeploymentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<DeploymentMeta>,
}

/// 协议私有数据：（network, protocol, identifier）→ value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolDataRecord {
    #[serde(default)]
    pub id: Id,
    pub network_id: Id,
    pub network_protocol_id: Id,
    pub data_identifier: String,
    pub data_value: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolDataFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_protocol_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_identifier: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolDataUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_value: Option<String>,
}

macro_rules! impl_record {
    ($record:ty, $filter:ty, $update:ty, $entity:literal, $table:literal) => {
        impl RecordFilter for $filter {
            fn by_id(id: Id) -> Self {
                Self {
                    id: Some(id),
                    ..Self::default()
                }
            }

            fn id(&self) -> Option<Id> {
                self.id
            }
        }

        impl Record for $record {
            const ENTITY: &'static str = $entity;
            const TABLE: &'static str = $table;
            type Filter = $filter;
            type Update = $update;

            fn id(&self) -> Id {
                self.id
            }

            fn set_id(&mut self, id: Id) {
                self.id = id;
            }
        }
    };
}

impl_record!(NetworkTypeRecord, NetworkTypeFilter, NetworkTypeUpdate, "networkType", "network_types");
impl_record!(
    NetworkProtocolRecord,
    NetworkProtocolFilter,
    NetworkProtocolUpdate,
    "networkProtocol",
    "network_protocols"
);
impl_record!(NetworkRecord, NetworkFilter, NetworkUpdate, "network", "networks");
impl_record!(ApplicationRecord, ApplicationFilter, ApplicationUpdate, "application", "applications");
impl_record!(
    ApplicationNetworkTypeLinkRecord,
    ApplicationNetworkTypeLinkFilter,
    ApplicationNetworkTypeLinkUpdate,
    "applicationNetworkTypeLink",
    "application_network_type_links"
);
impl_record!(
    DeviceProfileRecord,
    DeviceProfileFilter,
    DeviceProfileUpdate,
    "deviceProfile",
    "device_profiles"
);
impl_record!(DeviceRecord, DeviceFilter, DeviceUpdate, "device", "devices");
impl_record!(
    DeviceNetworkTypeLinkRecord,
    DeviceNetworkTypeLinkFilter,
    DeviceNetworkTypeLinkUpdate,
    "deviceNetworkTypeLink",
    "device_network_type_links"
);
impl_record!(
    NetworkDeploymentRecord,
    NetworkDeploymentFilter,
    NetworkDeploymentUpdate,
    "networkDeployment",
    "network_deployments"
);
impl_record!(
    ProtocolDataRecord,
    ProtocolDataFilter,
    ProtocolDataUpdate,
    "protocolData",
    "protocol_data"
);
