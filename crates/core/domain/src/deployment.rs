//! 网络部署（本地实体 ↔ 远端网络）的状态与元数据。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 部署状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentStatus {
    /// 本地已存在，尚未确认推送（或已推送且无待同步修改）。
    Created,
    /// 本地有修改待推送。
    Updated,
    /// 待从远端删除。
    Removed,
}

/// 部署对应的本地实体类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentType {
    Application,
    DeviceProfile,
    Device,
}

impl DeploymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentType::Application => "application",
            DeploymentType::DeviceProfile => "device profile",
            DeploymentType::Device => "device",
        }
    }
}

impl std::fmt::Display for DeploymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 部署元数据（由协议处理器持有，其余字段原样保留）。
///
/// - `remote_id`：实体在远端网络上的 ID，首次创建成功后写入且不再改变
/// - `is_origin`：实体是从该网络拉取而来，推送时不得在该网络上创建或删除
/// - `enabled`：应用在该网络上的数据接收是否已接通
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    #[serde(default)]
    pub is_origin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// remote_id 已分配为其他值。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("remote id already assigned: {existing} (attempted {attempted})")]
pub struct RemoteIdConflict {
    pub existing: String,
    pub attempted: String,
}

impl DeploymentMeta {
    /// 拉取产生的部署元数据。
    pub fn origin(remote_id: impl Into<String>) -> Self {
        Self {
            remote_id: Some(remote_id.into()),
            is_origin: true,
            ..Self::default()
        }
    }

    /// 写入 remote_id；已有相同值时为空操作，已有不同值时拒绝。
    pub fn assign_remote_id(&mut self, remote_id: impl Into<String>) -> Result<(), RemoteIdConflict> {
        let remote_id = remote_id.into();
        match self.remote_id.as_deref() {
            None => {
                self.remote_id = Some(remote_id);
                Ok(())
            }
            Some(existing) if existing == remote_id => Ok(()),
            Some(existing) => Err(RemoteIdConflict {
                existing: existing.to_string(),
                attempted: remote_id,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_serializes_camel_case_and_keeps_extra() {
        let raw = serde_json::json!({
            "remoteId": "abc",
            "isOrigin": true,
            "enabled": false,
            "serviceProfileId": "sp-1"
        });
        let meta: DeploymentMeta = serde_json::from_value(raw.clone()).expect("meta");
        assert_eq!(meta.remote_id.as_deref(), Some("abc"));
        assert!(meta.is_origin);
        assert_eq!(meta.enabled, Some(false));
        assert_eq!(serde_json::to_value(&meta).expect("json"), raw);
    }

    #[test]
    fn remote_id_is_assigned_once() {
        let mut meta = DeploymentMeta::default();
        meta.assign_remote_id("r-1").expect("first assignment");
        meta.assign_remote_id("r-1").expect("same id");
        let err = meta.assign_remote_id("r-2").expect_err("conflict");
        assert_eq!(err.existing, "r-1");
        assert_eq!(meta.remote_id.as_deref(), Some("r-1"));
    }

    #[test]
    fn status_uses_upper_snake_case() {
        let value = serde_json::to_value(DeploymentType::DeviceProfile).expect("json");
        assert_eq!(value, "DEVICE_PROFILE");
        let value = serde_json::to_value(DeploymentStatus::Removed).expect("json");
        assert_eq!(value, "REMOVED");
    }
}
