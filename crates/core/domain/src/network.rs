//! 已解密的网络视图。

use crate::Id;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 网络安全数据（解密后）：凭据 + 授权状态 + 面向运维的说明。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityData {
    #[serde(default)]
    pub authorized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub credentials: Map<String, Value>,
}

impl SecurityData {
    pub fn with_credentials(credentials: Map<String, Value>) -> Self {
        Self {
            authorized: false,
            message: None,
            credentials,
        }
    }

    /// 读取字符串凭据（数字会被转成字符串）。
    pub fn credential(&self, key: &str) -> Option<String> {
        match self.credentials.get(key)? {
            Value::String(value) => Some(value.clone()),
            Value::Number(value) => Some(value.to_string()),
            _ => None,
        }
    }
}

/// 网络（一个远端网络服务器实例）。
#[derive(Debug, Clone)]
pub struct Network {
    pub id: Id,
    pub name: String,
    pub network_type_id: Id,
    pub network_protocol_id: Id,
    pub base_url: String,
    pub enabled: bool,
    pub security_data: SecurityData,
}

impl Network {
    /// 拼接远端 URL（去掉多余的斜杠）。
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
