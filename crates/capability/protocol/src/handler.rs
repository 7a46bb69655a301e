//! 协议处理器契约
//!
//! 每种远端网络实现一个 `ProtocolHandler`，同步引擎只通过本契约与远端交互，
//! 从不判断协议身份。所有方法显式接收数据访问上下文和目标网络。
//!
//! 约定：
//! - `list_all_*` 返回远端原始对象，`build_*` 把原始对象翻译成本地可理解的结构
//! - `create_*` 返回远端分配的 ID
//! - 远端不可恢复的失败必须以错误返回，不得吞掉

use crate::data_access::NetworkDataAccess;
use crate::error::ProtocolError;
use async_trait::async_trait;
use domain::Network;
use lpwan_storage::{ApplicationRecord, DeviceProfileRecord, DeviceRecord};
use serde_json::Value;

/// 推送应用所需参数。
#[derive(Debug, Clone)]
pub struct ApplicationArgs {
    pub application: ApplicationRecord,
    /// 应用与网络类型关联上的网络参数
    pub network_settings: Value,
    pub remote_id: Option<String>,
}

/// 推送 device profile 所需参数。
#[derive(Debug, Clone)]
pub struct DeviceProfileArgs {
    pub device_profile: DeviceProfileRecord,
    pub remote_id: Option<String>,
}

/// 推送设备所需参数（依赖的应用与 profile 已解析为远端 ID）。
#[derive(Debug, Clone)]
pub struct DeviceArgs {
    pub device: DeviceRecord,
    /// 设备与网络类型关联上的网络参数（devEUI、密钥等）
    pub network_settings: Value,
    pub device_profile: DeviceProfileRecord,
    pub remote_application_id: String,
    pub remote_device_profile_id: String,
    pub remote_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteApplication {
    pub remote_id: String,
    pub name: String,
    pub description: Option<String>,
    pub network_settings: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteDeviceProfile {
    pub remote_id: String,
    pub name: String,
    pub description: Option<String>,
    pub network_settings: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteDevice {
    pub remote_id: String,
    pub name: String,
    pub description: Option<String>,
    pub remote_device_profile_id: String,
    pub network_settings: Value,
}

/// 解码后的上行数据。
#[derive(Debug, Clone, PartialEq)]
pub struct Uplink {
    pub remote_device_id: String,
    pub data: Value,
}

#[async_trait]
pub trait ProtocolHandler: Send + Sync {
    /// 处理器标识（如 `lora-server-v1`）
    fn identifier(&self) -> &'static str;

    /// 使用网络凭据登录远端
    async fn connect(&self, ctx: &NetworkDataAccess, network: &Network) -> Result<(), ProtocolError>;

    /// 验证凭据可用于读取远端数据
    async fn test(&self, ctx: &NetworkDataAccess, network: &Network) -> Result<(), ProtocolError>;

    async fn list_all_applications(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
    ) -> Result<Vec<Value>, ProtocolError>;

    fn build_application(&self, remote: &Value) -> Result<RemoteApplication, ProtocolError>;

    async fn create_application(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
        args: &ApplicationArgs,
    ) -> Result<String, ProtocolError>;

    async fn update_application(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
        args: &ApplicationArgs,
    ) -> Result<(), ProtocolError>;

    async fn remove_application(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
        remote_id: &str,
    ) -> Result<(), ProtocolError>;

    /// 接通远端到本系统的上行数据转发
    async fn start_application(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
        remote_id: &str,
    ) -> Result<(), ProtocolError>;

    async fn stop_application(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
        remote_id: &str,
    ) -> Result<(), ProtocolError>;

    async fn list_all_device_profiles(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
    ) -> Result<Vec<Value>, ProtocolError>;

    fn build_device_profile(&self, remote: &Value) -> Result<RemoteDeviceProfile, ProtocolError>;

    async fn create_device_profile(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
        args: &DeviceProfileArgs,
    ) -> Result<String, ProtocolError>;

    async fn update_device_profile(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
        args: &DeviceProfileArgs,
    ) -> Result<(), ProtocolError>;

    async fn remove_device_profile(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
        remote_id: &str,
    ) -> Result<(), ProtocolError>;

    async fn list_all_devices(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
        remote_application_id: &str,
    ) -> Result<Vec<Value>, ProtocolError>;

    fn build_device(&self, remote: &Value) -> Result<RemoteDevice, ProtocolError>;

    async fn create_device(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
        args: &DeviceArgs,
    ) -> Result<String, ProtocolError>;

    async fn update_device(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
        args: &DeviceArgs,
    ) -> Result<(), ProtocolError>;

    async fn remove_device(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
        remote_id: &str,
    ) -> Result<(), ProtocolError>;

    /// 下发数据到设备
    async fn pass_data_to_device(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
        remote_device_id: &str,
        data: &Value,
    ) -> Result<(), ProtocolError>;

    /// 解码远端推送来的上行数据
    async fn handle_uplink(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
        remote_application_id: &str,
        payload: &Value,
    ) -> Result<Uplink, ProtocolError>;
}
