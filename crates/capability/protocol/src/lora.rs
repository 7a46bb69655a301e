//! LoRa Server 参考处理器
//!
//! 通过 LoRa Server 的 JSON/REST 网关访问远端：
//! - `/api/internal/login` 取得 jwt，按网络缓存在会话缓存中，收到 401 时重新登录一次
//! - 应用、device profile、设备的增删改查
//! - `start/stop_application` 配置应用的 HTTP 集成，把上行数据转发到本系统
//! - `pass_data_to_device` 写入设备下行队列
//!
//! 版本差异只体现在设备密钥与激活参数的翻译上，由 `DeviceTranslator` 策略对象承担。

use crate::data_access::NetworkDataAccess;
use crate::error::ProtocolError;
use crate::handler::{
    ApplicationArgs, DeviceArgs, DeviceProfileArgs, ProtocolHandler, RemoteApplication,
    RemoteDevice, RemoteDeviceProfile, Uplink,
};
use crate::session::SessionCache;
use async_trait::async_trait;
use domain::Network;
use reqwest::{Method, StatusCode};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, info};

const PAGE_SIZE: usize = 100;

/// 设备密钥 / 激活参数的版本翻译。
///
/// 本地网络参数使用统一字段：`devEUI`、`appKey`（OTAA），
/// `devAddr`、`nwkSKey`、`appSKey`（ABP）以及 `skipFCntCheck`。
pub trait DeviceTranslator: Send + Sync {
    fn identifier(&self) -> &'static str;

    /// 本地参数 → 远端 keys 请求体；无 OTAA 密钥时为空
    fn keys_body(&self, dev_eui: &str, settings: &Value) -> Option<Value>;

    /// 本地参数 → 远端 activate 请求体；无 ABP 会话密钥时为空
    fn activation_body(&self, dev_eui: &str, settings: &Value) -> Option<Value>;

    /// 远端 deviceKeys → 本地参数字段
    fn settings_from_keys(&self, keys: &Value) -> Map<String, Value>;
}

fn setting<'a>(settings: &'a Value, key: &str) -> Option<&'a str> {
    settings.get(key).and_then(Value::as_str)
}

fn setting_u64(settings: &Value, key: &str) -> u64 {
    settings.get(key).and_then(Value::as_u64).unwrap_or(0)
}

/// LoRa Server v1：扁平的 `appKey`，扁平的 ABP 激活参数。
pub struct LoraServerV1;

impl DeviceTranslator for LoraServerV1 {
    fn identifier(&self) -> &'static str {
        "lora-server-v1"
    }

    fn keys_body(&self, dev_eui: &str, settings: &Value) -> Option<Value> {
        let app_key = setting(settings, "appKey")?;
        Some(json!({
            "devEUI": dev_eui,
            "deviceKeys": { "appKey": app_key }
        }))
    }

    fn activation_body(&self, dev_eui: &str, settings: &Value) -> Option<Value> {
        let dev_addr = setting(settings, "devAddr")?;
        let nwk_s_key = setting(settings, "nwkSKey")?;
        let app_s_key = setting(settings, "appSKey")?;
        Some(json!({
            "devEUI": dev_eui,
            "devAddr": dev_addr,
            "nwkSKey": nwk_s_key,
            "appSKey": app_s_key,
            "fCntUp": setting_u64(settings, "fCntUp"),
            "fCntDown": setting_u64(settings, "fCntDown"),
            "skipFCntCheck": settings.get("skipFCntCheck").and_then(Value::as_bool).unwrap_or(false)
        }))
    }

    fn settings_from_keys(&self, keys: &Value) -> Map<String, Value> {
        let mut settings = Map::new();
        if let Some(app_key) = keys.get("appKey").and_then(Value::as_str) {
            settings.insert("appKey".to_string(), Value::String(app_key.to_string()));
        }
        settings
    }
}

/// LoRa Server v2：`appKey` 改名为 `nwkKey`，激活参数嵌套在 `deviceActivation` 下并拆分网络会话密钥。
pub struct LoraServerV2;

impl DeviceTranslator for LoraServerV2 {
    fn identifier(&self) -> &'static str {
        "lora-server-v2"
    }

    fn keys_body(&self, dev_eui: &str, settings: &Value) -> Option<Value> {
        let app_key = setting(settings, "appKey")?;
        Some(json!({
            "devEUI": dev_eui,
            "deviceKeys": { "nwkKey": app_key }
        }))
    }

    fn activation_body(&self, dev_eui: &str, settings: &Value) -> Option<Value> {
        let dev_addr = setting(settings, "devAddr")?;
        let nwk_s_key = setting(settings, "nwkSKey")?;
        let app_s_key = setting(settings, "appSKey")?;
        Some(json!({
            "deviceActivation": {
                "devEUI": dev_eui,
                "devAddr": dev_addr,
                "appSKey": app_s_key,
                "nwkSEncKey": nwk_s_key,
                "sNwkSIntKey": nwk_s_key,
                "fNwkSIntKey": nwk_s_key,
                "fCntUp": setting_u64(settings, "fCntUp"),
                "nFCntDown": setting_u64(settings, "fCntDown"),
                "aFCntDown": setting_u64(settings, "fCntDown")
            }
        }))
    }

    fn settings_from_keys(&self, keys: &Value) -> Map<String, Value> {
        let mut settings = Map::new();
        if let Some(nwk_key) = keys.get("nwkKey").and_then(Value::as_str) {
            settings.insert("appKey".to_string(), Value::String(nwk_key.to_string()));
        }
        settings
    }
}

/// 远端 ID（字符串或数字）转字符串。
fn id_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn required_id(value: &Value, key: &str, entity: &str) -> Result<String, ProtocolError> {
    id_string(value.get(key))
        .ok_or_else(|| ProtocolError::InvalidData(format!("{} without {}", entity, key)))
}

fn required_remote_id<'a>(remote_id: &'a Option<String>, entity: &str) -> Result<&'a str, ProtocolError> {
    remote_id
        .as_deref()
        .ok_or_else(|| ProtocolError::InvalidData(format!("{} has no remote id", entity)))
}

/// 去掉远端对象中的标识字段，剩余部分作为网络参数。
fn remaining_settings(remote: &Value, skip: &[&str]) -> Value {
    let mut settings = Map::new();
    if let Value::Object(map) = remote {
        for (key, value) in map {
            if !skip.contains(&key.as_str()) {
                settings.insert(key.clone(), value.clone());
            }
        }
    }
    Value::Object(settings)
}

/// 把网络参数合并进请求对象（不覆盖已有字段）。
fn merge_settings(target: &mut Value, settings: &Value) {
    if let (Value::Object(target), Value::Object(settings)) = (target, settings) {
        for (key, value) in settings {
            target.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
}

fn total_count(page: &Value) -> Option<usize> {
    match page.get("totalCount")? {
        Value::String(text) => text.parse().ok(),
        Value::Number(number) => number.as_u64().map(|value| value as usize),
        _ => None,
    }
}

pub struct LoraServerHandler {
    client: reqwest::Client,
    sessions: SessionCache,
    translator: Arc<dyn DeviceTranslator>,
    uplink_base_url: String,
}

impl LoraServerHandler {
    pub fn new(
        client: reqwest::Client,
        sessions: SessionCache,
        translator: Arc<dyn DeviceTranslator>,
        uplink_base_url: impl Into<String>,
    ) -> Self {
        let uplink_base_url: String = uplink_base_url.into();
        Self {
            client,
            sessions,
            translator,
            uplink_base_url: uplink_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn v1(client: reqwest::Client, sessions: SessionCache, uplink_base_url: impl Into<String>) -> Self {
        Self::new(client, sessions, Arc::new(LoraServerV1), uplink_base_url)
    }

    pub fn v2(client: reqwest::Client, sessions: SessionCache, uplink_base_url: impl Into<String>) -> Self {
        Self::new(client, sessions, Arc::new(LoraServerV2), uplink_base_url)
    }

    /// 远端投递上行数据的地址。
    pub fn uplink_url(&self, network: &Network, remote_application_id: &str) -> String {
        format!(
            "{}/uplinks/{}/{}",
            self.uplink_base_url, network.id, remote_application_id
        )
    }

    async fn login(&self, network: &Network) -> Result<String, ProtocolError> {
        let security = &network.security_data;
        let (Some(username), Some(password)) =
            (security.credential("username"), security.credential("password"))
        else {
            return Err(ProtocolError::Unauthorized(
                "username and password are required".to_string(),
            ));
        };
        let response = self
            .client
            .post(network.url("/api/internal/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;
        if matches!(response.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(ProtocolError::Unauthorized("login rejected by the network server".to_string()));
        }
        let body = read_json(response).await?;
        let token = body
            .get("jwt")
            .and_then(Value::as_str)
            .ok_or_else(|| ProtocolError::InvalidData("login response without jwt".to_string()))?;
        info!(target: "lpwan.protocol", network_id = network.id, "network_login");
        Ok(token.to_string())
    }

    async fn token(&self, network: &Network, refresh: bool) -> Result<String, ProtocolError> {
        if !refresh {
            if let Some(token) = self.sessions.get(network.id, None).await {
                return Ok(token);
            }
        }
        let token = self.login(network).await?;
        self.sessions.put(network.id, None, &token).await;
        Ok(token)
    }

    async fn send(
        &self,
        network: &Network,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: &str,
    ) -> Result<reqwest::Response, ProtocolError> {
        let mut request = self
            .client
            .request(method, network.url(path))
            .header("Grpc-Metadata-Authorization", format!("Bearer {}", token));
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    /// 带会话的请求；会话过期时重新登录并重试一次。
    async fn call(
        &self,
        network: &Network,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ProtocolError> {
        let token = self.token(network, false).await?;
        let response = self.send(network, method.clone(), path, body, &token).await?;
        let response = if response.status() == StatusCode::UNAUTHORIZED {
            debug!(target: "lpwan.protocol", network_id = network.id, path = %path, "session_expired");
            self.sessions.invalidate(network.id, None).await;
            let token = self.token(network, true).await?;
            self.send(network, method, path, body, &token).await?
        } else {
            response
        };
        read_json(response).await
    }

    /// 分页读取 `result` 列表直到取满 `totalCount`。
    async fn list_paginated(&self, network: &Network, path: &str) -> Result<Vec<Value>, ProtocolError> {
        let separator = if path.contains('?') { '&' } else { '?' };
        let mut items = Vec::new();
        loop {
            let page_path = format!("{}{}limit={}&offset={}", path, separator, PAGE_SIZE, items.len());
            let page = self.call(network, Method::GET, &page_path, None).await?;
            let result = match page.get("result") {
                Some(Value::Array(result)) => result.clone(),
                _ => Vec::new(),
            };
            let fetched = result.len();
            items.extend(result);
            let total = total_count(&page).unwrap_or(items.len());
            if fetched == 0 || items.len() >= total {
                break;
            }
        }
        Ok(items)
    }

    /// 首个可用的远端 ID，结果保存为协议私有数据。
    async fn discover_id(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
        identifier: &str,
        path: &str,
    ) -> Result<String, ProtocolError> {
        if let Some(value) = network.security_data.credential(identifier) {
            return Ok(value);
        }
        if let Some(value) = ctx.get_protocol_data(network, identifier).await? {
            return Ok(value);
        }
        let page = self.call(network, Method::GET, path, None).await?;
        let value = page
            .get("result")
            .and_then(Value::as_array)
            .and_then(|result| result.first())
            .and_then(|first| id_string(first.get("id")))
            .ok_or_else(|| ProtocolError::NotFound(format!("{} on the network server", identifier)))?;
        ctx.put_protocol_data(network, identifier, &value).await?;
        Ok(value)
    }

    async fn organization_id(&self, ctx: &NetworkDataAccess, network: &Network) -> Result<String, ProtocolError> {
        self.discover_id(ctx, network, "organizationId", "/api/organizations?limit=1")
            .await
    }

    async fn service_profile_id(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
    ) -> Result<String, ProtocolError> {
        let organization_id = self.organization_id(ctx, network).await?;
        let path = format!("/api/service-profiles?organizationID={}&limit=1", organization_id);
        self.discover_id(ctx, network, "serviceProfileId", &path).await
    }

    async fn network_server_id(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
    ) -> Result<String, ProtocolError> {
        let organization_id = self.organization_id(ctx, network).await?;
        let path = format!("/api/network-servers?organizationID={}&limit=1", organization_id);
        self.discover_id(ctx, network, "networkServerId", &path).await
    }

    async fn application_body(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
        args: &ApplicationArgs,
    ) -> Result<Value, ProtocolError> {
        let application = &args.application;
        let mut body = json!({
            "name": application.name,
            "description": application.description.clone().unwrap_or_else(|| application.name.clone()),
            "organizationID": self.organization_id(ctx, network).await?,
            "serviceProfileID": self.service_profile_id(ctx, network).await?,
        });
        if let Some(remote_id) = &args.remote_id {
            body["id"] = Value::String(remote_id.clone());
        }
        merge_settings(&mut body, &args.network_settings);
        Ok(json!({ "application": body }))
    }

    async fn device_profile_body(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
        args: &DeviceProfileArgs,
    ) -> Result<Value, ProtocolError> {
        let profile = &args.device_profile;
        let mut body = json!({
            "name": profile.name,
            "organizationID": self.organization_id(ctx, network).await?,
            "networkServerID": self.network_server_id(ctx, network).await?,
        });
        if let Some(remote_id) = &args.remote_id {
            body["id"] = Value::String(remote_id.clone());
        }
        merge_settings(&mut body, &profile.network_settings);
        Ok(json!({ "deviceProfile": body }))
    }

    fn device_body(&self, dev_eui: &str, args: &DeviceArgs) -> Value {
        let device = &args.device;
        json!({
            "device": {
                "devEUI": dev_eui,
                "name": device.name,
                "description": device.description.clone().unwrap_or_else(|| device.name.clone()),
                "applicationID": args.remote_application_id,
                "deviceProfileID": args.remote_device_profile_id,
                "skipFCntCheck": args.network_settings.get("skipFCntCheck").and_then(Value::as_bool).unwrap_or(false)
            }
        })
    }

    /// 写入设备密钥与激活参数。
    async fn provision_device(
        &self,
        network: &Network,
        dev_eui: &str,
        settings: &Value,
        replace_keys: bool,
    ) -> Result<(), ProtocolError> {
        if let Some(keys) = self.translator.keys_body(dev_eui, settings) {
            let path = format!("/api/devices/{}/keys", dev_eui);
            let method = if replace_keys { Method::PUT } else { Method::POST };
            self.call(network, method, &path, Some(&keys)).await?;
        }
        if let Some(activation) = self.translator.activation_body(dev_eui, settings) {
            let path = format!("/api/devices/{}/activate", dev_eui);
            self.call(network, Method::POST, &path, Some(&activation)).await?;
        }
        Ok(())
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value, ProtocolError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(ProtocolError::Http {
            status: status.as_u16(),
            message: text,
        });
    }
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
}

#[async_trait]
impl ProtocolHandler for LoraServerHandler {
    fn identifier(&self) -> &'static str {
        self.translator.identifier()
    }

    /// 复用缓存的会话，没有会话时登录。
    async fn connect(&self, _ctx: &NetworkDataAccess, network: &Network) -> Result<(), ProtocolError> {
        self.token(network, false).await?;
        Ok(())
    }

    async fn test(&self, ctx: &NetworkDataAccess, network: &Network) -> Result<(), ProtocolError> {
        let organization_id = self.organization_id(ctx, network).await?;
        let path = format!("/api/applications?organizationID={}&limit=1", organization_id);
        self.call(network, Method::GET, &path, None).await?;
        Ok(())
    }

    async fn list_all_applications(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
    ) -> Result<Vec<Value>, ProtocolError> {
        let organization_id = self.organization_id(ctx, network).await?;
        let path = format!("/api/applications?organizationID={}", organization_id);
        self.list_paginated(network, &path).await
    }

    fn build_application(&self, remote: &Value) -> Result<RemoteApplication, ProtocolError> {
        Ok(RemoteApplication {
            remote_id: required_id(remote, "id", "application")?,
            name: required_id(remote, "name", "application")?,
            description: remote.get("description").and_then(Value::as_str).map(str::to_string),
            network_settings: remaining_settings(
                remote,
                &["id", "name", "description", "organizationID", "serviceProfileName"],
            ),
        })
    }

    async fn create_application(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
        args: &ApplicationArgs,
    ) -> Result<String, ProtocolError> {
        let body = self.application_body(ctx, network, args).await?;
        let created = self.call(network, Method::POST, "/api/applications", Some(&body)).await?;
        required_id(&created, "id", "created application")
    }

    async fn update_application(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
        args: &ApplicationArgs,
    ) -> Result<(), ProtocolError> {
        let remote_id = required_remote_id(&args.remote_id, "application")?;
        let body = self.application_body(ctx, network, args).await?;
        let path = format!("/api/applications/{}", remote_id);
        self.call(network, Method::PUT, &path, Some(&body)).await?;
        Ok(())
    }

    async fn remove_application(
        &self,
        _ctx: &NetworkDataAccess,
        network: &Network,
        remote_id: &str,
    ) -> Result<(), ProtocolError> {
        let path = format!("/api/applications/{}", remote_id);
        self.call(network, Method::DELETE, &path, None).await?;
        Ok(())
    }

    async fn start_application(
        &self,
        _ctx: &NetworkDataAccess,
        network: &Network,
        remote_id: &str,
    ) -> Result<(), ProtocolError> {
        let path = format!("/api/applications/{}/integrations/http", remote_id);
        let body = json!({
            "integration": {
                "id": remote_id,
                "uplinkDataURL": self.uplink_url(network, remote_id),
                "headers": []
            }
        });
        match self.call(network, Method::POST, &path, Some(&body)).await {
            Ok(_) => Ok(()),
            Err(ProtocolError::Http { status: 409, .. }) => {
                self.call(network, Method::PUT, &path, Some(&body)).await?;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn stop_application(
        &self,
        _ctx: &NetworkDataAccess,
        network: &Network,
        remote_id: &str,
    ) -> Result<(), ProtocolError> {
        let path = format!("/api/applications/{}/integrations/http", remote_id);
        match self.call(network, Method::DELETE, &path, None).await {
            Ok(_) | Err(ProtocolError::Http { status: 404, .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn list_all_device_profiles(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
    ) -> Result<Vec<Value>, ProtocolError> {
        let organization_id = self.organization_id(ctx, network).await?;
        let path = format!("/api/device-profiles?organizationID={}", organization_id);
        self.list_paginated(network, &path).await
    }

    fn build_device_profile(&self, remote: &Value) -> Result<RemoteDeviceProfile, ProtocolError> {
        Ok(RemoteDeviceProfile {
            remote_id: required_id(remote, "id", "device profile")?,
            name: required_id(remote, "name", "device profile")?,
            description: remote.get("description").and_then(Value::as_str).map(str::to_string),
            network_settings: remaining_settings(
                remote,
                &[
                    "id",
                    "name",
                    "description",
                    "organizationID",
                    "networkServerID",
                    "createdAt",
                    "updatedAt",
                ],
            ),
        })
    }

    async fn create_device_profile(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
        args: &DeviceProfileArgs,
    ) -> Result<String, ProtocolError> {
        let body = self.device_profile_body(ctx, network, args).await?;
        let created = self
            .call(network, Method::POST, "/api/device-profiles", Some(&body))
            .await?;
        required_id(&created, "id", "created device profile")
    }

    async fn update_device_profile(
        &self,
        ctx: &NetworkDataAccess,
        network: &Network,
        args: &DeviceProfileArgs,
    ) -> Result<(), ProtocolError> {
        let remote_id = required_remote_id(&args.remote_id, "device profile")?;
        let body = self.device_profile_body(ctx, network, args).await?;
        let path = format!("/api/device-profiles/{}", remote_id);
        self.call(network, Method::PUT, &path, Some(&body)).await?;
        Ok(())
    }

    async fn remove_device_profile(
        &self,
        _ctx: &NetworkDataAccess,
        network: &Network,
        remote_id: &str,
    ) -> Result<(), ProtocolError> {
        let path = format!("/api/device-profiles/{}", remote_id);
        self.call(network, Method::DELETE, &path, None).await?;
        Ok(())
    }

    async fn list_all_devices(
        &self,
        _ctx: &NetworkDataAccess,
        network: &Network,
        remote_application_id: &str,
    ) -> Result<Vec<Value>, ProtocolError> {
        let path = format!("/api/devices?applicationID={}", remote_application_id);
        let mut devices = self.list_paginated(network, &path).await?;
        for device in devices.iter_mut() {
            let Some(dev_eui) = id_string(device.get("devEUI")) else {
                continue;
            };
            let keys_path = format!("/api/devices/{}/keys", dev_eui);
            match self.call(network, Method::GET, &keys_path, None).await {
                Ok(response) => {
                    if let (Value::Object(map), Some(keys)) = (&mut *device, response.get("deviceKeys")) {
                        map.insert("deviceKeys".to_string(), keys.clone());
                    }
                }
                Err(ProtocolError::Http { status: 404, .. }) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(devices)
    }

    fn build_device(&self, remote: &Value) -> Result<RemoteDevice, ProtocolError> {
        let dev_eui = required_id(remote, "devEUI", "device")?;
        let mut settings = Map::new();
        settings.insert("devEUI".to_string(), Value::String(dev_eui.clone()));
        if let Some(skip) = remote.get("skipFCntCheck") {
            settings.insert("skipFCntCheck".to_string(), skip.clone());
        }
        if let Some(keys) = remote.get("deviceKeys") {
            settings.extend(self.translator.settings_from_keys(keys));
        }
        Ok(RemoteDevice {
            remote_id: dev_eui,
            name: required_id(remote, "name", "device")?,
            description: remote.get("description").and_then(Value::as_str).map(str::to_string),
            remote_device_profile_id: required_id(remote, "deviceProfileID", "device")?,
            network_settings: Value::Object(settings),
        })
    }

    async fn create_device(
        &self,
        _ctx: &NetworkDataAccess,
        network: &Network,
        args: &DeviceArgs,
    ) -> Result<String, ProtocolError> {
        let dev_eui = setting(&args.network_settings, "devEUI")
            .ok_or_else(|| ProtocolError::InvalidData("device settings without devEUI".to_string()))?
            .to_string();
        let body = self.device_body(&dev_eui, args);
        self.call(network, Method::POST, "/api/devices", Some(&body)).await?;
        self.provision_device(network, &dev_eui, &args.network_settings, false)
            .await?;
        Ok(dev_eui)
    }

    async fn update_device(
        &self,
        _ctx: &NetworkDataAccess,
        network: &Network,
        args: &DeviceArgs,
    ) -> Result<(), ProtocolError> {
        let remote_id = required_remote_id(&args.remote_id, "device")?;
        let body = self.device_body(remote_id, args);
        let path = format!("/api/devices/{}", remote_id);
        self.call(network, Method::PUT, &path, Some(&body)).await?;
        self.provision_device(network, remote_id, &args.network_settings, true)
            .await
    }

    async fn remove_device(
        &self,
        _ctx: &NetworkDataAccess,
        network: &Network,
        remote_id: &str,
    ) -> Result<(), ProtocolError> {
        let path = format!("/api/devices/{}", remote_id);
        self.call(network, Method::DELETE, &path, None).await?;
        Ok(())
    }

    async fn pass_data_to_device(
        &self,
        _ctx: &NetworkDataAccess,
        network: &Network,
        remote_device_id: &str,
        data: &Value,
    ) -> Result<(), ProtocolError> {
        let payload = data
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| ProtocolError::InvalidData("downlink without base64 data".to_string()))?;
        let body = json!({
            "deviceQueueItem": {
                "devEUI": remote_device_id,
                "confirmed": data.get("confirmed").and_then(Value::as_bool).unwrap_or(false),
                "data": payload,
                "fPort": data.get("fPort").and_then(Value::as_u64).unwrap_or(1)
            }
        });
        let path = format!("/api/devices/{}/queue", remote_device_id);
        self.call(network, Method::POST, &path, Some(&body)).await?;
        Ok(())
    }

    async fn handle_uplink(
        &self,
        _ctx: &NetworkDataAccess,
        _network: &Network,
        remote_application_id: &str,
        payload: &Value,
    ) -> Result<Uplink, ProtocolError> {
        if let Some(application_id) = id_string(payload.get("applicationID")) {
            if application_id != remote_application_id {
                return Err(ProtocolError::InvalidData(format!(
                    "uplink for application {} delivered to {}",
                    application_id, remote_application_id
                )));
            }
        }
        let remote_device_id = required_id(payload, "devEUI", "uplink")?;
        let mut data = payload.clone();
        if let Value::Object(map) = &mut data {
            map.remove("rxInfo");
            map.remove("txInfo");
        }
        Ok(Uplink {
            remote_device_id,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_keeps_flat_keys_and_activation() {
        let settings = json!({
            "devEUI": "0102030405060708",
            "appKey": "k-app",
            "devAddr": "26011b2c",
            "nwkSKey": "k-nwk",
            "appSKey": "k-appS"
        });
        let keys = LoraServerV1.keys_body("0102030405060708", &settings).expect("keys");
        assert_eq!(keys["deviceKeys"]["appKey"], "k-app");
        let activation = LoraServerV1
            .activation_body("0102030405060708", &settings)
            .expect("activation");
        assert_eq!(activation["nwkSKey"], "k-nwk");
        assert!(activation.get("deviceActivation").is_none());
    }

    #[test]
    fn v2_renames_app_key_and_nests_activation() {
        let settings = json!({
            "appKey": "k-app",
            "devAddr": "26011b2c",
            "nwkSKey": "k-nwk",
            "appSKey": "k-appS"
        });
        let keys = LoraServerV2.keys_body("eui", &settings).expect("keys");
        assert_eq!(keys["deviceKeys"]["nwkKey"], "k-app");
        assert!(keys["deviceKeys"].get("appKey").is_none());
        let activation = LoraServerV2.activation_body("eui", &settings).expect("activation");
        assert_eq!(activation["deviceActivation"]["fNwkSIntKey"], "k-nwk");
        assert_eq!(activation["deviceActivation"]["appSKey"], "k-appS");

        let back = LoraServerV2.settings_from_keys(&json!({ "nwkKey": "k-app" }));
        assert_eq!(back.get("appKey"), Some(&json!("k-app")));
    }

    #[test]
    fn otaa_only_settings_skip_activation() {
        let settings = json!({ "appKey": "k-app" });
        assert!(LoraServerV1.activation_body("eui", &settings).is_none());
        assert!(LoraServerV2.activation_body("eui", &settings).is_none());
    }

    #[test]
    fn total_count_accepts_strings() {
        assert_eq!(total_count(&json!({ "totalCount": "3" })), Some(3));
        assert_eq!(total_count(&json!({ "totalCount": 4 })), Some(4));
        assert_eq!(total_count(&json!({})), None);
    }
}
