#![allow(dead_code)]

use async_trait::async_trait;
use domain::{Id, Network};
use lpwan_protocol::{
    ApplicationArgs, DeviceArgs, DeviceProfileArgs, NetworkDataAccess, ProtocolError,
    ProtocolHandler, ProtocolRegistry, RemoteApplication, RemoteDevice, RemoteDeviceProfile,
    ReportingSink, SessionCache, Uplink,
};
use lpwan_storage::{
    ApplicationNetworkTypeLinkRecord, ApplicationRecord, DeviceNetworkTypeLinkRecord,
    DeviceProfileRecord, DeviceRecord, InMemoryCacheClient, NetworkDeploymentFilter,
    NetworkDeploymentRecord, Stores,
};
use lpwan_sync::{NewNetwork, SyncConfig, SyncEngine, ensure_network_type, register_network_protocol};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// 一次远端调用。
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub op: &'static str,
    pub network_id: Id,
    pub remote_id: Option<String>,
    pub detail: Value,
}

/// 记录调用的协议处理器桩；远端对象按 JSON 原样提供。
#[derive(Default)]
pub struct MockHandler {
    calls: Mutex<Vec<Call>>,
    next_id: AtomicUsize,
    pub remote_applications: Mutex<Vec<Value>>,
    pub remote_device_profiles: Mutex<Vec<Value>>,
    pub remote_devices: Mutex<HashMap<String, Vec<Value>>>,
    pub fail_connect: Mutex<HashSet<Id>>,
    pub fail_test: AtomicBool,
    pub fail_create: Mutex<HashSet<String>>,
}

impl MockHandler {
    fn record(&self, op: &'static str, network: &Network, remote_id: Option<&str>, detail: Value) {
        self.calls.lock().expect("calls").push(Call {
            op,
            network_id: network.id,
            remote_id: remote_id.map(str::to_string),
            detail,
        });
    }

    fn next(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn calls(&self, op: &str) -> Vec<Call> {
        self.calls
            .lock()
            .expect("calls")
            .iter()
            .filter(|call| call.op == op)
            .cloned()
            .collect()
    }

    /// 除 connect / test 以外的远端调用数。
    pub fn remote_calls(&self) -> usize {
        self.calls
            .lock()
            .expect("calls")
            .iter()
            .filter(|call| call.op != "connect" && call.op != "test")
            .count()
    }

    fn check_create(&self, name: &str) -> Result<(), ProtocolError> {
        if self.fail_create.lock().expect("fail_create").contains(name) {
            return Err(ProtocolError::Http {
                status: 500,
                message: format!("cannot create {}", name),
            });
        }
        Ok(())
    }
}

fn text(raw: &Value, key: &str) -> Result<String, ProtocolError> {
    raw.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ProtocolError::InvalidData(format!("missing {}", key)))
}

#[async_trait]
impl ProtocolHandler for MockHandler {
    fn identifier(&self) -> &'static str {
        "mock"
    }

    async fn connect(&self, _ctx: &NetworkDataAccess, network: &Network) -> Result<(), ProtocolError> {
        self.record("connect", network, None, Value::Null);
        if self.fail_connect.lock().expect("fail_connect").contains(&network.id) {
            return Err(ProtocolError::ConnectionRefused(network.base_url.clone()));
        }
        Ok(())
    }

    async fn test(&self, _ctx: &NetworkDataAccess, network: &Network) -> Result<(), ProtocolError> {
        self.record("test", network, None, Value::Null);
        if self.fail_test.load(Ordering::SeqCst) {
            return Err(ProtocolError::Unauthorized("bad password".to_string()));
        }
        Ok(())
    }

    async fn list_all_applications(
        &self,
        _ctx: &NetworkDataAccess,
        _network: &Network,
    ) -> Result<Vec<Value>, ProtocolError> {
        Ok(self.remote_applications.lock().expect("apps").clone())
    }

    fn build_application(&self, remote: &Value) -> Result<RemoteApplication, ProtocolError> {
        Ok(RemoteApplication {
            remote_id: text(remote, "id")?,
            name: text(remote, "name")?,
            description: None,
            network_settings: remote.get("settings").cloned().unwrap_or_else(|| json!({})),
        })
    }

    async fn create_application(
        &self,
        _ctx: &NetworkDataAccess,
        network: &Network,
        args: &ApplicationArgs,
    ) -> Result<String, ProtocolError> {
        self.check_create(&args.application.name)?;
        let remote_id = self.next("app");
        self.record(
            "create_application",
            network,
            Some(&remote_id),
            json!({ "name": args.application.name, "settings": args.network_settings }),
        );
        Ok(remote_id)
    }

    async fn update_application(
        &self,
        _ctx: &NetworkDataAccess,
        network: &Network,
        args: &ApplicationArgs,
    ) -> Result<(), ProtocolError> {
        self.record(
            "update_application",
            network,
            args.remote_id.as_deref(),
            json!({ "name": args.application.name }),
        );
        Ok(())
    }

    async fn remove_application(
        &self,
        _ctx: &NetworkDataAccess,
        network: &Network,
        remote_id: &str,
    ) -> Result<(), ProtocolError> {
        self.record("remove_application", network, Some(remote_id), Value::Null);
        Ok(())
    }

    async fn start_application(
        &self,
        _ctx: &NetworkDataAccess,
        network: &Network,
        remote_id: &str,
    ) -> Result<(), ProtocolError> {
        self.record("start_application", network, Some(remote_id), Value::Null);
        Ok(())
    }

    async fn stop_application(
        &self,
        _ctx: &NetworkDataAccess,
        network: &Network,
        remote_id: &str,
    ) -> Result<(), ProtocolError> {
        self.record("stop_application", network, Some(remote_id), Value::Null);
        Ok(())
    }

    async fn list_all_device_profiles(
        &self,
        _ctx: &NetworkDataAccess,
        _network: &Network,
    ) -> Result<Vec<Value>, ProtocolError> {
        Ok(self.remote_device_profiles.lock().expect("profiles").clone())
    }

    fn build_device_profile(&self, remote: &Value) -> Result<RemoteDeviceProfile, ProtocolError> {
        Ok(RemoteDeviceProfile {
            remote_id: text(remote, "id")?,
            name: text(remote, "name")?,
            description: None,
            network_settings: remote.get("settings").cloned().unwrap_or_else(|| json!({})),
        })
    }

    async fn create_device_profile(
        &self,
        _ctx: &NetworkDataAccess,
        network: &Network,
        args: &DeviceProfileArgs,
    ) -> Result<String, ProtocolError> {
        self.check_create(&args.device_profile.name)?;
        let remote_id = self.next("dp");
        self.record(
            "create_device_profile",
            network,
            Some(&remote_id),
            json!({ "name": args.device_profile.name }),
        );
        Ok(remote_id)
    }

    async fn update_device_profile(
        &self,
        _ctx: &NetworkDataAccess,
        network: &Network,
        args: &DeviceProfileArgs,
    ) -> Result<(), ProtocolError> {
        self.record("update_device_profile", network, args.remote_id.as_deref(), Value::Null);
        Ok(())
    }

    async fn remove_device_profile(
        &self,
        _ctx: &NetworkDataAccess,
        network: &Network,
        remote_id: &str,
    ) -> Result<(), ProtocolError> {
        self.record("remove_device_profile", network, Some(remote_id), Value::Null);
        Ok(())
    }

    async fn list_all_devices(
        &self,
        _ctx: &NetworkDataAccess,
        _network: &Network,
        remote_application_id: &str,
    ) -> Result<Vec<Value>, ProtocolError> {
        Ok(self
            .remote_devices
            .lock()
            .expect("devices")
            .get(remote_application_id)
            .cloned()
            .unwrap_or_default())
    }

    fn build_device(&self, remote: &Value) -> Result<RemoteDevice, ProtocolError> {
        Ok(RemoteDevice {
            remote_id: text(remote, "id")?,
            name: text(remote, "name")?,
            description: None,
            remote_device_profile_id: text(remote, "profileId")?,
            network_settings: remote.get("settings").cloned().unwrap_or_else(|| json!({})),
        })
    }

    async fn create_device(
        &self,
        _ctx: &NetworkDataAccess,
        network: &Network,
        args: &DeviceArgs,
    ) -> Result<String, ProtocolError> {
        self.check_create(&args.device.name)?;
        let remote_id = self.next("dev");
        self.record("create_device", network, Some(&remote_id), device_detail(args));
        Ok(remote_id)
    }

    async fn update_device(
        &self,
        _ctx: &NetworkDataAccess,
        network: &Network,
        args: &DeviceArgs,
    ) -> Result<(), ProtocolError> {
        self.record("update_device", network, args.remote_id.as_deref(), device_detail(args));
        Ok(())
    }

    async fn remove_device(
        &self,
        _ctx: &NetworkDataAccess,
        network: &Network,
        remote_id: &str,
    ) -> Result<(), ProtocolError> {
        self.record("remove_device", network, Some(remote_id), Value::Null);
        Ok(())
    }

    async fn pass_data_to_device(
        &self,
        _ctx: &NetworkDataAccess,
        network: &Network,
        remote_device_id: &str,
        data: &Value,
    ) -> Result<(), ProtocolError> {
        self.record("pass_data_to_device", network, Some(remote_device_id), data.clone());
        Ok(())
    }

    async fn handle_uplink(
        &self,
        _ctx: &NetworkDataAccess,
        _network: &Network,
        _remote_application_id: &str,
        payload: &Value,
    ) -> Result<Uplink, ProtocolError> {
        Ok(Uplink {
            remote_device_id: text(payload, "devEUI")?,
            data: payload.get("data").cloned().unwrap_or(Value::Null),
        })
    }
}

fn device_detail(args: &DeviceArgs) -> Value {
    json!({
        "name": args.device.name,
        "remoteApplicationId": args.remote_application_id,
        "remoteDeviceProfileId": args.remote_device_profile_id,
        "settings": args.network_settings,
    })
}

/// 记录上报内容的上报出口。
#[derive(Default)]
pub struct RecordingSink {
    pub reports: Mutex<Vec<(String, String, Value)>>,
}

#[async_trait]
impl ReportingSink for RecordingSink {
    async fn report(&self, data: &Value, url: &str, app_name: &str) -> Result<(), ProtocolError> {
        self.reports
            .lock()
            .expect("reports")
            .push((url.to_string(), app_name.to_string(), data.clone()));
        Ok(())
    }
}

pub struct Harness {
    pub engine: SyncEngine,
    pub stores: Arc<Stores>,
    pub cache: Arc<InMemoryCacheClient>,
    pub handler: Arc<MockHandler>,
    pub sink: Arc<RecordingSink>,
    pub network_type_id: Id,
    pub network_protocol_id: Id,
}

pub async fn harness(config: SyncConfig) -> Harness {
    let cache = Arc::new(InMemoryCacheClient::new());
    let stores = Arc::new(Stores::in_memory(cache.clone(), None));
    let network_type = ensure_network_type(&stores, "LoRa").await.expect("network type");
    let protocol = register_network_protocol(&stores, "Mock", "1.0", "mock", network_type.id)
        .await
        .expect("protocol");

    let handler = Arc::new(MockHandler::default());
    let mut registry = ProtocolRegistry::new();
    registry.register(protocol.id, handler.clone());
    let sink = Arc::new(RecordingSink::default());
    let sessions = SessionCache::new(cache.clone(), 3600);
    let engine = SyncEngine::new(stores.clone(), registry, sink.clone(), sessions, config);
    Harness {
        engine,
        stores,
        cache,
        handler,
        sink,
        network_type_id: network_type.id,
        network_protocol_id: protocol.id,
    }
}

impl Harness {
    /// 创建并授权一个网络（本地无实体时不产生远端调用）。
    pub async fn network(&self, name: &str) -> Network {
        let credentials = json!({ "username": "admin", "password": "secret" })
            .as_object()
            .cloned()
            .expect("credentials");
        let outcome = self
            .engine
            .create_network(NewNetwork {
                name: name.to_string(),
                network_type_id: self.network_type_id,
                network_protocol_id: self.network_protocol_id,
                base_url: format!("http://{}.lora.local", name),
                enabled: true,
                credentials,
            })
            .await
            .expect("create network");
        assert!(outcome.network.security_data.authorized);
        outcome.network
    }

    pub async fn application(&self, name: &str, link_enabled: Option<bool>) -> ApplicationRecord {
        let application = self
            .stores
            .applications
            .create(ApplicationRecord {
                id: 0,
                name: name.to_string(),
                description: None,
                base_url: Some(format!("http://{}.app.local/uplinks", name)),
                reporting_protocol_id: None,
            })
            .await
            .expect("application");
        if let Some(enabled) = link_enabled {
            self.stores
                .application_links
                .create(ApplicationNetworkTypeLinkRecord {
                    id: 0,
                    application_id: application.id,
                    network_type_id: self.network_type_id,
                    enabled,
                    network_settings: json!({ "serviceProfileID": "sp-1" }),
                })
                .await
                .expect("application link");
        }
        application
    }

    pub async fn device_profile(&self, name: &str) -> DeviceProfileRecord {
        self.stores
            .device_profiles
            .create(DeviceProfileRecord {
                id: 0,
                network_type_id: self.network_type_id,
                name: name.to_string(),
                description: None,
                network_settings: json!({ "macVersion": "1.0.2" }),
            })
            .await
            .expect("device profile")
    }

    pub async fn device(&self, name: &str, application_id: Id, device_profile_id: Id) -> DeviceRecord {
        let device = self
            .stores
            .devices
            .create(DeviceRecord {
                id: 0,
                application_id,
                name: name.to_string(),
                description: None,
                device_model: None,
            })
            .await
            .expect("device");
        self.stores
            .device_links
            .create(DeviceNetworkTypeLinkRecord {
                id: 0,
                device_id: device.id,
                network_type_id: self.network_type_id,
                device_profile_id,
                network_settings: json!({ "devEUI": format!("00000000000000{:02}", device.id) }),
            })
            .await
            .expect("device link");
        device
    }

    pub async fn deployments(&self, network_id: Id) -> Vec<NetworkDeploymentRecord> {
        self.stores
            .deployments
            .list_where(NetworkDeploymentFilter {
                network_id: Some(network_id),
                ..NetworkDeploymentFilter::default()
            })
            .await
            .expect("deployments")
    }

    pub async fn push(&self, network: &Network) {
        let ctx = self.engine.context("Push");
        self.engine.push_network(&ctx, network).await.expect("push");
    }

    pub async fn pull(&self, network: &Network) {
        let ctx = self.engine.context("Pull");
        self.engine.pull_network(&ctx, network).await.expect("pull");
    }
}
