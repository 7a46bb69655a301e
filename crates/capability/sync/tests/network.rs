mod support;

use lpwan_protocol::SessionCache;
use lpwan_storage::{CacheClient, ProtocolDataFilter};
use lpwan_sync::{NewNetwork, SyncConfig, SyncError, ensure_network_type};
use serde_json::json;
use std::sync::atomic::Ordering;
use support::harness;

fn credentials() -> serde_json::Map<String, serde_json::Value> {
    json!({ "username": "admin", "password": "secret" })
        .as_object()
        .cloned()
        .expect("credentials")
}

#[tokio::test]
async fn created_network_keeps_credentials_encrypted() {
    let h = harness(SyncConfig::default()).await;
    let network = h.network("north").await;

    let record = h
        .stores
        .networks
        .load_by_id(network.id)
        .await
        .expect("load")
        .expect("record");
    let sealed = record.security_data.expect("security data");
    assert!(!sealed.contains("secret"));
    assert!(!sealed.contains("admin"));

    let loaded = h.engine.load_network(network.id).await.expect("load network");
    assert!(loaded.security_data.authorized);
    assert_eq!(loaded.security_data.credential("username").as_deref(), Some("admin"));
    assert_eq!(loaded.security_data.credential("password").as_deref(), Some("secret"));
}

#[tokio::test]
async fn failed_verification_blocks_sync_until_reauthorized() {
    let h = harness(SyncConfig::default()).await;
    h.handler.fail_test.store(true, Ordering::SeqCst);
    let outcome = h
        .engine
        .create_network(NewNetwork {
            name: "north".to_string(),
            network_type_id: h.network_type_id,
            network_protocol_id: h.network_protocol_id,
            base_url: "http://north.lora.local".to_string(),
            enabled: true,
            credentials: credentials(),
        })
        .await
        .expect("create network");
    let network = outcome.network;
    assert!(!network.security_data.authorized);
    assert_eq!(
        network.security_data.message.as_deref(),
        Some("The network is not authorized: bad password")
    );
    assert_eq!(
        outcome.logs.get(&network.id).expect("bucket").logs,
        vec!["The network is not authorized: bad password".to_string()]
    );

    h.application("water", None).await;
    let logs = h.engine.push_network_by_id(network.id).await.expect("push");
    let bucket = logs.get(&network.id).expect("bucket");
    assert_eq!(
        bucket.logs,
        vec![format!(
            "network {} is not authorized: The network is not authorized: bad password",
            network.id
        )]
    );
    assert!(h.handler.calls("create_application").is_empty());

    h.handler.fail_test.store(false, Ordering::SeqCst);
    let outcome = h
        .engine
        .reauthorize_network(network.id, None)
        .await
        .expect("reauthorize");
    assert!(outcome.network.security_data.authorized);
    assert!(outcome.network.security_data.message.is_none());

    h.engine.push_network_by_id(network.id).await.expect("push");
    assert_eq!(h.handler.calls("create_application").len(), 1);
}

#[tokio::test]
async fn protocol_must_serve_the_network_type() {
    let h = harness(SyncConfig::default()).await;
    let ip = ensure_network_type(&h.stores, "IP").await.expect("type");
    let err = h
        .engine
        .create_network(NewNetwork {
            name: "gateway".to_string(),
            network_type_id: ip.id,
            network_protocol_id: h.network_protocol_id,
            base_url: "http://gateway.local".to_string(),
            enabled: true,
            credentials: credentials(),
        })
        .await
        .expect_err("mismatched protocol");
    assert!(matches!(err, SyncError::InvalidRequest(_)));
}

#[tokio::test]
async fn remove_network_cascades_local_data() {
    let h = harness(SyncConfig::default()).await;
    let network = h.network("north").await;
    let other = h.network("south").await;
    h.application("water", None).await;
    h.push(&network).await;
    h.push(&other).await;
    h.cache
        .set(&SessionCache::key(network.id, None), "token", None)
        .await
        .expect("session");

    h.engine.remove_network(network.id).await.expect("remove");

    let err = h.engine.load_network(network.id).await.expect_err("gone");
    assert!(matches!(err, SyncError::NetworkNotFound(id) if id == network.id));
    assert!(h.deployments(network.id).await.is_empty());
    assert_eq!(h.deployments(other.id).await.len(), 1);
    let protocol_data = h
        .stores
        .protocol_data
        .list_where(ProtocolDataFilter {
            network_id: Some(network.id),
            ..ProtocolDataFilter::default()
        })
        .await
        .expect("protocol data");
    assert!(protocol_data.is_empty());
    assert!(
        h.cache
            .get(&SessionCache::key(network.id, None))
            .await
            .expect("get")
            .is_none()
    );
    assert!(h.engine.load_network(other.id).await.is_ok());
}

#[tokio::test]
async fn uplink_is_reported_to_the_owning_application() {
    let h = harness(SyncConfig::default()).await;
    let network = h.network("north").await;
    let application = h.application("water", None).await;
    let profile = h.device_profile("class-a").await;
    let device = h.device("meter-1", application.id, profile.id).await;
    h.push(&network).await;
    let app_remote = h.handler.calls("create_application")[0]
        .remote_id
        .clone()
        .expect("remote application");
    let device_remote = h.handler.calls("create_device")[0]
        .remote_id
        .clone()
        .expect("remote device");

    let payload = json!({ "devEUI": device_remote, "data": { "temperature": 21 } });
    let reported = h
        .engine
        .relay_uplink(network.id, &app_remote, &payload)
        .await
        .expect("relay");
    assert!(reported);

    let reports = h.sink.reports.lock().expect("reports").clone();
    assert_eq!(reports.len(), 1);
    let (url, app_name, data) = &reports[0];
    assert_eq!(url, "http://water.app.local/uplinks");
    assert_eq!(app_name, "water");
    assert_eq!(data["deviceId"], json!(device.id));
    assert_eq!(data["data"]["temperature"], json!(21));

    let unknown = json!({ "devEUI": "ffff", "data": {} });
    let err = h
        .engine
        .relay_uplink(network.id, &app_remote, &unknown)
        .await
        .expect_err("unknown device");
    assert!(matches!(err, SyncError::UnknownRemoteReference { .. }));
}

#[tokio::test]
async fn downlink_goes_through_every_deployed_network() {
    let h = harness(SyncConfig::default()).await;
    let north = h.network("north").await;
    let south = h.network("south").await;
    let application = h.application("water", None).await;
    let profile = h.device_profile("class-a").await;
    let device = h.device("meter-1", application.id, profile.id).await;
    h.push(&north).await;
    h.push(&south).await;

    let logs = h
        .engine
        .pass_data_to_device(device.id, &json!({ "valve": "open" }))
        .await
        .expect("downlink");
    for network in [&north, &south] {
        assert_eq!(
            logs.get(&network.id).expect("bucket").logs,
            vec!["Data sent to device meter-1".to_string()]
        );
    }
    let sent = h.handler.calls("pass_data_to_device");
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|call| call.detail == json!({ "valve": "open" })));
}
