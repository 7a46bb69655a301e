use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use lpwan_api::{AppState, build_app, build_state};
use lpwan_config::{AppConfig, CacheBackend, StorageBackend};
use lpwan_storage::{NetworkProtocolFilter, NetworkTypeFilter};
use serde_json::{Value, json};
use tower::ServiceExt;

fn memory_config() -> AppConfig {
    AppConfig {
        http_addr: "127.0.0.1:0".to_string(),
        public_url: "http://127.0.0.1:8080".to_string(),
        storage: StorageBackend::Memory,
        database_url: None,
        cache: CacheBackend::Memory,
        redis_url: "redis://127.0.0.1:6379".to_string(),
        cache_ttl_seconds: None,
        session_ttl_seconds: 3600,
        remote_timeout_ms: 2_000,
        sync_reassert_updated: false,
    }
}

async fn app() -> (Router, AppState) {
    let state = build_state(&memory_config()).await.expect("state");
    (build_app(state.clone()), state)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    assert!(response.headers().contains_key("x-request-id"));
    assert!(response.headers().contains_key("x-trace-id"));
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let value = serde_json::from_slice(&bytes).expect("json body");
    (status, value)
}

/// LoRa 类型与 v1 协议的 ID。
async fn lora_ids(state: &AppState) -> (i64, i64) {
    let stores = state.engine.stores();
    let lora = stores
        .network_types
        .load(&NetworkTypeFilter {
            name: Some("LoRa".to_string()),
            ..NetworkTypeFilter::default()
        })
        .await
        .expect("load")
        .expect("LoRa type");
    let v1 = stores
        .network_protocols
        .load(&NetworkProtocolFilter {
            version: Some("1.0".to_string()),
            network_type_id: Some(lora.id),
            ..NetworkProtocolFilter::default()
        })
        .await
        .expect("load")
        .expect("v1 protocol");
    (lora.id, v1.id)
}

#[tokio::test]
async fn health_is_served_under_both_prefixes() {
    let (app, _) = app().await;
    for uri in ["/health", "/api/health"] {
        let (status, body) = send(&app, "GET", uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["data"]["ok"], json!(true));
    }
}

#[tokio::test]
async fn bootstrap_registers_both_lora_server_versions() {
    let (_, state) = app().await;
    let protocols = state
        .engine
        .stores()
        .network_protocols
        .list_where(NetworkProtocolFilter::default())
        .await
        .expect("protocols");
    assert_eq!(protocols.len(), 2);
    let first = protocols
        .iter()
        .find(|protocol| protocol.version == "1.0")
        .expect("v1");
    assert!(protocols.iter().all(|protocol| protocol.master_protocol_id == Some(first.id)));
    assert_eq!(state.engine.registry().len(), 2);
}

#[tokio::test]
async fn unreachable_network_is_created_unauthorized_and_blocks_sync() {
    let (app, state) = app().await;
    let (lora_id, protocol_id) = lora_ids(&state).await;

    let (status, body) = send(
        &app,
        "POST",
        "/networks",
        Some(json!({
            "name": "north",
            "networkTypeId": lora_id,
            "networkProtocolId": protocol_id,
            "baseUrl": "http://127.0.0.1:1",
            "securityData": { "username": "admin", "password": "secret" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let network = &body["data"]["network"];
    assert_eq!(network["authorized"], json!(false));
    assert!(network["message"].is_string());
    assert!(network.get("securityData").is_none());
    let network_id = network["id"].as_i64().expect("id");
    let bucket = &body["data"]["logs"][network_id.to_string()];
    assert_eq!(bucket["networkName"], json!("north"));
    assert_eq!(bucket["networkTypeName"], json!("LoRa"));

    let (status, body) = send(&app, "GET", &format!("/networks/{}", network_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], json!("north"));
    assert_eq!(body["data"]["authorized"], json!(false));

    let (status, body) = send(&app, "POST", &format!("/networks/{}/push", network_id), None).await;
    assert_eq!(status, StatusCode::OK);
    let line = body["data"][network_id.to_string()]["logs"][0]
        .as_str()
        .expect("log line");
    assert!(line.starts_with(&format!("network {} is not authorized", network_id)));

    let (status, body) = send(&app, "POST", &format!("/network-types/{}/pull", lora_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"][network_id.to_string()].is_object());
}

#[tokio::test]
async fn deleted_network_is_gone() {
    let (app, state) = app().await;
    let (lora_id, protocol_id) = lora_ids(&state).await;
    let (_, body) = send(
        &app,
        "POST",
        "/networks",
        Some(json!({
            "name": "north",
            "networkTypeId": lora_id,
            "networkProtocolId": protocol_id,
            "baseUrl": "http://127.0.0.1:1",
            "enabled": false
        })),
    )
    .await;
    let network_id = body["data"]["network"]["id"].as_i64().expect("id");

    let (status, body) = send(&app, "DELETE", &format!("/networks/{}", network_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));

    let (status, body) = send(&app, "GET", &format!("/networks/{}", network_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], json!("RESOURCE.NOT_FOUND"));
    assert_eq!(
        body["error"]["message"],
        json!(format!("network {} not found", network_id))
    );
}

#[tokio::test]
async fn caller_errors_map_to_client_statuses() {
    let (app, state) = app().await;
    let (_, protocol_id) = lora_ids(&state).await;
    let ip = state
        .engine
        .stores()
        .network_types
        .load(&NetworkTypeFilter {
            name: Some("IP".to_string()),
            ..NetworkTypeFilter::default()
        })
        .await
        .expect("load")
        .expect("IP type");

    let (status, body) = send(
        &app,
        "POST",
        "/api/networks",
        Some(json!({
            "name": "gateway",
            "networkTypeId": ip.id,
            "networkProtocolId": protocol_id,
            "baseUrl": "http://127.0.0.1:1"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("INVALID.REQUEST"));

    let (status, body) = send(&app, "POST", "/network-types/99/push", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], json!("network type 99 not found"));

    let (status, _) = send(&app, "POST", "/uplinks/42/app-1", Some(json!({ "devEUI": "01" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "POST", "/devices/42/downlink", Some(json!({ "data": {} }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn metrics_snapshot_is_camel_case() {
    let (app, _) = app().await;
    let (status, body) = send(&app, "GET", "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["cacheHits"].is_u64());
    assert!(body["data"]["uplinksRelayed"].is_u64());
}
