use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::routing::{get, post};
use axum::{Json, Router};
use domain::{Network, SecurityData};
use lpwan_protocol::{
    DeviceArgs, LoraServerHandler, NetworkDataAccess, ProtocolError, ProtocolHandler,
    SessionCache,
};
use lpwan_storage::{DeviceProfileRecord, DeviceRecord, InMemoryCacheClient, Stores};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// 记录请求的 LoRa Server 桩。
#[derive(Clone, Default)]
struct MockServer {
    logins: Arc<AtomicUsize>,
    token: Arc<Mutex<String>>,
    requests: Arc<Mutex<Vec<(String, Value)>>>,
}

impl MockServer {
    fn authorized(&self, headers: &HeaderMap) -> bool {
        let expected = format!("Bearer {}", self.token.lock().expect("token"));
        headers
            .get("Grpc-Metadata-Authorization")
            .and_then(|value| value.to_str().ok())
            == Some(expected.as_str())
    }

    fn requests(&self, path: &str) -> Vec<Value> {
        self.requests
            .lock()
            .expect("requests")
            .iter()
            .filter(|(item, _)| item == path)
            .map(|(_, body)| body.clone())
            .collect()
    }
}

async fn login(State(server): State<MockServer>) -> Json<Value> {
    let count = server.logins.fetch_add(1, Ordering::SeqCst) + 1;
    let token = format!("token-{}", count);
    *server.token.lock().expect("token") = token.clone();
    Json(json!({ "jwt": token }))
}

async fn organizations(
    State(server): State<MockServer>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    if !server.authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(Json(json!({ "totalCount": "1", "result": [{ "id": "7", "name": "org" }] })))
}

/// 每页只返回一条，验证分页。
async fn applications(
    State(server): State<MockServer>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Value>, StatusCode> {
    if !server.authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let offset: usize = query
        .get("offset")
        .and_then(|value| value.parse().ok())
        .unwrap_or(0);
    let all = [
        json!({ "id": "1", "name": "water", "organizationID": "7", "serviceProfileID": "sp" }),
        json!({ "id": "2", "name": "gas", "organizationID": "7", "serviceProfileID": "sp" }),
        json!({ "id": "3", "name": "power", "organizationID": "7", "serviceProfileID": "sp" }),
    ];
    let result: Vec<Value> = all.iter().skip(offset).take(1).cloned().collect();
    Ok(Json(json!({ "totalCount": "3", "result": result })))
}

async fn record(
    State(server): State<MockServer>,
    headers: HeaderMap,
    uri: Uri,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    if !server.authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    server
        .requests
        .lock()
        .expect("requests")
        .push((uri.path().to_string(), body));
    Ok(Json(json!({})))
}

async fn spawn_server(server: MockServer) -> String {
    let app = Router::new()
        .route("/api/internal/login", post(login))
        .route("/api/organizations", get(organizations))
        .route("/api/applications", get(applications))
        .route("/api/devices", post(record))
        .route("/api/devices/:dev_eui/keys", post(record))
        .route("/api/devices/:dev_eui/activate", post(record))
        .with_state(server);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{}", addr)
}

fn network(base_url: &str) -> Network {
    let credentials = json!({ "username": "admin", "password": "secret" })
        .as_object()
        .cloned()
        .expect("credentials");
    Network {
        id: 3,
        name: "campus".to_string(),
        network_type_id: 1,
        network_protocol_id: 2,
        base_url: base_url.to_string(),
        enabled: true,
        security_data: SecurityData::with_credentials(credentials),
    }
}

fn setup() -> (Arc<InMemoryCacheClient>, SessionCache, NetworkDataAccess) {
    let cache = Arc::new(InMemoryCacheClient::new());
    let sessions = SessionCache::new(cache.clone(), 3600);
    let stores = Arc::new(Stores::in_memory(cache.clone(), None));
    (cache, sessions, NetworkDataAccess::new("Test", stores))
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().expect("client")
}

#[tokio::test]
async fn lists_applications_across_pages() {
    let server = MockServer::default();
    let base_url = spawn_server(server.clone()).await;
    let (_cache, sessions, ctx) = setup();
    let handler = LoraServerHandler::v1(client(), sessions, "http://lpwan.local");
    let network = network(&base_url);

    let remote = handler
        .list_all_applications(&ctx, &network)
        .await
        .expect("list");
    assert_eq!(remote.len(), 3);
    let built = handler.build_application(&remote[2]).expect("build");
    assert_eq!(built.remote_id, "3");
    assert_eq!(built.name, "power");
    assert_eq!(built.network_settings, json!({ "serviceProfileID": "sp" }));
    assert_eq!(server.logins.load(Ordering::SeqCst), 1);
    assert_eq!(
        ctx.get_protocol_data(&network, "organizationId")
            .await
            .expect("protocol data")
            .as_deref(),
        Some("7")
    );
}

#[tokio::test]
async fn v2_device_create_sends_renamed_keys_and_nested_activation() {
    let server = MockServer::default();
    let base_url = spawn_server(server.clone()).await;
    let (_cache, sessions, ctx) = setup();
    let handler = LoraServerHandler::v2(client(), sessions, "http://lpwan.local");
    let network = network(&base_url);

    let args = DeviceArgs {
        device: DeviceRecord {
            id: 5,
            application_id: 1,
            name: "meter-5".to_string(),
            description: None,
            device_model: None,
        },
        network_settings: json!({
            "devEUI": "0102030405060708",
            "appKey": "k-app",
            "devAddr": "26011b2c",
            "nwkSKey": "k-nwk",
            "appSKey": "k-appS"
        }),
        device_profile: DeviceProfileRecord {
            id: 2,
            network_type_id: 1,
            name: "class-a".to_string(),
            description: None,
            network_settings: json!({}),
        },
        remote_application_id: "app-1".to_string(),
        remote_device_profile_id: "dp-1".to_string(),
        remote_id: None,
    };
    let remote_id = handler
        .create_device(&ctx, &network, &args)
        .await
        .expect("create");
    assert_eq!(remote_id, "0102030405060708");

    let created = server.requests("/api/devices");
    assert_eq!(created.len(), 1);
    assert_eq!(created[0]["device"]["applicationID"], "app-1");
    assert_eq!(created[0]["device"]["deviceProfileID"], "dp-1");

    let keys = server.requests("/api/devices/0102030405060708/keys");
    assert_eq!(keys[0]["deviceKeys"], json!({ "nwkKey": "k-app" }));

    let activation = server.requests("/api/devices/0102030405060708/activate");
    assert_eq!(activation[0]["deviceActivation"]["sNwkSIntKey"], "k-nwk");
}

#[tokio::test]
async fn expired_session_is_renewed_once() {
    let server = MockServer::default();
    let base_url = spawn_server(server.clone()).await;
    let (_cache, sessions, ctx) = setup();
    let network = network(&base_url);
    sessions.put(network.id, None, "stale").await;
    let handler = LoraServerHandler::v1(client(), sessions.clone(), "http://lpwan.local");

    handler.test(&ctx, &network).await.expect("test");
    assert_eq!(server.logins.load(Ordering::SeqCst), 1);
    assert_eq!(sessions.get(network.id, None).await.as_deref(), Some("token-1"));
}

#[tokio::test]
async fn connect_reuses_the_cached_session() {
    let server = MockServer::default();
    let base_url = spawn_server(server.clone()).await;
    let (_cache, sessions, ctx) = setup();
    let network = network(&base_url);
    let handler = LoraServerHandler::v1(client(), sessions.clone(), "http://lpwan.local");

    handler.connect(&ctx, &network).await.expect("first connect");
    handler.connect(&ctx, &network).await.expect("second connect");
    handler
        .list_all_applications(&ctx, &network)
        .await
        .expect("list");
    assert_eq!(server.logins.load(Ordering::SeqCst), 1);
    assert_eq!(sessions.get(network.id, None).await.as_deref(), Some("token-1"));
}

#[tokio::test]
async fn missing_credentials_are_unauthorized() {
    let (_cache, sessions, ctx) = setup();
    let handler = LoraServerHandler::v1(client(), sessions, "http://lpwan.local");
    let mut network = network("http://127.0.0.1:9");
    network.security_data = SecurityData::default();
    let err = handler.connect(&ctx, &network).await.expect_err("no credentials");
    assert!(matches!(err, ProtocolError::Unauthorized(_)));
}

#[tokio::test]
async fn unreachable_server_is_connection_refused() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let (_cache, sessions, ctx) = setup();
    let handler = LoraServerHandler::v1(client(), sessions, "http://lpwan.local");
    let network = network(&format!("http://{}", addr));
    let err = handler.connect(&ctx, &network).await.expect_err("refused");
    assert!(matches!(err, ProtocolError::ConnectionRefused(_)), "{:?}", err);
}
