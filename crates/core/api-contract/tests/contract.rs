use api_contract::{
    AuthorizeNetworkRequest, CreateNetworkRequest, NetworkDto, NetworkLogDto, NetworkLogsDto,
    NetworkOutcomeDto,
};
use serde_json::json;

#[test]
fn create_network_request_accepts_camel_case() {
    let payload = r#"{
        "name": "north",
        "networkTypeId": 1,
        "networkProtocolId": 2,
        "baseUrl": "http://lora.local:8080",
        "securityData": { "username": "admin", "password": "secret" }
    }"#;
    let req: CreateNetworkRequest = serde_json::from_str(payload).expect("parse");
    assert_eq!(req.network_type_id, 1);
    assert_eq!(req.network_protocol_id, 2);
    assert_eq!(req.base_url, "http://lora.local:8080");
    assert_eq!(req.enabled, None);
    assert_eq!(req.security_data.get("username"), Some(&json!("admin")));
}

#[test]
fn create_network_request_accepts_credentials_alias() {
    let payload = r#"{
        "name": "north",
        "networkTypeId": 1,
        "networkProtocolId": 1,
        "baseUrl": "http://lora.local",
        "enabled": false,
        "credentials": { "apiKey": "k-1" }
    }"#;
    let req: CreateNetworkRequest = serde_json::from_str(payload).expect("parse");
    assert_eq!(req.enabled, Some(false));
    assert_eq!(req.security_data.get("apiKey"), Some(&json!("k-1")));
}

#[test]
fn authorize_request_body_is_optional() {
    let req: AuthorizeNetworkRequest = serde_json::from_str("{}").expect("parse");
    assert!(req.security_data.is_none());
}

#[test]
fn network_outcome_is_camel_case_and_keyed_by_network_id() {
    let mut logs = NetworkLogsDto::new();
    logs.insert(
        7,
        NetworkLogDto {
            network_name: "north".to_string(),
            network_type_name: "LoRa".to_string(),
            logs: vec!["Network credentials verified".to_string()],
        },
    );
    let outcome = NetworkOutcomeDto {
        network: NetworkDto {
            id: 7,
            name: "north".to_string(),
            network_type_id: 1,
            network_protocol_id: 2,
            base_url: "http://lora.local".to_string(),
            enabled: true,
            authorized: true,
            message: None,
        },
        logs,
    };
    let value = serde_json::to_value(outcome).expect("serialize");
    assert_eq!(value["network"]["networkTypeId"], json!(1));
    assert_eq!(value["network"]["baseUrl"], json!("http://lora.local"));
    assert!(value["network"].get("securityData").is_none());
    assert_eq!(value["logs"]["7"]["networkName"], json!("north"));
    assert_eq!(value["logs"]["7"]["networkTypeName"], json!("LoRa"));
    assert_eq!(value["logs"]["7"]["logs"][0], json!("Network credentials verified"));
}
