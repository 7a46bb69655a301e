mod support;

use lpwan_storage::NetworkUpdate;
use lpwan_sync::SyncConfig;
use support::harness;

#[tokio::test]
async fn failing_network_does_not_hide_the_others() {
    let h = harness(SyncConfig::default()).await;
    let first = h.network("north").await;
    let second = h.network("south").await;
    let third = h.network("east").await;
    h.application("water", None).await;
    h.handler
        .fail_connect
        .lock()
        .expect("fail_connect")
        .insert(second.id);

    let logs = h.engine.push_networks(h.network_type_id).await.expect("push");

    assert_eq!(logs.len(), 3);
    for network in [&first, &third] {
        let bucket = logs.get(&network.id).expect("bucket");
        assert_eq!(bucket.network_name, network.name);
        assert_eq!(bucket.network_type_name, "LoRa");
        assert!(bucket.logs.iter().any(|line| line.starts_with("Applications: 1 created")));
    }
    let failed = logs.get(&second.id).expect("failed bucket");
    assert_eq!(
        failed.logs,
        vec![format!(
            "Connection refused: the network server at {} is not reachable",
            second.base_url
        )]
    );
    let created = h.handler.calls("create_application");
    assert_eq!(created.len(), 2);
    assert!(created.iter().all(|call| call.network_id != second.id));
}

#[tokio::test]
async fn no_networks_yields_empty_logs() {
    let h = harness(SyncConfig::default()).await;
    let logs = h.engine.pull_networks(h.network_type_id).await.expect("pull");
    assert!(logs.is_empty());
    assert_eq!(h.handler.remote_calls(), 0);
}

#[tokio::test]
async fn disabled_networks_are_skipped() {
    let h = harness(SyncConfig::default()).await;
    let active = h.network("north").await;
    let paused = h.network("south").await;
    h.stores
        .networks
        .update_by_id(
            paused.id,
            &NetworkUpdate {
                enabled: Some(false),
                ..NetworkUpdate::default()
            },
        )
        .await
        .expect("disable");
    h.application("water", None).await;

    let logs = h.engine.push_networks(h.network_type_id).await.expect("push");
    assert!(logs.contains_key(&active.id));
    assert!(!logs.contains_key(&paused.id));

    let single = h.engine.push_network_by_id(paused.id).await.expect("push one");
    assert_eq!(
        single.get(&paused.id).expect("bucket").logs,
        vec!["Network is disabled".to_string()]
    );
}

#[tokio::test]
async fn unknown_network_type_is_rejected() {
    let h = harness(SyncConfig::default()).await;
    let err = h.engine.push_networks(99).await.expect_err("missing type");
    assert_eq!(err.to_string(), "network type 99 not found");
}
