//! 健康检查与计数快照
//!
//! - GET /health
//! - GET /metrics

use crate::utils::ok;
use api_contract::MetricsSnapshotDto;
use axum::response::Response;
use lpwan_telemetry::metrics;

pub async fn health() -> Response {
    ok(serde_json::json!({ "ok": true }))
}

pub async fn get_metrics() -> Response {
    let snapshot = metrics().snapshot();
    ok(MetricsSnapshotDto {
        cache_hits: snapshot.cache_hits,
        cache_misses: snapshot.cache_misses,
        cache_errors: snapshot.cache_errors,
        cache_invalidations: snapshot.cache_invalidations,
        remote_creates: snapshot.remote_creates,
        remote_updates: snapshot.remote_updates,
        remote_removes: snapshot.remote_removes,
        pulled_entities: snapshot.pulled_entities,
        sync_failures: snapshot.sync_failures,
        uplinks_relayed: snapshot.uplinks_relayed,
    })
}
