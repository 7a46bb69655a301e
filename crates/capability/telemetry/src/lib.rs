//! 追踪、请求 ID 与同步计数。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 计数快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_errors: u64,
    pub cache_invalidations: u64,
    pub remote_creates: u64,
    pub remote_updates: u64,
    pub remote_removes: u64,
    pub pulled_entities: u64,
    pub sync_failures: u64,
    pub uplinks_relayed: u64,
}

/// 进程级计数器。
pub struct TelemetryMetrics {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_errors: AtomicU64,
    cache_invalidations: AtomicU64,
    remote_creates: AtomicU64,
    remote_updates: AtomicU64,
    remote_removes: AtomicU64,
    pulled_entities: AtomicU64,
    sync_failures: AtomicU64,
    uplinks_relayed: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            cache_errors: AtomicU64::new(0),
            cache_invalidations: AtomicU64::new(0),
            remote_creates: AtomicU64::new(0),
            remote_updates: AtomicU64::new(0),
            remote_removes: AtomicU64::new(0),
            pulled_entities: AtomicU64::new(0),
            sync_failures: AtomicU64::new(0),
            uplinks_relayed: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            cache_errors: self.cache_errors.load(Ordering::Relaxed),
            cache_invalidations: self.cache_invalidations.load(Ordering::Relaxed),
            remote_creates: self.remote_creates.load(Ordering::Relaxed),
            remote_updates: self.remote_updates.load(Ordering::Relaxed),
            remote_removes: self.remote_removes.load(Ordering::Relaxed),
            pulled_entities: self.pulled_entities.load(Ordering::Relaxed),
            sync_failures: self.sync_failures.load(Ordering::Relaxed),
            uplinks_relayed: self.uplinks_relayed.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局计数实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录缓存命中。
pub fn record_cache_hit() {
    metrics().cache_hits.fetch_add(1, Ordering::Relaxed);
}

/// 记录缓存未命中。
pub fn record_cache_miss() {
    metrics().cache_misses.fetch_add(1, Ordering::Relaxed);
}

/// 记录缓存层错误（按未命中处理）。
pub fn record_cache_error() {
    metrics().cache_errors.fetch_add(1, Ordering::Relaxed);
}

/// 记录一次按记录失效（删除的 key 数）。
pub fn record_cache_invalidation(keys: u64) {
    metrics()
        .cache_invalidations
        .fetch_add(keys, Ordering::Relaxed);
}

/// 记录远端创建。
pub fn record_remote_create() {
    metrics().remote_creates.fetch_add(1, Ordering::Relaxed);
}

/// 记录远端更新。
pub fn record_remote_update() {
    metrics().remote_updates.fetch_add(1, Ordering::Relaxed);
}

/// 记录远端删除。
pub fn record_remote_remove() {
    metrics().remote_removes.fetch_add(1, Ordering::Relaxed);
}

/// 记录拉取落地的实体数。
pub fn record_pulled_entity() {
    metrics().pulled_entities.fetch_add(1, Ordering::Relaxed);
}

/// 记录单个实体或单个网络的同步失败。
pub fn record_sync_failure() {
    metrics().sync_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录上行数据转发。
pub fn record_uplink_relayed() {
    metrics().uplinks_relayed.fetch_add(1, Ordering::Relaxed);
}
