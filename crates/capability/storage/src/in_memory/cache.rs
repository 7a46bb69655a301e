//! 缓存内存实现
//!
//! 仅用于本地演示和测试。支持过期时间、集合以及快照式游标扫描：
//! 游标 0 时对匹配结果做快照，后续游标依次返回快照中的剩余部分，
//! 扫描过程中删除键不会导致遗漏。未取完的快照闲置超过 [`SCAN_IDLE`] 后丢弃，
//! 同时保留的快照不超过 [`MAX_OPEN_SCANS`] 个，超出时先丢弃最早的游标。

use crate::cache::CacheClient;
use crate::error::StorageError;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

/// 未取完的快照最长闲置时间。
pub const SCAN_IDLE: Duration = Duration::from_secs(60);
/// 同时保留的快照上限。
pub const MAX_OPEN_SCANS: usize = 64;

struct OpenScan {
    remaining: VecDeque<String>,
    touched_at: Instant,
}

enum CacheEntry {
    Value {
        data: String,
        expires_at: Option<Instant>,
    },
    Set(BTreeSet<String>),
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        match self {
            CacheEntry::Value {
                expires_at: Some(expires_at),
                ..
            } => *expires_at <= now,
            _ => false,
        }
    }
}

/// 缓存内存实现
pub struct InMemoryCacheClient {
    entries: RwLock<BTreeMap<String, CacheEntry>>,
    scans: Mutex<HashMap<u64, OpenScan>>,
    next_cursor: AtomicU64,
}

impl InMemoryCacheClient {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            scans: Mutex::new(HashMap::new()),
            next_cursor: AtomicU64::new(1),
        }
    }

    /// 当前未过期的键数量。
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .map(|map| map.values().filter(|entry| !entry.is_expired(now)).count())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 返回快照中的下一批数据；快照取完时返回游标 0。
    fn page(&self, cursor: u64, snapshot: Option<Vec<String>>, count: usize) -> Result<(u64, Vec<String>), StorageError> {
        let mut scans = self
            .scans
            .lock()
            .map_err(|_| StorageError::new("lock failed"))?;
        let now = Instant::now();
        scans.retain(|_, scan| now.duration_since(scan.touched_at) < SCAN_IDLE);
        let mut remaining = match snapshot {
            Some(items) => VecDeque::from(items),
            None => match scans.remove(&cursor) {
                Some(scan) => scan.remaining,
                None => return Ok((0, Vec::new())),
            },
        };
        let take = count.max(1).min(remaining.len());
        let batch: Vec<String> = remaining.drain(..take).collect();
        if remaining.is_empty() {
            return Ok((0, batch));
        }
        while scans.len() >= MAX_OPEN_SCANS {
            let Some(oldest) = scans.keys().min().copied() else {
                break;
            };
            scans.remove(&oldest);
        }
        let next = self.next_cursor.fetch_add(1, Ordering::SeqCst);
        scans.insert(
            next,
            OpenScan {
                remaining,
                touched_at: now,
            },
        );
        Ok((next, batch))
    }

    #[cfg(test)]
    fn open_scans(&self) -> usize {
        self.scans.lock().map(|scans| scans.len()).unwrap_or_default()
    }
}

impl Default for InMemoryCacheClient {
    fn default() -> Self {
        Self::new()
    }
}

/// 仅支持 `*` 通配。
fn glob_match(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }
    let mut rest = key;
    for (index, part) in parts.iter().enumerate() {
        if index == 0 {
            match rest.strip_prefix(part) {
                Some(tail) => rest = tail,
                None => return false,
            }
        } else if index == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(position) => rest = &rest[position + part.len()..],
                None => return false,
            }
        }
    }
    true
}

#[async_trait::async_trait]
impl CacheClient for InMemoryCacheClient {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let map = self
            .entries
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        match map.get(key) {
            Some(entry) if entry.is_expired(Instant::now()) => Ok(None),
            Some(CacheEntry::Value { data, .. }) => Ok(Some(data.clone())),
            Some(CacheEntry::Set(_)) => Err(StorageError::new(
                "WRONGTYPE Operation against a key holding the wrong kind of value",
            )),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<(), StorageError> {
        let expires_at = ttl_seconds
            .filter(|ttl| *ttl > 0)
            .map(|ttl| Instant::now() + Duration::from_secs(ttl));
        let mut map = self
            .entries
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        map.insert(
            key.to_string(),
            CacheEntry::Value {
                data: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<u64, StorageError> {
        let now = Instant::now();
        let mut map = self
            .entries
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut deleted = 0;
        for key in keys {
            if let Some(entry) = map.remove(key) {
                if !entry.is_expired(now) {
                    deleted += 1;
                }
            }
        }
        Ok(deleted)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<(), StorageError> {
        let mut map = self
            .entries
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let entry = map
            .entry(key.to_string())
            .or_insert_with(|| CacheEntry::Set(BTreeSet::new()));
        match entry {
            CacheEntry::Set(members) => {
                members.insert(member.to_string());
                Ok(())
            }
            CacheEntry::Value { .. } => Err(StorageError::new(
                "WRONGTYPE Operation against a key holding the wrong kind of value",
            )),
        }
    }

    async fn sscan(
        &self,
        key: &str,
        cursor: u64,
        count: usize,
    ) -> Result<(u64, Vec<String>), StorageError> {
        let snapshot = if cursor == 0 {
            let map = self
                .entries
                .read()
                .map_err(|_| StorageError::new("lock failed"))?;
            match map.get(key) {
                Some(CacheEntry::Set(members)) => Some(members.iter().cloned().collect()),
                Some(CacheEntry::Value { .. }) => {
                    return Err(StorageError::new(
                        "WRONGTYPE Operation against a key holding the wrong kind of value",
                    ));
                }
                None => Some(Vec::new()),
            }
        } else {
            None
        };
        self.page(cursor, snapshot, count)
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), StorageError> {
        let snapshot = if cursor == 0 {
            let now = Instant::now();
            let map = self
                .entries
                .read()
                .map_err(|_| StorageError::new("lock failed"))?;
            Some(
                map.iter()
                    .filter(|(key, entry)| !entry.is_expired(now) && glob_match(pattern, key))
                    .map(|(key, _)| key.clone())
                    .collect(),
            )
        } else {
            None
        };
        self.page(cursor, snapshot, count)
    }
}
