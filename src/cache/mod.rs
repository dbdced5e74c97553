use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use xxhash_rust::xxh3::xxh3_64;

use crate::stats::CacheStats;

/// 计数缓存的 key：过滤条件的规范化查询文本 + 计数种类
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CountKey<'a> {
    /// 匹配总数
    Total { query: &'a str },
    /// 第 `index` 个匹配仓库的星数
    StarsAt { query: &'a str, index: u32 },
}

impl CountKey<'_> {
    pub fn canonical(&self) -> String {
        match self {
            CountKey::Total { query } => format!("TotalCount-{}", query),
            CountKey::StarsAt { query, index } => format!("StarsCount-{}@{}", query, index),
        }
    }

    pub fn digest(&self) -> u64 {
        xxh3_64(self.canonical().as_bytes())
    }
}

/// 计数缓存抽象
///
/// 并发读写安全；同一 key 后写覆盖先写即可（条目过期后按需重算，幂等）。
pub trait CountCache: Send + Sync {
    fn get(&self, key: &CountKey<'_>) -> Option<u32>;
    fn set(&self, key: &CountKey<'_>, value: u32, ttl: Duration);
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    value: u32,
    expires_at: Instant,
}

/// 内存计数缓存（DashMap 实现，带绝对过期时间）
pub struct MemoryCountCache {
    inner: DashMap<u64, Entry>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCountCache {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            inner: DashMap::with_capacity(cap.min(4096)),
            capacity: cap.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// 清理所有已过期条目，返回清理数量
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.len();
        self.inner.retain(|_, e| e.expires_at > now);
        before.saturating_sub(self.inner.len())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.inner.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl CountCache for MemoryCountCache {
    fn get(&self, key: &CountKey<'_>) -> Option<u32> {
        let hash = key.digest();
        let hit = self
            .inner
            .get(&hash)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.value);

        match hit {
            Some(v) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(v)
            }
            None => {
                // 过期条目顺手删除（remove_if 避免误删并发写入的新值）
                self.inner
                    .remove_if(&hash, |_, e| e.expires_at <= Instant::now());
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn set(&self, key: &CountKey<'_>, value: u32, ttl: Duration) {
        if self.inner.len() >= self.capacity {
            self.purge_expired();
        }
        if self.inner.len() >= self.capacity {
            // 仍然满：淘汰最早过期的条目
            let victim = self
                .inner
                .iter()
                .min_by_key(|e| e.value().expires_at)
                .map(|e| *e.key());
            if let Some(k) = victim {
                self.inner.remove(&k);
            }
        }

        self.inner.insert(
            key.digest(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }
}
