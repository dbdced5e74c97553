use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::{CountCache, CountKey};
use crate::core::{Repository, RepositoryFilter};
use crate::error::Result;
use crate::gateway::RepositoryGateway;

/// 默认 TTL：总数变化慢，缓存更久
pub const TOTAL_COUNT_TTL: Duration = Duration::from_secs(60 * 60);
pub const STAR_COUNT_TTL: Duration = Duration::from_secs(10 * 60);

/// 带计数缓存的网关装饰器：`count` / `star_count_at` 走缓存，`fetch` 直通
pub struct CachedGateway {
    inner: Arc<dyn RepositoryGateway>,
    cache: Arc<dyn CountCache>,
    total_count_ttl: Duration,
    star_count_ttl: Duration,
}

impl CachedGateway {
    pub fn new(inner: Arc<dyn RepositoryGateway>, cache: Arc<dyn CountCache>) -> Self {
        Self {
            inner,
            cache,
            total_count_ttl: TOTAL_COUNT_TTL,
            star_count_ttl: STAR_COUNT_TTL,
        }
    }

    pub fn with_ttls(mut self, total_count_ttl: Duration, star_count_ttl: Duration) -> Self {
        self.total_count_ttl = total_count_ttl;
        self.star_count_ttl = star_count_ttl;
        self
    }
}

#[async_trait]
impl RepositoryGateway for CachedGateway {
    async fn count(&self, filter: &RepositoryFilter) -> Result<u32> {
        let query = filter.to_query();
        let key = CountKey::Total { query: &query };
        if let Some(v) = self.cache.get(&key) {
            return Ok(v);
        }
        let v = self.inner.count(filter).await?;
        self.cache.set(&key, v, self.total_count_ttl);
        Ok(v)
    }

    async fn star_count_at(&self, filter: &RepositoryFilter, index: u32) -> Result<u32> {
        let query = filter.to_query();
        let key = CountKey::StarsAt {
            query: &query,
            index,
        };
        if let Some(v) = self.cache.get(&key) {
            return Ok(v);
        }
        // NotFound 不缓存
        let v = self.inner.star_count_at(filter, index).await?;
        self.cache.set(&key, v, self.star_count_ttl);
        Ok(v)
    }

    async fn fetch(
        &self,
        filter: &RepositoryFilter,
        from: u32,
        count: u32,
    ) -> Result<Vec<Repository>> {
        self.inner.fetch(filter, from, count).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCountCache;
    use crate::gateway::MemoryGateway;

    fn repos() -> Vec<Repository> {
        (0..5)
            .map(|i| Repository {
                name: format!("r{}", i),
                stars_count: i,
                ..Default::default()
            })
            .collect()
    }

    #[tokio::test]
    async fn counts_are_served_from_cache() {
        let backend = Arc::new(MemoryGateway::new(repos()));
        let cache = Arc::new(MemoryCountCache::with_capacity(64));
        let gw = CachedGateway::new(backend.clone(), cache.clone());
        let f = RepositoryFilter::default().with_min_stars(2);

        assert_eq!(gw.count(&f).await.unwrap(), 3);
        assert_eq!(gw.count(&f).await.unwrap(), 3);
        assert_eq!(gw.star_count_at(&f, 1).await.unwrap(), 4);
        assert_eq!(gw.star_count_at(&f, 1).await.unwrap(), 4);
        assert_eq!(backend.calls(), 2);

        // 不同位置是不同 key
        assert_eq!(gw.star_count_at(&f, 2).await.unwrap(), 3);
        assert_eq!(backend.calls(), 3);
        assert_eq!(cache.stats().hits, 2);
    }

    #[tokio::test]
    async fn fetch_bypasses_cache() {
        let backend = Arc::new(MemoryGateway::new(repos()));
        let gw = CachedGateway::new(backend.clone(), Arc::new(MemoryCountCache::with_capacity(8)));
        let f = RepositoryFilter::default();
        gw.fetch(&f, 1, 2).await.unwrap();
        gw.fetch(&f, 1, 2).await.unwrap();
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn not_found_is_not_cached() {
        let backend = Arc::new(MemoryGateway::new(repos()));
        let cache = Arc::new(MemoryCountCache::with_capacity(8));
        let gw = CachedGateway::new(backend.clone(), cache.clone());
        assert!(gw.star_count_at(&RepositoryFilter::default(), 9).await.is_err());
        assert!(cache.is_empty());
    }
}
