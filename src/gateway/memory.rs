use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::core::{Repository, RepositoryFilter};
use crate::error::{ExplorerError, Result};
use crate::gateway::RepositoryGateway;

/// 内存网关：按远端索引的语义在本地数据集上求值（测试与离线演示用）
pub struct MemoryGateway {
    repositories: Vec<Repository>,
    calls: AtomicU64,
}

impl MemoryGateway {
    pub fn new(repositories: Vec<Repository>) -> Self {
        Self {
            repositories,
            calls: AtomicU64::new(0),
        }
    }

    /// 累计网关调用次数
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// 过滤 + 固定排序（stars desc, updated desc）
    pub fn matching(&self, filter: &RepositoryFilter) -> Vec<&Repository> {
        let mut matched: Vec<&Repository> = self
            .repositories
            .iter()
            .filter(|r| matches_filter(r, filter))
            .collect();
        matched.sort_by(|a, b| {
            b.stars_count
                .cmp(&a.stars_count)
                .then_with(|| b.updated_date.cmp(&a.updated_date))
        });
        matched
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn matches_filter(repository: &Repository, filter: &RepositoryFilter) -> bool {
    if filter.has_good_first_issues == Some(true) && repository.good_first_issues_count == 0 {
        return false;
    }
    if filter.has_help_wanted_issues == Some(true) && repository.help_wanted_issues_count == 0 {
        return false;
    }
    if let Some(language) = filter.language.as_deref().filter(|l| !l.is_empty()) {
        let same = repository
            .primary_language
            .as_deref()
            .is_some_and(|p| p.eq_ignore_ascii_case(language));
        if !same {
            return false;
        }
    }
    if let Some(text) = filter.text.as_deref().filter(|t| !t.is_empty()) {
        let needle = text.to_lowercase();
        let hit = repository.name.to_lowercase().contains(&needle)
            || repository.owner.to_lowercase().contains(&needle)
            || repository
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));
        if !hit {
            return false;
        }
    }
    if let Some(after) = filter.last_update_after {
        if repository.updated_date.date_naive() < after {
            return false;
        }
    }
    if filter.min_created.is_some_and(|min| repository.created_date < min) {
        return false;
    }
    if filter.max_created.is_some_and(|max| repository.created_date > max) {
        return false;
    }
    if filter.min_stars.is_some_and(|min| repository.stars_count < min) {
        return false;
    }
    if filter.max_stars.is_some_and(|max| repository.stars_count > max) {
        return false;
    }
    true
}

#[async_trait]
impl RepositoryGateway for MemoryGateway {
    async fn count(&self, filter: &RepositoryFilter) -> Result<u32> {
        self.touch();
        Ok(self.matching(filter).len() as u32)
    }

    async fn star_count_at(&self, filter: &RepositoryFilter, index: u32) -> Result<u32> {
        self.touch();
        let matched = self.matching(filter);
        index
            .checked_sub(1)
            .and_then(|i| matched.get(i as usize))
            .map(|r| r.stars_count)
            .ok_or(ExplorerError::NotFound { index })
    }

    async fn fetch(
        &self,
        filter: &RepositoryFilter,
        from: u32,
        count: u32,
    ) -> Result<Vec<Repository>> {
        self.touch();
        Ok(self
            .matching(filter)
            .into_iter()
            .skip(from.saturating_sub(1) as usize)
            .take(count as usize)
            .cloned()
            .collect())
    }
}
