use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::core::{Partition, Partitioner, Repository, RepositoryFilter, RepositoryPage};
use crate::error::{ExplorerError, Result};
use crate::gateway::RepositoryGateway;

/// 入站请求校验（控制器层规则）：至少一个过滤条件；分页检索还需要合法的分页参数
pub fn validate_request(filter: &RepositoryFilter, pagination: Option<(u32, u32)>) -> Result<()> {
    if !filter.has_constraint() {
        return Err(ExplorerError::InvalidArgument(
            "Request parameters should be set".into(),
        ));
    }
    if let Some((page_size, page_number)) = pagination {
        if page_size == 0 || page_number == 0 {
            return Err(ExplorerError::InvalidArgument(
                "Pagination parameters should be set".into(),
            ));
        }
    }
    Ok(())
}

/// 仓库检索编排：页请求 / 随机请求 -> [from, to] -> 分区 -> 逐个子查询取数 -> 拼接
///
/// 单个请求内的网关调用严格串行；请求被取消时直接丢弃 future 即可，
/// 已写入的计数缓存仍然有效。
pub struct RepositoryService {
    gateway: Arc<dyn RepositoryGateway>,
    window_cap: u32,
    clock: fn() -> DateTime<Utc>,
}

impl RepositoryService {
    pub fn new(gateway: Arc<dyn RepositoryGateway>, window_cap: u32) -> Self {
        Self {
            gateway,
            window_cap,
            clock: Utc::now,
        }
    }

    /// 日期窗口锚点来源
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    fn partitioner(&self) -> Partitioner<'_> {
        Partitioner::new(self.gateway.as_ref(), self.window_cap).with_now((self.clock)())
    }

    /// 第 `page_number` 页（1-based），每页 `page_size` 个
    pub async fn get_page(
        &self,
        filter: &RepositoryFilter,
        page_size: u32,
        page_number: u32,
    ) -> Result<RepositoryPage> {
        if page_size == 0 || page_number == 0 {
            return Err(ExplorerError::InvalidArgument(
                "Pagination parameters should be set".into(),
            ));
        }

        let total = self.gateway.count(filter).await?;
        let from = u64::from(page_size) * u64::from(page_number - 1) + 1;
        if from > u64::from(total) {
            tracing::debug!("page {} beyond {} matches", page_number, total);
            return Ok(RepositoryPage::empty(total, page_number));
        }
        let from = from as u32;
        let to = total.min(from.saturating_add(page_size - 1));

        let partitions = self.partitioner().partition(filter, from, to).await?;
        tracing::info!(
            "page {}x{} [{}, {}] of {} -> {} sub-queries",
            page_number,
            page_size,
            from,
            to,
            total,
            partitions.len()
        );
        if partitions.is_empty() {
            return Err(inconsistency(filter, from, to));
        }

        let repositories = self.fetch_all(&partitions).await?;
        Ok(RepositoryPage {
            repositories,
            total_count: total,
            has_next_page: to < total,
            has_previous_page: page_number > 1,
        })
    }

    /// 均匀随机取一个匹配仓库；无匹配时返回 `None`
    pub async fn get_random<R: Rng>(
        &self,
        filter: &RepositoryFilter,
        rng: &mut R,
    ) -> Result<Option<Repository>> {
        let total = self.gateway.count(filter).await?;
        if total == 0 {
            return Ok(None);
        }

        let index = rng.random_range(1..=total);
        let partitions = self.partitioner().partition(filter, index, index).await?;
        let partition = single_partition(filter, index, partitions)?;

        let mut found = self
            .gateway
            .fetch(&partition.filter, partition.from, 1)
            .await?;
        if found.is_empty() {
            tracing::warn!(
                "random pick #{} of {} vanished for '{}'",
                index,
                total,
                filter.to_query()
            );
            return Ok(None);
        }
        Ok(Some(found.swap_remove(0)))
    }

    /// 任一子查询失败则整页失败（不返回部分结果）
    async fn fetch_all(&self, partitions: &[Partition]) -> Result<Vec<Repository>> {
        let mut out = Vec::new();
        for p in partitions {
            let batch = self.gateway.fetch(&p.filter, p.from, p.len()).await?;
            if batch.len() < p.len() as usize {
                tracing::warn!(
                    "sub-query [{}, {}] returned {} for '{}'",
                    p.from,
                    p.to,
                    batch.len(),
                    p.filter.to_query()
                );
            }
            out.extend(batch);
        }
        Ok(out)
    }
}

fn inconsistency(filter: &RepositoryFilter, from: u32, to: u32) -> ExplorerError {
    tracing::error!(
        "partitioner returned no sub-queries for [{}, {}] filter={:?}",
        from,
        to,
        filter
    );
    ExplorerError::InternalInconsistency(format!("no sub-queries for [{}, {}]", from, to))
}

/// 单个位置必须恰好对应一个子查询
fn single_partition(
    filter: &RepositoryFilter,
    index: u32,
    partitions: Vec<Partition>,
) -> Result<Partition> {
    if partitions.len() > 1 {
        tracing::error!(
            "partitioner returned {} sub-queries for [{}, {}] filter={:?}",
            partitions.len(),
            index,
            index,
            filter
        );
        return Err(ExplorerError::InternalInconsistency(format!(
            "{} sub-queries for [{}, {}]",
            partitions.len(),
            index,
            index
        )));
    }
    partitions
        .into_iter()
        .next()
        .ok_or_else(|| inconsistency(filter, index, index))
}
