pub mod cached;
pub mod cursor;
pub mod graphql;
pub mod memory;

use async_trait::async_trait;

use crate::core::{Repository, RepositoryFilter};
use crate::error::Result;

/// 远端检索网关抽象
///
/// ## 契约（重要）
/// - 三个操作必须使用同一个固定排序：stars desc，其次 updated desc。
///   分区器的正确性完全依赖于此。
/// - 所有位置均为 1-based。
/// - `star_count_at` 在 `index` 超出匹配数时返回 `ExplorerError::NotFound`。
#[async_trait]
pub trait RepositoryGateway: Send + Sync {
    /// 过滤条件下的匹配总数
    async fn count(&self, filter: &RepositoryFilter) -> Result<u32>;

    /// 第 `index` 个匹配仓库的星数
    async fn star_count_at(&self, filter: &RepositoryFilter, index: u32) -> Result<u32>;

    /// 从第 `from` 个开始取至多 `count` 个仓库
    async fn fetch(
        &self,
        filter: &RepositoryFilter,
        from: u32,
        count: u32,
    ) -> Result<Vec<Repository>>;
}

pub use cached::CachedGateway;
pub use graphql::{GraphQLGateway, GraphQLOptions};
pub use memory::MemoryGateway;
