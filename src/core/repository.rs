use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 单个匹配仓库；分区器只关心排序键（stars, updated_date）
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    /// 远端 edge cursor
    pub key: String,
    pub name: String,
    pub owner: String,
    pub url: String,
    pub description: Option<String>,
    pub forks_count: u32,
    pub stars_count: u32,
    pub primary_language: Option<String>,
    /// 使用最多的前若干种语言（按代码量降序）
    pub languages: Vec<String>,
    pub languages_total_count: u32,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
    pub help_wanted_issues_count: u32,
    pub good_first_issues_count: u32,
}

/// 一页检索结果
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryPage {
    pub repositories: Vec<Repository>,
    /// 匹配过滤条件的仓库总数
    pub total_count: u32,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl RepositoryPage {
    pub fn empty(total_count: u32, page_number: u32) -> Self {
        Self {
            repositories: Vec::new(),
            total_count,
            has_next_page: false,
            has_previous_page: page_number > 1,
        }
    }
}
