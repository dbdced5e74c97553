use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

const DAY_FORMAT: &str = "%Y-%m-%d";
const SECOND_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// 仓库检索过滤条件
///
/// 值语义：每一步收窄都在副本上进行（`with_*` 返回新值），不共享可变实例。
///
/// ## 前置条件
/// - `min_stars <= max_stars`、`min_created <= max_created`（两端都设置时）。
///   该约束由调用方保证，这里不做运行时校验。
/// - 星数与创建时间区间均为闭区间。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryFilter {
    pub text: Option<String>,
    pub language: Option<String>,
    pub has_help_wanted_issues: Option<bool>,
    pub has_good_first_issues: Option<bool>,
    pub last_update_after: Option<NaiveDate>,
    pub min_stars: Option<u32>,
    pub max_stars: Option<u32>,
    pub min_created: Option<DateTime<Utc>>,
    pub max_created: Option<DateTime<Utc>>,
}

impl RepositoryFilter {
    /// 是否至少设置了一个可识别的约束
    pub fn has_constraint(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.is_empty())
            || self.language.is_some()
            || self.last_update_after.is_some()
            || self.min_stars.is_some()
            || self.max_stars.is_some()
            || self.min_created.is_some()
            || self.max_created.is_some()
            || self.has_help_wanted_issues == Some(true)
            || self.has_good_first_issues == Some(true)
    }

    pub fn with_min_stars(&self, min: u32) -> Self {
        Self {
            min_stars: Some(min),
            ..self.clone()
        }
    }

    pub fn with_max_stars(&self, max: u32) -> Self {
        Self {
            max_stars: Some(max),
            ..self.clone()
        }
    }

    /// 收窄到恰好 `stars` 颗星的桶
    pub fn with_exact_stars(&self, stars: u32) -> Self {
        Self {
            min_stars: Some(stars),
            max_stars: Some(stars),
            ..self.clone()
        }
    }

    pub fn with_created(
        &self,
        min: Option<DateTime<Utc>>,
        max: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            min_created: min,
            max_created: max,
            ..self.clone()
        }
    }

    /// 生成远端检索的查询文本（固定排序：stars desc, updated desc）
    pub fn to_query(&self) -> String {
        let mut query = String::new();
        if let Some(text) = self.text.as_deref().filter(|t| !t.is_empty()) {
            query.push_str(text);
        }
        if let Some(language) = self.language.as_deref().filter(|l| !l.is_empty()) {
            query.push_str(&format!(" language:{}", language));
        }
        if let Some(after) = self.last_update_after {
            query.push_str(&format!(" pushed:>={}", after.format(DAY_FORMAT)));
        }
        if self.has_good_first_issues == Some(true) {
            query.push_str(" good-first-issues:>0");
        }
        if self.has_help_wanted_issues == Some(true) {
            query.push_str(" help-wanted-issues:>0");
        }
        match (self.min_stars, self.max_stars) {
            (Some(min), Some(max)) => query.push_str(&format!(" stars:{}..{}", min, max)),
            (Some(min), None) => query.push_str(&format!(" stars:>={}", min)),
            (None, Some(max)) => query.push_str(&format!(" stars:<={}", max)),
            (None, None) => {}
        }
        match (self.min_created, self.max_created) {
            (Some(min), Some(max)) => query.push_str(&format!(
                " created:{}..{}",
                min.format(SECOND_FORMAT),
                max.format(SECOND_FORMAT)
            )),
            (Some(min), None) => {
                query.push_str(&format!(" created:>={}", min.format(SECOND_FORMAT)))
            }
            (None, Some(max)) => {
                query.push_str(&format!(" created:<={}", max.format(SECOND_FORMAT)))
            }
            (None, None) => {}
        }
        query.push_str(" sort:stars-desc sort:updated-desc");
        query
    }
}
