use chrono::{DateTime, Duration, NaiveTime, Utc};

use crate::core::RepositoryFilter;
use crate::error::{ExplorerError, Result};
use crate::gateway::RepositoryGateway;

/// 远端检索可直接寻址的最大位置（GitHub 搜索为 1000）
pub const DEFAULT_WINDOW_CAP: u32 = 1000;
/// 日期窗口初始跨度：半年
pub const DEFAULT_PERIOD_SECS: i64 = 182 * 24 * 3600;
/// 日期窗口跨度上限（空窗口会倍增跨度）
const MAX_PERIOD_SECS: i64 = 100 * 365 * 24 * 3600;
/// 单个日期窗口最多收缩次数
const MAX_SHRINK_STEPS: u32 = 32;
/// 连续空窗口上限
const MAX_EMPTY_WINDOWS: u32 = 64;

/// 子查询：收窄后的过滤条件 + 该条件下的闭区间 [from, to]（1-based）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    pub filter: RepositoryFilter,
    pub from: u32,
    pub to: u32,
}

impl Partition {
    fn new(filter: RepositoryFilter, from: i64, to: i64) -> Self {
        Self {
            filter,
            from: from as u32,
            to: to as u32,
        }
    }

    pub fn len(&self) -> u32 {
        self.to - self.from + 1
    }

    pub fn is_empty(&self) -> bool {
        self.to < self.from
    }
}

/// 结果窗口分区器
///
/// 把任意 `[from, to]` 拆成若干子查询，每个子查询都不需要寻址超过 `max` 的位置；
/// 按顺序拼接子查询的结果，恰好覆盖原过滤条件下第 `from..=to` 个仓库（各一次）。
///
/// 收窄顺序：先按星数分桶（stars desc），单个桶超过窗口时再按创建时间切日期窗口
/// （从最近往前）。超过窗口的星数桶内按日期窗口顺序排列，而非 updated desc；
/// 这个顺序只由位置决定，与请求的 `[from, to]` 无关，连续分页不会重复或遗漏。
///
/// 例外：`to <= max` 的请求不收窄，按自然排序返回。若跨越位置 `max` 的桶超过窗口，
/// 该桶在这类请求与更大请求之间的顺序不同（接缝只出现在这一处）。
///
/// 每一步都基于过滤条件副本，调用之间不共享可变状态。
pub struct Partitioner<'a> {
    gateway: &'a dyn RepositoryGateway,
    max: u32,
    anchor: DateTime<Utc>,
    period_secs: i64,
}

impl<'a> Partitioner<'a> {
    pub fn new(gateway: &'a dyn RepositoryGateway, max: u32) -> Self {
        Self {
            gateway,
            max: max.max(1),
            anchor: day_end(Utc::now()),
            period_secs: DEFAULT_PERIOD_SECS,
        }
    }

    /// 日期窗口的锚点：`now` 当天（UTC）的最后一秒
    ///
    /// 同一天内的请求切出相同的窗口，桶内顺序和窗口计数缓存都保持稳定。
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.anchor = day_end(now);
        self
    }

    /// 日期窗口初始跨度
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period_secs = period.num_seconds().clamp(1, MAX_PERIOD_SECS);
        self
    }

    pub async fn partition(
        &self,
        filter: &RepositoryFilter,
        from: u32,
        to: u32,
    ) -> Result<Vec<Partition>> {
        if from == 0 || from > to {
            return Err(ExplorerError::InvalidArgument(format!(
                "invalid range [{}, {}]",
                from, to
            )));
        }

        let max = i64::from(self.max);
        if i64::from(to) <= max {
            // 请求整体落在窗口内：按远端自然排序直接取
            return Ok(vec![Partition::new(filter.clone(), i64::from(from), i64::from(to))]);
        }

        let mut filter = filter.clone();
        let (mut from, mut to) = (i64::from(from), i64::from(to));
        let mut out = Vec::new();

        loop {
            // 窗口外按 `max` 探测；剩余范围进入窗口后按 `to` 探测
            let probe = to.min(max);
            let stars = match self.gateway.star_count_at(&filter, probe as u32).await {
                Ok(s) => s,
                Err(ExplorerError::NotFound { .. }) => {
                    // 剩余匹配不足 probe 个：所在的桶都小于窗口，可直接寻址
                    tracing::warn!(
                        "partition: fewer than {} matches left for [{}, {}], closing run",
                        probe,
                        from,
                        to
                    );
                    if from <= probe {
                        out.push(Partition::new(filter, from, probe));
                    }
                    return Ok(out);
                }
                Err(e) => return Err(e),
            };

            if filter.max_stars.is_some_and(|m| stars > m) {
                return Err(ExplorerError::InternalInconsistency(format!(
                    "star count {} above bucket bound {:?} for '{}'",
                    stars,
                    filter.max_stars,
                    filter.to_query()
                )));
            }

            let bucket_filter = filter.with_exact_stars(stars);
            let bucket = i64::from(self.gateway.count(&bucket_filter).await?);

            // 剩余范围已在窗口内，且 `to` 所在的桶不超过窗口：
            // 范围内的每个桶都按自然排序寻址，与更大请求下的顺序一致
            if to <= max && bucket <= max {
                out.push(Partition::new(filter, from, to));
                return Ok(out);
            }

            // 排在该桶之前（stars > s）的仓库都在窗口内，可直接取
            let shift = if filter.max_stars == Some(stars) {
                0
            } else {
                i64::from(self.gateway.count(&filter.with_min_stars(stars + 1)).await?)
            };
            tracing::debug!(
                "partition: stars={} shift={} bucket={} range=[{}, {}]",
                stars,
                shift,
                bucket,
                from,
                to
            );
            if from <= shift {
                out.push(Partition::new(filter.clone(), from, to.min(shift)));
            }
            from = (from - shift).max(1);
            to -= shift;
            if to <= 0 {
                return Ok(out);
            }

            if from <= bucket {
                self.split_bucket(&bucket_filter, from, to.min(bucket), bucket, &mut out)
                    .await?;
            }

            // 桶内未请求的仓库也要跳过
            from = (from - bucket).max(1);
            to -= bucket;
            if to <= 0 {
                return Ok(out);
            }

            match stars.checked_sub(1) {
                Some(next) => filter = filter.with_max_stars(next),
                None => return Ok(out),
            }
        }
    }

    /// 单个星数桶内按创建时间切日期窗口；`from`/`to` 相对于桶，`1 <= from <= to <= bucket`
    async fn split_bucket(
        &self,
        bucket_filter: &RepositoryFilter,
        mut from: i64,
        mut to: i64,
        bucket: i64,
        out: &mut Vec<Partition>,
    ) -> Result<()> {
        let max = i64::from(self.max);
        if bucket <= max {
            out.push(Partition::new(bucket_filter.clone(), from, to));
            return Ok(());
        }

        let lower = bucket_filter.min_created;
        let mut end = bucket_filter.max_created.unwrap_or(self.anchor);
        let mut len = self.period_secs;
        let mut remaining = bucket;
        let mut empty_windows = 0;
        let mut split = false;

        while remaining > max {
            let mut shrink_steps = 0;
            let (start, window, count) = loop {
                let mut start = end - Duration::seconds(len - 1);
                if let Some(l) = lower {
                    if start <= l {
                        start = l;
                        len = (end - l).num_seconds() + 1;
                    }
                }
                let window = bucket_filter.with_created(Some(start), Some(end));
                let count = i64::from(self.gateway.count(&window).await?);
                if count <= max {
                    break (start, window, count);
                }

                shrink_steps += 1;
                if len <= 1 || shrink_steps > MAX_SHRINK_STEPS {
                    return Err(ExplorerError::InternalInconsistency(format!(
                        "date window ending {} did not shrink below {} (count {}) for '{}'",
                        end,
                        max,
                        count,
                        bucket_filter.to_query()
                    )));
                }
                len = shrink(len, max, count);
            };

            tracing::debug!(
                "partition: window {}..{} count={} range=[{}, {}]",
                start,
                end,
                count,
                from,
                to
            );

            if count == 0 {
                empty_windows += 1;
                if empty_windows > MAX_EMPTY_WINDOWS {
                    return Err(ExplorerError::InternalInconsistency(format!(
                        "{} matches never appeared in date windows before {} for '{}'",
                        remaining,
                        end,
                        bucket_filter.to_query()
                    )));
                }
            } else {
                empty_windows = 0;
            }

            if from <= count {
                out.push(Partition::new(window, from, to.min(count)));
            }
            from = (from - count).max(1);
            to -= count;
            remaining -= count;
            split = true;

            let reached_lower = lower.is_some_and(|l| start <= l);
            if to <= 0 || reached_lower {
                return Ok(());
            }

            end = start - Duration::seconds(1);
            if count * 2 < max {
                len = (len * 2).min(MAX_PERIOD_SECS);
            }
        }

        // 剩余部分不超过一个窗口：恢复原始下界
        let rest = if split {
            bucket_filter.with_created(lower, Some(end))
        } else {
            bucket_filter.clone()
        };
        let last = to.min(remaining);
        if from <= last {
            out.push(Partition::new(rest, from, last));
        }
        Ok(())
    }
}

fn day_end(t: DateTime<Utc>) -> DateTime<Utc> {
    let midnight = t.date_naive().and_time(NaiveTime::MIN).and_utc();
    midnight + Duration::seconds(24 * 3600 - 1)
}

/// 按实际超出比例收缩窗口：`ceil(len * max / count)`，至少缩短 1 秒
fn shrink(len: i64, max: i64, count: i64) -> i64 {
    let shrunk = (i128::from(len) * i128::from(max) + i128::from(count) - 1) / i128::from(count);
    i64::try_from(shrunk).unwrap_or(len).clamp(1, (len - 1).max(1))
}
