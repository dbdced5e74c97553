use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// 计数缓存统计
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct CacheStats {
    /// 当前条目数（含尚未清理的过期条目）
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// 请求计数（HTTP 层累加）
#[derive(Debug, Default)]
pub struct RequestCounters {
    pages: AtomicU64,
    random_picks: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
}

impl RequestCounters {
    pub fn record_page(&self) {
        self.pages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_random(&self) {
        self.random_picks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RequestStats {
        RequestStats {
            pages: self.pages.load(Ordering::Relaxed),
            random_picks: self.random_picks.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct RequestStats {
    pub pages: u64,
    pub random_picks: u64,
    /// 参数校验失败
    pub rejected: u64,
    /// 网关失败 / 内部错误
    pub failed: u64,
}

/// 运行状态报告（/status 与退出时打印）
#[derive(Clone, Debug, Default, Serialize)]
pub struct StatusReport {
    pub window_cap: u32,
    pub cache: CacheStats,
    pub requests: RequestStats,
    /// 进程级 RSS（从 /proc/self/statm 读取）
    pub process_rss_bytes: u64,
}

impl StatusReport {
    /// 汇总当前计数并附上进程 RSS
    pub fn capture(window_cap: u32, cache: CacheStats, requests: RequestStats) -> Self {
        Self {
            window_cap,
            cache,
            requests,
            process_rss_bytes: process_rss_bytes().unwrap_or(0),
        }
    }

    fn rss_mib(&self) -> f64 {
        self.process_rss_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Linux 下读 /proc/self/statm 第二列（常驻页数）
fn process_rss_bytes() -> Option<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let resident: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(resident * 4096)
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "╔══════════════════════════════════════════════════╗")?;
        writeln!(f, "║           repo-explorer Status Report            ║")?;
        writeln!(f, "╠══════════════════════════════════════════════════╣")?;
        writeln!(f, "║ Process RSS: {:>31.2} MiB ║", self.rss_mib())?;
        writeln!(f, "║ Window cap:  {:>35} ║", self.window_cap)?;
        writeln!(f, "╠──────────────────────────────────────────────────╣")?;
        writeln!(f, "║ Count Cache:                                     ║")?;
        writeln!(f, "║   entries:      {:>10}                       ║", self.cache.entries)?;
        writeln!(f, "║   hits:         {:>10}                       ║", self.cache.hits)?;
        writeln!(f, "║   misses:       {:>10}                       ║", self.cache.misses)?;
        writeln!(
            f,
            "║   hit ratio:    {:>9.1}%                       ║",
            self.cache.hit_ratio() * 100.0
        )?;
        writeln!(f, "╠──────────────────────────────────────────────────╣")?;
        writeln!(f, "║ Requests:                                        ║")?;
        writeln!(f, "║   pages:        {:>10}                       ║", self.requests.pages)?;
        writeln!(
            f,
            "║   random:       {:>10}                       ║",
            self.requests.random_picks
        )?;
        writeln!(f, "║   rejected:     {:>10}                       ║", self.requests.rejected)?;
        writeln!(f, "║   failed:       {:>10}                       ║", self.requests.failed)?;
        writeln!(f, "╚══════════════════════════════════════════════════╝")?;
        Ok(())
    }
}
