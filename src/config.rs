use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

use crate::core::DEFAULT_WINDOW_CAP;
use crate::error::{ExplorerError, Result};

pub const DEFAULT_API_URL: &str = "https://api.github.com/graphql";
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// 命令行参数（覆盖配置文件）
#[derive(Parser, Debug, Default)]
#[command(
    name = "repo-explorer",
    about = "GitHub repository search service with deep pagination",
    version
)]
pub struct Args {
    /// 配置文件路径（默认 <config_dir>/repo-explorer/config.toml）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// HTTP 端口
    #[arg(short, long)]
    pub port: Option<u16>,

    /// 访问令牌（也可用环境变量 GITHUB_TOKEN）
    #[arg(long)]
    pub token: Option<String>,

    /// GraphQL 端点
    #[arg(long)]
    pub api_url: Option<String>,

    /// 远端结果窗口上限
    #[arg(long)]
    pub window_cap: Option<u32>,
}

/// 配置文件内容：全部可选，缺省取默认值
#[derive(Deserialize, Debug, Default)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    api_url: Option<String>,
    access_token: Option<String>,
    port: Option<u16>,
    window_cap: Option<u32>,
    total_count_ttl_secs: Option<u64>,
    star_count_ttl_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
    max_languages: Option<u32>,
    cache_capacity: Option<usize>,
    cache_purge_secs: Option<u64>,
}

/// 合并后的运行配置
#[derive(Clone, Debug)]
pub struct ExplorerConfig {
    pub api_url: String,
    pub access_token: String,
    pub port: u16,
    pub window_cap: u32,
    pub total_count_ttl: Duration,
    pub star_count_ttl: Duration,
    pub request_timeout: Duration,
    pub max_languages: u32,
    pub cache_capacity: usize,
    pub cache_purge_interval: Duration,
}

impl ExplorerConfig {
    /// 默认配置文件位置
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("repo-explorer").join("config.toml"))
    }

    /// 读取配置文件（显式指定的文件必须存在）+ 环境变量 + 命令行
    pub fn load(args: &Args) -> Result<Self> {
        let file = match &args.config {
            Some(path) => read_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => read_file(&path)?,
                _ => ConfigFile::default(),
            },
        };
        Self::merge(file, args, std::env::var(TOKEN_ENV).ok())
    }

    /// 优先级：命令行 > 配置文件 > 环境变量 > 默认值
    fn merge(file: ConfigFile, args: &Args, env_token: Option<String>) -> Result<Self> {
        let access_token = args
            .token
            .clone()
            .or(file.access_token)
            .or(env_token)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                ExplorerError::Config(format!(
                    "access token is missing (set access_token, --token or {})",
                    TOKEN_ENV
                ))
            })?;

        let window_cap = args.window_cap.or(file.window_cap).unwrap_or(DEFAULT_WINDOW_CAP);
        if window_cap == 0 {
            return Err(ExplorerError::Config("window_cap must be positive".into()));
        }

        Ok(Self {
            api_url: args
                .api_url
                .clone()
                .or(file.api_url)
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            access_token,
            port: args.port.or(file.port).unwrap_or(6060),
            window_cap,
            total_count_ttl: Duration::from_secs(file.total_count_ttl_secs.unwrap_or(3600)),
            star_count_ttl: Duration::from_secs(file.star_count_ttl_secs.unwrap_or(600)),
            request_timeout: Duration::from_secs(file.request_timeout_secs.unwrap_or(30)),
            max_languages: file.max_languages.unwrap_or(10),
            cache_capacity: file.cache_capacity.unwrap_or(100_000),
            cache_purge_interval: Duration::from_secs(file.cache_purge_secs.unwrap_or(60).max(1)),
        })
    }
}

fn read_file(path: &Path) -> Result<ConfigFile> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ExplorerError::Config(format!("{}: {}", path.display(), e)))?;
    toml::from_str(&text).map_err(|e| ExplorerError::Config(format!("{}: {}", path.display(), e)))
}
