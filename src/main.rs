use clap::Parser;
use repo_explorer::cache::MemoryCountCache;
use repo_explorer::config::{Args, ExplorerConfig};
use repo_explorer::gateway::{CachedGateway, GraphQLGateway, GraphQLOptions};
use repo_explorer::query::{AppState, QueryServer};
use repo_explorer::service::RepositoryService;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = ExplorerConfig::load(&args)?;

    info!(
        "Starting repo-explorer: {} (window cap {})",
        config.api_url, config.window_cap
    );

    // 远端网关 + 计数缓存
    let remote = GraphQLGateway::new(GraphQLOptions {
        api_url: config.api_url.clone(),
        access_token: config.access_token.clone(),
        timeout: config.request_timeout,
        max_languages: config.max_languages,
    })?;
    let cache = Arc::new(MemoryCountCache::with_capacity(config.cache_capacity));
    let gateway = CachedGateway::new(Arc::new(remote), cache.clone())
        .with_ttls(config.total_count_ttl, config.star_count_ttl);

    let service = Arc::new(RepositoryService::new(Arc::new(gateway), config.window_cap));
    let state = AppState::new(service, cache.clone(), config.window_cap);

    // 启动查询服务 (HTTP)
    let port = config.port;
    let query_server = QueryServer::new(state.clone());
    tokio::spawn(async move {
        if let Err(e) = query_server.run(port).await {
            tracing::error!("HTTP server stopped: {:#}", e);
        }
    });

    // 定期清理过期计数
    let purge_interval = config.cache_purge_interval;
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(purge_interval).await;
            let removed = cache.purge_expired();
            if removed > 0 {
                tracing::debug!("purged {} expired count entries", removed);
            }
        }
    });

    info!(
        "repo-explorer ready. Query via: http://localhost:{}/api/repository/search?language=rust&pageSize=20&pageNumber=1",
        port
    );

    // 优雅退出处理
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    eprintln!("{}", state.report());

    Ok(())
}
