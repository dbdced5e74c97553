use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::cache::MemoryCountCache;
use crate::core::{Repository, RepositoryFilter, RepositoryPage};
use crate::error::ExplorerError;
use crate::service::{validate_request, RepositoryService};
use crate::stats::{RequestCounters, StatusReport};

/// 检索请求参数（query string，camelCase）
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub text: Option<String>,
    pub language: Option<String>,
    pub has_help_wanted_issues: Option<bool>,
    pub has_good_first_issues: Option<bool>,
    pub last_update_after: Option<NaiveDate>,
    pub min_number_of_stars: Option<u32>,
    pub max_number_of_stars: Option<u32>,
    pub min_created_date: Option<DateTime<Utc>>,
    pub max_created_date: Option<DateTime<Utc>>,
    pub page_size: Option<u32>,
    pub page_number: Option<u32>,
}

impl SearchParams {
    pub fn filter(&self) -> RepositoryFilter {
        RepositoryFilter {
            text: self.text.clone(),
            language: self.language.clone(),
            has_help_wanted_issues: self.has_help_wanted_issues,
            has_good_first_issues: self.has_good_first_issues,
            last_update_after: self.last_update_after,
            min_stars: self.min_number_of_stars,
            max_stars: self.max_number_of_stars,
            min_created: self.min_created_date,
            max_created: self.max_created_date,
        }
    }

    /// 缺失的分页字段按 0 处理，交给校验拒绝
    fn pagination(&self) -> (u32, u32) {
        (self.page_size.unwrap_or(0), self.page_number.unwrap_or(0))
    }
}

#[derive(Debug, Serialize)]
pub struct RandomResponse {
    pub repository: Option<Repository>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

/// HTTP 错误映射
#[derive(Debug)]
pub struct ApiError(pub ExplorerError);

impl From<ExplorerError> for ApiError {
    fn from(e: ExplorerError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            ExplorerError::InvalidArgument(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ExplorerError::NotFound { .. } => (StatusCode::NOT_FOUND, self.0.to_string()),
            other => {
                tracing::error!("request failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Search backend is unavailable".to_string(),
                )
            }
        };
        (status, Json(ErrorBody { message })).into_response()
    }
}

/// 路由共享状态
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RepositoryService>,
    pub cache: Arc<MemoryCountCache>,
    pub counters: Arc<RequestCounters>,
    /// 只用来派生每个请求的种子，锁不跨 await
    rng: Arc<Mutex<StdRng>>,
    window_cap: u32,
}

impl AppState {
    pub fn new(
        service: Arc<RepositoryService>,
        cache: Arc<MemoryCountCache>,
        window_cap: u32,
    ) -> Self {
        Self::with_rng(service, cache, window_cap, StdRng::from_os_rng())
    }

    pub fn with_rng(
        service: Arc<RepositoryService>,
        cache: Arc<MemoryCountCache>,
        window_cap: u32,
        rng: StdRng,
    ) -> Self {
        Self {
            service,
            cache,
            counters: Arc::new(RequestCounters::default()),
            rng: Arc::new(Mutex::new(rng)),
            window_cap,
        }
    }

    pub fn report(&self) -> StatusReport {
        StatusReport::capture(self.window_cap, self.cache.stats(), self.counters.snapshot())
    }

    fn request_rng(&self) -> StdRng {
        let seed: u64 = self.rng.lock().random();
        StdRng::seed_from_u64(seed)
    }

    fn record_error(&self, e: &ExplorerError) {
        match e {
            ExplorerError::InvalidArgument(_) => self.counters.record_rejected(),
            _ => self.counters.record_failed(),
        }
    }
}

pub struct QueryServer {
    pub state: AppState,
}

impl QueryServer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/repository/search", get(search_handler))
            .route("/api/repository/random", get(random_handler))
            .route("/status", get(status_handler))
            .with_state(self.state.clone())
    }

    pub async fn run(self, port: u16) -> anyhow::Result<()> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
        tracing::info!("HTTP Query Server listening on port {}", port);
        axum::serve(listener, app).await?;
        Ok(())
    }
}

fn bad_query(rejection: QueryRejection) -> ApiError {
    ApiError(ExplorerError::InvalidArgument(rejection.body_text()))
}

async fn search_handler(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<RepositoryPage>, ApiError> {
    let Query(params) = params.map_err(|r| {
        state.counters.record_rejected();
        bad_query(r)
    })?;
    let filter = params.filter();
    let (page_size, page_number) = params.pagination();

    let result = match validate_request(&filter, Some((page_size, page_number))) {
        Ok(()) => state.service.get_page(&filter, page_size, page_number).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(page) => {
            state.counters.record_page();
            Ok(Json(page))
        }
        Err(e) => {
            state.record_error(&e);
            if !matches!(e, ExplorerError::InvalidArgument(_)) {
                tracing::error!(
                    "search page {}x{} failed for {:?}",
                    page_number,
                    page_size,
                    filter
                );
            }
            Err(e.into())
        }
    }
}

async fn random_handler(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<RandomResponse>, ApiError> {
    let Query(params) = params.map_err(|r| {
        state.counters.record_rejected();
        bad_query(r)
    })?;
    let filter = params.filter();

    let result = match validate_request(&filter, None) {
        Ok(()) => {
            let mut rng = state.request_rng();
            state.service.get_random(&filter, &mut rng).await
        }
        Err(e) => Err(e),
    };
    match result {
        Ok(repository) => {
            state.counters.record_random();
            Ok(Json(RandomResponse { repository }))
        }
        Err(e) => {
            state.record_error(&e);
            Err(e.into())
        }
    }
}

async fn status_handler(State(state): State<AppState>) -> Json<StatusReport> {
    Json(state.report())
}
