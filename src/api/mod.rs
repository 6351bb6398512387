// HTTP API：稽核、客戶與權杖端點

pub mod handlers;
pub mod middleware;
pub mod response;

use crate::config::cli::LocalStorage;
use crate::config::toml_config::NavConfig;
use crate::core::AuditService;
use crate::domain::ports::DataProvider;
use crate::security::JwtManager;
use crate::utils::error::Result;
use crate::utils::rate_limit::KeyedRateLimiter;
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use response::{ApiErrorBody, ApiResponse, RequestTimer};

/// API 使用的稽核服務：執行期選擇資料來源，結果寫入本機目錄
pub type ApiAuditService = AuditService<Arc<dyn DataProvider>, LocalStorage>;

#[derive(Clone)]
pub struct AppState {
    pub audits: Arc<ApiAuditService>,
    pub jwt: Arc<JwtManager>,
    pub limiter: Arc<KeyedRateLimiter>,
    pub api_keys: Arc<Vec<String>>,
    pub default_days: u32,
}

impl AppState {
    pub fn new(audits: ApiAuditService, jwt: JwtManager, config: &NavConfig) -> Self {
        Self {
            audits: Arc::new(audits),
            jwt: Arc::new(jwt),
            limiter: Arc::new(KeyedRateLimiter::per_minute(config.api.rate_limit_per_minute)),
            api_keys: Arc::new(config.api.api_keys.clone()),
            default_days: config.audit.default_days,
        }
    }

    pub fn from_config(audits: ApiAuditService, config: &NavConfig) -> Result<Self> {
        let jwt = JwtManager::new(
            config.jwt_secret()?,
            &config.api.jwt_issuer,
            config.api.token_ttl_seconds,
        )?;
        Ok(Self::new(audits, jwt, config))
    }
}

pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/v1/auth/revoke", post(handlers::revoke_token))
        .route(
            "/v1/customers",
            get(handlers::list_customers).post(handlers::upsert_customer),
        )
        .route("/v1/customers/:id", get(handlers::get_customer))
        .route("/v1/customers/:id/audits", get(handlers::list_customer_audits))
        .route("/v1/analyzers", get(handlers::list_analyzers))
        .route("/v1/audits", post(handlers::create_audit))
        .route("/v1/audits/:id", get(handlers::get_audit))
        .route(
            "/v1/audits/:id/recommendations",
            get(handlers::audit_recommendations),
        )
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    let limited = Router::new()
        .route("/v1/auth/token", post(handlers::issue_token))
        .merge(protected)
        .route_layer(from_fn_with_state(state.clone(), middleware::rate_limit));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(limited)
        .layer(from_fn(middleware::track_request))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// 啟動 HTTP 服務直到程序結束
pub async fn serve(state: AppState, bind: &str, sweep_interval: Duration) -> Result<()> {
    let sweeper = state.jwt.blacklist().clone().spawn_sweeper(sweep_interval);

    let limiter = state.limiter.clone();
    let cleaner = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            limiter.cleanup();
        }
    });

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("🚀 API listening on http://{}", listener.local_addr()?);

    let result = axum::serve(listener, create_router(state)).await;
    sweeper.abort();
    cleaner.abort();
    result?;
    Ok(())
}
