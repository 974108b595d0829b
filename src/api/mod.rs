//! HTTP surface of the server.
//!
//! Every authenticated handler runs the same sequence: API key, permission,
//! rate limit, body validation, dispatch. The first failing step decides the
//! response status.

pub mod codegen;
pub mod debugger;
pub mod guard;
pub mod middleware;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        State,
    },
    http::HeaderMap,
    middleware::from_fn,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{ServerConfig, StoreBackend};
use crate::errors::{ApiError, ConfigError};
use crate::models::{HealthResponse, HealthStatus, McpRequest};
use crate::rate_limit::{RateLimiter, RedisCounterStore};
use crate::router::ModelRouter;
use crate::security::{ApiKeyStore, Permission};

pub use guard::{authenticate, authorize};

pub struct AppState {
    pub keys: ApiKeyStore,
    pub limiter: Arc<RateLimiter>,
    pub router: ModelRouter,
    pub security_headers: bool,
    pub started_at: Instant,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(keys: ApiKeyStore, limiter: RateLimiter, router: ModelRouter) -> Self {
        Self {
            keys,
            limiter: Arc::new(limiter),
            router,
            security_headers: true,
            started_at: Instant::now(),
        }
    }

    /// Builds keys, limiter and router from the process configuration.
    pub async fn from_config(config: &ServerConfig) -> Result<Self, ConfigError> {
        let keys = ApiKeyStore::load(config.mcp_api_key.as_deref(), config.api_keys_file.as_deref())?;
        let router = ModelRouter::with_default_models()?;
        let rate_config = config.rate_limit_config();

        let limiter = match config.store {
            StoreBackend::Memory => RateLimiter::in_memory(rate_config),
            StoreBackend::Redis => {
                match RedisCounterStore::connect(&config.redis_url, rate_config.window).await {
                    Ok(store) => {
                        tracing::info!("Redis connection established");
                        RateLimiter::new(rate_config, Arc::new(store))
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Redis connection failed: {}. Rate limiting will use in-memory storage.",
                            e
                        );
                        RateLimiter::degraded(rate_config)
                    }
                }
            }
        };

        let mut state = Self::new(keys, limiter, router);
        state.security_headers = config.security_headers;
        Ok(state)
    }
}

pub fn build_app(state: SharedState) -> Router {
    let security_headers = state.security_headers;

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/mcp", post(handle_mcp))
        .nest("/api/v1/codegen", codegen::routes())
        .nest("/api/v1/debugger", debugger::routes())
        .layer(from_fn(middleware::log_requests))
        .with_state(state);

    if security_headers {
        app.layer(from_fn(middleware::security_headers))
    } else {
        app
    }
}

pub(crate) fn reject_body(rejection: JsonRejection) -> ApiError {
    ApiError::Validation(rejection.body_text())
}

pub(crate) fn reject_query(rejection: QueryRejection) -> ApiError {
    ApiError::Validation(rejection.body_text())
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "status": "running",
        "message": "MCP Server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let status = if state.limiter.is_degraded() {
        HealthStatus::Degraded
    } else {
        HealthStatus::Ok
    };

    Json(HealthResponse {
        status,
        store: state.limiter.store_name().to_string(),
        timestamp: chrono::Utc::now().timestamp(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        requests_processed: state.router.total_requests(),
    })
}

async fn handle_mcp(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Result<Json<McpRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let quota = authorize(&state, &headers, Permission::Write).await?;
    let Json(request) = body.map_err(reject_body)?;
    request.validate()?;

    tracing::info!("Processing MCP request for model: {}", request.model);
    let response = state.router.dispatch(&request)?;

    Ok((guard::quota_headers(&quota), Json(response)))
}
