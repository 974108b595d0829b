use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map};

use super::guard::{authenticate, authorize, quota_headers};
use super::{reject_body, reject_query, SharedState};
use crate::errors::ApiError;
use crate::handlers::codegen;
use crate::models::{McpResponse, PromptRequest};
use crate::router::{Category, CODEGEN};
use crate::security::Permission;

pub const MAX_BATCH: usize = 10;

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/capabilities", get(capabilities))
        .route("/templates", get(templates))
        .route("/stats", get(stats))
        .route("/health", get(health))
        .route("/generate", post(generate))
        .route("/generate/batch", post(generate_batch))
}

#[derive(Debug, Deserialize)]
pub struct TemplateQuery {
    #[serde(default = "default_language")]
    language: String,
    #[serde(default = "default_category")]
    category: String,
}

fn default_language() -> String {
    "python".to_string()
}

fn default_category() -> String {
    "api".to_string()
}

async fn capabilities(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let quota = authorize(&state, &headers, Permission::Read).await?;
    tracing::info!("Retrieving codegen model capabilities");

    let caps = state.router.capabilities(CODEGEN)?.clone();
    Ok((quota_headers(&quota), Json(caps)))
}

async fn templates(
    State(state): State<SharedState>,
    headers: HeaderMap,
    query: Result<Query<TemplateQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let quota = authorize(&state, &headers, Permission::Read).await?;
    let Query(query) = query.map_err(reject_query)?;
    tracing::info!(
        "Retrieving code templates: {}/{}",
        query.language,
        query.category
    );

    let body = codegen::templates(&query.language, &query.category)?;
    Ok((quota_headers(&quota), Json(body)))
}

async fn stats(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let quota = authorize(&state, &headers, Permission::Read).await?;
    let mut body = state.router.category_stats(Category::Codegen);
    let caps = state.router.capabilities(CODEGEN)?;
    body["supported_languages"] = json!(caps.supported_languages);
    body["max_tokens"] = json!(caps.max_tokens);

    Ok((quota_headers(&quota), Json(body)))
}

async fn health(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    authenticate(&state, &headers)?;
    Ok(Json(json!({
        "status": "healthy",
        "service": "codegen",
        "model": CODEGEN,
    })))
}

async fn generate(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Result<Json<PromptRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let quota = authorize(&state, &headers, Permission::Write).await?;
    let Json(body) = body.map_err(reject_body)?;

    let request = body.into_mcp(CODEGEN);
    request.validate()?;

    let response = state.router.dispatch(&request)?;
    tracing::info!(
        "Codegen request {} completed successfully",
        response.request_id
    );
    Ok((quota_headers(&quota), Json(response)))
}

async fn generate_batch(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Result<Json<Vec<PromptRequest>>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let quota = authorize(&state, &headers, Permission::Write).await?;
    let Json(items) = body.map_err(reject_body)?;

    if items.is_empty() || items.len() > MAX_BATCH {
        return Err(ApiError::Validation(format!(
            "Batch size must be between 1 and {} requests",
            MAX_BATCH
        )));
    }

    tracing::info!("Processing batch codegen request with {} items", items.len());

    let responses: Vec<McpResponse> = items
        .into_iter()
        .map(|item| {
            let request = item.into_mcp(CODEGEN);
            request
                .validate()
                .and_then(|_| state.router.dispatch(&request))
                .unwrap_or_else(|e| failed_item(request.request_id.clone(), &e))
        })
        .collect();

    Ok((quota_headers(&quota), Json(responses)))
}

fn failed_item(request_id: Option<String>, err: &ApiError) -> McpResponse {
    let mut metadata = Map::new();
    metadata.insert("error".to_string(), json!(err.code()));

    McpResponse {
        request_id: request_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        model: CODEGEN.to_string(),
        response: format!("Error: {}", err.detail()),
        metadata,
        processing_time: 0.0,
        success: false,
    }
}
