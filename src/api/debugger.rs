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
use serde_json::{json, Value};

use super::guard::{authenticate, authorize, quota_headers};
use super::{reject_body, reject_query, SharedState};
use crate::errors::ApiError;
use crate::handlers::debugger::{self, AnalysisType};
use crate::models::PromptRequest;
use crate::router::{Category, DEBUGGER};
use crate::security::Permission;

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/capabilities", get(capabilities))
        .route("/best-practices", get(best_practices))
        .route("/common-issues", get(common_issues))
        .route("/stats", get(stats))
        .route("/health", get(health))
        .route("/analyze", post(analyze))
        .route("/fix", post(fix))
        .route("/performance", post(performance))
        .route("/security", post(security))
}

#[derive(Debug, Deserialize)]
pub struct PracticeQuery {
    #[serde(default = "default_language")]
    language: String,
    #[serde(default = "default_category")]
    category: String,
}

#[derive(Debug, Deserialize)]
pub struct IssueQuery {
    #[serde(default = "default_language")]
    language: String,
}

fn default_language() -> String {
    "python".to_string()
}

fn default_category() -> String {
    "general".to_string()
}

async fn capabilities(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let quota = authorize(&state, &headers, Permission::Read).await?;
    tracing::info!("Retrieving debugger model capabilities");

    let caps = state.router.capabilities(DEBUGGER)?.clone();
    Ok((quota_headers(&quota), Json(caps)))
}

async fn best_practices(
    State(state): State<SharedState>,
    headers: HeaderMap,
    query: Result<Query<PracticeQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let quota = authorize(&state, &headers, Permission::Read).await?;
    let Query(query) = query.map_err(reject_query)?;
    tracing::info!(
        "Retrieving best practices: {}/{}",
        query.language,
        query.category
    );

    let body = debugger::best_practices(&query.language, &query.category)?;
    Ok((quota_headers(&quota), Json(body)))
}

async fn common_issues(
    State(state): State<SharedState>,
    headers: HeaderMap,
    query: Result<Query<IssueQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let quota = authorize(&state, &headers, Permission::Read).await?;
    let Query(query) = query.map_err(reject_query)?;
    let body = debugger::common_issues(&query.language)?;
    Ok((quota_headers(&quota), Json(body)))
}

async fn stats(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let quota = authorize(&state, &headers, Permission::Read).await?;
    let mut body = state.router.category_stats(Category::Debugger);
    let caps = state.router.capabilities(DEBUGGER)?;
    body["supported_languages"] = json!(caps.supported_languages);
    body["max_tokens"] = json!(caps.max_tokens);
    body["analysis_types"] = json!(["general", "performance", "security", "code_fix"]);

    Ok((quota_headers(&quota), Json(body)))
}

async fn health(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    authenticate(&state, &headers)?;
    Ok(Json(json!({
        "status": "healthy",
        "service": "debugger",
        "model": DEBUGGER,
    })))
}

async fn analyze(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Result<Json<PromptRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    run_analysis(state, headers, body, AnalysisType::General).await
}

async fn fix(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Result<Json<PromptRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    run_analysis(state, headers, body, AnalysisType::CodeFix).await
}

async fn performance(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Result<Json<PromptRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    run_analysis(state, headers, body, AnalysisType::Performance).await
}

async fn security(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Result<Json<PromptRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    run_analysis(state, headers, body, AnalysisType::Security).await
}

async fn run_analysis(
    state: SharedState,
    headers: HeaderMap,
    body: Result<Json<PromptRequest>, JsonRejection>,
    analysis: AnalysisType,
) -> Result<impl IntoResponse, ApiError> {
    let quota = authorize(&state, &headers, Permission::Write).await?;
    let Json(body) = body.map_err(reject_body)?;

    let mut request = body.into_mcp(DEBUGGER);
    request.validate()?;

    let original_prompt = request.prompt.trim().to_string();
    if let Some(instruction) = analysis.instruction() {
        request.prompt = format!("{}\n\n{}", instruction, original_prompt);
        request
            .context
            .insert("analysis_type".to_string(), json!(analysis.as_str()));
    }

    let mut response = state.router.dispatch(&request)?;

    if analysis != AnalysisType::General {
        let metadata = &mut response.metadata;
        metadata.insert("analysis_type".to_string(), json!(analysis.as_str()));
        metadata.insert("original_prompt".to_string(), Value::String(original_prompt));
        match analysis {
            AnalysisType::CodeFix => {
                metadata.insert("fix_applied".to_string(), Value::Bool(true));
            }
            AnalysisType::Security => {
                metadata.insert("security_scan".to_string(), Value::Bool(true));
            }
            _ => {}
        }
    }

    tracing::info!(
        "Debugger {} request {} completed successfully",
        analysis.as_str(),
        response.request_id
    );
    Ok((quota_headers(&quota), Json(response)))
}
