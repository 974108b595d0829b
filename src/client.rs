//! Client SDK for the MCP server.
//!
//! [`McpClient`] suspends the calling task for the round trip,
//! [`BlockingMcpClient`] blocks the calling thread. Both build the same
//! [`McpRequest`] and decode responses through [`decode_response`], so they
//! always agree with the server schema. Neither retries: a non-success status
//! surfaces as a typed [`ClientError`].

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

use crate::models::{Context, ErrorBody, HealthResponse, McpRequest, McpResponse};
use crate::security::API_KEY_HEADER;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Rate limited, retry after {retry_after:?} seconds")]
    RateLimited { retry_after: Option<u64> },

    #[error("Request rejected: {0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Server error {status}: {detail}")]
    Server { status: u16, detail: String },

    #[error("Unexpected status {status}: {detail}")]
    UnexpectedStatus { status: u16, detail: String },

    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("API key contains characters not allowed in a header")]
    InvalidApiKey,
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Unauthorized(_) => Some(401),
            ClientError::Forbidden(_) => Some(403),
            ClientError::RateLimited { .. } => Some(429),
            ClientError::Validation(_) => Some(422),
            ClientError::BadRequest(_) => Some(400),
            ClientError::NotFound(_) => Some(404),
            ClientError::Server { status, .. } | ClientError::UnexpectedStatus { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            API_KEY_HEADER,
            HeaderValue::from_str(&self.api_key).map_err(|_| ClientError::InvalidApiKey)?,
        );
        Ok(headers)
    }
}

/// Request the SDK sends for `generate`, tagged with a fresh request id.
pub fn build_request(model: &str, prompt: &str, context: Option<Context>) -> McpRequest {
    McpRequest::new(model, prompt, context.unwrap_or_default())
        .with_request_id(uuid::Uuid::new_v4().to_string())
}

/// Maps an HTTP status and body to the decoded value or a typed error.
pub fn decode_response<T: DeserializeOwned>(
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
) -> Result<T> {
    if status.is_success() {
        return Ok(serde_json::from_str(body)?);
    }

    let error_body: Option<ErrorBody> = serde_json::from_str(body).ok();
    let detail = error_body
        .as_ref()
        .map(|b| b.detail.clone())
        .unwrap_or_else(|| body.chars().take(500).collect());

    Err(match status {
        StatusCode::UNAUTHORIZED => ClientError::Unauthorized(detail),
        StatusCode::FORBIDDEN => ClientError::Forbidden(detail),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = error_body.and_then(|b| b.retry_after).or_else(|| {
                headers
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
            });
            ClientError::RateLimited { retry_after }
        }
        StatusCode::UNPROCESSABLE_ENTITY => ClientError::Validation(detail),
        StatusCode::BAD_REQUEST => ClientError::BadRequest(detail),
        StatusCode::NOT_FOUND => ClientError::NotFound(detail),
        s if s.is_server_error() => ClientError::Server {
            status: s.as_u16(),
            detail,
        },
        s => ClientError::UnexpectedStatus {
            status: s.as_u16(),
            detail,
        },
    })
}

/// Async client.
#[derive(Debug, Clone)]
pub struct McpClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl McpClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(config.default_headers()?)
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub async fn generate(
        &self,
        model: &str,
        prompt: &str,
        context: Option<Context>,
    ) -> Result<McpResponse> {
        self.send(&build_request(model, prompt, context)).await
    }

    pub async fn send(&self, request: &McpRequest) -> Result<McpResponse> {
        let resp = self
            .http
            .post(self.config.url("/mcp"))
            .json(request)
            .send()
            .await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.text().await?;
        decode_response(status, &headers, &body)
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let resp = self.http.get(self.config.url("/health")).send().await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.text().await?;
        decode_response(status, &headers, &body)
    }
}

/// Blocking client. Must not be used from inside an async runtime.
#[derive(Debug, Clone)]
pub struct BlockingMcpClient {
    config: ClientConfig,
    http: reqwest::blocking::Client,
}

impl BlockingMcpClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .default_headers(config.default_headers()?)
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn generate(&self, model: &str, prompt: &str, context: Option<Context>) -> Result<McpResponse> {
        self.send(&build_request(model, prompt, context))
    }

    pub fn send(&self, request: &McpRequest) -> Result<McpResponse> {
        let resp = self.http.post(self.config.url("/mcp")).json(request).send()?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.text()?;
        decode_response(status, &headers, &body)
    }

    pub fn health(&self) -> Result<HealthResponse> {
        let resp = self.http.get(self.config.url("/health")).send()?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.text()?;
        decode_response(status, &headers, &body)
    }
}
