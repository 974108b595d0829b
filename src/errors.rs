use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::time::Duration;
use thiserror::Error;

use crate::models::ErrorBody;

const GENERIC_DETAIL: &str = "Internal server error";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("API key required. Provide a valid API key in the X-API-Key header.")]
    MissingApiKey,

    #[error("Invalid API key")]
    InvalidKey,

    #[error("Insufficient permissions. Required: {0}")]
    PermissionDenied(String),

    #[error("Rate limit of {limit} requests per window exceeded")]
    RateLimited { limit: u32, retry_after: Duration },

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Unsupported model: {0}")]
    UnknownModel(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Handler failed: {0}")]
    Handler(#[from] HandlerError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingApiKey | ApiError::InvalidKey => StatusCode::UNAUTHORIZED,
            ApiError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::UnknownModel(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Handler(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code placed in the `error` field of the body.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::MissingApiKey => "missing_api_key",
            ApiError::InvalidKey => "invalid_key",
            ApiError::PermissionDenied(_) => "insufficient_permissions",
            ApiError::RateLimited { .. } => "rate_limit_exceeded",
            ApiError::Validation(_) => "validation_error",
            ApiError::UnknownModel(_) => "unknown_model",
            ApiError::NotFound(_) => "not_found",
            ApiError::Handler(_) => "handler_error",
            ApiError::Internal(_) => "internal_error",
        }
    }

    /// Text returned to the caller. Internal failures never leak their cause.
    pub fn detail(&self) -> String {
        match self {
            ApiError::Handler(_) | ApiError::Internal(_) => GENERIC_DETAIL.to_string(),
            other => other.to_string(),
        }
    }
}

/// Whole seconds a client should wait, never less than one.
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let millis = retry_after.as_millis() as u64;
    millis.div_ceil(1000).max(1)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{} ({})", self, self.code());
        }

        let retry_after = match &self {
            ApiError::RateLimited { retry_after, .. } => Some(retry_after_secs(*retry_after)),
            _ => None,
        };

        let body = ErrorBody {
            error: self.code().to_string(),
            detail: self.detail(),
            retry_after,
        };
        let mut response = (status, Json(body)).into_response();
        let headers = response.headers_mut();

        match &self {
            ApiError::MissingApiKey | ApiError::InvalidKey => {
                headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("ApiKey"));
            }
            ApiError::RateLimited { limit, .. } => {
                if let Some(secs) = retry_after {
                    headers.insert(header::RETRY_AFTER, HeaderValue::from(secs));
                }
                headers.insert("x-ratelimit-limit", HeaderValue::from(*limit));
                headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
            }
            _ => {}
        }

        response
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HandlerError {
    #[error("context field '{0}' must be a string")]
    InvalidContext(String),

    #[error("{0}")]
    Failed(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Counter store error: {0}")]
    Internal(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read API key file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse API key file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Duplicate API key: {0}")]
    DuplicateKey(String),

    #[error("Duplicate model registration: {0}")]
    DuplicateModel(String),

    #[error("Model registry is empty")]
    EmptyRegistry,
}
