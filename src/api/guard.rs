use axum::http::{HeaderMap, HeaderValue};

use super::AppState;
use crate::errors::ApiError;
use crate::rate_limit::{Quota, RateDecision, RateLimiter};
use crate::security::{redact_key, ApiKeyRecord, ApiKeyStore, Permission, API_KEY_HEADER};

/// Resolves the `X-API-Key` header to a known record.
pub fn authenticate<'a>(state: &'a AppState, headers: &HeaderMap) -> Result<&'a ApiKeyRecord, ApiError> {
    let raw = match headers.get(API_KEY_HEADER) {
        None => None,
        Some(value) => Some(value.to_str().map_err(|_| ApiError::InvalidKey)?),
    };

    match state.keys.validate(raw) {
        Ok(record) => {
            tracing::debug!("Valid API key authenticated: {}", record.name);
            Ok(record)
        }
        Err(ApiError::MissingApiKey) => {
            tracing::warn!("API request without API key");
            Err(ApiError::MissingApiKey)
        }
        Err(e) => {
            tracing::warn!("Invalid API key attempted: {}", redact_key(raw.unwrap_or_default()));
            Err(e)
        }
    }
}

/// Key, permission and rate limit checks, in that order.
pub async fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    permission: Permission,
) -> Result<Quota, ApiError> {
    let record = authenticate(state, headers)?;

    if !ApiKeyStore::has_permission(record, permission) {
        tracing::warn!("Key '{}' lacks permission {}", record.name, permission);
        return Err(ApiError::PermissionDenied(permission.to_string()));
    }

    let limit = record
        .rate_limit
        .unwrap_or(state.limiter.config().limit);

    match state
        .limiter
        .check_and_increment_with_limit(record.key_id(), limit, RateLimiter::now())
        .await
    {
        RateDecision::Allowed(quota) => Ok(quota),
        RateDecision::Rejected { limit, retry_after } => {
            Err(ApiError::RateLimited { limit, retry_after })
        }
    }
}

pub fn quota_headers(quota: &Quota) -> HeaderMap {
    let reset_at = RateLimiter::now() + quota.reset_after;

    let mut headers = HeaderMap::new();
    headers.insert("x-ratelimit-limit", HeaderValue::from(quota.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(quota.remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(reset_at.as_secs()));
    headers
}
