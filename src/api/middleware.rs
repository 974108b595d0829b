use axum::{
    extract::Request,
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const PROCESSING_TIME_HEADER: &str = "x-processing-time";

pub async fn log_requests(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let request_id = format!("req_{}", uuid::Uuid::new_v4().simple());
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    tracing::info!("Request started: {} - {} {}", request_id, method, path);

    let mut response = next.run(request).await;
    let elapsed = started.elapsed().as_secs_f64();

    tracing::info!(
        "Request completed: {} - {} ({:.3}s)",
        request_id,
        response.status().as_u16(),
        elapsed
    );

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        headers.insert(REQUEST_ID_HEADER, value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("{:.3}s", elapsed)) {
        headers.insert(PROCESSING_TIME_HEADER, value);
    }

    response
}

pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    response
}
