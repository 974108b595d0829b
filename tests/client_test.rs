use aiden_mcp::client::{BlockingMcpClient, ClientConfig, ClientError, McpClient};
use aiden_mcp::models::HealthStatus;
use aiden_mcp::rate_limit::{RateLimitConfig, RateLimiter};
use aiden_mcp::router::ModelRouter;
use aiden_mcp::security::ApiKeyStore;
use aiden_mcp::{build_app, AppState};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const DEV_KEY: &str = "mcp-key-dev-123";

fn state(limit: u32) -> Arc<AppState> {
    let keys = ApiKeyStore::from_records(ApiKeyStore::builtin_records()).unwrap();
    let limiter = RateLimiter::in_memory(RateLimitConfig::new(limit, Duration::from_secs(60)));
    Arc::new(AppState::new(
        keys,
        limiter,
        ModelRouter::with_default_models().unwrap(),
    ))
}

/// Serves the app on an ephemeral port and returns its base URL.
async fn spawn_server(limit: u32) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_app(state(limit));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client(base_url: &str, key: &str) -> McpClient {
    McpClient::new(ClientConfig::new(key).with_base_url(base_url)).unwrap()
}

#[tokio::test]
async fn test_async_client_generate() {
    let base_url = spawn_server(10).await;
    let client = client(&base_url, DEV_KEY);

    let context = json!({ "language": "python" }).as_object().cloned();
    let response = client
        .generate("codegen", "Write a fibonacci function", context)
        .await
        .unwrap();

    assert_eq!(response.model, "codegen");
    assert!(response.success);
    assert!(!response.request_id.is_empty());

    let health = client.health().await.unwrap();
    assert_eq!(health.status, HealthStatus::Ok);
    assert_eq!(health.requests_processed, 1);
}

#[tokio::test]
async fn test_async_client_typed_errors() {
    let base_url = spawn_server(1).await;

    let bad_key = client(&base_url, "mcp-key-wrong");
    match bad_key.generate("codegen", "hello", None).await {
        Err(ClientError::Unauthorized(_)) => {}
        other => panic!("expected unauthorized, got {:?}", other),
    }

    let dev = client(&base_url, DEV_KEY);
    match dev.generate("gpt-99", "hello", None).await {
        Err(ClientError::BadRequest(detail)) => assert!(detail.contains("gpt-99")),
        other => panic!("expected bad request, got {:?}", other),
    }

    // the unknown model above used the only slot of this window
    match dev.generate("codegen", "hello", None).await {
        Err(ClientError::RateLimited { retry_after }) => {
            let secs = retry_after.unwrap();
            assert!((1..=60).contains(&secs));
        }
        other => panic!("expected rate limit, got {:?}", other),
    }
}

#[tokio::test]
async fn test_client_reports_transport_errors() {
    // nothing listens on the discard port
    let client = McpClient::new(
        ClientConfig::new(DEV_KEY)
            .with_base_url("http://127.0.0.1:9")
            .with_timeout(Duration::from_secs(2)),
    )
    .unwrap();

    match client.generate("codegen", "hello", None).await {
        Err(e @ ClientError::Transport(_)) => assert_eq!(e.status(), None),
        other => panic!("expected transport error, got {:?}", other),
    }
}

#[test]
fn test_client_rejects_unusable_key() {
    let result = McpClient::new(ClientConfig::new("bad\nkey"));
    assert!(matches!(result, Err(ClientError::InvalidApiKey)));
}

#[test]
fn test_blocking_client_matches_async_client() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let base_url = runtime.block_on(spawn_server(10));

    let blocking = BlockingMcpClient::new(ClientConfig::new(DEV_KEY).with_base_url(&base_url)).unwrap();
    let blocking_response = blocking
        .generate("debugger", "Why does this loop never end?", None)
        .unwrap();

    let async_response = runtime
        .block_on(client(&base_url, DEV_KEY).generate(
            "debugger",
            "Why does this loop never end?",
            None,
        ))
        .unwrap();

    assert_eq!(blocking_response.model, async_response.model);
    assert_eq!(blocking_response.response, async_response.response);
    assert_ne!(blocking_response.request_id, async_response.request_id);

    let health = blocking.health().unwrap();
    assert_eq!(health.requests_processed, 2);
}
