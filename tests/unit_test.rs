use aiden_mcp::client::{build_request, decode_response, ClientError};
use aiden_mcp::errors::{retry_after_secs, ApiError, ConfigError, HandlerError};
use aiden_mcp::handlers::codegen;
use aiden_mcp::handlers::{HandlerInput, DEFAULT_LANGUAGE};
use aiden_mcp::models::{Context, McpRequest, McpResponse, MAX_PROMPT_CHARS};
use aiden_mcp::router::{Category, ModelRouter, AIDEN_7B, CODEGEN, DEBUGGER};
use aiden_mcp::security::{
    generate_api_key, hash_api_key, redact_key, ApiKeyRecord, ApiKeyStore, Permission, Tier,
};
use aiden_mcp::ServerConfig;
use axum::http::StatusCode;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use serde_json::json;
use std::time::Duration;

fn context(value: serde_json::Value) -> Context {
    value.as_object().cloned().unwrap_or_default()
}

#[test]
fn test_api_key_generation() {
    println!("🧪 Testing API key generation...");

    let key = generate_api_key("mcp-key");
    assert!(key.starts_with("mcp-key-"));
    assert_eq!(key.len(), "mcp-key-".len() + 32);
    assert!(key
        .trim_start_matches("mcp-key-")
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));

    assert_ne!(generate_api_key("mcp-key"), generate_api_key("mcp-key"));
}

#[test]
fn test_api_key_hashing() {
    let hash1 = hash_api_key("mcp-key-dev-123");
    let hash2 = hash_api_key("mcp-key-dev-123");
    let hash3 = hash_api_key("mcp-key-dev-124");

    assert_eq!(hash1, hash2);
    assert_ne!(hash1, hash3);
    assert_eq!(hash1.len(), 64);
}

#[test]
fn test_redact_key() {
    assert_eq!(redact_key("mcp-key-dev-123"), "mcp-key-de...");
    assert_eq!(redact_key("short"), "short...");
}

#[test]
fn test_builtin_keys_validate() {
    let store = ApiKeyStore::from_records(ApiKeyStore::builtin_records()).unwrap();
    assert_eq!(store.len(), 2);

    let dev = store.validate(Some("mcp-key-dev-123")).unwrap();
    assert_eq!(dev.name, "Development Key");
    assert_eq!(dev.tier, Tier::Development);
    assert!(ApiKeyStore::has_permission(dev, Permission::Read));
    assert!(ApiKeyStore::has_permission(dev, Permission::Write));
    assert!(!ApiKeyStore::has_permission(dev, Permission::Admin));

    let prod = store.validate(Some("  mcp-key-prod-456 ")).unwrap();
    assert_eq!(prod.name, "Production Key");
}

#[test]
fn test_missing_and_invalid_keys_are_distinct() {
    let store = ApiKeyStore::from_records(ApiKeyStore::builtin_records()).unwrap();

    assert!(matches!(store.validate(None), Err(ApiError::MissingApiKey)));
    assert!(matches!(store.validate(Some("   ")), Err(ApiError::MissingApiKey)));
    assert!(matches!(
        store.validate(Some("mcp-key-unknown")),
        Err(ApiError::InvalidKey)
    ));
}

#[test]
fn test_duplicate_keys_are_rejected() {
    let records = vec![
        ApiKeyRecord::new("same", "First", Tier::Custom, &[Permission::Read]),
        ApiKeyRecord::new("same", "Second", Tier::Custom, &[Permission::Read]),
    ];

    match ApiKeyStore::from_records(records) {
        Err(ConfigError::DuplicateKey(name)) => assert_eq!(name, "Second"),
        other => panic!("expected duplicate key error, got {:?}", other),
    }
}

#[test]
fn test_environment_key_is_added() {
    let store = ApiKeyStore::load(Some("env-secret-key"), None).unwrap();
    assert_eq!(store.len(), 3);

    let record = store.validate(Some("env-secret-key")).unwrap();
    assert_eq!(record.tier, Tier::Environment);

    let blank = ApiKeyStore::load(Some("  "), None).unwrap();
    assert_eq!(blank.len(), 2);
}

#[test]
fn test_key_file_loading() {
    let dir = std::env::temp_dir().join(format!("mcp-keys-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("keys.json");

    let hashed = hash_api_key("hashed-only-key");
    let body = json!([
        { "key": "reader-key", "name": "Reader", "permissions": ["read"], "rate_limit": 5 },
        { "key_hash": hashed, "name": "Hashed", "tier": "production", "permissions": ["read", "write"] }
    ]);
    std::fs::write(&path, body.to_string()).unwrap();

    let store = ApiKeyStore::load(None, Some(path.as_path())).unwrap();
    assert_eq!(store.len(), 4);

    let reader = store.validate(Some("reader-key")).unwrap();
    assert_eq!(reader.tier, Tier::Custom);
    assert_eq!(reader.rate_limit, Some(5));
    assert!(!ApiKeyStore::has_permission(reader, Permission::Write));

    let hashed = store.validate(Some("hashed-only-key")).unwrap();
    assert_eq!(hashed.tier, Tier::Production);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_key_file_entry_without_key_is_rejected() {
    let dir = std::env::temp_dir().join(format!("mcp-keys-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("keys.json");
    std::fs::write(&path, r#"[{ "name": "Broken", "permissions": ["read"] }]"#).unwrap();

    assert!(matches!(
        ApiKeyStore::read_key_file(&path),
        Err(ConfigError::Invalid(_))
    ));
    assert!(matches!(
        ApiKeyStore::read_key_file(&dir.join("missing.json")),
        Err(ConfigError::Io(_))
    ));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_key_id_is_hash_prefix() {
    let record = ApiKeyRecord::new("mcp-key-dev-123", "Dev", Tier::Development, &[]);
    assert_eq!(record.key_id().len(), 16);
    assert!(record.key_hash.starts_with(record.key_id()));
    assert!(!record.key_id().contains("mcp-key"));
}

#[test]
fn test_request_validation() {
    println!("🧪 Testing request validation...");

    let valid = McpRequest::new(AIDEN_7B, "Write a hello world", Context::new());
    assert!(valid.validate().is_ok());

    let blank = McpRequest::new(AIDEN_7B, "   \n\t", Context::new());
    assert!(matches!(blank.validate(), Err(ApiError::Validation(_))));

    let long = McpRequest::new(AIDEN_7B, "x".repeat(MAX_PROMPT_CHARS + 1), Context::new());
    assert!(matches!(long.validate(), Err(ApiError::Validation(_))));

    let at_limit = McpRequest::new(AIDEN_7B, "x".repeat(MAX_PROMPT_CHARS), Context::new());
    assert!(at_limit.validate().is_ok());

    let mut zero_tokens = valid.clone();
    zero_tokens.max_tokens = 0;
    assert!(zero_tokens.validate().is_err());

    let mut hot = valid.clone();
    hot.temperature = 2.5;
    assert!(hot.validate().is_err());

    let secret = McpRequest::new(AIDEN_7B, "hi", context(json!({ "API_KEY": "x" })));
    assert!(matches!(secret.validate(), Err(ApiError::Validation(_))));
}

#[test]
fn test_request_defaults_from_json() {
    let request: McpRequest =
        serde_json::from_str(r#"{"model": "codegen", "prompt": "hello"}"#).unwrap();

    assert_eq!(request.max_tokens, 2048);
    assert!((request.temperature - 0.7).abs() < f32::EPSILON);
    assert!(request.context.is_empty());
    assert!(request.request_id.is_none());

    let encoded = serde_json::to_value(&request).unwrap();
    assert!(encoded.get("request_id").is_none());
}

#[test]
fn test_default_router_models() {
    let router = ModelRouter::with_default_models().unwrap();
    assert_eq!(router.model_ids(), vec![AIDEN_7B, CODEGEN, DEBUGGER]);

    assert_eq!(router.route(DEBUGGER).unwrap().category, Category::Debugger);
    assert_eq!(router.capabilities(CODEGEN).unwrap().max_tokens, 8192);
    assert!(matches!(
        router.route("gpt-99"),
        Err(ApiError::UnknownModel(id)) if id == "gpt-99"
    ));
}

#[test]
fn test_dispatch_echoes_model_and_request_id() {
    let router = ModelRouter::with_default_models().unwrap();
    let request = McpRequest::new(
        CODEGEN,
        "  Write a fibonacci function  ",
        context(json!({ "language": "python" })),
    )
    .with_request_id("req-1");

    let response = router.dispatch(&request).unwrap();
    assert_eq!(response.model, CODEGEN);
    assert_eq!(response.request_id, "req-1");
    assert!(response.success);
    assert!(!response.response.is_empty());
    assert_eq!(response.metadata["category"], json!("codegen"));
    assert_eq!(response.metadata["input_tokens"], json!(4));
    assert_eq!(router.total_requests(), 1);
}

#[test]
fn test_dispatch_generates_request_id() {
    let router = ModelRouter::with_default_models().unwrap();
    let request = McpRequest::new(AIDEN_7B, "Explain closures", Context::new());

    let first = router.dispatch(&request).unwrap();
    let second = router.dispatch(&request).unwrap();
    assert!(!first.request_id.is_empty());
    assert_ne!(first.request_id, second.request_id);
}

#[test]
fn test_dispatch_clamps_max_tokens() {
    let router = ModelRouter::with_default_models().unwrap();
    let mut request = McpRequest::new(AIDEN_7B, "Explain closures", Context::new());
    request.max_tokens = 8000;

    let response = router.dispatch(&request).unwrap();
    assert_eq!(response.metadata["max_tokens"], json!(4096));
}

#[test]
fn test_aiden_routes_by_keyword() {
    let router = ModelRouter::with_default_models().unwrap();

    let debug = router
        .dispatch(&McpRequest::new(AIDEN_7B, "Help me debug this", Context::new()))
        .unwrap();
    assert!(debug.response.contains("Debugging Analysis"));

    let fib = router
        .dispatch(&McpRequest::new(
            AIDEN_7B,
            "Generate a fibonacci function",
            Context::new(),
        ))
        .unwrap();
    assert!(fib.response.contains("def fibonacci"));
}

#[test]
fn test_handler_failure_is_counted() {
    let router = ModelRouter::with_default_models().unwrap();
    let request = McpRequest::new(DEBUGGER, "Why", context(json!({ "language": 42 })));

    match router.dispatch(&request) {
        Err(ApiError::Handler(HandlerError::InvalidContext(field))) => {
            assert_eq!(field, "language")
        }
        other => panic!("expected handler error, got {:?}", other),
    }

    let stats = router.stats();
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.failed_requests, 1);
    assert_eq!(stats.models[DEBUGGER].failures, 1);
}

fn always_fails(_input: &HandlerInput<'_>) -> Result<String, HandlerError> {
    Err(HandlerError::Failed("backend exploded".to_string()))
}

#[test]
fn test_router_builder_rejects_bad_registrations() {
    let caps = ModelRouter::with_default_models()
        .unwrap()
        .capabilities(CODEGEN)
        .unwrap()
        .clone();

    assert!(matches!(
        ModelRouter::builder().build(),
        Err(ConfigError::EmptyRegistry)
    ));
    assert!(matches!(
        ModelRouter::builder().register(" ", Category::Codegen, caps.clone(), always_fails),
        Err(ConfigError::Invalid(_))
    ));

    let duplicate = ModelRouter::builder()
        .register("m", Category::Codegen, caps.clone(), always_fails)
        .unwrap()
        .register("m", Category::Codegen, caps, always_fails);
    assert!(matches!(duplicate, Err(ConfigError::DuplicateModel(_))));
}

#[test]
fn test_handler_input_language() {
    let empty = Context::new();
    let input = HandlerInput {
        prompt: "p",
        context: &empty,
        max_tokens: 10,
        temperature: 0.5,
    };
    assert_eq!(input.language().unwrap(), DEFAULT_LANGUAGE);

    let ctx = context(json!({ "language": "rust" }));
    let input = HandlerInput { context: &ctx, ..input };
    assert_eq!(input.language().unwrap(), "rust");
}

#[test]
fn test_templates_catalog() {
    let body = codegen::templates("python", "api").unwrap();
    assert_eq!(body["language"], "python");
    assert_eq!(body["templates"]["name"], "FastAPI Basic Template");

    assert!(matches!(
        codegen::templates("cobol", "api"),
        Err(ApiError::NotFound(_))
    ));
    assert!(matches!(
        codegen::templates("python", "games"),
        Err(ApiError::NotFound(_))
    ));
}

#[test]
fn test_error_status_codes() {
    assert_eq!(ApiError::MissingApiKey.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(ApiError::InvalidKey.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        ApiError::PermissionDenied("write".into()).status_code(),
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        ApiError::UnknownModel("x".into()).status_code(),
        StatusCode::BAD_REQUEST
    );

    let handler = ApiError::Handler(HandlerError::Failed("secret detail".into()));
    assert_eq!(handler.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(handler.detail(), "Internal server error");
}

#[test]
fn test_retry_after_rounds_up() {
    assert_eq!(retry_after_secs(Duration::from_millis(1)), 1);
    assert_eq!(retry_after_secs(Duration::from_millis(1500)), 2);
    assert_eq!(retry_after_secs(Duration::from_secs(30)), 30);
    assert_eq!(retry_after_secs(Duration::ZERO), 1);
}

#[test]
fn test_response_roundtrip() {
    let router = ModelRouter::with_default_models().unwrap();
    let response = router
        .dispatch(&McpRequest::new(CODEGEN, "Write a parser", Context::new()))
        .unwrap();

    let encoded = serde_json::to_string(&response).unwrap();
    let decoded: McpResponse = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, response);
}

#[test]
fn test_schema_roundtrip_preserves_floats() {
    let mut rng = rand::thread_rng();

    for i in 0..20_000 {
        let mut request = McpRequest::new(
            AIDEN_7B,
            format!("prompt {}", i),
            context(json!({ "language": "rust", "attempt": i })),
        )
        .with_request_id(format!("req-{}", i));
        request.temperature = rng.gen_range(0.0f32..=2.0);
        request.max_tokens = rng.gen_range(1..=8192);

        let decoded: McpRequest =
            serde_json::from_str(&serde_json::to_string(&request).unwrap()).unwrap();
        assert_eq!(decoded, request);

        let mut metadata = serde_json::Map::new();
        metadata.insert("temperature".to_string(), json!(request.temperature));
        let response = McpResponse {
            request_id: format!("req-{}", i),
            model: AIDEN_7B.to_string(),
            response: "ok".to_string(),
            metadata,
            processing_time: Duration::from_nanos(rng.gen_range(0..5_000_000_000)).as_secs_f64(),
            success: i % 2 == 0,
        };

        let decoded: McpResponse =
            serde_json::from_str(&serde_json::to_string(&response).unwrap()).unwrap();
        assert_eq!(decoded, response, "processing_time {}", response.processing_time);
    }

    // values that lose a ULP without exact float parsing
    for processing_time in [2.5976397732906826, 0.10494035463009499] {
        let response = McpResponse {
            request_id: "r".to_string(),
            model: CODEGEN.to_string(),
            response: String::new(),
            metadata: serde_json::Map::new(),
            processing_time,
            success: true,
        };
        let decoded: McpResponse =
            serde_json::from_str(&serde_json::to_string(&response).unwrap()).unwrap();
        assert_eq!(decoded.processing_time.to_bits(), processing_time.to_bits());
    }
}

#[test]
fn test_client_builds_tagged_requests() {
    let request = build_request(CODEGEN, "hello", None);
    assert_eq!(request.model, CODEGEN);
    assert!(request.context.is_empty());
    assert!(request.request_id.is_some());
}

#[test]
fn test_client_decodes_error_statuses() {
    let headers = HeaderMap::new();

    let unauthorized = decode_response::<McpResponse>(
        StatusCode::UNAUTHORIZED,
        &headers,
        r#"{"error":"invalid_key","detail":"Invalid API key"}"#,
    );
    assert!(matches!(unauthorized, Err(ClientError::Unauthorized(d)) if d == "Invalid API key"));

    let limited = decode_response::<McpResponse>(
        StatusCode::TOO_MANY_REQUESTS,
        &headers,
        r#"{"error":"rate_limit_exceeded","detail":"slow down","retry_after":17}"#,
    );
    assert!(matches!(
        limited,
        Err(ClientError::RateLimited { retry_after: Some(17) })
    ));

    let mut retry_headers = HeaderMap::new();
    retry_headers.insert(RETRY_AFTER, HeaderValue::from_static("9"));
    let from_header =
        decode_response::<McpResponse>(StatusCode::TOO_MANY_REQUESTS, &retry_headers, "busy");
    assert!(matches!(
        from_header,
        Err(ClientError::RateLimited { retry_after: Some(9) })
    ));

    let server = decode_response::<McpResponse>(StatusCode::BAD_GATEWAY, &headers, "upstream");
    match server {
        Err(e) => assert_eq!(e.status(), Some(502)),
        Ok(_) => panic!("expected server error"),
    }
}

#[test]
fn test_server_config_validation() {
    let config = ServerConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.listen_addr(), "0.0.0.0:8000");
    assert!(config.sweep_every().is_none());

    let broken = ServerConfig {
        rate_limit: 0,
        rate_window: 0,
        ..ServerConfig::default()
    };
    assert!(matches!(broken.validate(), Err(ConfigError::Invalid(_))));
}
