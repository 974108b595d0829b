// Model Control Protocol server and client SDK
// Main library module

pub mod api;
pub mod client;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod rate_limit;
pub mod router;
pub mod security;

// Re-export commonly used items
pub use api::{build_app, AppState, SharedState};
pub use client::{BlockingMcpClient, ClientConfig, ClientError, McpClient};
pub use config::ServerConfig;
pub use errors::ApiError;
pub use models::{McpRequest, McpResponse, PromptRequest};
pub use rate_limit::{CounterStore, RateDecision, RateLimitConfig, RateLimiter};
pub use router::ModelRouter;
pub use security::{ApiKeyRecord, ApiKeyStore, Permission};
