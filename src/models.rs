use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ApiError;

pub const MAX_PROMPT_CHARS: usize = 10_000;
pub const MAX_TOKENS_CEILING: u32 = 8192;
pub const DEFAULT_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

const SENSITIVE_CONTEXT_KEYS: [&str; 4] = ["password", "api_key", "secret", "token"];

pub type Context = Map<String, Value>;

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

/// Request body of `POST /mcp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default)]
    pub context: Context,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl McpRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, context: Context) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            context,
            request_id: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        validate_fields(&self.prompt, &self.context, self.max_tokens, self.temperature)
    }
}

/// Body of the category endpoints, which fix the model themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptRequest {
    pub prompt: String,
    #[serde(default)]
    pub context: Context,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl PromptRequest {
    pub fn into_mcp(self, model: &str) -> McpRequest {
        McpRequest {
            model: model.to_string(),
            prompt: self.prompt,
            context: self.context,
            request_id: self.request_id,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

fn validate_fields(
    prompt: &str,
    context: &Context,
    max_tokens: u32,
    temperature: f32,
) -> Result<(), ApiError> {
    if prompt.trim().is_empty() {
        return Err(ApiError::Validation(
            "Prompt cannot be empty or only whitespace".to_string(),
        ));
    }
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(ApiError::Validation(format!(
            "Prompt exceeds {} characters",
            MAX_PROMPT_CHARS
        )));
    }
    if max_tokens == 0 || max_tokens > MAX_TOKENS_CEILING {
        return Err(ApiError::Validation(format!(
            "max_tokens must be between 1 and {}",
            MAX_TOKENS_CEILING
        )));
    }
    if !(0.0..=2.0).contains(&temperature) {
        return Err(ApiError::Validation(
            "temperature must be between 0.0 and 2.0".to_string(),
        ));
    }
    for key in context.keys() {
        let lowered = key.to_lowercase();
        if SENSITIVE_CONTEXT_KEYS.iter().any(|s| lowered.contains(s)) {
            return Err(ApiError::Validation(format!(
                "Context cannot contain sensitive key: {}",
                key
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpResponse {
    pub request_id: String,
    pub model: String,
    pub response: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub processing_time: f64,
    #[serde(default = "default_success")]
    pub success: bool,
}

fn default_success() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    pub model_type: String,
    pub max_tokens: u32,
    pub supported_languages: Vec<String>,
    pub specializations: Vec<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub store: String,
    pub timestamp: i64,
    pub uptime_secs: u64,
    pub requests_processed: u64,
}
