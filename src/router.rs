use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::errors::{ApiError, ConfigError};
use crate::handlers::{self, HandlerFn, HandlerInput};
use crate::models::{McpRequest, McpResponse, ModelCapabilities};

pub const AIDEN_7B: &str = "aiden-7b";
pub const CODEGEN: &str = "codegen";
pub const DEBUGGER: &str = "debugger";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Codegen,
    Debugger,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Codegen => write!(f, "codegen"),
            Category::Debugger => write!(f, "debugger"),
        }
    }
}

pub struct RegisteredModel {
    pub id: String,
    pub category: Category,
    pub capabilities: ModelCapabilities,
    handler: HandlerFn,
    requests: AtomicU64,
    failures: AtomicU64,
}

impl fmt::Debug for RegisteredModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredModel")
            .field("id", &self.id)
            .field("category", &self.category)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelStats {
    pub category: Category,
    pub requests: u64,
    pub failures: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouterStats {
    pub total_requests: u64,
    pub failed_requests: u64,
    pub models: BTreeMap<String, ModelStats>,
}

#[derive(Default)]
pub struct ModelRouterBuilder {
    models: Vec<RegisteredModel>,
}

impl ModelRouterBuilder {
    pub fn register(
        mut self,
        id: &str,
        category: Category,
        capabilities: ModelCapabilities,
        handler: HandlerFn,
    ) -> Result<Self, ConfigError> {
        if id.trim().is_empty() {
            return Err(ConfigError::Invalid("model id cannot be empty".to_string()));
        }
        if self.models.iter().any(|m| m.id == id) {
            return Err(ConfigError::DuplicateModel(id.to_string()));
        }

        self.models.push(RegisteredModel {
            id: id.to_string(),
            category,
            capabilities,
            handler,
            requests: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        });
        Ok(self)
    }

    pub fn build(self) -> Result<ModelRouter, ConfigError> {
        if self.models.is_empty() {
            return Err(ConfigError::EmptyRegistry);
        }
        Ok(ModelRouter {
            models: self.models.into_iter().map(|m| (m.id.clone(), m)).collect(),
            total: AtomicU64::new(0),
        })
    }
}

/// Static model registry, fixed once built.
#[derive(Debug)]
pub struct ModelRouter {
    models: BTreeMap<String, RegisteredModel>,
    total: AtomicU64,
}

fn capabilities(
    model_type: &str,
    max_tokens: u32,
    languages: &[&str],
    specializations: &[&str],
    description: &str,
) -> ModelCapabilities {
    ModelCapabilities {
        model_type: model_type.to_string(),
        max_tokens,
        supported_languages: languages.iter().map(|s| s.to_string()).collect(),
        specializations: specializations.iter().map(|s| s.to_string()).collect(),
        description: description.to_string(),
    }
}

impl ModelRouter {
    pub fn builder() -> ModelRouterBuilder {
        ModelRouterBuilder::default()
    }

    /// The three built-in models.
    pub fn with_default_models() -> Result<Self, ConfigError> {
        Self::builder()
            .register(
                AIDEN_7B,
                Category::Codegen,
                capabilities(
                    AIDEN_7B,
                    4096,
                    &["python", "javascript", "java", "cpp", "rust", "go"],
                    &["general_coding", "code_generation", "debugging"],
                    "General-purpose 7B parameter model for code generation and debugging",
                ),
                handlers::aiden_7b,
            )?
            .register(
                CODEGEN,
                Category::Codegen,
                capabilities(
                    CODEGEN,
                    8192,
                    &["python", "javascript", "typescript", "java", "cpp", "c", "rust", "go"],
                    &["code_generation", "boilerplate", "algorithms", "data_structures"],
                    "Specialized model optimized for code generation tasks",
                ),
                handlers::codegen::generate,
            )?
            .register(
                DEBUGGER,
                Category::Debugger,
                capabilities(
                    DEBUGGER,
                    6144,
                    &["python", "javascript", "java", "cpp", "rust"],
                    &["debugging", "error_analysis", "code_review", "optimization"],
                    "Specialized model for debugging and code analysis tasks",
                ),
                handlers::debugger::analyze,
            )?
            .build()
    }

    pub fn route(&self, model_id: &str) -> Result<&RegisteredModel, ApiError> {
        self.models
            .get(model_id)
            .ok_or_else(|| ApiError::UnknownModel(model_id.to_string()))
    }

    pub fn model_ids(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }

    pub fn capabilities(&self, model_id: &str) -> Result<&ModelCapabilities, ApiError> {
        self.route(model_id).map(|m| &m.capabilities)
    }

    /// Runs the model's handler. The request is expected to be validated.
    pub fn dispatch(&self, request: &McpRequest) -> Result<McpResponse, ApiError> {
        let started = Instant::now();
        let model = self.route(&request.model)?;

        self.total.fetch_add(1, Ordering::Relaxed);
        model.requests.fetch_add(1, Ordering::Relaxed);

        let request_id = request
            .request_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut max_tokens = request.max_tokens;
        if max_tokens > model.capabilities.max_tokens {
            tracing::warn!(
                "Reduced max_tokens to {} for model {}",
                model.capabilities.max_tokens,
                model.id
            );
            max_tokens = model.capabilities.max_tokens;
        }

        tracing::info!("Routing request {} to model {}", request_id, model.id);

        let prompt = request.prompt.trim();
        let input = HandlerInput {
            prompt,
            context: &request.context,
            max_tokens,
            temperature: request.temperature,
        };

        let text = (model.handler)(&input).map_err(|e| {
            model.failures.fetch_add(1, Ordering::Relaxed);
            tracing::error!("Error processing request {}: {}", request_id, e);
            ApiError::Handler(e)
        })?;

        let mut metadata = Map::new();
        metadata.insert("category".to_string(), json!(model.category));
        metadata.insert("model_capabilities".to_string(), json!(model.capabilities));
        metadata.insert("input_tokens".to_string(), json!(word_count(prompt)));
        metadata.insert("output_tokens".to_string(), json!(word_count(&text)));
        metadata.insert("temperature".to_string(), json!(request.temperature));
        metadata.insert("max_tokens".to_string(), json!(max_tokens));

        let processing_time = started.elapsed().as_secs_f64();
        tracing::info!(
            "Request {} processed successfully in {:.3}s",
            request_id,
            processing_time
        );

        Ok(McpResponse {
            request_id,
            model: request.model.clone(),
            response: text,
            metadata,
            processing_time,
            success: true,
        })
    }

    pub fn total_requests(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> RouterStats {
        let models: BTreeMap<String, ModelStats> = self
            .models
            .values()
            .map(|m| {
                (
                    m.id.clone(),
                    ModelStats {
                        category: m.category,
                        requests: m.requests.load(Ordering::Relaxed),
                        failures: m.failures.load(Ordering::Relaxed),
                    },
                )
            })
            .collect();

        RouterStats {
            total_requests: self.total_requests(),
            failed_requests: models.values().map(|m| m.failures).sum(),
            models,
        }
    }

    /// Stats of one category, for the category stats endpoints.
    pub fn category_stats(&self, category: Category) -> Value {
        let stats = self.stats();
        let models: BTreeMap<&String, &ModelStats> = stats
            .models
            .iter()
            .filter(|(_, m)| m.category == category)
            .collect();
        let requests: u64 = models.values().map(|m| m.requests).sum();
        let failures: u64 = models.values().map(|m| m.failures).sum();

        json!({
            "category": category,
            "total_requests": requests,
            "failed_requests": failures,
            "models": models,
        })
    }
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
