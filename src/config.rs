use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::rate_limit::RateLimitConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    /// Process-local counters, single instance only
    Memory,
    /// Counters shared through Redis
    Redis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "mcp-server")]
#[command(about = "Model Control Protocol server: API keys, rate limiting and model routing")]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(short, long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Requests allowed per API key in one window
    #[arg(long, env = "DEFAULT_RATE_LIMIT", default_value_t = 60)]
    pub rate_limit: u32,

    /// Rate limit window in seconds
    #[arg(long, env = "RATE_LIMIT_WINDOW", default_value_t = 60)]
    pub rate_window: u64,

    #[arg(long, env = "RATE_LIMIT_STORE", value_enum, default_value_t = StoreBackend::Memory)]
    pub store: StoreBackend,

    #[arg(long, env = "REDIS_URL", default_value = "redis://localhost:6379")]
    pub redis_url: String,

    /// Seconds between sweeps of stale in-memory windows, 0 disables sweeping
    #[arg(long, env = "RATE_LIMIT_SWEEP_INTERVAL", default_value_t = 0)]
    pub sweep_interval: u64,

    /// JSON file with additional API key records
    #[arg(long, env = "API_KEYS_FILE")]
    pub api_keys_file: Option<PathBuf>,

    /// Extra API key granted read and write
    #[arg(long, env = "MCP_API_KEY", hide_env_values = true)]
    pub mcp_api_key: Option<String>,

    #[arg(long, env = "SECURITY_HEADERS_ENABLED", default_value_t = true, action = clap::ArgAction::Set)]
    pub security_headers: bool,

    /// Fallback filter when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            rate_limit: 60,
            rate_window: 60,
            store: StoreBackend::Memory,
            redis_url: "redis://localhost:6379".to_string(),
            sweep_interval: 0,
            api_keys_file: None,
            mcp_api_key: None,
            security_headers: true,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.port == 0 {
            errors.push(format!("Invalid port number: {}", self.port));
        }
        if self.rate_limit == 0 {
            errors.push(format!("Rate limit must be positive: {}", self.rate_limit));
        }
        if self.rate_window == 0 {
            errors.push(format!(
                "Rate limit window must be positive: {}",
                self.rate_window
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors.join("; ")))
        }
    }

    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig::new(self.rate_limit, Duration::from_secs(self.rate_window))
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn sweep_every(&self) -> Option<Duration> {
        (self.sweep_interval > 0).then(|| Duration::from_secs(self.sweep_interval))
    }
}
