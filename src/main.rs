use aiden_mcp::{
    api::{build_app, AppState},
    config::{LogFormat, ServerConfig},
    rate_limit::spawn_sweeper,
};
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_logging(config: &ServerConfig) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
    );
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down MCP server...");
}

#[tokio::main]
async fn main() {
    // Load environment variables before clap reads them
    dotenv::dotenv().ok();
    let config = ServerConfig::parse();

    init_logging(&config);

    if let Err(e) = config.validate() {
        tracing::error!("{}", e);
        std::process::exit(2);
    }

    tracing::info!("Starting MCP server...");

    let state = match AppState::from_config(&config).await {
        Ok(state) => Arc::new(state),
        Err(e) => {
            tracing::error!("Failed to initialize server: {}", e);
            std::process::exit(1);
        }
    };

    for (key_id, name, tier) in state.keys.summaries() {
        tracing::info!("API key loaded: {} ({}, {:?})", name, key_id, tier);
    }
    tracing::info!("Models: {}", state.router.model_ids().join(", "));
    tracing::info!(
        "Rate limit: {} requests per {} seconds ({} store)",
        config.rate_limit,
        config.rate_window,
        state.limiter.store_name()
    );

    if let Some(every) = config.sweep_every() {
        spawn_sweeper(state.limiter.clone(), every);
    }

    let app = build_app(state);

    let addr = config.listen_addr();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!("Starting server on {}", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
