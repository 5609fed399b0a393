mod config;
mod db;
mod errors;
mod llm;
mod metrics;
mod providers;
mod routes;
mod services;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use providers::{ArxivProvider, SemanticScholarProvider, SourceAggregator};

/// Outbound timeout for provider HTTP calls.
const PROVIDER_TIMEOUT_SECS: u64 = 30;

/// Graceful shutdown signal handler: SIGINT (Ctrl+C) and SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration
    dotenvy::dotenv().ok();
    let config = config::AppConfig::build()?;

    // 2. Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.server.rust_log))
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting paperharvest...");

    // 3. Initialize storage
    let store: Arc<dyn db::Store> = if config.database.url == "memory" {
        tracing::warn!("Using in-memory store - not for production use");
        Arc::new(db::MemoryStore::new())
    } else {
        Arc::new(db::Repository::new(&config.database).await?)
    };
    tracing::info!(
        enabled_sources = store.count_enabled_sources().await?,
        "Storage ready"
    );

    // 4. Generative text service (optional; deterministic fallbacks apply)
    let chat_model: Option<Arc<dyn llm::ChatModel>> = if config.llm.is_configured() {
        Some(Arc::new(llm::GroqClient::new(config.llm.clone())?))
    } else {
        tracing::warn!("No generative-service credential configured, using fallback modes");
        None
    };

    // 5. Search providers share one outbound HTTP client
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(PROVIDER_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(10))
        .build()?;
    let aggregator = SourceAggregator::new(
        vec![
            Arc::new(ArxivProvider::new(http.clone())),
            Arc::new(SemanticScholarProvider::new(http)),
        ],
        config.collection.provider_limit,
    );

    // 6. App state (services)
    let state = services::AppState::new(store, chat_model, aggregator, config.collection.clone());

    // 7. Router with metrics endpoint
    let metrics_router = metrics::setup_metrics()?;
    let app = routes::create_router(state, metrics_router);

    // 8. Serve with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!(address = %addr, "Server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}
