//! Sentra API server with graceful shutdown

use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::compression::CompressionLayer;

use crate::error::ApiError;
use crate::jobs::{BatchScanJob, ScanJobPayload};
use crate::middleware::{
    body_limit_layer, cors_layer, request_id_middleware, security_headers_middleware,
    timeout_layer, tracing_middleware,
};
use crate::routes::api_router;
use crate::state::AppState;
use sentra_llm::{AnthropicProvider, LlmConfig, LlmProvider, Metrics, MockProvider, OpenAiProvider};
use sentra_persist::{
    AlertStore, ConfigStore, SqliteQueueBackend, SqliteStore, TransactionStore,
};
use sentra_queue::{QueueBackend, WorkerConfig, WorkerPool};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server address
    pub addr: SocketAddr,
    /// Request timeout
    pub timeout: Duration,
    /// Max request body size (bytes)
    pub max_body_size: usize,
    /// Enable compression
    pub compression: bool,
    /// Database URL
    pub database_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            timeout: Duration::from_secs(30),
            max_body_size: 1024 * 1024, // 1MB
            compression: true,
            database_url: "sqlite:sentra.db?mode=rwc".to_string(),
        }
    }
}

impl ServerConfig {
    /// Create from environment variables
    pub fn from_env() -> Self {
        let port: u16 = std::env::var("SENTRA_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let timeout_secs: u64 = std::env::var("SENTRA_TIMEOUT_SECS")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(30);

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:sentra.db?mode=rwc".to_string());

        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], port)),
            timeout: Duration::from_secs(timeout_secs),
            database_url,
            ..Default::default()
        }
    }
}

/// Sentra API server
pub struct SentraServer {
    config: ServerConfig,
    app_state: AppState,
}

impl SentraServer {
    /// Create a new server: connect storage, wire the queue and LLM
    pub async fn new(config: ServerConfig) -> Result<Self, ApiError> {
        let metrics = Arc::new(Metrics::new());

        // Persistence
        let db = SqliteStore::new(&config.database_url)
            .await
            .map_err(|e| ApiError::Internal(format!("DB init failed: {}", e)))?;
        let db = Arc::new(db);

        // Durable queue over the same pool
        let queue_backend: Arc<dyn QueueBackend> =
            Arc::new(SqliteQueueBackend::new(db.pool().clone()));
        let worker_pool =
            WorkerPool::new_with_arc(queue_backend.clone(), WorkerConfig::default());

        // LLM provider selection
        let llm = build_llm_provider();

        // Batch scan job wiring
        let scan_txns = TransactionStore::new(db.pool().clone());
        let scan_alerts = AlertStore::new(db.pool().clone());
        let scan_config = ConfigStore::new(db.pool().clone());
        let scan_queue = queue_backend.clone();
        let scan_metrics = metrics.clone();
        worker_pool.register_job_factory("batch_scan", move |job_id, payload| {
            let payload: ScanJobPayload =
                serde_json::from_value(payload).unwrap_or_else(|_| ScanJobPayload {
                    scan_type: "invalid_payload".to_string(),
                    filters: Default::default(),
                    max_transactions: 0,
                    submitted_by: "unknown".to_string(),
                });
            Box::new(BatchScanJob {
                job_id,
                payload,
                transactions: scan_txns.clone(),
                alerts: scan_alerts.clone(),
                config: scan_config.clone(),
                queue: scan_queue.clone(),
                metrics: scan_metrics.clone(),
            })
        });

        let app_state = AppState::new(metrics, db, Arc::new(worker_pool), llm);

        Ok(Self { config, app_state })
    }

    /// Get the configured router with all middleware layers applied
    pub fn router(&self) -> Router {
        let mut app = api_router(self.app_state.clone());

        // Apply middleware layers (order matters - bottom to top execution)
        app = app
            // Compression (outermost - compresses response)
            .layer(CompressionLayer::new())
            // Body size limit
            .layer(body_limit_layer(self.config.max_body_size))
            // Timeout
            .layer(timeout_layer(self.config.timeout))
            // CORS
            .layer(cors_layer())
            // Security headers
            .layer(middleware::from_fn(security_headers_middleware))
            // Tracing
            .layer(middleware::from_fn(tracing_middleware))
            // Request ID (innermost - runs first)
            .layer(middleware::from_fn(request_id_middleware));

        app
    }

    /// Run the server with graceful shutdown
    pub async fn run(self) -> Result<(), ApiError> {
        let app = self.router();
        let addr = self.config.addr;

        // Start worker pool in background
        let queue = self.app_state.queue();
        tokio::spawn(async move {
            queue.start().await;
        });

        // Background sweep for consensus sessions past their deadline
        let consensus = self.app_state.consensus();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(60)).await;
                match consensus.expire_overdue().await {
                    Ok(0) => {}
                    Ok(n) => tracing::info!(expired = n, "Expired overdue consensus sessions"),
                    Err(e) => tracing::error!(error = %e, "Consensus expiry sweep failed"),
                }
            }
        });

        tracing::info!("Sentra API listening on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    /// Get server metrics
    pub fn metrics(&self) -> Arc<Metrics> {
        self.app_state.metrics()
    }

    /// Access the app state (used by the binary for startup checks)
    pub fn state(&self) -> &AppState {
        &self.app_state
    }
}

fn build_llm_provider() -> Arc<dyn LlmProvider> {
    let llm_config = LlmConfig::from_env();

    match llm_config.default_provider.as_str() {
        "anthropic" if llm_config.anthropic_api_key.is_some() => {
            tracing::info!(model = %llm_config.default_model, "Initializing Anthropic provider");
            let key = llm_config.anthropic_api_key.as_deref().unwrap_or_default();
            Arc::new(AnthropicProvider::new(key, &llm_config.default_model))
        }
        "openai" if llm_config.openai_api_key.is_some() => {
            tracing::info!(model = %llm_config.default_model, "Initializing OpenAI provider");
            let key = llm_config.openai_api_key.as_deref().unwrap_or_default();
            Arc::new(OpenAiProvider::new(key, &llm_config.default_model))
        }
        _ => {
            // Fall through the configured keys before giving up
            if let Some(key) = llm_config.anthropic_api_key.as_deref() {
                tracing::info!("Initializing Anthropic provider (key present)");
                Arc::new(AnthropicProvider::sonnet(key))
            } else if let Some(key) = llm_config.openai_api_key.as_deref() {
                tracing::info!("Initializing OpenAI provider (key present)");
                Arc::new(OpenAiProvider::gpt4o(key))
            } else {
                tracing::warn!("No LLM API key found, using mock provider");
                Arc::new(MockProvider::smart())
            }
        }
    }
}

/// Graceful shutdown signal handler
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
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Initialize tracing subscriber
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sentra_api=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}
