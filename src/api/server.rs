use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{get_series, health_check, ingest, list_series, stats, AppState};
use crate::attime::AtTime;
use crate::ingest::{IngestService, ParamResolver, DEFAULT_SAMPLE_RATE};
use crate::pool::{ScratchPool, DEFAULT_BUFFER_CAPACITY, DEFAULT_MAX_IDLE};
use crate::segment::SegmentKeyParser;
use crate::stats::Stats;
use crate::storage::MemoryStorage;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_memory_bytes: usize,
    pub default_sample_rate: u32,
    pub scratch_buffer_bytes: usize,
    pub max_idle_buffers: usize,
    /// 0 disables the limit
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4040,
            max_memory_bytes: 1024 * 1024 * 1024, // 1GB
            default_sample_rate: DEFAULT_SAMPLE_RATE,
            scratch_buffer_bytes: DEFAULT_BUFFER_CAPACITY,
            max_idle_buffers: DEFAULT_MAX_IDLE,
            max_body_bytes: 0,
        }
    }
}

impl AppState {
    /// Wire storage, the buffer pool and counters into an ingest service
    pub fn from_config(config: &ServerConfig) -> Self {
        let storage = Arc::new(MemoryStorage::with_memory_limit(config.max_memory_bytes));
        let stats = Arc::new(Stats::new());
        let pool = Arc::new(ScratchPool::new(
            config.scratch_buffer_bytes,
            config.max_idle_buffers,
        ));
        let params = ParamResolver::new(
            Arc::new(AtTime::new()),
            Arc::new(SegmentKeyParser),
            config.default_sample_rate,
        );

        let ingest = Arc::new(IngestService::new(
            params,
            pool,
            storage.clone(),
            stats.clone(),
        ));

        Self {
            ingest,
            storage,
            stats,
            max_body_bytes: config.max_body_bytes,
        }
    }
}

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = match state.max_body_bytes {
        0 => DefaultBodyLimit::disable(),
        max => DefaultBodyLimit::max(max),
    };

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Profile ingestion
        .route("/ingest", post(ingest).layer(body_limit))
        // Stored data
        .route("/series", get(list_series))
        .route("/series/:key", get(get_series))
        // Stats
        .route("/stats", get(stats))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(AppState::from_config(&config));
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Starting flamegate server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("flamegate server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received, draining requests...");
}
