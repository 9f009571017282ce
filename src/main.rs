//! flamegate server
//!
//! Run with: cargo run
//!
//! Environment variables:
//! - FLAMEGATE_HOST: Bind address (default: 0.0.0.0)
//! - FLAMEGATE_PORT: Port number (default: 4040)
//! - FLAMEGATE_MAX_MEMORY_MB: Memory budget for stored series in MB (default: 1024)
//! - FLAMEGATE_DEFAULT_SAMPLE_RATE: Sample rate assumed when a request has none (default: 100)
//! - FLAMEGATE_SCRATCH_BUFFER_KB: Initial size of pooled decode buffers in KB (default: 64)
//! - FLAMEGATE_MAX_IDLE_BUFFERS: Idle decode buffers kept for reuse (default: 64)
//! - FLAMEGATE_MAX_BODY_MB: Largest accepted ingest body in MB, 0 for no limit (default: 0)
//! - RUST_LOG: Log level (default: info)

use flamegate::api::{run_server, ServerConfig};
use std::str::FromStr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flamegate=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let defaults = ServerConfig::default();
    let config = ServerConfig {
        host: std::env::var("FLAMEGATE_HOST").unwrap_or(defaults.host),
        port: env_or("FLAMEGATE_PORT", defaults.port),
        max_memory_bytes: env_or("FLAMEGATE_MAX_MEMORY_MB", defaults.max_memory_bytes / (1024 * 1024))
            * 1024
            * 1024,
        default_sample_rate: env_or("FLAMEGATE_DEFAULT_SAMPLE_RATE", defaults.default_sample_rate)
            .max(1),
        scratch_buffer_bytes: env_or("FLAMEGATE_SCRATCH_BUFFER_KB", defaults.scratch_buffer_bytes / 1024)
            * 1024,
        max_idle_buffers: env_or("FLAMEGATE_MAX_IDLE_BUFFERS", defaults.max_idle_buffers),
        max_body_bytes: env_or("FLAMEGATE_MAX_BODY_MB", defaults.max_body_bytes / (1024 * 1024))
            * 1024
            * 1024,
    };

    tracing::info!("flamegate configuration:");
    tracing::info!("  Host: {}:{}", config.host, config.port);
    tracing::info!(
        "  Max memory: {} MB",
        config.max_memory_bytes / (1024 * 1024)
    );
    tracing::info!("  Default sample rate: {}", config.default_sample_rate);
    tracing::info!(
        "  Scratch buffers: {} KB, up to {} idle",
        config.scratch_buffer_bytes / 1024,
        config.max_idle_buffers
    );
    match config.max_body_bytes {
        0 => tracing::info!("  Max body: unlimited"),
        max => tracing::info!("  Max body: {} MB", max / (1024 * 1024)),
    }

    run_server(config).await
}
