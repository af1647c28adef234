use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::cache::ResponseCache;
use super::handlers::{data, health_check, ingest, root, sensors, status, AppState};
use crate::data::TableConfig;
use crate::query::{BucketPlanner, MAX_BUCKETS};
use crate::storage::StorageEngine;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest `width` a client may ask for
    pub max_buckets: usize,
    pub shard_duration_secs: f64,
    pub sensor_group: String,
    /// Response cache capacity; 0 disables the cache
    pub cache_entries: u64,
    pub cache_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_buckets: MAX_BUCKETS,
            shard_duration_secs: 3600.0,
            sensor_group: "sensors".to_string(),
            cache_entries: 1000,
            cache_ttl_secs: 30,
        }
    }
}

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/api/status", get(status))
        .route("/api/sensors", get(sensors))
        .route("/api/data", get(data))
        .route("/api/ingest", post(ingest))
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
    let engine = Arc::new(StorageEngine::with_config(
        TableConfig::new(config.sensor_group.as_str()).with_shard_duration(config.shard_duration_secs),
    ));

    let cache = ResponseCache::from_capacity(config.cache_entries, config.cache_ttl_secs);
    if cache.is_none() {
        tracing::info!("Response cache disabled");
    }

    let state = Arc::new(
        AppState::new(Arc::clone(&engine))
            .with_planner(BucketPlanner::new(config.max_buckets))
            .with_cache(cache)
            .with_sensor_group(config.sensor_group.clone()),
    );

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Starting sensorplot server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    engine.close();

    tracing::info!("sensorplot server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            // Without a signal handler the server runs until killed
            tracing::error!("Failed to install CTRL+C signal handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
