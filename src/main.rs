//! Sensorplot Server
//!
//! Run with: cargo run
//!
//! Environment variables:
//! - SENSORPLOT_HOST: Bind address (default: 0.0.0.0)
//! - SENSORPLOT_PORT: Port number (default: 8000)
//! - SENSORPLOT_MAX_BUCKETS: Largest accepted `width` (default: 100000)
//! - SENSORPLOT_SHARD_SECS: Time span of one storage shard (default: 3600)
//! - SENSORPLOT_SENSOR_GROUP: Group name returned by /api/sensors (default: sensors)
//! - SENSORPLOT_CACHE_ENTRIES: Response cache capacity, 0 disables (default: 1000)
//! - SENSORPLOT_CACHE_TTL_SECS: Response cache TTL (default: 30)
//! - RUST_LOG: Log level (default: info)

use sensorplot::api::{run_server, ServerConfig};
use std::str::FromStr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={:?}", name, raw);
            default
        }),
        Err(_) => default,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sensorplot=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let defaults = ServerConfig::default();

    let shard_duration_secs = env_or("SENSORPLOT_SHARD_SECS", defaults.shard_duration_secs);
    let shard_duration_secs = if shard_duration_secs.is_finite() && shard_duration_secs > 0.0 {
        shard_duration_secs
    } else {
        tracing::warn!("SENSORPLOT_SHARD_SECS must be positive, using the default");
        defaults.shard_duration_secs
    };

    let config = ServerConfig {
        host: std::env::var("SENSORPLOT_HOST").unwrap_or_else(|_| defaults.host.clone()),
        port: env_or("SENSORPLOT_PORT", defaults.port),
        max_buckets: env_or("SENSORPLOT_MAX_BUCKETS", defaults.max_buckets),
        shard_duration_secs,
        sensor_group: std::env::var("SENSORPLOT_SENSOR_GROUP")
            .unwrap_or_else(|_| defaults.sensor_group.clone()),
        cache_entries: env_or("SENSORPLOT_CACHE_ENTRIES", defaults.cache_entries),
        cache_ttl_secs: env_or("SENSORPLOT_CACHE_TTL_SECS", defaults.cache_ttl_secs),
    };

    tracing::info!("Sensorplot configuration:");
    tracing::info!("  Host: {}:{}", config.host, config.port);
    tracing::info!("  Max buckets: {}", config.max_buckets);
    tracing::info!("  Shard duration: {} seconds", config.shard_duration_secs);
    tracing::info!("  Sensor group: {}", config.sensor_group);
    if config.cache_entries > 0 {
        tracing::info!(
            "  Response cache: {} entries, {}s TTL",
            config.cache_entries,
            config.cache_ttl_secs
        );
    }

    println!(
        "\n Sensorplot: sensor time-series downsampling backend\n Version: {}\n",
        env!("CARGO_PKG_VERSION")
    );

    run_server(config).await
}
