//! Deadline Cache soak driver
//!
//! Hammers one shared cache from several workers and reports its statistics.
//!
//! # Environment Variables
//! Cache settings come from [`CacheConfig::from_env`]. In addition:
//! - `SOAK_WORKERS` - Number of concurrent workers (default: 4)
//! - `SOAK_SECONDS` - How long to run (default: 10)
//! - `SOAK_KEYSPACE` - Number of distinct keys the workers cycle through (default: 4096)

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinSet;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deadline_cache::{Cache, CacheConfig};

/// Soak run parameters.
#[derive(Debug, Clone)]
struct SoakConfig {
    workers: usize,
    duration: Duration,
    keyspace: u64,
}

impl SoakConfig {
    fn from_env() -> Self {
        Self {
            workers: env_or("SOAK_WORKERS", 4),
            duration: Duration::from_secs(env_or("SOAK_SECONDS", 10)),
            keyspace: env_or("SOAK_KEYSPACE", 4096).max(1),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Main entry point for the soak driver.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load cache and soak configuration from environment variables
/// 3. Spawn workers issuing a mix of set/get/del against one cache
/// 4. Stop on timeout or SIGINT/SIGTERM and print the final statistics
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deadline_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CacheConfig::from_env();
    let soak = SoakConfig::from_env();
    info!(
        "Configuration loaded: capacity={}, ttl={}ms, reset_on_access={}, workers={}, duration={:?}",
        config.capacity,
        config.ttl.num_milliseconds(),
        config.reset_on_access,
        soak.workers,
        soak.duration
    );

    let cache: Cache<u64, u64> =
        Cache::with_config(config).context("cache configuration rejected")?;

    let mut workers = JoinSet::new();
    for worker in 0..soak.workers {
        workers.spawn(run_worker(cache.clone(), worker as u64, soak.keyspace));
    }

    tokio::select! {
        _ = tokio::time::sleep(soak.duration) => {
            info!("Soak duration elapsed");
        }
        _ = shutdown_signal() => {
            warn!("Soak interrupted");
        }
    }
    workers.shutdown().await;

    let stats = cache.stats().await;
    info!(
        "Soak finished: hit_rate={:.3}, evictions={}, expirations={}",
        stats.hit_rate(),
        stats.evictions,
        stats.expirations
    );
    println!("{}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}

/// One worker: walks the keyspace with a stride unique to the worker so that
/// workers overlap on some keys and not others.
async fn run_worker(cache: Cache<u64, u64>, worker: u64, keyspace: u64) {
    let stride = 2 * worker + 1;
    let mut step: u64 = 0;
    loop {
        let key = step.wrapping_mul(stride) % keyspace;
        match step % 8 {
            0..=3 => {
                cache.get(&key).await;
            }
            4..=6 => {
                cache.set(key, step).await;
            }
            _ => {
                cache.del(&key).await;
            }
        }
        step = step.wrapping_add(1);
        if step % 256 == 0 {
            tokio::task::yield_now().await;
        }
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
