//! Token Key Cache - load driver
//!
//! Hammers a provider cache from many concurrent tasks with a mixed
//! get/set/remove workload and prints the resulting statistics as JSON.

use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::signal;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use token_key_cache::{CacheConfig, ProviderCache, ProviderFingerprint};

/// Number of distinct fingerprints the workload draws from, relative to capacity.
const KEY_SPACE_FACTOR: usize = 2;

/// Stand-in for an expensive signing provider.
#[derive(Debug)]
struct SimulatedProvider {
    #[allow(dead_code)]
    key_material: Vec<u8>,
}

/// Main entry point for the load driver.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load cache configuration and workload size from environment variables
/// 3. Spawn worker tasks running the mixed workload
/// 4. Wait for completion or Ctrl+C
/// 5. Print stats and shut the cache down
#[tokio::main]
async fn main() -> Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "token_key_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CacheConfig::from_env().context("loading cache configuration")?;
    let tasks: usize = env_or("LOAD_TASKS", 8)?;
    let ops_per_task: usize = env_or("LOAD_OPS", 100_000)?;
    info!(
        "Configuration loaded: capacity={}, tasks={}, ops_per_task={}",
        config.capacity, tasks, ops_per_task
    );

    let cache = Arc::new(ProviderCache::with_config(&config).context("starting cache")?);
    let key_space = config.capacity * KEY_SPACE_FACTOR;

    let started = Instant::now();
    let stop = CancellationToken::new();
    let mut workers = JoinSet::new();
    for task_id in 0..tasks {
        let cache = Arc::clone(&cache);
        let stop = stop.clone();
        workers.spawn_blocking(move || run_workload(&cache, &stop, task_id, ops_per_task, key_space));
    }

    let interrupted = tokio::select! {
        result = drain(&mut workers) => {
            result?;
            false
        }
        _ = signal::ctrl_c() => true,
    };
    if interrupted {
        warn!("Received Ctrl+C, stopping workload early");
        stop.cancel();
        drain(&mut workers).await?;
    }

    let elapsed = started.elapsed();
    let stats = cache.stats();
    info!(
        "Workload finished in {:.2?} ({:.0} ops/s), hit rate {:.1}%",
        elapsed,
        (tasks * ops_per_task) as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
        stats.hit_rate() * 100.0
    );
    println!("{}", serde_json::to_string_pretty(&stats)?);

    cache.shutdown().await;
    info!("Cache shutdown complete");
    Ok(())
}

/// One task's share of the workload: mostly lookups, building on miss.
fn run_workload(
    cache: &ProviderCache<SimulatedProvider>,
    stop: &CancellationToken,
    task_id: usize,
    ops: usize,
    key_space: usize,
) -> Result<()> {
    // Cheap deterministic spread so tasks do not march in lockstep
    let mut state = (task_id as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    for _ in 0..ops {
        if stop.is_cancelled() {
            break;
        }
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;

        let slot = (state % key_space as u64) as usize;
        let fingerprint =
            ProviderFingerprint::new("SimulatedProvider", format!("kid-{}", slot), "RS256", false);

        match state % 20 {
            0 => {
                cache.try_remove(&fingerprint)?;
            }
            1 => {
                // Rotated key material with a bounded lifetime
                let provider = Arc::new(build_provider(&fingerprint, slot)?);
                cache
                    .inner()
                    .set_with_ttl(fingerprint, provider, Duration::from_secs(60))?;
            }
            _ => {
                cache.get_or_create(&fingerprint, |fp| build_provider(fp, slot))?;
            }
        }
    }
    Ok(())
}

fn build_provider(fingerprint: &ProviderFingerprint, slot: usize) -> Result<SimulatedProvider> {
    anyhow::ensure!(
        fingerprint.algorithm == "RS256",
        "unsupported algorithm {}",
        fingerprint.algorithm
    );
    Ok(SimulatedProvider {
        key_material: vec![slot as u8; 32],
    })
}

async fn drain(workers: &mut JoinSet<Result<()>>) -> Result<()> {
    while let Some(joined) = workers.join_next().await {
        joined.context("workload task panicked")??;
    }
    Ok(())
}

fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{} has invalid value {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}
