//! `reefctl`: operator tool for a sharded Reef cache.
//!
//! Inspects key placement on the configured ring, checks the ring's balance,
//! and exercises the populate-once write path.
//!
//! # Usage
//!
//! ```text
//! reefctl route user:1 user:2                # owning instance per key
//! reefctl -c reef.toml distribution -n 50000 # ring balance
//! reefctl bench --keys 200 --writers 16      # in-memory contention run
//! reefctl probe user:1                       # live lookup (feature "redis")
//! ```

mod bench;
mod config;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use reef_placement::Ring;
use tracing::info;

use config::CliConfig;

// -----------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "reefctl",
    version,
    about = "Operator tool for a sharded Reef cache"
)]
struct Cli {
    /// Path to TOML config file.
    #[arg(short, long, global = true, env = "REEF_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the instance owning each key.
    Route {
        /// Keys to resolve.
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Hash synthetic keys and report how they spread over the instances.
    Distribution {
        /// Number of keys to hash.
        #[arg(short = 'n', long, default_value = "100000")]
        count: usize,
    },

    /// Race populate-once writers against in-memory instances.
    Bench {
        /// Number of distinct keys.
        #[arg(long, default_value = "100")]
        keys: usize,

        /// Concurrent writers per key.
        #[arg(long, default_value = "8")]
        writers: usize,

        /// Maximum injected latency per store call, in milliseconds.
        #[arg(long, default_value = "2")]
        latency_ms: u64,
    },

    /// Look keys up on the live instances.
    #[cfg(feature = "redis")]
    Probe {
        /// Keys to look up.
        #[arg(required = true)]
        keys: Vec<String>,
    },
}

// -----------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref()).context("failed to load config")?;

    setup_tracing(&config.log.level, config.log.span_timings);
    info!(
        instances = ?config.instance_addrs(),
        vnodes = config.ring.vnodes,
        timeout = ?config.timeout(),
        auth = config.password().is_some(),
        "loaded config"
    );

    match cli.command {
        Commands::Route { keys } => cmd_route(&config, &keys),
        Commands::Distribution { count } => cmd_distribution(&config, count),
        Commands::Bench {
            keys,
            writers,
            latency_ms,
        } => cmd_bench(&config, keys, writers, latency_ms).await,
        #[cfg(feature = "redis")]
        Commands::Probe { keys } => cmd_probe(&config, &keys).await,
    }
}

fn setup_tracing(level: &str, span_timings: bool) {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt::format::FmtSpan;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let span_events = if span_timings {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(span_events)
        .init();
}

/// Ring over the configured instance addresses.
fn address_ring(config: &CliConfig) -> Result<Ring<String>> {
    Ok(Ring::new(config.instance_addrs(), config.ring.vnodes)?)
}

// -----------------------------------------------------------------------
// reefctl route
// -----------------------------------------------------------------------

fn cmd_route(config: &CliConfig, keys: &[String]) -> Result<()> {
    let ring = address_ring(config)?;
    let width = keys.iter().map(String::len).max().unwrap_or(0);
    for key in keys {
        let ordinal = ring.resolve_index(key);
        println!("{key:<width$}  #{ordinal}  {}", ring.resolve(key));
    }
    Ok(())
}

// -----------------------------------------------------------------------
// reefctl distribution
// -----------------------------------------------------------------------

fn cmd_distribution(config: &CliConfig, count: usize) -> Result<()> {
    let ring = address_ring(config)?;
    let keys: Vec<String> = (0..count).map(|i| format!("key-{i}")).collect();
    let counts = ring.distribution(keys.iter().map(String::as_str));

    println!("Reef ring distribution");
    println!("  instances: {}", ring.instance_count());
    println!("  keys:      {count}");
    println!();
    for (ordinal, (addr, owned)) in ring.instances().iter().zip(&counts).enumerate() {
        let share = if count == 0 {
            0.0
        } else {
            *owned as f64 * 100.0 / count as f64
        };
        println!("  #{ordinal:<3} {addr:<24} {owned:>9} keys  {share:5.1}%");
    }

    let expected = ring.instance_count() * usize::from(ring.vnodes_per_instance());
    let collisions = expected - ring.vnode_count();
    println!();
    println!(
        "  vnodes:    {} of {expected} ({collisions} position collisions)",
        ring.vnode_count()
    );
    Ok(())
}

// -----------------------------------------------------------------------
// reefctl bench
// -----------------------------------------------------------------------

async fn cmd_bench(
    config: &CliConfig,
    keys: usize,
    writers: usize,
    latency_ms: u64,
) -> Result<()> {
    let params = bench::BenchParams {
        instances: config.cluster.hosts.len(),
        vnodes: config.ring.vnodes,
        keys,
        writers,
        latency_ms,
    };

    println!("Reef populate-once benchmark");
    println!("  instances: {}", params.instances);
    println!("  keys:      {keys}");
    println!("  writers:   {writers} per key");
    println!("  latency:   0-{latency_ms} ms per call");
    println!();

    info!(?params, "starting contention run");
    let report = bench::run(params, config.facade_config()).await?;

    let writes = keys * writers;
    println!(
        "Finished {writes} writes in {:.2}s ({:.0} writes/s)",
        report.elapsed.as_secs_f64(),
        writes as f64 / report.elapsed.as_secs_f64().max(f64::EPSILON)
    );
    for (ordinal, owned) in report.keys_per_instance.iter().enumerate() {
        println!("  instance #{ordinal}: {owned} keys");
    }

    let violations = report.violations();
    if !violations.is_empty() {
        for k in &violations {
            println!(
                "  {}: {} winners",
                bench::bench_key(*k),
                report.winners_per_key[*k]
            );
        }
        bail!("{} keys did not have exactly one winner", violations.len());
    }
    println!("Every key populated exactly once.");
    Ok(())
}

// -----------------------------------------------------------------------
// reefctl probe
// -----------------------------------------------------------------------

#[cfg(feature = "redis")]
async fn cmd_probe(config: &CliConfig, keys: &[String]) -> Result<()> {
    use std::sync::Arc;

    use reef_cache::CacheFacade;
    use reef_store::{CacheStore, RedisLock, RedisStore};

    let mut stores: Vec<Arc<dyn CacheStore>> = Vec::new();
    for endpoint in config.endpoints() {
        let store = RedisStore::connect(endpoint.clone(), config.timeout())
            .await
            .with_context(|| format!("failed to connect to {endpoint}"))?;
        store.ping().await?;
        stores.push(Arc::new(store));
    }
    let lock_endpoint = config.lock_endpoint()?;
    let locks = RedisLock::connect(lock_endpoint.clone(), config.timeout())
        .await
        .with_context(|| format!("failed to connect to lock service {lock_endpoint}"))?;

    let facade = CacheFacade::from_stores(
        stores,
        config.ring.vnodes,
        Arc::new(locks),
        config.facade_config(),
    )?;

    for key in keys {
        let ordinal = facade.ring().resolve_index(key);
        let exists = facade.has_key(key).await?;
        let len = match facade.list_len(key).await {
            Ok(len) => len.to_string(),
            Err(_) => "-".to_string(),
        };
        println!("{key}  #{ordinal}  exists={exists}  list_len={len}");
    }
    Ok(())
}
