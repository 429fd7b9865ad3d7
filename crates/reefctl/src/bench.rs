//! In-memory populate-once contention run.
//!
//! Many writers race `write_right_list` on each key over latency-injected
//! in-memory instances. A correct run has exactly one winner per key.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use reef_cache::{CacheFacade, CacheFacadeConfig};
use reef_store::{CacheStore, MemoryLock, MemoryStore, SlowStore};
use tracing::debug;

/// Shape of a contention run.
#[derive(Debug, Clone, Copy)]
pub struct BenchParams {
    /// Instances in the ring.
    pub instances: usize,
    /// Virtual nodes per instance.
    pub vnodes: u16,
    /// Distinct keys raced on.
    pub keys: usize,
    /// Concurrent writers per key.
    pub writers: usize,
    /// Upper bound of the injected per-call latency.
    pub latency_ms: u64,
}

/// Outcome of a contention run.
#[derive(Debug)]
pub struct BenchReport {
    /// Number of writers that populated each key, indexed by key number.
    pub winners_per_key: Vec<usize>,
    /// Keys owned by each instance, indexed by ordinal.
    pub keys_per_instance: Vec<usize>,
    /// Wall time of the whole run.
    pub elapsed: Duration,
}

impl BenchReport {
    /// Keys that did not end up with exactly one winner.
    pub fn violations(&self) -> Vec<usize> {
        self.winners_per_key
            .iter()
            .enumerate()
            .filter(|&(_, &winners)| winners != 1)
            .map(|(key, _)| key)
            .collect()
    }
}

/// Key name used for key number `i`.
pub fn bench_key(i: usize) -> String {
    format!("bench:list:{i}")
}

/// Run the contention benchmark.
pub async fn run(params: BenchParams, config: CacheFacadeConfig) -> Result<BenchReport> {
    let memory: Vec<Arc<MemoryStore>> = (0..params.instances)
        .map(|_| Arc::new(MemoryStore::new()))
        .collect();
    let stores: Vec<Arc<dyn CacheStore>> = memory
        .iter()
        .enumerate()
        .map(|(i, store)| {
            Arc::new(
                SlowStore::new(store.clone())
                    .read_latency(0, params.latency_ms)
                    .write_latency(0, params.latency_ms)
                    .seed(i as u64),
            ) as Arc<dyn CacheStore>
        })
        .collect();
    let facade = CacheFacade::from_stores(
        stores,
        params.vnodes,
        Arc::new(MemoryLock::new()),
        config,
    )?;

    let start = Instant::now();
    let mut handles = Vec::with_capacity(params.keys * params.writers);
    for k in 0..params.keys {
        for w in 0..params.writers {
            let facade = facade.clone();
            handles.push(tokio::spawn(async move {
                let values = vec![format!("writer-{w}")];
                let written = facade.write_right_list(&bench_key(k), &values).await?;
                Ok::<_, reef_cache::CacheError>((k, written))
            }));
        }
    }

    let mut winners_per_key = vec![0usize; params.keys];
    for handle in handles {
        let (k, written) = handle.await??;
        if written > 0 {
            winners_per_key[k] += 1;
        }
    }
    let elapsed = start.elapsed();
    debug!(?elapsed, "contention run finished");

    Ok(BenchReport {
        winners_per_key,
        keys_per_instance: memory.iter().map(|store| store.len()).collect(),
        elapsed,
    })
}
