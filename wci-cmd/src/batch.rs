//! The batch run: score every known unit and persist the results.
//!
//! Units are scored in fixed-size batches. Within a batch each unit's
//! collect and score step runs on the blocking pool; history and the result
//! map are only touched here, on the orchestrating task. The time budget is
//! checked between batches, and whatever completed before it ran out is
//! still persisted.

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use wci_core::baseline::Baselines;
use wci_core::score::{HistoryMap, IndicesMap};
use wci_core::source::SourceCaches;
use wci_core::unit::GeoReference;
use wci_data::collector::collect_unit;
use wci_data::indices::ScoringContext;
use wci_data::pipeline::{score_bundle, ScoredUnit};
use wci_store::{DurableCache, LeaseError, ObjectStore, RunLease};

/// Everything a unit needs to be scored. Cheap to clone.
#[derive(Clone)]
pub struct BatchContext {
    pub geography: Arc<GeoReference>,
    pub caches: Arc<dyn SourceCaches>,
    pub baselines: Arc<Baselines>,
}

impl BatchContext {
    pub fn new(geography: GeoReference, caches: Arc<dyn SourceCaches>, baselines: Baselines) -> Self {
        BatchContext {
            geography: Arc::new(geography),
            caches,
            baselines: Arc::new(baselines),
        }
    }

    /// Collect and score one unit. `Ok(None)` when it has no geography.
    pub fn score_unit(&self, code: &str, now: DateTime<Utc>) -> anyhow::Result<Option<ScoredUnit>> {
        let Some(bundle) = collect_unit(code, &self.geography, self.caches.as_ref())? else {
            return Ok(None);
        };
        let ctx = ScoringContext::new(now, &self.baselines);
        Ok(Some(score_bundle(&bundle, &ctx)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchOptions {
    pub batch_size: usize,
    pub time_budget: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        BatchOptions {
            batch_size: 10,
            time_budget: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub skipped_missing_geography: usize,
    pub failed: usize,
    /// Units never attempted because the time budget ran out.
    pub not_attempted: usize,
    pub timed_out: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(RunSummary),
    /// Another run holds the lease; nothing was written.
    LockContended {
        holder: String,
        expires_at: DateTime<Utc>,
    },
}

/// Acquire the lease, score and persist, then release the lease.
///
/// Lease contention is not an error. Persistence failures are.
pub async fn run_batch<F, D>(
    ctx: &BatchContext,
    cache: &DurableCache<F, D>,
    lease: &RunLease,
    options: &BatchOptions,
    now: DateTime<Utc>,
) -> anyhow::Result<RunOutcome>
where
    F: ObjectStore,
    D: ObjectStore,
{
    let guard = match lease.acquire(now).await {
        Ok(guard) => guard,
        Err(LeaseError::Held { holder, expires_at }) => {
            warn!("[WCI] batch: run lease held by {} until {}, skipping run", holder, expires_at);
            return Ok(RunOutcome::LockContended { holder, expires_at });
        }
        Err(LeaseError::Store(e)) => return Err(e.into()),
    };

    let result = score_and_persist(ctx, cache, options, now).await;

    if let Err(e) = guard.release().await {
        warn!("[WCI] batch: failed to release run lease: {}", e);
    }
    result.map(RunOutcome::Completed)
}

async fn score_and_persist<F, D>(
    ctx: &BatchContext,
    cache: &DurableCache<F, D>,
    options: &BatchOptions,
    now: DateTime<Utc>,
) -> anyhow::Result<RunSummary>
where
    F: ObjectStore,
    D: ObjectStore,
{
    let started = Instant::now();
    let mut indices = cache.load_indices().await?;
    let mut history = cache.load_history().await?;

    let codes = ctx.geography.all_unit_codes();
    let batch_size = options.batch_size.max(1);
    let batch_count = codes.len().div_ceil(batch_size);
    info!(
        "[WCI] batch: scoring {} units in {} batches of {} ({} prior results)",
        codes.len(),
        batch_count,
        batch_size,
        indices.len()
    );

    let mut summary = RunSummary::default();
    for (n, chunk) in codes.chunks(batch_size).enumerate() {
        if started.elapsed() >= options.time_budget {
            summary.timed_out = true;
            summary.not_attempted = codes.len() - n * batch_size;
            warn!(
                "[WCI] batch: time budget of {:?} spent after {} batches, {} units left for next run",
                options.time_budget, n, summary.not_attempted
            );
            break;
        }
        info!("[WCI] batch: batch {}/{} ({} units)", n + 1, batch_count, chunk.len());
        run_one_batch(ctx, chunk, now, &mut indices, &mut history, &mut summary).await;
    }

    cache.save_indices(&indices).await?;
    cache.save_history(&history).await?;

    summary.duration_ms = started.elapsed().as_millis() as u64;
    info!(
        "[WCI] batch: processed {}, skipped {} without geography, {} failed in {} ms",
        summary.processed, summary.skipped_missing_geography, summary.failed, summary.duration_ms
    );
    Ok(summary)
}

async fn run_one_batch(
    ctx: &BatchContext,
    codes: &[String],
    now: DateTime<Utc>,
    indices: &mut IndicesMap,
    history: &mut HistoryMap,
    summary: &mut RunSummary,
) {
    let mut tasks = JoinSet::new();
    for code in codes {
        let ctx = ctx.clone();
        let code = code.clone();
        tasks.spawn_blocking(move || {
            let scored = ctx.score_unit(&code, now);
            (code, scored)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((code, Ok(Some(scored)))) => {
                let entries = history.entry(code.clone()).or_default();
                indices.insert(code, scored.finalize(entries));
                summary.processed += 1;
            }
            Ok((code, Ok(None))) => {
                log::debug!("[WCI] batch: skipping {} (no geography)", code);
                summary.skipped_missing_geography += 1;
            }
            Ok((code, Err(e))) => {
                warn!("[WCI] batch: unit {} failed: {:#}", code, e);
                summary.failed += 1;
            }
            Err(e) => {
                warn!("[WCI] batch: unit task aborted: {}", e);
                summary.failed += 1;
            }
        }
    }
}
