//! Command implementations for the WCI CLI.
//!
//! `run` is the idempotent batch operation an external scheduler triggers;
//! `score` and `show` inspect a single unit.

use chrono::Utc;
use clap::Subcommand;
use std::sync::Arc;
use wci_db::Database;
use wci_store::{DurableCache, HttpObjectStore, LocalFileStore, RunLease};

pub mod batch;
pub mod config;
pub mod inspect;

use batch::{BatchContext, BatchOptions, RunOutcome};
use config::Settings;

/// The production cache: local files plus an optional HTTP object store.
pub type StoreCache = DurableCache<LocalFileStore, HttpObjectStore>;

#[derive(Subcommand)]
pub enum Command {
    /// Score every watershed unit and persist results to both tiers
    Run,

    /// Score one unit from the current caches and print it without persisting
    Score {
        /// 8-digit HUC code of the unit
        #[arg(short, long)]
        unit: String,
    },

    /// Print the persisted result and score history of one unit
    Show {
        /// 8-digit HUC code of the unit
        #[arg(short, long)]
        unit: String,
    },
}

pub async fn run(command: Command, settings: &Settings) -> anyhow::Result<()> {
    match command {
        Command::Run => {
            let ctx = open_context(settings)?;
            let cache = open_cache(settings);
            settings.batch.validate()?;
            let lease = RunLease::new(settings.lease_path(), settings.batch.lease_ttl()?);
            let options = BatchOptions {
                batch_size: settings.batch.batch_size,
                time_budget: settings.batch.time_budget(),
            };
            match batch::run_batch(&ctx, &cache, &lease, &options, Utc::now()).await? {
                RunOutcome::Completed(summary) => {
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                }
                RunOutcome::LockContended { holder, expires_at } => {
                    println!("Run skipped: lease held by {} until {}", holder, expires_at);
                }
            }
            Ok(())
        }
        Command::Score { unit } => {
            let ctx = open_context(settings)?;
            let cache = open_cache(settings);
            let result = inspect::score_unit(&ctx, &cache, &unit, Utc::now()).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Command::Show { unit } => {
            let cache = open_cache(settings);
            let report = inspect::show_unit(&cache, &unit).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

/// Load the geo reference, baselines and source-cache snapshots.
pub fn open_context(settings: &Settings) -> anyhow::Result<BatchContext> {
    let geography = settings.geo_reference()?;
    let baselines = settings.baselines()?;
    let db = Database::open_snapshot_dir(&settings.paths.source_cache_dir)?;
    Ok(BatchContext::new(geography, Arc::new(db), baselines))
}

pub fn open_cache(settings: &Settings) -> StoreCache {
    let fast = LocalFileStore::new(&settings.paths.local_store_dir);
    let durable = settings
        .remote
        .base_url
        .as_deref()
        .map(|url| HttpObjectStore::new(url, settings.remote.token()));
    DurableCache::new(fast, durable)
}
