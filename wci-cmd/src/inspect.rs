//! Single-unit commands: score one unit live, or show what is persisted.

use crate::batch::BatchContext;
use chrono::{DateTime, Utc};
use serde::Serialize;
use wci_core::score::{CompositeResult, ScoreHistoryEntry};
use wci_store::{DurableCache, ObjectStore};

/// Score `code` against the current caches. Projections use the persisted
/// history, which is left unchanged.
pub async fn score_unit<F, D>(
    ctx: &BatchContext,
    cache: &DurableCache<F, D>,
    code: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<CompositeResult>
where
    F: ObjectStore,
    D: ObjectStore,
{
    let history = cache.load_history().await?;
    let scoring = ctx.clone();
    let unit = code.to_string();
    let scored = tokio::task::spawn_blocking(move || scoring.score_unit(&unit, now)).await??;
    let Some(scored) = scored else {
        anyhow::bail!("unit {} has no centroid or adjacency entry", code);
    };
    let prior = history.get(code).map(Vec::as_slice).unwrap_or_default();
    Ok(scored.preview(prior))
}

#[derive(Debug, Serialize)]
pub struct UnitReport {
    pub result: Option<CompositeResult>,
    pub history: Vec<ScoreHistoryEntry>,
}

/// The persisted result and history for `code`.
pub async fn show_unit<F, D>(cache: &DurableCache<F, D>, code: &str) -> anyhow::Result<UnitReport>
where
    F: ObjectStore,
    D: ObjectStore,
{
    let mut indices = cache.load_indices().await?;
    let mut history = cache.load_history().await?;
    let report = UnitReport {
        result: indices.remove(code),
        history: history.remove(code).unwrap_or_default(),
    };
    if report.result.is_none() && report.history.is_empty() {
        anyhow::bail!("no persisted scores for unit {}", code);
    }
    Ok(report)
}
