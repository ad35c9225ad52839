//! Scoring pipeline for one unit: indices, tidal adjustment, composite,
//! then history and projections.
//!
//! [`score_bundle`] is pure and safe to run on worker threads. History is
//! only touched by [`ScoredUnit::finalize`], which the orchestrator calls
//! on the task that owns the history map.

use crate::composite::{aggregate, Composite};
use crate::indices::{compute_all, ScoringContext};
use crate::projection::{append_history, projections};
use crate::tidal::apply_tidal_modifier;
use chrono::{DateTime, Utc};
use wci_core::bundle::UnitDataBundle;
use wci_core::score::{CompositeResult, IndexSet, ScoreHistoryEntry};
use wci_core::unit::WatershedUnit;

/// A unit's scores before history and projections are attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredUnit {
    pub unit: WatershedUnit,
    pub indices: IndexSet,
    pub composite: Composite,
    pub coastal: bool,
    pub scored_at: DateTime<Utc>,
}

pub fn score_bundle(bundle: &UnitDataBundle, ctx: &ScoringContext) -> ScoredUnit {
    let coastal = bundle.is_coastal();
    let mut indices = compute_all(bundle, ctx);
    apply_tidal_modifier(&mut indices, coastal);
    let composite = aggregate(&indices);
    ScoredUnit {
        unit: bundle.unit.clone(),
        indices,
        composite,
        coastal,
        scored_at: ctx.now,
    }
}

impl ScoredUnit {
    /// Append this run's composite to `history` and build the result.
    pub fn finalize(self, history: &mut Vec<ScoreHistoryEntry>) -> CompositeResult {
        append_history(history, self.composite.value, self.scored_at);
        self.into_result(history)
    }

    /// The result this unit would get, leaving `history` untouched.
    pub fn preview(self, history: &[ScoreHistoryEntry]) -> CompositeResult {
        let mut scratch = history.to_vec();
        self.finalize(&mut scratch)
    }

    fn into_result(self, history: &[ScoreHistoryEntry]) -> CompositeResult {
        let (projection_7d, projection_30d) =
            projections(history, self.composite.confidence, self.scored_at);
        CompositeResult {
            unit: self.unit.code,
            state: self.unit.state,
            indices: self.indices,
            composite: self.composite.value,
            composite_confidence: self.composite.confidence,
            coastal: self.coastal,
            projection_7d,
            projection_30d,
            last_calculated: self.scored_at,
        }
    }
}
