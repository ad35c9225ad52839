//! Ecological Health: ecological stress on the unit's waters, weighted by
//! the state's sensitivity. Higher = worse.

use super::{
    baseline_fallback, distinct_causes, finish, impaired_fraction, impairment_trend, scaled,
    tmdl_coverage, weighted, ScoringContext, NEUTRAL,
};
use crate::confidence::{calculate_confidence, Benchmark, Evidence, TREND_WINDOW_MONTHS};
use wci_core::baseline::StateSpecies;
use wci_core::bundle::UnitDataBundle;
use wci_core::score::IndexScore;

pub const BENCHMARK: Benchmark = Benchmark {
    expected_points: 10,
    expected_sources: 2,
    window_months: TREND_WINDOW_MONTHS,
};

const TE_FULL_SCALE: f64 = 80.0;
const TOTAL_SPECIES_FULL_SCALE: f64 = 200.0;
const CRITICAL_HABITAT_FULL_SCALE: f64 = 80.0;

/// Distinct causes treated as maximally complex.
const CAUSE_COMPLEXITY_SATURATION: f64 = 10.0;

pub fn calculate(bundle: &UnitDataBundle, ctx: &ScoringContext) -> IndexScore {
    let waterbodies = &bundle.waterbodies;
    let species = ctx.baselines.species(&bundle.unit.state);

    let mut evidence = Evidence::default();
    evidence
        .dated(waterbodies.iter().filter_map(|w| w.assessed_on))
        .undated(waterbodies.iter().filter(|w| w.assessed_on.is_none()).count())
        .source(!waterbodies.is_empty())
        .source(species.is_some());

    if waterbodies.is_empty() && species.is_none() {
        return IndexScore::no_evidence(ctx.now);
    }
    let Some(species) = species else {
        log::debug!(
            "[WCI] ecological_health: no species baseline for {}",
            bundle.unit.state
        );
        return baseline_fallback(&BENCHMARK, &evidence, ctx);
    };

    let impairment = match impaired_fraction(waterbodies) {
        Some(fraction) => {
            let complexity = (distinct_causes(waterbodies) as f64 / CAUSE_COMPLEXITY_SATURATION).min(1.0);
            100.0 * (0.7 * fraction + 0.3 * complexity)
        }
        None => NEUTRAL,
    };
    let tmdl_gap = if waterbodies.is_empty() {
        NEUTRAL
    } else {
        tmdl_coverage(waterbodies).map(|c| 100.0 - c).unwrap_or(0.0)
    };

    let raw = weighted(&[
        (0.30, scaled(species.aquatic_te_count as f64, TE_FULL_SCALE)),
        (0.15, richness(species)),
        (0.35, impairment),
        (0.20, tmdl_gap),
    ]);
    let confidence = calculate_confidence(&BENCHMARK, &evidence, ctx.today());

    finish(raw, confidence, impairment_trend(waterbodies, ctx), &evidence, ctx)
}

/// Listed-species and critical-habitat density, 0-100.
fn richness(species: &StateSpecies) -> f64 {
    let total = (species.total_listed_species as f64 / TOTAL_SPECIES_FULL_SCALE).min(1.0);
    let habitat = (species.critical_habitat_count as f64 / CRITICAL_HABITAT_FULL_SCALE).min(1.0);
    100.0 * (total + habitat) / 2.0
}
