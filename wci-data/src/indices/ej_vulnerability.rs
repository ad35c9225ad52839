//! EJ Vulnerability: drinking-water exposure of the population, weighted by
//! the state's equity profile. Higher = worse.
//!
//! | component | weight |
//! |---|---|
//! | population-weighted violation + enforcement exposure | 0.40 |
//! | population share served by systems with health-based violations | 0.25 |
//! | state equity baseline | 0.35 |
//!
//! The equity baseline blends low-income share (0.5, saturating at 40%),
//! minority share (0.3, at 80%) and linguistic isolation (0.2, at 10%).

use super::{
    baseline_fallback, count_trend, finish, population_weighted, scaled, split_recent_prior,
    weighted, weighted_violations_by_system, ScoringContext, TREND_GATE,
};
use crate::confidence::{
    calculate_confidence, Benchmark, Evidence, ENFORCEMENT_WINDOW_MONTHS, TREND_WINDOW_MONTHS,
};
use std::collections::HashSet;
use wci_core::baseline::StateEquity;
use wci_core::bundle::{DrinkingWaterRecords, UnitDataBundle};
use wci_core::records::DrinkingWaterViolation;
use wci_core::score::{IndexScore, Trend};

pub const BENCHMARK: Benchmark = Benchmark {
    expected_points: 8,
    expected_sources: 2,
    window_months: TREND_WINDOW_MONTHS,
};

const EXPOSURE_FULL_SCALE: f64 = 5.0;

const LOW_INCOME_FULL_SCALE: f64 = 40.0;
const MINORITY_FULL_SCALE: f64 = 80.0;
const LINGUISTIC_ISOLATION_FULL_SCALE: f64 = 10.0;

pub fn calculate(bundle: &UnitDataBundle, ctx: &ScoringContext) -> IndexScore {
    let dw = &bundle.drinking_water;
    if dw.systems.is_empty() {
        return IndexScore::no_evidence(ctx.now);
    }

    let violations: Vec<&DrinkingWaterViolation> = dw
        .violations
        .iter()
        .filter(|v| ctx.within(&v.date, TREND_WINDOW_MONTHS))
        .collect();
    let enforcement: Vec<_> = dw
        .enforcement
        .iter()
        .filter(|e| ctx.within(&e.date, TREND_WINDOW_MONTHS))
        .collect();

    let mut evidence = Evidence::default();
    evidence
        .undated(dw.systems.len())
        .dated(violations.iter().map(|v| v.date))
        .dated(enforcement.iter().map(|e| e.date))
        .source(true);

    let Some(equity) = ctx.baselines.equity(&bundle.unit.state) else {
        log::debug!(
            "[WCI] ej_vulnerability: no equity baseline for {}",
            bundle.unit.state
        );
        return baseline_fallback(&BENCHMARK, &evidence, ctx);
    };
    evidence.source(true);

    let mut exposure_by_system = weighted_violations_by_system(violations.iter().copied());
    for action in &enforcement {
        *exposure_by_system.entry(action.pwsid.as_str()).or_default() += 1.0;
    }
    let exposure = scaled(
        population_weighted(dw, &exposure_by_system),
        EXPOSURE_FULL_SCALE,
    );

    let raw = weighted(&[
        (0.40, exposure),
        (0.25, health_based_share(dw, &violations)),
        (0.35, equity_score(equity)),
    ]);
    let confidence = calculate_confidence(&BENCHMARK, &evidence, ctx.today());

    let trend = if violations.len() < TREND_GATE {
        Trend::Unknown
    } else {
        let (recent, prior) = split_recent_prior(
            violations.iter().map(|v| &v.date),
            ctx,
            ENFORCEMENT_WINDOW_MONTHS,
        );
        count_trend(recent, prior)
    };

    finish(raw, confidence, trend, &evidence, ctx)
}

/// State equity profile as a 0-100 vulnerability score.
pub fn equity_score(equity: &StateEquity) -> f64 {
    0.5 * scaled(equity.low_income_pct, LOW_INCOME_FULL_SCALE)
        + 0.3 * scaled(equity.minority_pct, MINORITY_FULL_SCALE)
        + 0.2 * scaled(equity.linguistic_isolation_pct, LINGUISTIC_ISOLATION_FULL_SCALE)
}

/// Percent of the served population on systems with a health-based
/// violation. Counts systems when no population is reported.
fn health_based_share(dw: &DrinkingWaterRecords, violations: &[&DrinkingWaterViolation]) -> f64 {
    let affected: HashSet<&str> = violations
        .iter()
        .filter(|v| v.health_based)
        .map(|v| v.pwsid.as_str())
        .collect();
    let population = dw.population_served();
    if population == 0 {
        let hit = dw
            .systems
            .iter()
            .filter(|s| affected.contains(s.pwsid.as_str()))
            .count();
        return 100.0 * hit as f64 / dw.systems.len().max(1) as f64;
    }
    let exposed: u64 = dw
        .systems
        .iter()
        .filter(|s| affected.contains(s.pwsid.as_str()))
        .map(|s| s.population_served)
        .sum();
    100.0 * exposed as f64 / population as f64
}
