//! Infrastructure Failure: drinking-water system distress. Higher = worse.
//!
//! Components: violation density (0.30), health-based violation ratio (0.25),
//! enforcement frequency (0.20), population-weighted severity (0.15) and
//! permit inspection failure rate (0.10). Groundwater-dependent units get a
//! multiplier of up to 1.10.

use super::{
    count_trend, finish, population_weighted, rate, scaled, split_recent_prior,
    violation_weight, weighted, weighted_violations_by_system, ScoringContext, NEUTRAL,
    TREND_GATE,
};
use crate::confidence::{
    calculate_confidence, Benchmark, Evidence, ENFORCEMENT_WINDOW_MONTHS, TREND_WINDOW_MONTHS,
};
use wci_core::bundle::UnitDataBundle;
use wci_core::records::WaterSource;
use wci_core::score::{IndexScore, Trend};

pub const BENCHMARK: Benchmark = Benchmark {
    expected_points: 30,
    expected_sources: 3,
    window_months: TREND_WINDOW_MONTHS,
};

/// Weighted violations per system that saturate the density component.
const DENSITY_FULL_SCALE: f64 = 5.0;

/// Enforcement actions per system per year that saturate the component.
const ENFORCEMENT_FULL_SCALE: f64 = 2.0;

const SEVERITY_FULL_SCALE: f64 = 5.0;

const HEALTH_BASED_AMPLIFIER: f64 = 1.5;

/// Extra weight at full groundwater dependence.
const GROUNDWATER_UPLIFT: f64 = 0.10;

pub fn calculate(bundle: &UnitDataBundle, ctx: &ScoringContext) -> IndexScore {
    let dw = &bundle.drinking_water;
    let violations: Vec<_> = dw
        .violations
        .iter()
        .filter(|v| ctx.within(&v.date, TREND_WINDOW_MONTHS))
        .collect();
    let enforcement: Vec<_> = dw
        .enforcement
        .iter()
        .filter(|e| ctx.within(&e.date, ENFORCEMENT_WINDOW_MONTHS))
        .collect();
    let inspections: Vec<_> = bundle
        .permits
        .inspections
        .iter()
        .filter(|i| ctx.within(&i.date, TREND_WINDOW_MONTHS))
        .collect();

    if dw.systems.is_empty() && violations.is_empty() && inspections.is_empty() {
        return IndexScore::no_evidence(ctx.now);
    }

    let systems = dw.systems.len().max(1) as f64;
    let weighted_total: f64 = violations.iter().map(|v| violation_weight(v)).sum();
    let density = scaled(weighted_total / systems, DENSITY_FULL_SCALE);

    let health_based = violations.iter().filter(|v| v.health_based).count();
    let health_ratio = rate(health_based, violations.len())
        .map(|r| {
            if health_based > 0 {
                (r * HEALTH_BASED_AMPLIFIER).min(100.0)
            } else {
                r
            }
        })
        .unwrap_or(0.0);

    let enforcement_score = scaled(enforcement.len() as f64 / systems, ENFORCEMENT_FULL_SCALE);

    let by_system = weighted_violations_by_system(violations.iter().copied());
    let severity = scaled(population_weighted(dw, &by_system), SEVERITY_FULL_SCALE);

    let inspection_failure = rate(
        inspections.iter().filter(|i| !i.compliant).count(),
        inspections.len(),
    )
    .unwrap_or(NEUTRAL);

    let base = weighted(&[
        (0.30, density),
        (0.25, health_ratio),
        (0.20, enforcement_score),
        (0.15, severity),
        (0.10, inspection_failure),
    ]);
    let raw = base * (1.0 + GROUNDWATER_UPLIFT * groundwater_fraction(bundle));

    let mut evidence = Evidence::default();
    evidence
        .undated(dw.systems.len())
        .dated(violations.iter().map(|v| v.date))
        .dated(enforcement.iter().map(|e| e.date))
        .dated(inspections.iter().map(|i| i.date))
        .source(!dw.systems.is_empty())
        .source(!violations.is_empty() || !enforcement.is_empty())
        .source(!inspections.is_empty());
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

/// Share of systems drawing on groundwater, 0..1.
fn groundwater_fraction(bundle: &UnitDataBundle) -> f64 {
    let systems = &bundle.drinking_water.systems;
    if systems.is_empty() {
        return 0.0;
    }
    let groundwater = systems
        .iter()
        .filter(|s| s.source == WaterSource::Groundwater)
        .count();
    groundwater as f64 / systems.len() as f64
}
