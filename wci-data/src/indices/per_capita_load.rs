//! Per-Capita Load: nutrient pressure relative to the population the unit's
//! drinking-water systems serve. Higher = worse.
//!
//! Without any served population the three per-capita components are
//! neutral and confidence is capped at 30.

use super::{
    finish, level_trend, piecewise, rate, weighted, ScoringContext, FALLBACK_CONFIDENCE_CAP,
    NEUTRAL, TREND_GATE,
};
use crate::confidence::{calculate_confidence, Benchmark, Evidence, ENFORCEMENT_WINDOW_MONTHS};
use crate::regression::mean;
use wci_core::bundle::UnitDataBundle;
use wci_core::score::{IndexScore, Trend};

pub const BENCHMARK: Benchmark = Benchmark {
    expected_points: 20,
    expected_sources: 3,
    window_months: ENFORCEMENT_WINDOW_MONTHS,
};

/// Benchmark band for mg/L (or DMR quantity) per 1,000 people.
const LOAD_LOW: f64 = 0.5;
const LOAD_HIGH: f64 = 5.0;

/// Benchmark band for permits per 10,000 people.
const PERMIT_DENSITY_LOW: f64 = 1.0;
const PERMIT_DENSITY_HIGH: f64 = 10.0;

/// Population at which the density factor reaches 2x.
const DENSITY_REFERENCE_POPULATION: f64 = 250_000.0;
const MAX_DENSITY_FACTOR: f64 = 2.0;

/// Trend compares this many recent months against the months before.
const TREND_HALF_WINDOW_MONTHS: u32 = 6;

pub fn calculate(bundle: &UnitDataBundle, ctx: &ScoringContext) -> IndexScore {
    let samples: Vec<_> = bundle
        .samples
        .iter()
        .filter(|s| s.nutrient().is_some() && ctx.within(&s.date, ENFORCEMENT_WINDOW_MONTHS))
        .collect();
    let dmrs: Vec<_> = bundle
        .permits
        .nutrient_dmrs()
        .filter(|d| ctx.within(&d.date, ENFORCEMENT_WINDOW_MONTHS))
        .collect();
    let permits = &bundle.permits.permits;
    let systems = &bundle.drinking_water.systems;

    if samples.is_empty() && dmrs.is_empty() && permits.is_empty() && systems.is_empty() {
        return IndexScore::no_evidence(ctx.now);
    }

    let population = bundle.drinking_water.population_served() as f64;
    let thousands = population / 1_000.0;

    let sample_values: Vec<f64> = samples.iter().map(|s| s.value).collect();
    let concentration = mean(&sample_values);

    let (nutrient_load, dmr_load, permit_density) = if population > 0.0 {
        let nutrient_load = concentration
            .map(|c| piecewise(c / thousands, LOAD_LOW, LOAD_HIGH))
            .unwrap_or(NEUTRAL);
        let dmr_load = if dmrs.is_empty() {
            NEUTRAL
        } else {
            let discharged: f64 = dmrs.iter().map(|d| d.value.max(0.0)).sum();
            piecewise(discharged / thousands, LOAD_LOW, LOAD_HIGH)
        };
        let per_10k = permits.len() as f64 / (population / 10_000.0);
        (
            nutrient_load,
            dmr_load,
            piecewise(per_10k, PERMIT_DENSITY_LOW, PERMIT_DENSITY_HIGH),
        )
    } else {
        (NEUTRAL, NEUTRAL, NEUTRAL)
    };

    let exceedance = rate(
        dmrs.iter().filter(|d| d.is_exceedance()).count(),
        dmrs.len(),
    )
    .or_else(|| {
        rate(
            samples.iter().filter(|s| s.is_exceedance()).count(),
            samples.len(),
        )
    });
    let density_factor = (1.0 + population / DENSITY_REFERENCE_POPULATION).min(MAX_DENSITY_FACTOR);
    let pressure = exceedance
        .map(|r| (r * density_factor).min(100.0))
        .unwrap_or(NEUTRAL);

    let raw = weighted(&[
        (0.35, nutrient_load),
        (0.25, dmr_load),
        (0.20, permit_density),
        (0.20, pressure),
    ]);

    let mut evidence = Evidence::default();
    evidence
        .dated(samples.iter().map(|s| s.date))
        .dated(dmrs.iter().map(|d| d.date))
        .undated(permits.len() + systems.len())
        .source(!samples.is_empty())
        .source(!dmrs.is_empty() || !permits.is_empty())
        .source(!systems.is_empty());
    let mut confidence = calculate_confidence(&BENCHMARK, &evidence, ctx.today());
    if population <= 0.0 {
        confidence = confidence.min(FALLBACK_CONFIDENCE_CAP);
    }

    let trend = if samples.len() < TREND_GATE {
        Trend::Unknown
    } else {
        let recent: Vec<f64> = samples
            .iter()
            .filter(|s| ctx.within(&s.date, TREND_HALF_WINDOW_MONTHS))
            .map(|s| s.value)
            .collect();
        let prior: Vec<f64> = samples
            .iter()
            .filter(|s| !ctx.within(&s.date, TREND_HALF_WINDOW_MONTHS))
            .map(|s| s.value)
            .collect();
        level_trend(mean(&recent), mean(&prior))
    };

    finish(raw, confidence, trend, &evidence, ctx)
}
