//! Waterfront Exposure: economic value at risk from degraded water quality.
//! Higher = worse.

use super::{
    baseline_fallback, finish, impaired_fraction, level_trend, rate, scaled, weighted,
    ScoringContext, NEUTRAL, TREND_GATE,
};
use crate::confidence::{
    calculate_confidence, Benchmark, Evidence, ENFORCEMENT_WINDOW_MONTHS, TREND_WINDOW_MONTHS,
};
use crate::regression::{mean, median};
use std::collections::BTreeMap;
use wci_core::baseline::StateEconomics;
use wci_core::bundle::UnitDataBundle;
use wci_core::records::WaterQualitySample;
use wci_core::score::{IndexScore, Trend};

pub const BENCHMARK: Benchmark = Benchmark {
    expected_points: 15,
    expected_sources: 3,
    window_months: TREND_WINDOW_MONTHS,
};

/// Adjusted waterfront value, in dollars, that saturates the component.
const VALUE_CEILING: f64 = 2_000_000.0;

/// Blended severity ratio that saturates the hedonic component.
const SEVERITY_CAP: f64 = 3.0;

const WORST_PARAMETER_WEIGHT: f64 = 0.7;
const AVERAGE_PARAMETER_WEIGHT: f64 = 0.3;

pub fn calculate(bundle: &UnitDataBundle, ctx: &ScoringContext) -> IndexScore {
    let samples: Vec<&WaterQualitySample> = bundle
        .samples
        .iter()
        .filter(|s| s.threshold().is_some() && ctx.within(&s.date, TREND_WINDOW_MONTHS))
        .collect();
    let dmrs: Vec<_> = bundle
        .permits
        .nutrient_dmrs()
        .filter(|d| ctx.within(&d.date, ENFORCEMENT_WINDOW_MONTHS))
        .collect();
    let waterbodies = &bundle.waterbodies;
    let economics = ctx.baselines.economics(&bundle.unit.state);

    let mut evidence = Evidence::default();
    evidence
        .dated(samples.iter().map(|s| s.date))
        .dated(dmrs.iter().map(|d| d.date))
        .undated(waterbodies.len())
        .source(!samples.is_empty())
        .source(!dmrs.is_empty())
        .source(!waterbodies.is_empty());

    let no_records = samples.is_empty() && dmrs.is_empty() && waterbodies.is_empty();
    if no_records && economics.is_none() {
        return IndexScore::no_evidence(ctx.now);
    }
    let Some(economics) = economics else {
        log::debug!(
            "[WCI] waterfront_exposure: no economics baseline for {}",
            bundle.unit.state
        );
        return baseline_fallback(&BENCHMARK, &evidence, ctx);
    };

    let degradation = hedonic_degradation(&samples)
        .map(|ratio| scaled(ratio, SEVERITY_CAP))
        .unwrap_or(NEUTRAL);
    let impaired = impaired_fraction(waterbodies)
        .map(|f| 100.0 * f)
        .unwrap_or(NEUTRAL);
    let exceedance = rate(
        dmrs.iter().filter(|d| d.is_exceedance()).count(),
        dmrs.len(),
    )
    .unwrap_or(NEUTRAL);

    let raw = weighted(&[
        (0.30, scaled(adjusted_value(economics), VALUE_CEILING)),
        (0.35, degradation),
        (0.20, impaired),
        (0.15, exceedance),
    ]);
    let confidence = calculate_confidence(&BENCHMARK, &evidence, ctx.today());

    let trend = if samples.len() < TREND_GATE {
        Trend::Unknown
    } else {
        let (recent, prior): (Vec<&WaterQualitySample>, Vec<&WaterQualitySample>) = samples
            .iter()
            .copied()
            .partition(|s| ctx.within(&s.date, ENFORCEMENT_WINDOW_MONTHS));
        level_trend(hedonic_degradation(&recent), hedonic_degradation(&prior))
    };

    finish(raw, confidence, trend, &evidence, ctx)
}

/// Waterfront-adjusted property value for a state, in dollars.
fn adjusted_value(economics: &StateEconomics) -> f64 {
    economics.median_home_value
        * (1.0 + economics.waterfront_premium_pct / 100.0)
        * economics.proximity_factor
        * economics.water_gdp_multiplier
}

/// Blend of the worst and average per-parameter median severity ratios,
/// capped at 3.
fn hedonic_degradation(samples: &[&WaterQualitySample]) -> Option<f64> {
    let mut by_parameter: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for sample in samples {
        if let Some(threshold) = sample.threshold() {
            by_parameter
                .entry(threshold.parameter)
                .or_default()
                .push(threshold.severity_ratio(sample.value).min(SEVERITY_CAP));
        }
    }
    let medians: Vec<f64> = by_parameter.values().filter_map(|v| median(v)).collect();
    let worst = medians.iter().copied().reduce(f64::max)?;
    let average = mean(&medians)?;
    Some((WORST_PARAMETER_WEIGHT * worst + AVERAGE_PARAMETER_WEIGHT * average).min(SEVERITY_CAP))
}
