//! Load Velocity: how fast nutrient loading is rising. Higher = worse.
//!
//! | component | weight |
//! |---|---|
//! | TN trend slope | 0.30 |
//! | TP trend slope | 0.30 |
//! | threshold proximity | 0.20 |
//! | nutrient-DMR exceedance rate, 12 months | 0.20 |
//!
//! Fewer than three TN/TP samples caps confidence at 30.

use super::{finish, rate, weighted, ScoringContext, FALLBACK_CONFIDENCE_CAP, NEUTRAL, TREND_GATE};
use crate::confidence::{
    calculate_confidence, Benchmark, Evidence, ENFORCEMENT_WINDOW_MONTHS, TREND_WINDOW_MONTHS,
};
use crate::regression::{least_squares, mean, median};
use wci_core::bundle::UnitDataBundle;
use wci_core::parameter::Nutrient;
use wci_core::records::{DmrRecord, WaterQualitySample};
use wci_core::score::{IndexScore, Trend};
use wci_utils::dates::age_in_days;

pub const BENCHMARK: Benchmark = Benchmark {
    expected_points: 20,
    expected_sources: 2,
    window_months: TREND_WINDOW_MONTHS,
};

/// Yearly change, as a fraction of the threshold, that saturates the slope
/// score at 0 or 100.
const FULL_SCALE_SLOPE: f64 = 0.5;

/// Yearly relative change treated as flat.
const TREND_SLOPE_BAND: f64 = 0.05;

const DAYS_PER_YEAR: f64 = 365.25;

pub fn calculate(bundle: &UnitDataBundle, ctx: &ScoringContext) -> IndexScore {
    let samples: Vec<(&WaterQualitySample, Nutrient)> = bundle
        .samples
        .iter()
        .filter(|s| ctx.within(&s.date, TREND_WINDOW_MONTHS))
        .filter_map(|s| s.nutrient().map(|n| (s, n)))
        .collect();
    let dmrs: Vec<&DmrRecord> = bundle
        .permits
        .nutrient_dmrs()
        .filter(|d| ctx.within(&d.date, ENFORCEMENT_WINDOW_MONTHS))
        .collect();

    if samples.is_empty() && dmrs.is_empty() {
        return IndexScore::no_evidence(ctx.now);
    }

    let tn_slope = relative_slope(&samples, Nutrient::Nitrogen, ctx);
    let tp_slope = relative_slope(&samples, Nutrient::Phosphorus, ctx);
    let proximity = threshold_proximity(&samples, ctx).unwrap_or(NEUTRAL);
    let exceedance = rate(
        dmrs.iter().filter(|d| d.is_exceedance()).count(),
        dmrs.len(),
    )
    .unwrap_or(NEUTRAL);

    let raw = weighted(&[
        (0.30, tn_slope.map(slope_score).unwrap_or(NEUTRAL)),
        (0.30, tp_slope.map(slope_score).unwrap_or(NEUTRAL)),
        (0.20, proximity),
        (0.20, exceedance),
    ]);

    let mut evidence = Evidence::default();
    evidence
        .dated(samples.iter().map(|(s, _)| s.date))
        .dated(dmrs.iter().map(|d| d.date))
        .source(!samples.is_empty())
        .source(!dmrs.is_empty());
    let mut confidence = calculate_confidence(&BENCHMARK, &evidence, ctx.today());
    if samples.len() < TREND_GATE {
        confidence = confidence.min(FALLBACK_CONFIDENCE_CAP);
    }

    let trend = if samples.len() < TREND_GATE {
        Trend::Unknown
    } else {
        let slopes: Vec<f64> = [tn_slope, tp_slope].into_iter().flatten().collect();
        match mean(&slopes) {
            Some(s) if s > TREND_SLOPE_BAND => Trend::Declining,
            Some(s) if s < -TREND_SLOPE_BAND => Trend::Improving,
            _ => Trend::Stable,
        }
    };

    finish(raw, confidence, trend, &evidence, ctx)
}

/// OLS slope of concentration/threshold per year for one nutrient.
///
/// `None` with fewer than two samples.
fn relative_slope(
    samples: &[(&WaterQualitySample, Nutrient)],
    nutrient: Nutrient,
    ctx: &ScoringContext,
) -> Option<f64> {
    let today = ctx.today();
    let points: Vec<(f64, f64)> = samples
        .iter()
        .filter(|(_, n)| *n == nutrient)
        .map(|(s, _)| {
            let years = -(age_in_days(&s.date, today) as f64) / DAYS_PER_YEAR;
            (years, s.value / nutrient.threshold())
        })
        .collect();
    if points.len() < 2 {
        return None;
    }
    least_squares(&points).map(|fit| fit.slope)
}

/// 50 for a flat series, 100 at +50% of threshold per year, 0 at -50%.
fn slope_score(relative_slope: f64) -> f64 {
    (50.0 + 50.0 * relative_slope / FULL_SCALE_SLOPE).clamp(0.0, 100.0)
}

/// Worst median/threshold ratio over the last 12 months, as 0-100.
fn threshold_proximity(samples: &[(&WaterQualitySample, Nutrient)], ctx: &ScoringContext) -> Option<f64> {
    [Nutrient::Nitrogen, Nutrient::Phosphorus]
        .into_iter()
        .filter_map(|nutrient| {
            let values: Vec<f64> = samples
                .iter()
                .filter(|(s, n)| *n == nutrient && ctx.within(&s.date, ENFORCEMENT_WINDOW_MONTHS))
                .map(|(s, _)| s.value)
                .collect();
            median(&values).map(|m| m / nutrient.threshold())
        })
        .reduce(f64::max)
        .map(|ratio| (ratio * 100.0).min(100.0))
}
