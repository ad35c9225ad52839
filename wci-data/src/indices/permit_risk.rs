//! Permit Risk Exposure: compliance risk of the discharge permits around a
//! unit. Higher = worse.

use super::{
    count_trend, finish, rate, scaled, split_recent_prior, weighted, ScoringContext, NEUTRAL,
    TREND_GATE,
};
use crate::confidence::{calculate_confidence, Benchmark, Evidence, ENFORCEMENT_WINDOW_MONTHS};
use std::collections::HashSet;
use wci_core::bundle::UnitDataBundle;
use wci_core::score::{IndexScore, Trend};

pub const BENCHMARK: Benchmark = Benchmark {
    expected_points: 25,
    expected_sources: 3,
    window_months: ENFORCEMENT_WINDOW_MONTHS,
};

/// Violations in this many recent months count double.
const RECENT_MONTHS: u32 = 6;

const VIOLATION_RATE_FULL_SCALE: f64 = 3.0;

/// Floor on the RNC component once any recent RNC is on record.
const RECENT_RNC_FLOOR: f64 = 70.0;

/// Penalty dollars equivalent to one enforcement action.
const PENALTY_PER_ACTION: f64 = 10_000.0;

/// Enforcement intensity that saturates the log scale.
const ENFORCEMENT_SATURATION: f64 = 50.0;

pub fn calculate(bundle: &UnitDataBundle, ctx: &ScoringContext) -> IndexScore {
    let records = &bundle.permits;
    let violations: Vec<_> = records
        .violations
        .iter()
        .filter(|v| ctx.within(&v.date, ENFORCEMENT_WINDOW_MONTHS))
        .collect();
    let dmrs: Vec<_> = records
        .nutrient_dmrs()
        .filter(|d| ctx.within(&d.date, ENFORCEMENT_WINDOW_MONTHS))
        .collect();
    let enforcement: Vec<_> = records
        .enforcement
        .iter()
        .filter(|e| ctx.within(&e.date, ENFORCEMENT_WINDOW_MONTHS))
        .collect();

    if records.permits.is_empty() && violations.is_empty() && dmrs.is_empty() {
        return IndexScore::no_evidence(ctx.now);
    }

    let permits = records.permits.len().max(1) as f64;

    let weighted_violations: f64 = violations
        .iter()
        .map(|v| if ctx.within(&v.date, RECENT_MONTHS) { 2.0 } else { 1.0 })
        .sum();
    let violation_rate = scaled(weighted_violations / permits, VIOLATION_RATE_FULL_SCALE);

    let rnc_permits: HashSet<&str> = violations
        .iter()
        .filter(|v| v.rnc)
        .map(|v| v.permit_id.as_str())
        .collect();
    let mut rnc_share = (100.0 * rnc_permits.len() as f64 / permits).min(100.0);
    if violations
        .iter()
        .any(|v| v.rnc && ctx.within(&v.date, RECENT_MONTHS))
    {
        rnc_share = rnc_share.max(RECENT_RNC_FLOOR);
    }

    let exceedance = rate(
        dmrs.iter().filter(|d| d.is_exceedance()).count(),
        dmrs.len(),
    )
    .unwrap_or(NEUTRAL);

    let penalties: f64 = enforcement.iter().map(|e| e.penalty.max(0.0)).sum();
    let intensity = enforcement_intensity(enforcement.len() as f64 + penalties / PENALTY_PER_ACTION);

    let raw = weighted(&[
        (0.30, violation_rate),
        (0.25, rnc_share),
        (0.25, exceedance),
        (0.20, intensity),
    ]);

    let mut evidence = Evidence::default();
    evidence
        .undated(records.permits.len())
        .dated(violations.iter().map(|v| v.date))
        .dated(dmrs.iter().map(|d| d.date))
        .dated(enforcement.iter().map(|e| e.date))
        .source(!records.permits.is_empty() || !violations.is_empty())
        .source(!dmrs.is_empty())
        .source(!enforcement.is_empty());
    let confidence = calculate_confidence(&BENCHMARK, &evidence, ctx.today());

    let trend = if violations.len() < TREND_GATE {
        Trend::Unknown
    } else {
        let (recent, prior) =
            split_recent_prior(violations.iter().map(|v| &v.date), ctx, RECENT_MONTHS);
        count_trend(recent, prior)
    };

    finish(raw, confidence, trend, &evidence, ctx)
}

/// Log-scaled enforcement intensity, 0-100.
fn enforcement_intensity(x: f64) -> f64 {
    (100.0 * x.max(0.0).ln_1p() / ENFORCEMENT_SATURATION.ln_1p()).min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indices::fixtures::*;
    use wci_core::baseline::Baselines;

    fn score(bundle: &UnitDataBundle) -> IndexScore {
        let baselines = Baselines::default();
        calculate(bundle, &ScoringContext::new(now(), &baselines))
    }

    #[test]
    fn test_enforcement_intensity_scale() {
        assert_eq!(enforcement_intensity(0.0), 0.0);
        assert!((enforcement_intensity(50.0) - 100.0).abs() < 1e-9);
        assert_eq!(enforcement_intensity(500.0), 100.0);
        assert!(enforcement_intensity(3.0) > 30.0 && enforcement_intensity(3.0) < 40.0);
    }

    #[test]
    fn no_permits_is_no_evidence() {
        assert_eq!(score(&empty_bundle()), IndexScore::no_evidence(now()));
    }

    #[test]
    fn recent_rnc_floors_component() {
        let mut bundle = empty_bundle();
        for id in ["MD0001", "MD0002", "MD0003", "MD0004", "MD0005"] {
            bundle.permits.permits.push(permit(id));
        }
        // one RNC among five permits would be 20; the recent floor lifts it to 70
        bundle.permits.violations.push(violation("MD0001", 30, true));
        let with_rnc = score(&bundle);
        bundle.permits.violations[0].rnc = false;
        let without_rnc = score(&bundle);
        assert!(with_rnc.value > without_rnc.value);
    }

    #[test]
    fn rising_violations_is_declining() {
        let mut bundle = empty_bundle();
        bundle.permits.permits.push(permit("MD0001"));
        for days in [10, 20, 40, 60, 90, 300] {
            bundle.permits.violations.push(violation("MD0001", days, false));
        }
        for i in 0..12 {
            bundle.permits.dmrs.push(dmr("MD0001", "Phosphorus, total [as P]", 3.0, 2.0, 25 * i));
        }
        bundle.permits.enforcement.push(enforcement("MD0001", 120_000.0, 100));
        let result = score(&bundle);
        assert_eq!(result.trend, Trend::Declining);
        // 0.30*100 + 0.25*0 + 0.25*100 + 0.20*67
        assert!(result.value >= 65, "value {}", result.value);
    }

    #[test]
    fn old_violations_fall_out_of_window() {
        let mut bundle = empty_bundle();
        bundle.permits.permits.push(permit("MD0001"));
        bundle.permits.violations.push(violation("MD0001", 500, true));
        let result = score(&bundle);
        assert_eq!(result.data_points, 1);
        assert_eq!(result.trend, Trend::Unknown);
    }
}
