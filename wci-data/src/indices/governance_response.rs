//! Governance Response: how actively regulators answer problems in the
//! unit. Higher = worse (a weaker response).

use super::{
    finish, rate, scaled, tmdl_coverage, weighted, ScoringContext, NEUTRAL, TREND_GATE,
};
use crate::confidence::{
    calculate_confidence, Benchmark, Evidence, ENFORCEMENT_WINDOW_MONTHS, TREND_WINDOW_MONTHS,
};
use chrono::NaiveDate;
use wci_core::bundle::UnitDataBundle;
use wci_core::score::{IndexScore, Trend};

pub const BENCHMARK: Benchmark = Benchmark {
    expected_points: 20,
    expected_sources: 3,
    window_months: TREND_WINDOW_MONTHS,
};

/// Violations plus RNC flags per permit that saturate the component.
const VIOLATIONS_PER_PERMIT_FULL_SCALE: f64 = 5.0;

/// Change in the enforcement/violation ratio treated as flat.
const RESPONSE_RATIO_BAND: f64 = 0.1;

pub fn calculate(bundle: &UnitDataBundle, ctx: &ScoringContext) -> IndexScore {
    let permits = &bundle.permits;
    let dw = &bundle.drinking_water;
    let in_window = |d: &NaiveDate| ctx.within(d, TREND_WINDOW_MONTHS);

    let violation_dates: Vec<NaiveDate> = permits
        .violations
        .iter()
        .map(|v| v.date)
        .chain(dw.violations.iter().map(|v| v.date))
        .filter(|d| in_window(d))
        .collect();
    let enforcement_dates: Vec<NaiveDate> = permits
        .enforcement
        .iter()
        .map(|e| e.date)
        .chain(dw.enforcement.iter().map(|e| e.date))
        .filter(|d| in_window(d))
        .collect();
    let inspection_dates: Vec<NaiveDate> = permits
        .inspections
        .iter()
        .map(|i| i.date)
        .filter(|d| in_window(d))
        .collect();
    let waterbodies = &bundle.waterbodies;

    if permits.permits.is_empty()
        && violation_dates.is_empty()
        && waterbodies.is_empty()
        && dw.systems.is_empty()
    {
        return IndexScore::no_evidence(ctx.now);
    }

    let tmdl_gap = if waterbodies.is_empty() {
        NEUTRAL
    } else {
        tmdl_coverage(waterbodies).map(|c| 100.0 - c).unwrap_or(0.0)
    };

    let enforcement_gap = response_ratio(enforcement_dates.len(), violation_dates.len())
        .map(|ratio| 100.0 * (1.0 - ratio))
        .unwrap_or(0.0);

    let permit_count = permits.permits.len();
    let (violation_pressure, inspection_gap) = if permit_count == 0 {
        (NEUTRAL, NEUTRAL)
    } else {
        let permit_violations = permits
            .violations
            .iter()
            .filter(|v| in_window(&v.date))
            .map(|v| if v.rnc { 2.0 } else { 1.0 })
            .sum::<f64>();
        let pressure = scaled(
            permit_violations / permit_count as f64,
            VIOLATIONS_PER_PERMIT_FULL_SCALE,
        );
        let covered = rate(inspection_dates.len(), permit_count).unwrap_or(0.0).min(100.0);
        (pressure, 100.0 - covered)
    };

    let raw = weighted(&[
        (0.30, tmdl_gap),
        (0.25, enforcement_gap),
        (0.25, violation_pressure),
        (0.20, inspection_gap),
    ]);

    let mut evidence = Evidence::default();
    evidence
        .dated(violation_dates.iter().copied())
        .dated(enforcement_dates.iter().copied())
        .dated(inspection_dates.iter().copied())
        .undated(waterbodies.len())
        .source(!permits.permits.is_empty() || !violation_dates.is_empty())
        .source(!enforcement_dates.is_empty() || !inspection_dates.is_empty())
        .source(!waterbodies.is_empty());
    let confidence = calculate_confidence(&BENCHMARK, &evidence, ctx.today());

    let trend = if violation_dates.len() < TREND_GATE {
        Trend::Unknown
    } else {
        let recent = |d: &&NaiveDate| ctx.within(d, ENFORCEMENT_WINDOW_MONTHS);
        let now_ratio = response_ratio(
            enforcement_dates.iter().filter(recent).count(),
            violation_dates.iter().filter(recent).count(),
        );
        let then_ratio = response_ratio(
            enforcement_dates.iter().filter(|d| !recent(d)).count(),
            violation_dates.iter().filter(|d| !recent(d)).count(),
        );
        response_trend(now_ratio, then_ratio)
    };

    finish(raw, confidence, trend, &evidence, ctx)
}

/// Enforcement actions per violation, capped at 1. `None` without violations.
fn response_ratio(enforcement: usize, violations: usize) -> Option<f64> {
    if violations == 0 {
        None
    } else {
        Some((enforcement as f64 / violations as f64).min(1.0))
    }
}

/// A rising response ratio is an improving response.
fn response_trend(recent: Option<f64>, prior: Option<f64>) -> Trend {
    match (recent, prior) {
        (Some(r), Some(p)) if r - p > RESPONSE_RATIO_BAND => Trend::Improving,
        (Some(r), Some(p)) if p - r > RESPONSE_RATIO_BAND => Trend::Declining,
        _ => Trend::Stable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indices::fixtures::*;
    use wci_core::baseline::Baselines;
    use wci_core::records::{AssessmentCategory, TmdlStatus};

    fn score(bundle: &UnitDataBundle) -> IndexScore {
        let baselines = Baselines::default();
        calculate(bundle, &ScoringContext::new(now(), &baselines))
    }

    #[test]
    fn test_response_trend() {
        assert_eq!(response_trend(Some(0.9), Some(0.2)), Trend::Improving);
        assert_eq!(response_trend(Some(0.1), Some(0.5)), Trend::Declining);
        assert_eq!(response_trend(Some(0.5), Some(0.45)), Trend::Stable);
        assert_eq!(response_trend(None, Some(0.5)), Trend::Stable);
    }

    #[test]
    fn no_records_is_no_evidence() {
        assert_eq!(score(&empty_bundle()), IndexScore::no_evidence(now()));
    }

    #[test]
    fn unanswered_violations_score_high() {
        let mut bundle = empty_bundle();
        bundle.permits.permits.push(permit("MD0001"));
        for days in [10, 30, 60, 90, 120, 200] {
            bundle.permits.violations.push(violation("MD0001", days, true));
        }
        bundle.waterbodies.push(waterbody(
            "wb1",
            AssessmentCategory::Cat5,
            TmdlStatus::Needed,
            &["Phosphorus"],
            None,
        ));
        let result = score(&bundle);
        // 0.30*100 + 0.25*100 + 0.25*100 + 0.20*100
        assert_eq!(result.value, 100);
    }

    #[test]
    fn strengthening_response_is_improving() {
        let mut bundle = empty_bundle();
        bundle.permits.permits.push(permit("MD0001"));
        for days in [400, 450, 500, 30, 60, 90] {
            bundle.permits.violations.push(violation("MD0001", days, false));
        }
        for days in [20, 50, 80] {
            bundle.permits.enforcement.push(enforcement("MD0001", 0.0, days));
        }
        bundle.permits.inspections.push(inspection("MD0001", true, 40));
        let result = score(&bundle);
        assert_eq!(result.trend, Trend::Improving);
    }
}
