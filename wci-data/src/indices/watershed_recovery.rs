//! Watershed Recovery: progress of restoration. Higher = better; the
//! composite inverts it.

use super::{
    distinct_causes, finish, impaired_fraction, impairment_trend, tmdl_coverage, weighted,
    ScoringContext,
};
use crate::confidence::{calculate_confidence, Benchmark, Evidence, TREND_WINDOW_MONTHS};
use wci_core::bundle::UnitDataBundle;
use wci_core::records::{AssessmentCategory, TmdlStatus, Waterbody};
use wci_core::score::IndexScore;

pub const BENCHMARK: Benchmark = Benchmark {
    expected_points: 15,
    expected_sources: 1,
    window_months: TREND_WINDOW_MONTHS,
};

/// Distinct causes at which the concentration component bottoms out.
const CAUSE_SATURATION: usize = 5;

pub fn calculate(bundle: &UnitDataBundle, ctx: &ScoringContext) -> IndexScore {
    let waterbodies = &bundle.waterbodies;
    if waterbodies.is_empty() {
        return IndexScore::no_evidence(ctx.now);
    }

    let coverage = tmdl_coverage(waterbodies).unwrap_or(100.0);
    let unimpaired = 100.0 * (1.0 - impaired_fraction(waterbodies).unwrap_or(0.0));
    let credit =
        waterbodies.iter().map(category_credit).sum::<f64>() / waterbodies.len() as f64;
    let causes = distinct_causes(waterbodies).min(CAUSE_SATURATION);
    let concentration = 100.0 * (1.0 - causes as f64 / CAUSE_SATURATION as f64);

    let raw = weighted(&[
        (0.35, coverage),
        (0.30, unimpaired),
        (0.20, credit),
        (0.15, concentration),
    ]);

    let mut evidence = Evidence::default();
    evidence
        .dated(waterbodies.iter().filter_map(|w| w.assessed_on))
        .undated(waterbodies.iter().filter(|w| w.assessed_on.is_none()).count())
        .source(true);
    let confidence = calculate_confidence(&BENCHMARK, &evidence, ctx.today());

    finish(raw, confidence, impairment_trend(waterbodies, ctx), &evidence, ctx)
}

/// Restoration credit of one waterbody's category, 0-100.
fn category_credit(waterbody: &Waterbody) -> f64 {
    match waterbody.category {
        AssessmentCategory::Cat1 => 100.0,
        AssessmentCategory::Cat2 => 85.0,
        AssessmentCategory::Cat3 => 50.0,
        AssessmentCategory::Cat4a => 70.0,
        AssessmentCategory::Cat4b => 60.0,
        AssessmentCategory::Cat4c => 50.0,
        AssessmentCategory::Cat5Alt => 40.0,
        AssessmentCategory::Cat5 if waterbody.tmdl_status == TmdlStatus::Completed => 70.0,
        AssessmentCategory::Cat5 => 0.0,
        AssessmentCategory::Unknown => 50.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indices::fixtures::*;
    use wci_core::baseline::Baselines;
    use wci_core::score::Trend;

    fn score(bundle: &UnitDataBundle) -> IndexScore {
        let baselines = Baselines::default();
        calculate(bundle, &ScoringContext::new(now(), &baselines))
    }

    #[test]
    fn zero_waterbodies_is_neutral_with_no_confidence() {
        let result = score(&empty_bundle());
        assert_eq!(result.value, 50);
        assert_eq!(result.confidence, 0);
        assert_eq!(result.trend, Trend::Unknown);
        assert_eq!(result.data_points, 0);
    }

    #[test]
    fn attaining_waters_score_high() {
        let mut bundle = empty_bundle();
        for (i, days) in [30, 90, 200, 400, 500].iter().enumerate() {
            bundle.waterbodies.push(waterbody(
                &format!("wb{}", i),
                AssessmentCategory::Cat1,
                TmdlStatus::NotRequired,
                &[],
                Some(*days),
            ));
        }
        let result = score(&bundle);
        assert_eq!(result.value, 100);
        assert_eq!(result.trend, Trend::Stable);
    }

    #[test]
    fn untreated_impairment_scores_low() {
        let mut bundle = empty_bundle();
        let causes = ["Nitrogen", "Phosphorus", "Sediment", "PCBs", "Mercury", "Bacteria"];
        for i in 0..15 {
            bundle.waterbodies.push(waterbody(
                &format!("wb{}", i),
                AssessmentCategory::Cat5,
                TmdlStatus::Needed,
                &causes,
                Some(30),
            ));
        }
        let result = score(&bundle);
        assert_eq!(result.value, 0);
        assert!(result.confidence >= 70);
    }

    #[test]
    fn completed_tmdl_earns_cat5_credit() {
        let with_tmdl = waterbody("a", AssessmentCategory::Cat5, TmdlStatus::Completed, &[], None);
        let without = waterbody("b", AssessmentCategory::Cat5, TmdlStatus::Needed, &[], None);
        assert_eq!(category_credit(&with_tmdl), 70.0);
        assert_eq!(category_credit(&without), 0.0);
    }
}
