//! The nine index calculators.
//!
//! Each calculator is an independent pure function
//! `(&UnitDataBundle, &ScoringContext) -> IndexScore` with its own sub-weights
//! (summing to 1.00) and its own confidence [`Benchmark`]. Every calculator
//! follows the same outline:
//!
//! 1. no underlying records at all → [`IndexScore::no_evidence`]
//! 2. missing state baseline (where one is needed) → neutral 50, confidence ≤ 30
//! 3. weighted sub-components → raw score
//! 4. confidence from the evidence, then low-confidence regression
//! 5. trend, `Unknown` below the data-sufficiency gate

pub mod ecological_health;
pub mod ej_vulnerability;
pub mod governance_response;
pub mod infrastructure_failure;
pub mod load_velocity;
pub mod per_capita_load;
pub mod permit_risk;
pub mod waterfront_exposure;
pub mod watershed_recovery;

use crate::confidence::{apply_confidence_regression, calculate_confidence, Benchmark, Evidence};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeSet, HashMap};
use wci_core::baseline::Baselines;
use wci_core::bundle::{DrinkingWaterRecords, UnitDataBundle};
use wci_core::records::{DrinkingWaterViolation, TmdlStatus, Waterbody};
use wci_core::score::{IndexScore, IndexSet, Trend, NEUTRAL_SCORE};
use wci_utils::dates::within_months;

/// Confidence ceiling when a score rests on a fallback.
pub const FALLBACK_CONFIDENCE_CAP: u8 = 30;

/// Records needed before a trend is reported.
pub const TREND_GATE: usize = 3;

/// Neutral sub-component value used when a component has no evidence.
pub(crate) const NEUTRAL: f64 = NEUTRAL_SCORE as f64;

/// Inputs shared by every calculator in a run.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub now: DateTime<Utc>,
    pub baselines: &'a Baselines,
}

impl<'a> ScoringContext<'a> {
    pub fn new(now: DateTime<Utc>, baselines: &'a Baselines) -> Self {
        ScoringContext { now, baselines }
    }

    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }

    pub fn within(&self, date: &NaiveDate, months: u32) -> bool {
        within_months(date, self.today(), months)
    }
}

/// Run all nine calculators over one bundle.
pub fn compute_all(bundle: &UnitDataBundle, ctx: &ScoringContext) -> IndexSet {
    IndexSet {
        load_velocity: load_velocity::calculate(bundle, ctx),
        infrastructure_failure: infrastructure_failure::calculate(bundle, ctx),
        permit_risk_exposure: permit_risk::calculate(bundle, ctx),
        watershed_recovery: watershed_recovery::calculate(bundle, ctx),
        ecological_health: ecological_health::calculate(bundle, ctx),
        per_capita_load: per_capita_load::calculate(bundle, ctx),
        waterfront_exposure: waterfront_exposure::calculate(bundle, ctx),
        governance_response: governance_response::calculate(bundle, ctx),
        ej_vulnerability: ej_vulnerability::calculate(bundle, ctx),
    }
}

/// Sum of `weight * score` over the components.
pub(crate) fn weighted(components: &[(f64, f64)]) -> f64 {
    components.iter().map(|(w, s)| w * s).sum()
}

/// Regress, clamp and package a raw score.
pub(crate) fn finish(
    raw: f64,
    confidence: u8,
    trend: Trend,
    evidence: &Evidence,
    ctx: &ScoringContext,
) -> IndexScore {
    let adjusted = apply_confidence_regression(raw, confidence);
    IndexScore::new(
        adjusted,
        confidence as f64,
        trend,
        evidence.data_points,
        ctx.now,
    )
}

/// Neutral value with capped confidence, for a missing state baseline.
pub(crate) fn baseline_fallback(
    benchmark: &Benchmark,
    evidence: &Evidence,
    ctx: &ScoringContext,
) -> IndexScore {
    let confidence =
        calculate_confidence(benchmark, evidence, ctx.today()).min(FALLBACK_CONFIDENCE_CAP);
    IndexScore::new(
        NEUTRAL,
        confidence as f64,
        Trend::Unknown,
        evidence.data_points,
        ctx.now,
    )
}

/// `value / full_scale` as a 0-100 score.
pub(crate) fn scaled(value: f64, full_scale: f64) -> f64 {
    if full_scale <= 0.0 {
        return 0.0;
    }
    (100.0 * value / full_scale).clamp(0.0, 100.0)
}

/// Piecewise-linear benchmark: 0 at or below `low`, 100 at or above `high`.
pub(crate) fn piecewise(value: f64, low: f64, high: f64) -> f64 {
    if value <= low {
        0.0
    } else if value >= high {
        100.0
    } else {
        100.0 * (value - low) / (high - low)
    }
}

/// `numerator / denominator` as a percentage, `None` when nothing was counted.
pub(crate) fn rate(numerator: usize, denominator: usize) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(100.0 * numerator as f64 / denominator as f64)
    }
}

/// Trend of an event count where more events is worse.
pub(crate) fn count_trend(recent: usize, prior: usize) -> Trend {
    if recent == prior {
        return Trend::Stable;
    }
    let ratio = recent as f64 / prior.max(1) as f64;
    if ratio > 1.2 {
        Trend::Declining
    } else if ratio < 0.8 {
        Trend::Improving
    } else {
        Trend::Stable
    }
}

/// Trend of a level (concentration, severity) where higher is worse.
pub(crate) fn level_trend(recent: Option<f64>, prior: Option<f64>) -> Trend {
    match (recent, prior) {
        (Some(r), Some(p)) if p > 0.0 => {
            let ratio = r / p;
            if ratio > 1.1 {
                Trend::Declining
            } else if ratio < 0.9 {
                Trend::Improving
            } else {
                Trend::Stable
            }
        }
        (Some(r), Some(_)) if r > 0.0 => Trend::Declining,
        _ => Trend::Stable,
    }
}

/// Split dates into (last `months`, the `months` before that).
pub(crate) fn split_recent_prior<'d, I>(dates: I, ctx: &ScoringContext, months: u32) -> (usize, usize)
where
    I: IntoIterator<Item = &'d NaiveDate>,
{
    let mut recent = 0;
    let mut prior = 0;
    for date in dates {
        if ctx.within(date, months) {
            recent += 1;
        } else if ctx.within(date, months * 2) {
            prior += 1;
        }
    }
    (recent, prior)
}

/// TMDL coverage: completed / (completed + needed), percent.
///
/// `None` when no waterbody has or needs a TMDL.
pub(crate) fn tmdl_coverage(waterbodies: &[Waterbody]) -> Option<f64> {
    let completed = waterbodies
        .iter()
        .filter(|w| w.tmdl_status == TmdlStatus::Completed)
        .count();
    let needed = waterbodies
        .iter()
        .filter(|w| w.tmdl_status == TmdlStatus::Needed)
        .count();
    rate(completed, completed + needed)
}

/// Fraction (0..1) of waterbodies in an impaired category.
pub(crate) fn impaired_fraction(waterbodies: &[Waterbody]) -> Option<f64> {
    if waterbodies.is_empty() {
        return None;
    }
    let impaired = waterbodies.iter().filter(|w| w.is_impaired()).count();
    Some(impaired as f64 / waterbodies.len() as f64)
}

/// Number of distinct impairment causes, case-insensitive.
pub(crate) fn distinct_causes(waterbodies: &[Waterbody]) -> usize {
    waterbodies
        .iter()
        .flat_map(|w| w.causes.iter())
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .collect::<BTreeSet<_>>()
        .len()
}

/// Direction of the impaired share among recently assessed waterbodies
/// compared with those assessed earlier.
pub(crate) fn impairment_trend(waterbodies: &[Waterbody], ctx: &ScoringContext) -> Trend {
    let dated: Vec<(&NaiveDate, bool)> = waterbodies
        .iter()
        .filter_map(|w| w.assessed_on.as_ref().map(|d| (d, w.is_impaired())))
        .collect();
    if dated.len() < TREND_GATE {
        return Trend::Unknown;
    }
    let (recent, older): (Vec<_>, Vec<_>) = dated
        .iter()
        .partition(|(d, _)| ctx.within(d, crate::confidence::TREND_WINDOW_MONTHS));
    if recent.is_empty() || older.is_empty() {
        return Trend::Stable;
    }
    let share = |group: &[&(&NaiveDate, bool)]| {
        group.iter().filter(|(_, impaired)| *impaired).count() as f64 / group.len() as f64
    };
    let delta = share(&recent) - share(&older);
    if delta > 0.1 {
        Trend::Declining
    } else if delta < -0.1 {
        Trend::Improving
    } else {
        Trend::Stable
    }
}

/// Severity weight of a drinking-water violation: major 3, minor 1.
pub(crate) fn violation_weight(violation: &DrinkingWaterViolation) -> f64 {
    if violation.major {
        3.0
    } else {
        1.0
    }
}

/// Weighted violation load per system id, over `violations`.
pub(crate) fn weighted_violations_by_system<'v, I>(violations: I) -> HashMap<&'v str, f64>
where
    I: IntoIterator<Item = &'v DrinkingWaterViolation>,
{
    let mut by_system: HashMap<&str, f64> = HashMap::new();
    for v in violations {
        *by_system.entry(v.pwsid.as_str()).or_default() += violation_weight(v);
    }
    by_system
}

/// Population-weighted mean of a per-system quantity.
///
/// Falls back to the plain per-system mean when no population is reported.
pub(crate) fn population_weighted(
    drinking_water: &DrinkingWaterRecords,
    per_system: &HashMap<&str, f64>,
) -> f64 {
    let systems = &drinking_water.systems;
    if systems.is_empty() {
        return 0.0;
    }
    let population = drinking_water.population_served();
    if population == 0 {
        let total: f64 = systems
            .iter()
            .map(|s| per_system.get(s.pwsid.as_str()).copied().unwrap_or(0.0))
            .sum();
        return total / systems.len() as f64;
    }
    let weighted_sum: f64 = systems
        .iter()
        .map(|s| {
            s.population_served as f64 * per_system.get(s.pwsid.as_str()).copied().unwrap_or(0.0)
        })
        .sum();
    weighted_sum / population as f64
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Bundle builders shared by the calculator tests.

    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use wci_core::bundle::UnitDataBundle;
    use wci_core::records::*;
    use wci_core::unit::WatershedUnit;

    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap()
    }

    /// A date `days` before [`now`].
    pub fn days_ago(days: i64) -> NaiveDate {
        now().date_naive() - chrono::Duration::days(days)
    }

    pub fn unit(state: &str) -> WatershedUnit {
        WatershedUnit {
            code: "02060003".to_string(),
            lat: 38.95,
            lng: -76.60,
            state: state.to_string(),
            adjacent_codes: vec!["02060004".to_string()],
        }
    }

    pub fn empty_bundle() -> UnitDataBundle {
        UnitDataBundle::empty(unit("MD"))
    }

    pub fn sample(parameter: &str, value: f64, days: i64) -> WaterQualitySample {
        WaterQualitySample {
            station_id: "USGS-01589300".to_string(),
            state: "MD".to_string(),
            lat: 38.95,
            lng: -76.60,
            date: days_ago(days),
            parameter: parameter.to_string(),
            value,
            unit: "mg/l".to_string(),
        }
    }

    pub fn permit(id: &str) -> Permit {
        Permit {
            permit_id: id.to_string(),
            facility_name: format!("Facility {}", id),
            state: "MD".to_string(),
            lat: 38.95,
            lng: -76.60,
            design_flow_mgd: 1.5,
        }
    }

    pub fn violation(permit_id: &str, days: i64, rnc: bool) -> PermitViolation {
        PermitViolation {
            permit_id: permit_id.to_string(),
            date: days_ago(days),
            violation_code: "E90".to_string(),
            rnc,
        }
    }

    pub fn dmr(permit_id: &str, parameter: &str, value: f64, limit: f64, days: i64) -> DmrRecord {
        DmrRecord {
            permit_id: permit_id.to_string(),
            date: days_ago(days),
            parameter: parameter.to_string(),
            value,
            limit: Some(limit),
        }
    }

    pub fn enforcement(permit_id: &str, penalty: f64, days: i64) -> EnforcementAction {
        EnforcementAction {
            permit_id: permit_id.to_string(),
            date: days_ago(days),
            action_type: "Administrative Order".to_string(),
            penalty,
        }
    }

    pub fn inspection(permit_id: &str, compliant: bool, days: i64) -> Inspection {
        Inspection {
            permit_id: permit_id.to_string(),
            date: days_ago(days),
            compliant,
        }
    }

    pub fn system(pwsid: &str, population: u64, source: WaterSource) -> DrinkingWaterSystem {
        DrinkingWaterSystem {
            pwsid: pwsid.to_string(),
            name: format!("System {}", pwsid),
            state: "MD".to_string(),
            lat: 38.95,
            lng: -76.60,
            population_served: population,
            source,
        }
    }

    pub fn dw_violation(pwsid: &str, major: bool, health_based: bool, days: i64) -> DrinkingWaterViolation {
        DrinkingWaterViolation {
            pwsid: pwsid.to_string(),
            date: days_ago(days),
            violation_code: "02".to_string(),
            major,
            health_based,
        }
    }

    pub fn dw_enforcement(pwsid: &str, days: i64) -> DrinkingWaterEnforcement {
        DrinkingWaterEnforcement {
            pwsid: pwsid.to_string(),
            date: days_ago(days),
            action_type: "State Formal NOV".to_string(),
        }
    }

    pub fn waterbody(
        id: &str,
        category: AssessmentCategory,
        tmdl: TmdlStatus,
        causes: &[&str],
        assessed_days_ago: Option<i64>,
    ) -> Waterbody {
        Waterbody {
            assessment_unit_id: id.to_string(),
            name: format!("Waterbody {}", id),
            state: "MD".to_string(),
            huc12: "020600030101".to_string(),
            water_type: "RIVER".to_string(),
            category,
            tmdl_status: tmdl,
            causes: causes.iter().map(|c| c.to_string()).collect(),
            assessed_on: assessed_days_ago.map(days_ago),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use wci_core::records::AssessmentCategory;

    #[test]
    fn test_piecewise_benchmark() {
        assert_eq!(piecewise(0.2, 0.5, 5.0), 0.0);
        assert_eq!(piecewise(5.0, 0.5, 5.0), 100.0);
        assert!((piecewise(2.75, 0.5, 5.0) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_count_trend() {
        assert_eq!(count_trend(6, 3), Trend::Declining);
        assert_eq!(count_trend(1, 4), Trend::Improving);
        assert_eq!(count_trend(5, 5), Trend::Stable);
        assert_eq!(count_trend(3, 0), Trend::Declining);
    }

    #[test]
    fn test_tmdl_coverage_and_causes() {
        let wbs = vec![
            waterbody("a", AssessmentCategory::Cat4a, TmdlStatus::Completed, &["Phosphorus"], None),
            waterbody("b", AssessmentCategory::Cat5, TmdlStatus::Needed, &["phosphorus ", "PCBs"], None),
            waterbody("c", AssessmentCategory::Cat1, TmdlStatus::NotRequired, &[], None),
        ];
        assert_eq!(tmdl_coverage(&wbs), Some(50.0));
        assert_eq!(distinct_causes(&wbs), 2);
        let fraction = impaired_fraction(&wbs).unwrap();
        assert!((fraction - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(tmdl_coverage(&wbs[2..]), None);
    }

    #[test]
    fn test_impairment_trend_needs_dated_assessments() {
        let ctx_baselines = Baselines::default();
        let ctx = ScoringContext::new(now(), &ctx_baselines);
        let undated = vec![
            waterbody("a", AssessmentCategory::Cat5, TmdlStatus::Needed, &[], None),
            waterbody("b", AssessmentCategory::Cat5, TmdlStatus::Needed, &[], None),
            waterbody("c", AssessmentCategory::Cat5, TmdlStatus::Needed, &[], None),
        ];
        assert_eq!(impairment_trend(&undated, &ctx), Trend::Unknown);

        let worsening = vec![
            waterbody("a", AssessmentCategory::Cat1, TmdlStatus::NotRequired, &[], Some(1200)),
            waterbody("b", AssessmentCategory::Cat2, TmdlStatus::NotRequired, &[], Some(1100)),
            waterbody("c", AssessmentCategory::Cat5, TmdlStatus::Needed, &[], Some(60)),
        ];
        assert_eq!(impairment_trend(&worsening, &ctx), Trend::Declining);
    }
}
