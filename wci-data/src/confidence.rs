//! Confidence model shared by all index calculators.
//!
//! Confidence blends three sub-scores, each 0-100:
//!
//! - **data density**: points seen against a per-index expected count
//! - **recency**: mean freshness of the records over the index's window
//! - **source diversity**: distinct sources used against the expected count
//!
//! Scores backed by low confidence are pulled halfway back to neutral by
//! [`apply_confidence_regression`].

use chrono::NaiveDate;
use wci_core::score::{clamp_score, ConfidenceTier, NEUTRAL_SCORE};
use wci_utils::dates::{age_in_days, window_days};

pub const DATA_DENSITY_WEIGHT: f64 = 0.40;
pub const RECENCY_WEIGHT: f64 = 0.35;
pub const SOURCE_DIVERSITY_WEIGHT: f64 = 0.25;

/// Below this confidence the raw score is regressed toward neutral.
pub const LOW_CONFIDENCE_THRESHOLD: u8 = 40;

/// Fraction of the distance to neutral removed by regression.
pub const REGRESSION_STRENGTH: f64 = 0.5;

/// Analysis window for trend-based indices.
pub const TREND_WINDOW_MONTHS: u32 = 24;

/// Analysis window for enforcement- and DMR-based indices.
pub const ENFORCEMENT_WINDOW_MONTHS: u32 = 12;

/// Per-index expectations the evidence is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Benchmark {
    pub expected_points: u32,
    pub expected_sources: u32,
    pub window_months: u32,
}

/// The evidence behind one index score.
#[derive(Debug, Clone, Default)]
pub struct Evidence {
    pub data_points: u32,
    /// Dates of the dated records that were used.
    pub dates: Vec<NaiveDate>,
    pub sources_used: u32,
}

impl Evidence {
    /// Count a source as used when `present` is true.
    pub fn source(&mut self, present: bool) -> &mut Self {
        if present {
            self.sources_used += 1;
        }
        self
    }

    /// Add dated records to the evidence.
    pub fn dated<I>(&mut self, dates: I) -> &mut Self
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        for date in dates {
            self.data_points += 1;
            self.dates.push(date);
        }
        self
    }

    /// Add records that carry no date.
    pub fn undated(&mut self, count: usize) -> &mut Self {
        self.data_points += count as u32;
        self
    }
}

pub fn data_density(actual_points: u32, expected_points: u32) -> f64 {
    (100.0 * actual_points as f64 / expected_points.max(1) as f64).min(100.0)
}

/// Freshness weight of one record: 1.0 today, falling linearly to 0.0 at
/// the edge of the analysis window.
pub fn freshness_weight(date: &NaiveDate, now: NaiveDate, window_months: u32) -> f64 {
    let age = age_in_days(date, now).max(0) as f64;
    let window = window_days(now, window_months) as f64;
    (1.0 - age / window).clamp(0.0, 1.0)
}

/// Mean freshness of `dates`, scaled to 0-100. Zero when there are no dates.
pub fn recency(dates: &[NaiveDate], now: NaiveDate, window_months: u32) -> f64 {
    if dates.is_empty() {
        return 0.0;
    }
    let total: f64 = dates
        .iter()
        .map(|d| freshness_weight(d, now, window_months))
        .sum();
    100.0 * total / dates.len() as f64
}

pub fn source_diversity(sources_used: u32, expected_sources: u32) -> f64 {
    (100.0 * sources_used as f64 / expected_sources.max(1) as f64).min(100.0)
}

/// Confidence (0-100) for `evidence` measured against `benchmark`.
pub fn calculate_confidence(benchmark: &Benchmark, evidence: &Evidence, now: NaiveDate) -> u8 {
    let density = data_density(evidence.data_points, benchmark.expected_points);
    let fresh = recency(&evidence.dates, now, benchmark.window_months);
    let diversity = source_diversity(evidence.sources_used, benchmark.expected_sources);
    clamp_score(
        DATA_DENSITY_WEIGHT * density + RECENCY_WEIGHT * fresh + SOURCE_DIVERSITY_WEIGHT * diversity,
    )
}

pub fn confidence_tier(confidence: u8) -> ConfidenceTier {
    ConfidenceTier::for_confidence(confidence)
}

/// Pull low-confidence scores halfway toward neutral.
///
/// `raw + (50 - raw) * 0.5` when confidence is below 40, otherwise `raw`.
pub fn apply_confidence_regression(raw_score: f64, confidence: u8) -> f64 {
    if confidence < LOW_CONFIDENCE_THRESHOLD {
        raw_score + (NEUTRAL_SCORE as f64 - raw_score) * REGRESSION_STRENGTH
    } else {
        raw_score
    }
}
