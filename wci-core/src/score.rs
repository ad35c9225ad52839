//! Index scores, composite results, history entries and projections.
//!
//! All structs serialize with camelCase keys; they form the persisted
//! `indices` and `history` documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Persisted map of unit code to its latest composite result.
pub type IndicesMap = BTreeMap<String, CompositeResult>;

/// Persisted map of unit code to its rolling composite history.
pub type HistoryMap = BTreeMap<String, Vec<ScoreHistoryEntry>>;

/// Maximum number of history entries kept per unit (90-day window).
pub const HISTORY_CAPACITY: usize = 90;

/// Neutral score used whenever evidence is missing.
pub const NEUTRAL_SCORE: u8 = 50;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
    Unknown,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceTier {
    High,
    Moderate,
    Low,
}

impl ConfidenceTier {
    pub fn for_confidence(confidence: u8) -> ConfidenceTier {
        match confidence {
            70..=u8::MAX => ConfidenceTier::High,
            40..=69 => ConfidenceTier::Moderate,
            _ => ConfidenceTier::Low,
        }
    }
}

/// Clamp a raw score to [0, 100] and round it to an integer.
pub fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

/// One index value for one unit.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexScore {
    pub value: u8,
    pub confidence: u8,
    pub trend: Trend,
    pub last_calculated: DateTime<Utc>,
    pub data_points: u32,
    pub tidal_modified: bool,
}

impl IndexScore {
    /// Build a score, clamping `value` and `confidence` into [0, 100].
    pub fn new(
        value: f64,
        confidence: f64,
        trend: Trend,
        data_points: u32,
        last_calculated: DateTime<Utc>,
    ) -> Self {
        IndexScore {
            value: clamp_score(value),
            confidence: clamp_score(confidence),
            trend,
            last_calculated,
            data_points,
            tidal_modified: false,
        }
    }

    /// The result for an index with no underlying records at all.
    pub fn no_evidence(last_calculated: DateTime<Utc>) -> Self {
        IndexScore {
            value: NEUTRAL_SCORE,
            confidence: 0,
            trend: Trend::Unknown,
            last_calculated,
            data_points: 0,
            tidal_modified: false,
        }
    }

    pub fn tier(&self) -> ConfidenceTier {
        ConfidenceTier::for_confidence(self.confidence)
    }
}

/// The nine indices, in composite-table order.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IndexKind {
    LoadVelocity,
    InfrastructureFailure,
    PermitRiskExposure,
    WatershedRecovery,
    EcologicalHealth,
    PerCapitaLoad,
    WaterfrontExposure,
    GovernanceResponse,
    EjVulnerability,
}

impl IndexKind {
    pub const ALL: [IndexKind; 9] = [
        IndexKind::LoadVelocity,
        IndexKind::InfrastructureFailure,
        IndexKind::PermitRiskExposure,
        IndexKind::WatershedRecovery,
        IndexKind::EcologicalHealth,
        IndexKind::PerCapitaLoad,
        IndexKind::WaterfrontExposure,
        IndexKind::GovernanceResponse,
        IndexKind::EjVulnerability,
    ];

    /// Weight of this index in the composite. The nine weights sum to 1.00.
    pub fn weight(&self) -> f64 {
        match self {
            IndexKind::LoadVelocity
            | IndexKind::InfrastructureFailure
            | IndexKind::PermitRiskExposure
            | IndexKind::WatershedRecovery
            | IndexKind::EcologicalHealth => 0.12,
            IndexKind::PerCapitaLoad
            | IndexKind::WaterfrontExposure
            | IndexKind::GovernanceResponse
            | IndexKind::EjVulnerability => 0.10,
        }
    }

    /// False only for Watershed Recovery, where a higher value is better.
    pub fn higher_is_worse(&self) -> bool {
        !matches!(self, IndexKind::WatershedRecovery)
    }

    pub fn label(&self) -> &'static str {
        match self {
            IndexKind::LoadVelocity => "Load Velocity",
            IndexKind::InfrastructureFailure => "Infrastructure Failure",
            IndexKind::PermitRiskExposure => "Permit Risk Exposure",
            IndexKind::WatershedRecovery => "Watershed Recovery",
            IndexKind::EcologicalHealth => "Ecological Health",
            IndexKind::PerCapitaLoad => "Per-Capita Load",
            IndexKind::WaterfrontExposure => "Waterfront Exposure",
            IndexKind::GovernanceResponse => "Governance Response",
            IndexKind::EjVulnerability => "EJ Vulnerability",
        }
    }
}

/// The nine index scores for one unit.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSet {
    pub load_velocity: IndexScore,
    pub infrastructure_failure: IndexScore,
    pub permit_risk_exposure: IndexScore,
    pub watershed_recovery: IndexScore,
    pub ecological_health: IndexScore,
    pub per_capita_load: IndexScore,
    pub waterfront_exposure: IndexScore,
    pub governance_response: IndexScore,
    pub ej_vulnerability: IndexScore,
}

impl IndexSet {
    pub fn get(&self, kind: IndexKind) -> &IndexScore {
        match kind {
            IndexKind::LoadVelocity => &self.load_velocity,
            IndexKind::InfrastructureFailure => &self.infrastructure_failure,
            IndexKind::PermitRiskExposure => &self.permit_risk_exposure,
            IndexKind::WatershedRecovery => &self.watershed_recovery,
            IndexKind::EcologicalHealth => &self.ecological_health,
            IndexKind::PerCapitaLoad => &self.per_capita_load,
            IndexKind::WaterfrontExposure => &self.waterfront_exposure,
            IndexKind::GovernanceResponse => &self.governance_response,
            IndexKind::EjVulnerability => &self.ej_vulnerability,
        }
    }

    pub fn get_mut(&mut self, kind: IndexKind) -> &mut IndexScore {
        match kind {
            IndexKind::LoadVelocity => &mut self.load_velocity,
            IndexKind::InfrastructureFailure => &mut self.infrastructure_failure,
            IndexKind::PermitRiskExposure => &mut self.permit_risk_exposure,
            IndexKind::WatershedRecovery => &mut self.watershed_recovery,
            IndexKind::EcologicalHealth => &mut self.ecological_health,
            IndexKind::PerCapitaLoad => &mut self.per_capita_load,
            IndexKind::WaterfrontExposure => &mut self.waterfront_exposure,
            IndexKind::GovernanceResponse => &mut self.governance_response,
            IndexKind::EjVulnerability => &mut self.ej_vulnerability,
        }
    }

    /// Scores paired with their kind, in composite-table order.
    pub fn iter(&self) -> impl Iterator<Item = (IndexKind, &IndexScore)> {
        IndexKind::ALL.into_iter().map(move |kind| (kind, self.get(kind)))
    }
}

/// A short-term forecast of the composite.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub composite_value: u8,
    /// Projected minus current composite.
    pub delta: i32,
    /// `Declining` for a worsening composite, `Improving` for a falling one.
    pub direction: Trend,
    pub confidence: u8,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreHistoryEntry {
    pub date: DateTime<Utc>,
    pub composite_value: u8,
}

/// Everything computed for one unit in one run.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeResult {
    pub unit: String,
    pub state: String,
    pub indices: IndexSet,
    /// Weighted composite risk, higher = worse.
    pub composite: u8,
    /// Weakest-link confidence: the minimum of the nine.
    pub composite_confidence: u8,
    pub coastal: bool,
    #[serde(rename = "projection7d")]
    pub projection_7d: Option<Projection>,
    #[serde(rename = "projection30d")]
    pub projection_30d: Option<Projection>,
    pub last_calculated: DateTime<Utc>,
}

impl CompositeResult {
    pub fn tier(&self) -> ConfidenceTier {
        ConfidenceTier::for_confidence(self.composite_confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_index_weights_sum_to_one() {
        let total: f64 = IndexKind::ALL.iter().map(|k| k.weight()).sum();
        assert!((total - 1.0).abs() < 1e-9);
        let twelves = IndexKind::ALL.iter().filter(|k| k.weight() == 0.12).count();
        let tens = IndexKind::ALL.iter().filter(|k| k.weight() == 0.10).count();
        assert_eq!((twelves, tens), (5, 4));
    }

    #[test]
    fn test_index_score_clamps() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let high = IndexScore::new(140.2, 101.0, Trend::Stable, 4, now);
        assert_eq!((high.value, high.confidence), (100, 100));
        let low = IndexScore::new(-3.0, f64::NAN, Trend::Stable, 4, now);
        assert_eq!((low.value, low.confidence), (0, 0));
    }

    #[test]
    fn test_confidence_tiers() {
        assert_eq!(ConfidenceTier::for_confidence(70), ConfidenceTier::High);
        assert_eq!(ConfidenceTier::for_confidence(69), ConfidenceTier::Moderate);
        assert_eq!(ConfidenceTier::for_confidence(40), ConfidenceTier::Moderate);
        assert_eq!(ConfidenceTier::for_confidence(39), ConfidenceTier::Low);
    }

    #[test]
    fn test_serialized_keys() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let json = serde_json::to_value(IndexScore::no_evidence(now)).unwrap();
        assert_eq!(json["value"], 50);
        assert_eq!(json["trend"], "unknown");
        assert_eq!(json["dataPoints"], 0);
        assert_eq!(json["tidalModified"], false);
    }
}
