//! Records served by the upstream source caches.
//!
//! Field sets are the subset the index calculators read. Coordinate-keyed
//! records carry `lat`/`lng` and their owning `state` so the collector can
//! narrow neighbour-polluted grid lookups.

use crate::parameter::{self, Nutrient, Threshold};
use crate::unit::{is_valid_unit_code, UNIT_CODE_LENGTH};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single water-quality sample result.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterQualitySample {
    pub station_id: String,
    pub state: String,
    pub lat: f64,
    pub lng: f64,
    pub date: NaiveDate,
    /// Characteristic name, e.g. "Phosphorus".
    pub parameter: String,
    pub value: f64,
    pub unit: String,
}

impl WaterQualitySample {
    pub fn nutrient(&self) -> Option<Nutrient> {
        parameter::nutrient_for(&self.parameter)
    }

    pub fn threshold(&self) -> Option<&'static Threshold> {
        parameter::threshold_for(&self.parameter)
    }

    pub fn is_exceedance(&self) -> bool {
        self.threshold().is_some_and(|t| t.is_exceeded(self.value))
    }
}

/// A discharge permit (NPDES-style facility).
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permit {
    pub permit_id: String,
    pub facility_name: String,
    pub state: String,
    pub lat: f64,
    pub lng: f64,
    /// Design flow in million gallons per day, 0.0 if unknown.
    pub design_flow_mgd: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitViolation {
    pub permit_id: String,
    pub date: NaiveDate,
    pub violation_code: String,
    /// Repeat / significant noncompliance flag.
    pub rnc: bool,
}

/// A discharge-monitoring record reported by a permitted facility.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DmrRecord {
    pub permit_id: String,
    pub date: NaiveDate,
    pub parameter: String,
    /// Reported quantity or concentration.
    pub value: f64,
    /// Permit limit, when one applies.
    pub limit: Option<f64>,
}

impl DmrRecord {
    pub fn is_nutrient(&self) -> bool {
        parameter::is_nutrient_dmr_parameter(&self.parameter)
    }

    pub fn is_exceedance(&self) -> bool {
        self.limit.is_some_and(|limit| self.value > limit)
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnforcementAction {
    pub permit_id: String,
    pub date: NaiveDate,
    pub action_type: String,
    /// Assessed penalty in dollars.
    pub penalty: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inspection {
    pub permit_id: String,
    pub date: NaiveDate,
    /// False when the inspection found a deficiency.
    pub compliant: bool,
}

/// Primary water source of a drinking-water system.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum WaterSource {
    Groundwater,
    SurfaceWater,
    Purchased,
    Unknown,
}

impl WaterSource {
    /// Parse SDWIS-style source codes (`GW`, `SW`, `GWP`, `SWP`, ...).
    pub fn from_code(code: &str) -> WaterSource {
        match code.trim().to_uppercase().as_str() {
            "GW" | "GU" | "GROUNDWATER" => WaterSource::Groundwater,
            "SW" | "SURFACE" | "SURFACEWATER" => WaterSource::SurfaceWater,
            "GWP" | "SWP" | "GUP" | "PURCHASED" => WaterSource::Purchased,
            _ => WaterSource::Unknown,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrinkingWaterSystem {
    pub pwsid: String,
    pub name: String,
    pub state: String,
    pub lat: f64,
    pub lng: f64,
    pub population_served: u64,
    pub source: WaterSource,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrinkingWaterViolation {
    pub pwsid: String,
    pub date: NaiveDate,
    pub violation_code: String,
    pub major: bool,
    pub health_based: bool,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrinkingWaterEnforcement {
    pub pwsid: String,
    pub date: NaiveDate,
    pub action_type: String,
}

/// Integrated-report assessment category of a waterbody.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum AssessmentCategory {
    /// All uses attained.
    Cat1,
    /// Some uses attained, others not assessed.
    Cat2,
    /// Insufficient information.
    Cat3,
    /// Impaired, TMDL completed.
    Cat4a,
    /// Impaired, other controls expected to attain.
    Cat4b,
    /// Impaired by pollution, not a pollutant.
    Cat4c,
    /// Impaired, TMDL needed.
    Cat5,
    /// Impaired, alternative restoration plan in place.
    Cat5Alt,
    Unknown,
}

impl AssessmentCategory {
    pub fn from_code(code: &str) -> AssessmentCategory {
        match code.trim().to_uppercase().as_str() {
            "1" => AssessmentCategory::Cat1,
            "2" => AssessmentCategory::Cat2,
            "3" => AssessmentCategory::Cat3,
            "4A" => AssessmentCategory::Cat4a,
            "4B" => AssessmentCategory::Cat4b,
            "4C" => AssessmentCategory::Cat4c,
            "5" => AssessmentCategory::Cat5,
            "5ALT" | "5A" | "5R" => AssessmentCategory::Cat5Alt,
            _ => AssessmentCategory::Unknown,
        }
    }

    pub fn is_impaired(&self) -> bool {
        matches!(
            self,
            AssessmentCategory::Cat4a
                | AssessmentCategory::Cat4b
                | AssessmentCategory::Cat4c
                | AssessmentCategory::Cat5
                | AssessmentCategory::Cat5Alt
        )
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum TmdlStatus {
    Completed,
    Needed,
    Alternative,
    NotRequired,
}

impl TmdlStatus {
    pub fn from_code(code: &str) -> TmdlStatus {
        match code.trim().to_lowercase().as_str() {
            "completed" | "approved" | "established" => TmdlStatus::Completed,
            "needed" | "required" => TmdlStatus::Needed,
            "alternative" | "alt" => TmdlStatus::Alternative,
            _ => TmdlStatus::NotRequired,
        }
    }
}

/// An impairment/assessment record for one waterbody.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Waterbody {
    pub assessment_unit_id: String,
    pub name: String,
    pub state: String,
    /// 12-digit sub-basin code; its first eight digits identify the unit.
    pub huc12: String,
    /// Water type label, e.g. "RIVER", "ESTUARY", "LAKE, FRESHWATER".
    pub water_type: String,
    pub category: AssessmentCategory,
    pub tmdl_status: TmdlStatus,
    pub causes: Vec<String>,
    pub assessed_on: Option<NaiveDate>,
}

/// Whole words that mark a coastal or tidal water type.
pub const COASTAL_WATER_TYPE_TOKENS: &[&str] = &[
    "ESTUARY", "ESTUARIES", "ESTUARINE", "COASTAL", "OCEAN", "TIDAL", "BAY", "SOUND", "HARBOR",
];

impl Waterbody {
    /// The watershed unit code derived from the waterbody's sub-basin code.
    pub fn basin_code(&self) -> Option<&str> {
        let prefix = self.huc12.trim().get(..UNIT_CODE_LENGTH)?;
        is_valid_unit_code(prefix).then_some(prefix)
    }

    /// Coastal when the water type contains a coastal word. An explicit
    /// "NONTIDAL" or "NON-TIDAL" overrides everything else.
    pub fn is_coastal(&self) -> bool {
        let water_type = self.water_type.to_uppercase();
        let words: Vec<&str> = water_type
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let non_tidal = words.contains(&"NONTIDAL")
            || words.windows(2).any(|pair| pair == ["NON", "TIDAL"]);
        if non_tidal {
            return false;
        }
        words.iter().any(|word| COASTAL_WATER_TYPE_TOKENS.contains(word))
    }

    pub fn is_impaired(&self) -> bool {
        self.category.is_impaired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn waterbody(huc12: &str, water_type: &str) -> Waterbody {
        Waterbody {
            assessment_unit_id: "MD-02060003-1".to_string(),
            name: "Test Creek".to_string(),
            state: "MD".to_string(),
            huc12: huc12.to_string(),
            water_type: water_type.to_string(),
            category: AssessmentCategory::Cat5,
            tmdl_status: TmdlStatus::Needed,
            causes: vec!["Phosphorus".to_string()],
            assessed_on: None,
        }
    }

    #[test]
    fn test_basin_code_derivation() {
        assert_eq!(waterbody("020600030101", "RIVER").basin_code(), Some("02060003"));
        assert_eq!(waterbody("0206", "RIVER").basin_code(), None);
        assert_eq!(waterbody("02A600030101", "RIVER").basin_code(), None);
    }

    #[test]
    fn test_coastal_water_types() {
        assert!(waterbody("020600030101", "ESTUARY").is_coastal());
        assert!(waterbody("020600030101", "Tidal Wetlands").is_coastal());
        assert!(waterbody("020600030101", "COASTAL SHORELINE").is_coastal());
        assert!(!waterbody("020600030101", "RIVER").is_coastal());
        assert!(!waterbody("020600030101", "LAKE, FRESHWATER").is_coastal());
    }

    #[test]
    fn coastal_matches_whole_words_only() {
        assert!(waterbody("020600030101", "ESTUARINE BAY").is_coastal());
        assert!(waterbody("020600030101", "RIVER, TIDAL").is_coastal());
        assert!(!waterbody("020600030101", "NONTIDAL RIVER").is_coastal());
        assert!(!waterbody("020600030101", "Non-Tidal Stream").is_coastal());
        assert!(!waterbody("020600030101", "Non Tidal Wetland").is_coastal());
        assert!(!waterbody("020600030101", "BAYOU").is_coastal());
        assert!(!waterbody("020600030101", "SOUNDVIEW RESERVOIR").is_coastal());
    }

    #[test]
    fn test_category_codes() {
        assert_eq!(AssessmentCategory::from_code("4a"), AssessmentCategory::Cat4a);
        assert_eq!(AssessmentCategory::from_code("5alt"), AssessmentCategory::Cat5Alt);
        assert!(AssessmentCategory::from_code("5").is_impaired());
        assert!(!AssessmentCategory::from_code("2").is_impaired());
        assert_eq!(AssessmentCategory::from_code("x"), AssessmentCategory::Unknown);
    }

    #[test]
    fn test_dmr_exceedance() {
        let dmr = DmrRecord {
            permit_id: "MD0021555".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            parameter: "Phosphorus, total [as P]".to_string(),
            value: 2.5,
            limit: Some(2.0),
        };
        assert!(dmr.is_nutrient());
        assert!(dmr.is_exceedance());
        let no_limit = DmrRecord { limit: None, ..dmr };
        assert!(!no_limit.is_exceedance());
    }

    #[test]
    fn test_water_source_codes() {
        assert_eq!(WaterSource::from_code("gw"), WaterSource::Groundwater);
        assert_eq!(WaterSource::from_code("SWP"), WaterSource::Purchased);
        assert_eq!(WaterSource::from_code(""), WaterSource::Unknown);
    }
}
