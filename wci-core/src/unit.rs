use anyhow::Context;
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Length of a watershed unit code (HUC-8 equivalent).
pub const UNIT_CODE_LENGTH: usize = 8;

/// A watershed unit: an 8-character basin code with its centroid, owning
/// state and neighbouring units.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatershedUnit {
    pub code: String,
    pub lat: f64,
    pub lng: f64,
    /// Two-letter owning state, upper case.
    pub state: String,
    pub adjacent_codes: Vec<String>,
}

/// True if `code` looks like a basin code: exactly eight ASCII digits.
pub fn is_valid_unit_code(code: &str) -> bool {
    code.len() == UNIT_CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}

/// Adjacency/state metadata row for one unit.
#[derive(Debug, PartialEq, Clone)]
struct Adjacency {
    state: String,
    adjacent_codes: Vec<String>,
}

/// Static geographic reference: unit centroids plus adjacency/state mapping.
///
/// Loaded once at process start and read-only afterwards. A unit is only
/// usable when it has both a centroid and an adjacency entry.
#[derive(Debug, Default, Clone)]
pub struct GeoReference {
    centroids: BTreeMap<String, (f64, f64)>,
    adjacency: BTreeMap<String, Adjacency>,
}

impl GeoReference {
    /// Build the reference from the two CSV tables.
    ///
    /// - centroids (has headers): `huc8,lat,lng`
    /// - adjacency (has headers): `huc8,state,adjacent` where `adjacent` is a
    ///   `;`-separated list of unit codes
    ///
    /// Rows with an invalid code or unparseable coordinates are skipped.
    pub fn from_csv(centroids_csv: &str, adjacency_csv: &str) -> anyhow::Result<Self> {
        let mut reference = GeoReference::default();
        let mut skipped = 0u32;

        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(centroids_csv.as_bytes());
        for row in rdr.records() {
            let r = row.context("reading centroid row")?;
            let code = r.get(0).unwrap_or("").trim();
            let lat = r.get(1).and_then(|s| s.trim().parse::<f64>().ok());
            let lng = r.get(2).and_then(|s| s.trim().parse::<f64>().ok());
            match (is_valid_unit_code(code), lat, lng) {
                (true, Some(lat), Some(lng)) => {
                    reference.centroids.insert(code.to_string(), (lat, lng));
                }
                _ => skipped += 1,
            }
        }

        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(adjacency_csv.as_bytes());
        for row in rdr.records() {
            let r = row.context("reading adjacency row")?;
            let code = r.get(0).unwrap_or("").trim();
            let state = r.get(1).unwrap_or("").trim().to_uppercase();
            if !is_valid_unit_code(code) || state.len() != 2 {
                skipped += 1;
                continue;
            }
            let adjacent_codes = r
                .get(2)
                .unwrap_or("")
                .split(';')
                .map(str::trim)
                .filter(|c| is_valid_unit_code(c))
                .map(String::from)
                .collect();
            reference.adjacency.insert(
                code.to_string(),
                Adjacency {
                    state,
                    adjacent_codes,
                },
            );
        }

        log::info!(
            "[WCI] geo: loaded {} centroids, {} adjacency rows, skipped {}",
            reference.centroids.len(),
            reference.adjacency.len(),
            skipped
        );
        Ok(reference)
    }

    /// Every unit code known to either table, sorted.
    pub fn all_unit_codes(&self) -> Vec<String> {
        self.centroids
            .keys()
            .chain(self.adjacency.keys())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Full geography for a unit, or `None` if its centroid or adjacency entry
    /// is missing.
    pub fn unit_geography(&self, code: &str) -> Option<WatershedUnit> {
        let (lat, lng) = *self.centroids.get(code)?;
        let adjacency = self.adjacency.get(code)?;
        Some(WatershedUnit {
            code: code.to_string(),
            lat,
            lng,
            state: adjacency.state.clone(),
            adjacent_codes: adjacency.adjacent_codes.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.all_unit_codes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty() && self.adjacency.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CENTROIDS: &str = "huc8,lat,lng\n02060003,38.95,-76.60\n02070010,38.80,-77.05\nbad,1,2\n03050101,34.1,not-a-number\n";
    const ADJACENCY: &str = "huc8,state,adjacent\n02060003,md,02060004;02070010\n02070010,VA,02060003\n05120111,IN,\n";

    #[test]
    fn test_unit_code_validation() {
        assert!(is_valid_unit_code("02060003"));
        assert!(!is_valid_unit_code("0206000"));
        assert!(!is_valid_unit_code("0206000A"));
    }

    #[test]
    fn test_geo_reference_joins_both_tables() {
        let geo = GeoReference::from_csv(CENTROIDS, ADJACENCY).unwrap();
        let unit = geo.unit_geography("02060003").unwrap();
        assert_eq!(unit.state, "MD");
        assert_eq!(unit.adjacent_codes, vec!["02060004", "02070010"]);
        assert!((unit.lat - 38.95).abs() < 1e-9);
    }

    #[test]
    fn test_missing_centroid_or_adjacency_is_none() {
        let geo = GeoReference::from_csv(CENTROIDS, ADJACENCY).unwrap();
        // adjacency only
        assert!(geo.unit_geography("05120111").is_none());
        // nothing at all
        assert!(geo.unit_geography("99999999").is_none());
    }

    #[test]
    fn test_all_unit_codes_is_sorted_union() {
        let geo = GeoReference::from_csv(CENTROIDS, ADJACENCY).unwrap();
        assert_eq!(
            geo.all_unit_codes(),
            vec!["02060003", "02070010", "05120111"]
        );
        assert_eq!(geo.len(), 3);
    }
}
