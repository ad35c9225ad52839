//! Screening thresholds for water-quality sample parameters.
//!
//! These are general screening levels applied uniformly; state-specific
//! criteria vary and are not modelled.

/// Which side of a threshold counts as an exceedance.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Direction {
    Above(f64),
    Below(f64),
    Range { low: f64, high: f64 },
}

/// A screening threshold for one characteristic name.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Threshold {
    pub parameter: &'static str,
    pub direction: Direction,
    pub unit: &'static str,
}

/// Total nitrogen threshold in mg/L.
pub const TN_THRESHOLD_MG_L: f64 = 3.0;

/// Total phosphorus threshold in mg/L.
pub const TP_THRESHOLD_MG_L: f64 = 0.1;

pub const THRESHOLDS: &[Threshold] = &[
    Threshold { parameter: "Dissolved oxygen (DO)", direction: Direction::Below(5.0), unit: "mg/l" },
    Threshold { parameter: "pH", direction: Direction::Range { low: 6.5, high: 8.5 }, unit: "std units" },
    Threshold { parameter: "Total Nitrogen, mixed forms", direction: Direction::Above(TN_THRESHOLD_MG_L), unit: "mg/l" },
    Threshold { parameter: "Nitrogen", direction: Direction::Above(TN_THRESHOLD_MG_L), unit: "mg/l" },
    Threshold { parameter: "Phosphorus", direction: Direction::Above(TP_THRESHOLD_MG_L), unit: "mg/l" },
    Threshold { parameter: "Total suspended solids", direction: Direction::Above(25.0), unit: "mg/l" },
    Threshold { parameter: "Escherichia coli", direction: Direction::Above(410.0), unit: "MPN/100ml" },
    Threshold { parameter: "Enterococcus", direction: Direction::Above(130.0), unit: "MPN/100ml" },
    Threshold { parameter: "Fecal Coliform", direction: Direction::Above(400.0), unit: "CFU/100ml" },
    Threshold { parameter: "Turbidity", direction: Direction::Above(50.0), unit: "NTU" },
];

/// Nutrient class of a sample parameter.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Nutrient {
    Nitrogen,
    Phosphorus,
}

impl Nutrient {
    pub fn threshold(&self) -> f64 {
        match self {
            Nutrient::Nitrogen => TN_THRESHOLD_MG_L,
            Nutrient::Phosphorus => TP_THRESHOLD_MG_L,
        }
    }
}

/// Classify a sample characteristic name as TN or TP.
pub fn nutrient_for(parameter: &str) -> Option<Nutrient> {
    match parameter.trim() {
        "Total Nitrogen, mixed forms" | "Nitrogen" => Some(Nutrient::Nitrogen),
        "Phosphorus" => Some(Nutrient::Phosphorus),
        _ => None,
    }
}

/// True if a DMR parameter description refers to a nutrient.
///
/// DMR parameter names are free text ("Nitrogen, total [as N]",
/// "Phosphorus, total [as P]", "Ammonia-nitrogen" ...).
pub fn is_nutrient_dmr_parameter(parameter: &str) -> bool {
    let p = parameter.to_lowercase();
    ["nitrogen", "phosph", "ammonia", "nitrate", "nitrite"]
        .iter()
        .any(|needle| p.contains(needle))
}

pub fn threshold_for(parameter: &str) -> Option<&'static Threshold> {
    let parameter = parameter.trim();
    THRESHOLDS.iter().find(|t| t.parameter == parameter)
}

impl Threshold {
    /// True if `value` violates this threshold.
    pub fn is_exceeded(&self, value: f64) -> bool {
        match self.direction {
            Direction::Above(t) => value > t,
            Direction::Below(t) => value < t,
            Direction::Range { low, high } => value < low || value > high,
        }
    }

    /// How far `value` sits relative to the threshold, where 1.0 is exactly at
    /// the limit and larger is worse.
    ///
    /// For ranges the ratio is measured against the nearer bound and is 0.0
    /// inside the band's centre.
    pub fn severity_ratio(&self, value: f64) -> f64 {
        match self.direction {
            Direction::Above(t) => value / t,
            Direction::Below(t) => {
                if value <= 0.0 {
                    f64::MAX
                } else {
                    t / value
                }
            }
            Direction::Range { low, high } => {
                let mid = (low + high) / 2.0;
                let half = (high - low) / 2.0;
                (value - mid).abs() / half
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nutrient_classification() {
        assert_eq!(nutrient_for("Nitrogen"), Some(Nutrient::Nitrogen));
        assert_eq!(
            nutrient_for("Total Nitrogen, mixed forms"),
            Some(Nutrient::Nitrogen)
        );
        assert_eq!(nutrient_for("Phosphorus"), Some(Nutrient::Phosphorus));
        assert_eq!(nutrient_for("Nitrate"), None);
    }

    #[test]
    fn test_nutrient_dmr_parameters() {
        assert!(is_nutrient_dmr_parameter("Nitrogen, total [as N]"));
        assert!(is_nutrient_dmr_parameter("Phosphorus, total [as P]"));
        assert!(is_nutrient_dmr_parameter("Ammonia-nitrogen"));
        assert!(!is_nutrient_dmr_parameter("BOD, 5-day, 20 deg. C"));
    }

    #[test]
    fn test_threshold_directions() {
        let dox = threshold_for("Dissolved oxygen (DO)").unwrap();
        assert!(dox.is_exceeded(4.0));
        assert!(!dox.is_exceeded(6.0));
        assert!((dox.severity_ratio(2.5) - 2.0).abs() < 1e-9);

        let ph = threshold_for("pH").unwrap();
        assert!(ph.is_exceeded(9.0));
        assert!(ph.is_exceeded(6.0));
        assert!(!ph.is_exceeded(7.5));
        assert!((ph.severity_ratio(8.5) - 1.0).abs() < 1e-9);

        let tp = threshold_for("Phosphorus").unwrap();
        assert!((tp.severity_ratio(0.2) - 2.0).abs() < 1e-9);
    }
}
