use crate::records::{
    DmrRecord, DrinkingWaterEnforcement, DrinkingWaterSystem, DrinkingWaterViolation,
    EnforcementAction, Inspection, Permit, PermitViolation, WaterQualitySample, Waterbody,
};
use crate::unit::WatershedUnit;

/// Permit-side records returned by one coordinate lookup.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PermitRecords {
    pub permits: Vec<Permit>,
    pub violations: Vec<PermitViolation>,
    pub dmrs: Vec<DmrRecord>,
    pub enforcement: Vec<EnforcementAction>,
    pub inspections: Vec<Inspection>,
}

impl PermitRecords {
    /// Nutrient DMRs, in input order.
    pub fn nutrient_dmrs(&self) -> impl Iterator<Item = &DmrRecord> {
        self.dmrs.iter().filter(|d| d.is_nutrient())
    }
}

/// Drinking-water records returned by one coordinate lookup.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DrinkingWaterRecords {
    pub systems: Vec<DrinkingWaterSystem>,
    pub violations: Vec<DrinkingWaterViolation>,
    pub enforcement: Vec<DrinkingWaterEnforcement>,
}

impl DrinkingWaterRecords {
    pub fn population_served(&self) -> u64 {
        self.systems.iter().map(|s| s.population_served).sum()
    }
}

/// Everything known about one watershed unit for a single batch pass.
///
/// Built by the collector, read by all nine calculators, then dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitDataBundle {
    pub unit: WatershedUnit,
    pub samples: Vec<WaterQualitySample>,
    pub permits: PermitRecords,
    pub drinking_water: DrinkingWaterRecords,
    /// Waterbodies whose derived basin code equals the unit's code.
    pub waterbodies: Vec<Waterbody>,
}

impl UnitDataBundle {
    /// An empty bundle for `unit`, handy for tests and partial assembly.
    pub fn empty(unit: WatershedUnit) -> Self {
        UnitDataBundle {
            unit,
            samples: Vec::new(),
            permits: PermitRecords::default(),
            drinking_water: DrinkingWaterRecords::default(),
            waterbodies: Vec::new(),
        }
    }

    /// True if any mapped waterbody is of a coastal/tidal water type.
    pub fn is_coastal(&self) -> bool {
        self.waterbodies.iter().any(|w| w.is_coastal())
    }
}
