//! Per-unit data collection.
//!
//! One coordinate lookup per grid-keyed source plus one state lookup for
//! waterbodies. Grid lookups cover a 3×3 neighbourhood and therefore leak
//! records from neighbouring states; everything is narrowed to the unit's
//! owning state here.

use std::collections::HashSet;
use wci_core::bundle::{DrinkingWaterRecords, PermitRecords, UnitDataBundle};
use wci_core::source::SourceCaches;
use wci_core::unit::{GeoReference, WatershedUnit};

/// Gather every record relevant to `code`.
///
/// `Ok(None)` when the unit lacks a centroid or adjacency entry; callers
/// skip such units. Source errors propagate.
pub fn collect_unit(
    code: &str,
    geography: &GeoReference,
    caches: &dyn SourceCaches,
) -> anyhow::Result<Option<UnitDataBundle>> {
    let Some(unit) = geography.unit_geography(code) else {
        log::debug!("[WCI] collector: no geography for {}", code);
        return Ok(None);
    };

    let samples = caches
        .water_quality_near(unit.lat, unit.lng)?
        .into_iter()
        .filter(|s| same_state(&s.state, &unit))
        .collect();
    let permits = narrow_permits(caches.permits_near(unit.lat, unit.lng)?, &unit);
    let drinking_water = narrow_drinking_water(caches.drinking_water_near(unit.lat, unit.lng)?, &unit);
    let waterbodies = caches
        .waterbodies_in_state(&unit.state)?
        .into_iter()
        .filter(|w| w.basin_code() == Some(unit.code.as_str()))
        .collect();

    let bundle = UnitDataBundle {
        unit,
        samples,
        permits,
        drinking_water,
        waterbodies,
    };
    log::debug!(
        "[WCI] collector: {} -> {} samples, {} permits, {} systems, {} waterbodies",
        code,
        bundle.samples.len(),
        bundle.permits.permits.len(),
        bundle.drinking_water.systems.len(),
        bundle.waterbodies.len()
    );
    Ok(Some(bundle))
}

fn same_state(state: &str, unit: &WatershedUnit) -> bool {
    state.trim().eq_ignore_ascii_case(&unit.state)
}

/// Keep in-state permits and the child records that belong to them.
fn narrow_permits(records: PermitRecords, unit: &WatershedUnit) -> PermitRecords {
    let permits: Vec<_> = records
        .permits
        .into_iter()
        .filter(|p| same_state(&p.state, unit))
        .collect();
    let ids: HashSet<String> = permits.iter().map(|p| p.permit_id.clone()).collect();
    PermitRecords {
        violations: records
            .violations
            .into_iter()
            .filter(|v| ids.contains(&v.permit_id))
            .collect(),
        dmrs: records
            .dmrs
            .into_iter()
            .filter(|d| ids.contains(&d.permit_id))
            .collect(),
        enforcement: records
            .enforcement
            .into_iter()
            .filter(|e| ids.contains(&e.permit_id))
            .collect(),
        inspections: records
            .inspections
            .into_iter()
            .filter(|i| ids.contains(&i.permit_id))
            .collect(),
        permits,
    }
}

/// Keep in-state systems and the child records that belong to them.
fn narrow_drinking_water(records: DrinkingWaterRecords, unit: &WatershedUnit) -> DrinkingWaterRecords {
    let systems: Vec<_> = records
        .systems
        .into_iter()
        .filter(|s| same_state(&s.state, unit))
        .collect();
    let ids: HashSet<String> = systems.iter().map(|s| s.pwsid.clone()).collect();
    DrinkingWaterRecords {
        violations: records
            .violations
            .into_iter()
            .filter(|v| ids.contains(&v.pwsid))
            .collect(),
        enforcement: records
            .enforcement
            .into_iter()
            .filter(|e| ids.contains(&e.pwsid))
            .collect(),
        systems,
    }
}
