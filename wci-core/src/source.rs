//! The boundary to the upstream source caches.
//!
//! Coordinate lookups perform their own 3×3 neighbourhood expansion, so
//! results can include records from adjoining states; callers narrow them.

use crate::bundle::{DrinkingWaterRecords, PermitRecords};
use crate::records::{WaterQualitySample, Waterbody};

/// Read access to the warmed source caches.
///
/// Implementations must be shareable across the batch worker threads.
pub trait SourceCaches: Send + Sync {
    /// Water-quality samples around a coordinate.
    fn water_quality_near(&self, lat: f64, lng: f64) -> anyhow::Result<Vec<WaterQualitySample>>;

    /// Permits around a coordinate plus their violations, DMRs, enforcement
    /// actions and inspections.
    fn permits_near(&self, lat: f64, lng: f64) -> anyhow::Result<PermitRecords>;

    /// Drinking-water systems around a coordinate plus their violations and
    /// enforcement actions.
    fn drinking_water_near(&self, lat: f64, lng: f64) -> anyhow::Result<DrinkingWaterRecords>;

    /// Every assessed waterbody in a state.
    fn waterbodies_in_state(&self, state: &str) -> anyhow::Result<Vec<Waterbody>>;
}
