//! Scoring for watershed units.
//!
//! The flow for one unit is: [`collector`] builds a `UnitDataBundle`, the
//! nine [`indices`] calculators score it, [`tidal`] adjusts coastal units,
//! [`composite`] folds the nine into one value and [`projection`] extends the
//! unit's history into short-term forecasts. [`pipeline`] strings the steps
//! together. Everything except the collector is a pure function.

pub mod collector;
pub mod composite;
pub mod confidence;
pub mod indices;
pub mod pipeline;
pub mod projection;
pub mod regression;
pub mod tidal;
