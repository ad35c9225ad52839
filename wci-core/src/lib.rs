//! Core types for the watershed composite index engine.
//!
//! Everything in this crate is plain data: watershed units and their geo
//! reference, the records served by the upstream source caches, the
//! per-unit [`bundle::UnitDataBundle`], index and composite scores, and the
//! state-level baseline tables. Algorithms live in `wci-data`.

pub mod baseline;
pub mod bundle;
pub mod parameter;
pub mod records;
pub mod score;
pub mod source;
pub mod unit;
