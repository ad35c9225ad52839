//! Coastal/tidal adjustment.
//!
//! Only four indices carry a tidal factor; the rest are never touched.

use wci_core::score::{clamp_score, IndexKind, IndexSet};

/// Multipliers applied to the indices of a coastal unit.
pub const TIDAL_FACTORS: [(IndexKind, f64); 4] = [
    (IndexKind::LoadVelocity, 1.05),
    (IndexKind::InfrastructureFailure, 1.10),
    (IndexKind::WatershedRecovery, 0.85),
    (IndexKind::PermitRiskExposure, 0.98),
];

/// Scale the tidal indices of a coastal unit in place. No-op otherwise.
pub fn apply_tidal_modifier(indices: &mut IndexSet, coastal: bool) {
    if !coastal {
        return;
    }
    for (kind, factor) in TIDAL_FACTORS {
        let score = indices.get_mut(kind);
        score.value = clamp_score(score.value as f64 * factor);
        score.tidal_modified = true;
    }
}
