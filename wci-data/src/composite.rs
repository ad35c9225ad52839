//! Weighted composite of the nine indices.
//!
//! Every index except Watershed Recovery is a risk score. Recovery is
//! higher-is-better, so it enters the composite as `100 - value` and the
//! composite stays a pure risk number.

use wci_core::score::{clamp_score, IndexSet};

/// Composite value and its weakest-link confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Composite {
    pub value: u8,
    pub confidence: u8,
}

pub fn aggregate(indices: &IndexSet) -> Composite {
    let mut total = 0.0;
    let mut confidence = u8::MAX;
    for (kind, score) in indices.iter() {
        let risk = if kind.higher_is_worse() {
            score.value as f64
        } else {
            100.0 - score.value as f64
        };
        total += kind.weight() * risk;
        confidence = confidence.min(score.confidence);
    }
    Composite {
        value: clamp_score(total),
        confidence,
    }
}
