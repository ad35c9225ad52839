//! Rolling composite history and short-term projections.

use crate::regression::least_squares;
use chrono::{DateTime, Duration, Utc};
use wci_core::score::{clamp_score, Projection, ScoreHistoryEntry, Trend, HISTORY_CAPACITY};
use wci_utils::dates::day_offset;

/// History points needed before any projection is made.
pub const MIN_PROJECTION_POINTS: usize = 3;

/// Projected change, in composite points, that counts as a direction.
pub const DIRECTION_THRESHOLD: i32 = 3;

/// Horizon and fitting window of one projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Horizon {
    pub days: i64,
    /// Most recent points used for the fit; `None` uses the whole history.
    pub window: Option<usize>,
    /// Multiplier on the composite confidence.
    pub confidence_scale: f64,
}

pub const SEVEN_DAY: Horizon = Horizon {
    days: 7,
    window: Some(7),
    confidence_scale: 0.85,
};

pub const THIRTY_DAY: Horizon = Horizon {
    days: 30,
    window: None,
    confidence_scale: 0.70,
};

/// Append today's composite and trim to the newest [`HISTORY_CAPACITY`]
/// entries.
pub fn append_history(
    history: &mut Vec<ScoreHistoryEntry>,
    composite_value: u8,
    now: DateTime<Utc>,
) {
    history.push(ScoreHistoryEntry {
        date: now,
        composite_value,
    });
    if history.len() > HISTORY_CAPACITY {
        let excess = history.len() - HISTORY_CAPACITY;
        history.drain(..excess);
    }
}

/// Project the composite `horizon.days` ahead of `now`.
///
/// `None` with fewer than three history points. The current value is the
/// last history entry.
pub fn project(
    history: &[ScoreHistoryEntry],
    horizon: Horizon,
    composite_confidence: u8,
    now: DateTime<Utc>,
) -> Option<Projection> {
    let points = match horizon.window {
        Some(n) => &history[history.len().saturating_sub(n)..],
        None => history,
    };
    if points.len() < MIN_PROJECTION_POINTS {
        return None;
    }
    let current = points.last()?.composite_value;
    let xy: Vec<(f64, f64)> = points
        .iter()
        .map(|e| (day_offset(&e.date, &now), e.composite_value as f64))
        .collect();
    let fit = least_squares(&xy)?;
    let target = now + Duration::days(horizon.days);
    let projected = clamp_score(fit.at(day_offset(&target, &now)));
    let delta = projected as i32 - current as i32;

    Some(Projection {
        composite_value: projected,
        delta,
        direction: direction_for(delta),
        confidence: clamp_score(composite_confidence as f64 * horizon.confidence_scale),
    })
}

/// Both projections, 7-day then 30-day.
pub fn projections(
    history: &[ScoreHistoryEntry],
    composite_confidence: u8,
    now: DateTime<Utc>,
) -> (Option<Projection>, Option<Projection>) {
    (
        project(history, SEVEN_DAY, composite_confidence, now),
        project(history, THIRTY_DAY, composite_confidence, now),
    )
}

/// A rising composite means worsening conditions.
pub fn direction_for(delta: i32) -> Trend {
    if delta >= DIRECTION_THRESHOLD {
        Trend::Declining
    } else if delta <= -DIRECTION_THRESHOLD {
        Trend::Improving
    } else {
        Trend::Stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 6, 0, 0).unwrap()
    }

    fn daily(values: &[u8]) -> Vec<ScoreHistoryEntry> {
        let n = values.len() as i64;
        values
            .iter()
            .enumerate()
            .map(|(i, v)| ScoreHistoryEntry {
                date: now() - Duration::days(n - 1 - i as i64),
                composite_value: *v,
            })
            .collect()
    }

    #[test]
    fn test_history_is_capped() {
        let mut history = Vec::new();
        for day in 0..(HISTORY_CAPACITY as i64 + 10) {
            append_history(&mut history, (day % 100) as u8, now() + Duration::days(day));
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history[0].composite_value, 10);
        assert_eq!(history.last().map(|e| e.composite_value), Some(99));
    }

    #[test]
    fn test_too_little_history() {
        let history = daily(&[40, 42]);
        assert_eq!(projections(&history, 80, now()), (None, None));
    }

    #[test]
    fn test_flat_history_is_stable() {
        let history = daily(&[55, 55, 55, 55]);
        let (seven, thirty) = projections(&history, 80, now());
        let seven = seven.unwrap();
        assert_eq!(seven.composite_value, 55);
        assert_eq!(seven.delta, 0);
        assert_eq!(seven.direction, Trend::Stable);
        assert_eq!(seven.confidence, 68);
        assert_eq!(thirty.unwrap().confidence, 56);
    }

    #[test]
    fn test_rising_history_is_declining() {
        // +1 point per day, current value 50
        let history = daily(&[40, 41, 42, 43, 44, 45, 46, 47, 48, 49, 50]);
        let (seven, thirty) = projections(&history, 100, now());
        let seven = seven.unwrap();
        assert_eq!(seven.composite_value, 57);
        assert_eq!(seven.delta, 7);
        assert_eq!(seven.direction, Trend::Declining);
        let thirty = thirty.unwrap();
        assert_eq!(thirty.composite_value, 80);
        assert_eq!(thirty.direction, Trend::Declining);
    }

    #[test]
    fn test_projection_is_clamped() {
        let history = daily(&[10, 5, 0]);
        let thirty = project(&history, THIRTY_DAY, 50, now()).unwrap();
        assert_eq!(thirty.composite_value, 0);
        assert_eq!(thirty.delta, 0);
        assert_eq!(thirty.direction, Trend::Stable);
    }

    #[test]
    fn test_direction_thresholds() {
        assert_eq!(direction_for(3), Trend::Declining);
        assert_eq!(direction_for(2), Trend::Stable);
        assert_eq!(direction_for(-3), Trend::Improving);
    }
}
