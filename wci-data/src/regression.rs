//! Ordinary least squares and small summary statistics.

/// A fitted line `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Fit `y` against `x` by ordinary least squares.
///
/// Returns `None` for an empty input. When every `x` is the same the
/// slope is zero and the line passes through the mean of `y`.
pub fn least_squares(points: &[(f64, f64)]) -> Option<LinearFit> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (x, y) in points {
        sxx += (x - mean_x) * (x - mean_x);
        sxy += (x - mean_x) * (y - mean_y);
    }

    if sxx.abs() < f64::EPSILON {
        return Some(LinearFit {
            slope: 0.0,
            intercept: mean_y,
        });
    }
    let slope = sxy / sxx;
    Some(LinearFit {
        slope,
        intercept: mean_y - slope * mean_x,
    })
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_least_squares_exact_line() {
        let points = [(-2.0, 1.0), (-1.0, 3.0), (0.0, 5.0), (1.0, 7.0)];
        let fit = least_squares(&points).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-9);
        assert!((fit.intercept - 5.0).abs() < 1e-9);
        assert!((fit.at(7.0) - 19.0).abs() < 1e-9);
    }

    #[test]
    fn test_least_squares_degenerate_x() {
        let points = [(0.0, 40.0), (0.0, 44.0), (0.0, 42.0)];
        let fit = least_squares(&points).unwrap();
        assert_eq!(fit.slope, 0.0);
        assert!((fit.intercept - 42.0).abs() < 1e-9);
    }

    #[test]
    fn test_least_squares_empty() {
        assert!(least_squares(&[]).is_none());
    }

    #[test]
    fn test_median_and_mean() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
        assert_eq!(mean(&[1.0, 2.0, 6.0]), Some(3.0));
    }
}
