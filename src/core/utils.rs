//! Utility functions and types.

/// A time interval, either right half-open or closed.
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum TimeInterval {
    /// An interval [start, end).
    HalfOpen { start: f64, end: f64 },
    /// An interval [start, end].
    Closed { start: f64, end: f64 },
    /// An empty time interval.
    Empty,
}

impl TimeInterval {
    pub fn new(start: f64, end: f64) -> Self {
        if start >= end {
            TimeInterval::Empty
        } else {
            TimeInterval::HalfOpen { start, end }
        }
    }

    /// The closed interval spanned by a `[start, end]` pair.
    /// Degenerate intervals (`start >= end`) are empty.
    pub fn from_bounds(bounds: [f64; 2]) -> Self {
        let [start, end] = bounds;
        if start >= end {
            TimeInterval::Empty
        } else {
            TimeInterval::Closed { start, end }
        }
    }

    pub fn contains(&self, time: f64) -> bool {
        match self {
            TimeInterval::HalfOpen { start, end } => time >= *start && time < *end,
            TimeInterval::Closed { start, end } => time >= *start && time <= *end,
            TimeInterval::Empty => false,
        }
    }

    pub fn length(&self) -> f64 {
        match self {
            TimeInterval::HalfOpen { start, end } | TimeInterval::Closed { start, end } => {
                end - start
            }
            TimeInterval::Empty => 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, TimeInterval::Empty)
    }
}

/// The number of decimal digits of a (positive) count.
pub fn num_digits(n: usize) -> usize {
    n.max(1).to_string().len()
}

/// The mean and (population) standard deviation of a sample.
/// Returns `None` for an empty sample.
pub fn mean_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, var.sqrt()))
}

/// The q-quantile of a sorted sample, with linear interpolation between the closest ranks.
/// Returns `None` for an empty sample.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_contains() {
        let interval = TimeInterval::new(0.0, 10.0);
        assert_eq!(interval.contains(-1.0), false);
        assert_eq!(interval.contains(0.0), true);
        assert_eq!(interval.contains(5.0), true);
        assert_eq!(interval.contains(10.0), false);
        assert_eq!(interval.length(), 10.0);

        let interval = TimeInterval::from_bounds([600.0, 800.0]);
        assert_eq!(interval.contains(600.0), true);
        assert_eq!(interval.contains(800.0), true);
        assert_eq!(interval.contains(800.1), false);
        assert_eq!(interval.length(), 200.0);
    }

    #[test]
    fn test_empty_interval() {
        let interval = TimeInterval::new(500.0, 400.0);
        assert!(interval.is_empty());
        assert_eq!(interval.contains(450.0), false);
        assert_eq!(interval.length(), 0.0);
        assert!(TimeInterval::from_bounds([500.0, 500.0]).is_empty());
        assert!(TimeInterval::from_bounds([500.0, 400.0]).is_empty());
    }

    #[test]
    fn test_num_digits() {
        assert_eq!(num_digits(0), 1);
        assert_eq!(num_digits(9), 1);
        assert_eq!(num_digits(10), 2);
        assert_eq!(num_digits(7725), 4);
    }

    #[test]
    fn test_mean_std() {
        assert_eq!(mean_std(&[]), None);
        let (mean, std) = mean_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(mean, 5.0);
        assert_eq!(std, 2.0);
    }

    #[test]
    fn test_quantile() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&sorted, 0.0), Some(1.0));
        assert_eq!(quantile(&sorted, 0.5), Some(2.5));
        assert_eq!(quantile(&sorted, 0.25), Some(1.75));
        assert_eq!(quantile(&sorted, 1.0), Some(4.0));
        assert_eq!(quantile(&[], 0.5), None);
    }
}
