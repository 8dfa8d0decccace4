//! Descriptive statistics for audit scores and summarized metrics.
//!
//! The aggregator and the offline summarizers both reduce a series of
//! per-iteration values to a median and a standard deviation; nothing more
//! elaborate is needed here.

/// Median of a slice of f64 samples.
///
/// Uses linear interpolation between the two middle values for even-length
/// input.
///
/// # Examples
///
/// ```
/// use sitegauge::stats::median;
///
/// assert_eq!(median(&[80.0, 95.0, 90.0]), Some(90.0));
/// assert_eq!(median(&[1.0, 2.0, 3.0, 4.0]), Some(2.5));
/// assert_eq!(median(&[]), None);
/// ```
pub fn median(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// Population standard deviation of a slice of f64 samples.
///
/// # Examples
///
/// ```
/// use sitegauge::stats::std_dev;
///
/// assert_eq!(std_dev(&[4.0, 4.0, 4.0]), Some(0.0));
/// assert_eq!(std_dev(&[]), None);
/// ```
pub fn std_dev(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }

    let count = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / count;
    let variance = samples.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / count;
    Some(variance.sqrt())
}
