//! Percentiles by linear interpolation between order statistics

/// Percentile `q` in [0, 1] of an ascending slice
///
/// Position `h = (n - 1) * q`, interpolating between the neighbouring order
/// statistics. `None` for an empty slice.
pub fn percentile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    let h = (sorted.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    Some(sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo]))
}

/// Percentile of unsorted values
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile_sorted(&sorted, q)
}

/// Median of unsorted values
pub fn median(values: &[f64]) -> Option<f64> {
    percentile(values, 0.5)
}

/// Summary percentiles of one sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Percentiles {
    pub p10: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub p90: f64,
    pub lower: f64,
    pub upper: f64,
}

impl Percentiles {
    /// Sorts `samples` in place; `None` when empty
    pub fn from_samples(samples: &mut [f64], confidence_level: f64) -> Option<Self> {
        samples.sort_by(f64::total_cmp);
        let tail = (1.0 - confidence_level) / 2.0;
        let at = |q| percentile_sorted(samples, q);

        Some(Self {
            p10: at(0.10)?,
            p25: at(0.25)?,
            median: at(0.50)?,
            p75: at(0.75)?,
            p90: at(0.90)?,
            lower: at(tail)?,
            upper: at(1.0 - tail)?,
        })
    }
}
