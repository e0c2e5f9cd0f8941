//! Additive seasonal decomposition
//!
//! Splits a monthly series into `trend + seasonal + residual`:
//!
//! - Trend: centred moving average over one period (2xP for an even period, i.e.
//!   P+1 points with half-weighted ends). The undefined ends are extrapolated with a
//!   least-squares line through the nearest P defined trend values.
//! - Seasonal: mean detrended value per calendar slot, normalised to sum to zero.
//! - Residual: whatever is left.
//!
//! Series shorter than two full periods get a degenerate decomposition: no seasonal
//! component and a straight-line trend.

use serde::{Deserialize, Serialize};

use crate::history::Month;

/// Monthly seasonality
pub const DEFAULT_PERIOD: usize = 12;

/// Result of decomposing one series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decomposition {
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub residual: Vec<f64>,

    /// One additive index per calendar slot (January first for period 12)
    pub seasonal_indices: Vec<f64>,

    /// Mean of the observed values
    pub mean_level: f64,

    /// True when the series was too short for a seasonal estimate
    pub degenerate: bool,
}

impl Decomposition {
    fn degenerate(values: &[f64], period: usize) -> Self {
        let xs: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
        let (intercept, slope) = linear_fit(&xs, values);
        let trend: Vec<f64> = xs.iter().map(|x| intercept + slope * x).collect();
        let residual = values.iter().zip(&trend).map(|(y, t)| y - t).collect();

        Self {
            trend,
            seasonal: vec![0.0; values.len()],
            residual,
            seasonal_indices: vec![0.0; period],
            mean_level: mean(values),
            degenerate: true,
        }
    }

    /// Additive seasonal index for a calendar month
    pub fn seasonal_index(&self, month: Month) -> f64 {
        if self.seasonal_indices.is_empty() {
            return 0.0;
        }
        self.seasonal_indices[month.calendar_index() % self.seasonal_indices.len()]
    }

    /// Seasonal index expressed as a multiplier around the mean level
    ///
    /// `1 + index / mean_level`, floored at 0. Always 1.0 for a degenerate
    /// decomposition or a non-positive mean level.
    pub fn seasonal_multiplier(&self, month: Month) -> f64 {
        if self.degenerate || self.mean_level <= 0.0 {
            return 1.0;
        }
        (1.0 + self.seasonal_index(month) / self.mean_level).max(0.0)
    }
}

/// Additive decomposer with a fixed seasonal period
#[derive(Debug, Clone)]
pub struct SeasonalDecomposer {
    period: usize,
}

impl Default for SeasonalDecomposer {
    fn default() -> Self {
        Self { period: DEFAULT_PERIOD }
    }
}

impl SeasonalDecomposer {
    /// Decomposer for a custom period (at least 2)
    pub fn with_period(period: usize) -> Self {
        Self { period: period.max(2) }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Decompose a series of consecutive monthly observations
    ///
    /// `months` and `values` are parallel; seasonal slots follow the calendar month
    /// of each observation.
    pub fn decompose(&self, months: &[Month], values: &[f64]) -> Decomposition {
        let n = values.len().min(months.len());
        let values = &values[..n];
        let p = self.period;

        if n < 2 * p {
            log::debug!("{} observations is under two periods, using linear trend only", n);
            return Decomposition::degenerate(values, p);
        }

        let (centred, first, last) = centred_moving_average(values, p);
        let trend = extend_trend(centred, first, last, p);

        // Seasonal means over the centred window only; extrapolated ends would bias them
        let mut sums = vec![0.0; p];
        let mut counts = vec![0usize; p];
        for i in first..=last {
            let slot = months[i].calendar_index() % p;
            sums[slot] += values[i] - trend[i];
            counts[slot] += 1;
        }
        let mut indices: Vec<f64> = sums
            .iter()
            .zip(&counts)
            .map(|(s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
            .collect();
        let offset = mean(&indices);
        for index in indices.iter_mut() {
            *index -= offset;
        }

        let seasonal: Vec<f64> = months[..n]
            .iter()
            .map(|m| indices[m.calendar_index() % p])
            .collect();
        let residual = values
            .iter()
            .zip(&trend)
            .zip(&seasonal)
            .map(|((y, t), s)| y - t - s)
            .collect();

        Decomposition {
            trend,
            seasonal,
            residual,
            seasonal_indices: indices,
            mean_level: mean(values),
            degenerate: false,
        }
    }
}

/// Centred moving average; returns the values plus the first/last defined index
fn centred_moving_average(values: &[f64], period: usize) -> (Vec<f64>, usize, usize) {
    let n = values.len();
    let half = period / 2;
    let mut trend = vec![0.0; n];

    for (i, slot) in trend.iter_mut().enumerate().take(n - half).skip(half) {
        *slot = if period % 2 == 0 {
            let inner: f64 = values[i + 1 - half..i + half].iter().sum();
            (0.5 * values[i - half] + inner + 0.5 * values[i + half]) / period as f64
        } else {
            values[i - half..=i + half].iter().sum::<f64>() / period as f64
        };
    }

    (trend, half, n - half - 1)
}

/// Fill the undefined ends of a centred trend by linear extrapolation
fn extend_trend(mut trend: Vec<f64>, first: usize, last: usize, period: usize) -> Vec<f64> {
    let span = period.min(last - first + 1);

    let head: Vec<f64> = (first..first + span).map(|i| i as f64).collect();
    let (a, b) = linear_fit(&head, &trend[first..first + span]);
    for (i, slot) in trend.iter_mut().enumerate().take(first) {
        *slot = a + b * i as f64;
    }

    let tail_start = last + 1 - span;
    let tail: Vec<f64> = (tail_start..=last).map(|i| i as f64).collect();
    let (a, b) = linear_fit(&tail, &trend[tail_start..=last]);
    for (i, slot) in trend.iter_mut().enumerate().skip(last + 1) {
        *slot = a + b * i as f64;
    }

    trend
}

/// Ordinary least squares `y = a + b x`; flat line through the mean when x has no spread
pub(crate) fn linear_fit(xs: &[f64], ys: &[f64]) -> (f64, f64) {
    if xs.is_empty() {
        return (0.0, 0.0);
    }
    let mx = mean(xs);
    let my = mean(ys);
    let sxx: f64 = xs.iter().map(|x| (x - mx).powi(2)).sum();
    if sxx == 0.0 {
        return (my, 0.0);
    }
    let sxy: f64 = xs.iter().zip(ys).map(|(x, y)| (x - mx) * (y - my)).sum();
    let slope = sxy / sxx;
    (my - slope * mx, slope)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
