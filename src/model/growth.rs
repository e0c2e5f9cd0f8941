//! Compound member growth with optional seasonal modulation
//!
//! ```text
//! predicted(n) = base * (1 + g/100)^n * (1 + amplitude * sin(2*pi*(n-1)/12)),  n = 1..=periods
//! ```

use std::f64::consts::PI;

use crate::error::{ForecastError, Result};
use crate::history::MonthlyAggregate;

/// Growth projector with an accepted growth-rate range (percent per month)
#[derive(Debug, Clone)]
pub struct GrowthProjector {
    min_pct: f64,
    max_pct: f64,
}

impl Default for GrowthProjector {
    fn default() -> Self {
        Self {
            min_pct: -50.0,
            max_pct: 100.0,
        }
    }
}

impl GrowthProjector {
    pub fn new(min_pct: f64, max_pct: f64) -> Self {
        Self { min_pct, max_pct }
    }

    /// Reject a growth rate outside the configured range
    pub fn check_rate(&self, growth_pct: f64) -> Result<()> {
        if !growth_pct.is_finite() || growth_pct < self.min_pct || growth_pct > self.max_pct {
            return Err(ForecastError::invalid(
                "member_growth_rate_pct",
                format!("{} is outside [{}, {}]", growth_pct, self.min_pct, self.max_pct),
            ));
        }
        Ok(())
    }

    /// Clamp a rate into the accepted range
    pub fn clamp(&self, growth_pct: f64) -> f64 {
        if growth_pct.is_finite() {
            growth_pct.clamp(self.min_pct, self.max_pct)
        } else {
            0.0
        }
    }

    /// Project `periods` months forward from `base`
    pub fn project(
        &self,
        base: f64,
        growth_pct: f64,
        periods: u32,
        seasonal_amplitude: Option<f64>,
    ) -> Result<Vec<f64>> {
        if !base.is_finite() {
            return Err(ForecastError::invalid("base", "must be finite"));
        }
        self.check_rate(growth_pct)?;
        let amplitude = seasonal_amplitude.unwrap_or(0.0);
        if !(0.0..=1.0).contains(&amplitude) {
            return Err(ForecastError::invalid(
                "member_seasonal_amplitude",
                format!("{} is outside [0, 1]", amplitude),
            ));
        }

        let factor = 1.0 + growth_pct / 100.0;
        Ok((1..=periods)
            .map(|n| {
                let seasonal = 1.0 + amplitude * (2.0 * PI * (n - 1) as f64 / 12.0).sin();
                base * factor.powi(n as i32) * seasonal
            })
            .collect())
    }
}

/// Mean month-over-month member growth in percent
///
/// Months whose predecessor had no members are skipped; 0 when nothing is left.
pub fn historical_growth_rate_pct(aggregates: &[MonthlyAggregate]) -> f64 {
    let deltas: Vec<f64> = aggregates
        .windows(2)
        .filter(|w| w[0].total_members > 0)
        .map(|w| (w[1].total_members as f64 / w[0].total_members as f64 - 1.0) * 100.0)
        .collect();

    if deltas.is_empty() {
        0.0
    } else {
        deltas.iter().sum::<f64>() / deltas.len() as f64
    }
}
