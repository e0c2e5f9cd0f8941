//! History diagnostics: data quality score and calls-per-member anomalies

use serde::{Deserialize, Serialize};

use crate::config::AnomalyConfig;
use crate::history::{Month, MonthlyAggregate};
use crate::simulation::percentile::{median, percentile};

/// Months of history considered complete for scoring
const FULL_HISTORY_MONTHS: usize = 12;

/// Scales MAD to a standard deviation for normal data
const MAD_SCALE: f64 = 0.6745;

/// What the engine observed about the history behind a forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub history_months: usize,

    /// Month the forecast was anchored on
    pub base_month: Month,

    /// 1.0 for a clean year or more of history, lower for short or noisy data
    pub data_quality_score: f64,

    /// Months with unusual calls per member
    pub anomalous_months: Vec<Month>,

    /// Decomposition fell back to a straight-line trend
    pub degenerate_decomposition: bool,

    /// Mean month-over-month member growth in the history, percent
    pub historical_growth_rate_pct: f64,

    /// Calls per 1000 members in the base month
    pub base_calls_per_thousand: f64,

    /// Multiplier from the scenario's segment adjustments
    pub segment_adjustment_factor: f64,
}

/// Score history completeness and cleanliness in [0, 1]
///
/// Starts at 1, loses 0.05 per month short of a full year and 0.1 times the
/// outlier ratio for members, calls and handle time. An outlier lies outside the
/// 1st to 99th percentile range of its column.
pub fn data_quality_score(aggregates: &[MonthlyAggregate]) -> f64 {
    if aggregates.is_empty() {
        return 0.0;
    }

    let mut score = 1.0;
    score -= 0.05 * FULL_HISTORY_MONTHS.saturating_sub(aggregates.len()) as f64;

    let columns: [Vec<f64>; 3] = [
        aggregates.iter().map(|a| a.total_members as f64).collect(),
        aggregates.iter().map(|a| a.total_calls as f64).collect(),
        aggregates.iter().map(|a| a.avg_handle_time_seconds).collect(),
    ];
    for column in &columns {
        score -= 0.1 * outlier_ratio(column);
    }

    score.clamp(0.0, 1.0)
}

fn outlier_ratio(values: &[f64]) -> f64 {
    let (Some(low), Some(high)) = (percentile(values, 0.01), percentile(values, 0.99)) else {
        return 0.0;
    };
    let outliers = values.iter().filter(|&&v| v < low || v > high).count();
    outliers as f64 / values.len() as f64
}

/// Robust z-score detector on calls per member
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    z_threshold: f64,
    contamination: f64,
    min_months: usize,
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::from_config(&AnomalyConfig::default())
    }
}

impl AnomalyDetector {
    pub fn from_config(config: &AnomalyConfig) -> Self {
        Self {
            z_threshold: config.z_threshold,
            contamination: config.contamination,
            min_months: config.min_months,
        }
    }

    /// Months whose calls per member stand out, most extreme first
    ///
    /// Empty below the minimum history length or when the series has no spread.
    pub fn detect(&self, aggregates: &[MonthlyAggregate]) -> Vec<Month> {
        if aggregates.len() < self.min_months {
            return Vec::new();
        }

        let ratios: Vec<f64> = aggregates
            .iter()
            .map(|a| {
                if a.total_members == 0 {
                    0.0
                } else {
                    a.total_calls as f64 / a.total_members as f64
                }
            })
            .collect();

        let Some(centre) = median(&ratios) else {
            return Vec::new();
        };
        let deviations: Vec<f64> = ratios.iter().map(|r| (r - centre).abs()).collect();
        let mad = median(&deviations).unwrap_or(0.0);
        if mad <= 0.0 {
            return Vec::new();
        }

        let mut flagged: Vec<(f64, Month)> = aggregates
            .iter()
            .zip(&ratios)
            .map(|(a, r)| (MAD_SCALE * (r - centre).abs() / mad, a.month))
            .filter(|(z, _)| *z > self.z_threshold)
            .collect();
        flagged.sort_by(|a, b| b.0.total_cmp(&a.0));

        let cap = (self.contamination * aggregates.len() as f64).floor() as usize;
        flagged.truncate(cap);
        flagged.into_iter().map(|(_, month)| month).collect()
    }
}
