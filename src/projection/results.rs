//! Forecast output structures

use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostics;
use crate::history::Month;

/// Forecast for one horizon month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub month: Month,
    pub predicted_members: u64,
    pub predicted_calls: u64,
    pub required_staff: u32,
    pub required_supervisors: u32,

    /// Calls per member (0 with no members)
    pub calls_per_member: f64,

    /// Offered load divided by staffed agents
    pub agent_utilization: f64,

    /// Probability of answering within the target time at `required_staff`
    pub service_level: f64,

    /// False when Erlang-C gave up and the workload floor was used instead
    pub staffing_converged: bool,
}

/// Metrics that carry confidence intervals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Members,
    Calls,
    Staff,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Members, Metric::Calls, Metric::Staff];

    /// This metric's value in a forecast point
    pub fn value(&self, point: &ForecastPoint) -> f64 {
        match self {
            Metric::Members => point.predicted_members as f64,
            Metric::Calls => point.predicted_calls as f64,
            Metric::Staff => point.required_staff as f64,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Members => "members",
            Metric::Calls => "calls",
            Metric::Staff => "staff",
        }
    }
}

/// Monte Carlo percentiles of one metric in one month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub month: Month,
    pub metric: Metric,
    pub p10: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub p90: f64,

    /// Two-sided bounds at the scenario's confidence level
    pub lower: f64,
    pub upper: f64,
}

/// Bookkeeping for a Monte Carlo run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloSummary {
    pub requested: usize,
    pub completed: usize,
    pub failed: usize,

    /// Failed trials that ran out of time
    pub timed_out: usize,

    /// Completed trials with at least one month on workload staffing
    #[serde(default)]
    pub staffing_fallbacks: usize,

    /// Base seed; trial `i` used `seed + i`
    pub seed: u64,

    pub confidence_level: f64,
}

/// A month whose staffing fell back to the workload estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffingIssue {
    pub month: Month,
    pub message: String,
}

/// Full result of `compute_forecast`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastOutput {
    pub forecast_results: Vec<ForecastPoint>,

    /// Present only when Monte Carlo ran
    pub confidence_intervals: Option<Vec<ConfidenceInterval>>,

    pub computation_time_ms: u64,

    pub monte_carlo: Option<MonteCarloSummary>,

    #[serde(default)]
    pub staffing_issues: Vec<StaffingIssue>,

    pub diagnostics: Diagnostics,
}

impl ForecastOutput {
    /// Intervals for a single metric, in month order
    pub fn intervals_for(&self, metric: Metric) -> Vec<&ConfidenceInterval> {
        self.confidence_intervals
            .iter()
            .flatten()
            .filter(|ci| ci.metric == metric)
            .collect()
    }

    /// Get summary statistics
    pub fn summary(&self) -> ForecastSummary {
        let points = &self.forecast_results;
        let total_calls: u64 = points.iter().map(|p| p.predicted_calls).sum();
        let peak = points.iter().max_by_key(|p| p.required_staff);
        let average_staff = if points.is_empty() {
            0.0
        } else {
            points.iter().map(|p| p.required_staff as f64).sum::<f64>() / points.len() as f64
        };

        ForecastSummary {
            total_months: points.len() as u32,
            total_calls,
            final_members: points.last().map(|p| p.predicted_members).unwrap_or(0),
            peak_staff: peak.map(|p| p.required_staff).unwrap_or(0),
            peak_month: peak.map(|p| p.month),
            average_staff,
            unconverged_months: points.iter().filter(|p| !p.staffing_converged).count() as u32,
        }
    }
}

/// Summary statistics for a forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSummary {
    pub total_months: u32,
    pub total_calls: u64,
    pub final_members: u64,
    pub peak_staff: u32,
    pub peak_month: Option<Month>,
    pub average_staff: f64,
    pub unconverged_months: u32,
}
