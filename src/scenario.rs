//! Forecast scenarios and the batch scenario runner
//!
//! A `Scenario` carries every adjustable parameter of one forecast. Presets build
//! baseline, optimistic and pessimistic variants; `ScenarioRunner` holds one engine
//! and runs many scenarios against the same history.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::assumptions::Assumptions;
use crate::config::EngineConfig;
use crate::error::{ForecastError, Result};
use crate::history::{Month, TimeSeriesRecord};
use crate::projection::{ForecastEngine, ForecastOutput, Metric};

/// Which preset a scenario was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    Baseline,
    Optimistic,
    Pessimistic,
    #[default]
    Custom,
}

/// Multipliers applied to the historical call rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallVolumeFactors {
    pub seasonal_factor: f64,
    pub engagement_impact: f64,
    pub product_mix_impact: f64,
    pub regulatory_impact: f64,
}

impl Default for CallVolumeFactors {
    fn default() -> Self {
        Self {
            seasonal_factor: 1.0,
            engagement_impact: 1.0,
            product_mix_impact: 1.0,
            regulatory_impact: 1.0,
        }
    }
}

impl CallVolumeFactors {
    /// Combined multiplier
    pub fn product(&self) -> f64 {
        self.seasonal_factor * self.engagement_impact * self.product_mix_impact * self.regulatory_impact
    }
}

/// Contact-centre staffing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaffingParams {
    pub avg_handle_time_minutes: f64,

    /// Productive hours per agent per month; also the centre's open hours
    pub hours_per_agent_per_month: f64,

    /// Target occupancy in (0, 1), used for the workload floor
    pub utilization_target: f64,

    /// Supervisors per agent
    pub supervisor_ratio: f64,

    /// Fraction of calls to answer within `target_answer_time_seconds`
    pub target_service_level: f64,

    pub target_answer_time_seconds: f64,
}

impl Default for StaffingParams {
    fn default() -> Self {
        Self {
            avg_handle_time_minutes: 6.2,
            hours_per_agent_per_month: 160.0,
            utilization_target: 0.85,
            supervisor_ratio: 0.12,
            target_service_level: 0.8,
            target_answer_time_seconds: 20.0,
        }
    }
}

/// Shift applied to a baseline to build the optimistic or pessimistic preset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetShift {
    /// Added to the baseline growth rate, percentage points
    pub growth_delta_pct: f64,

    /// Replaces the baseline engagement impact
    pub engagement_impact: f64,
}

impl PresetShift {
    pub fn optimistic() -> Self {
        Self {
            growth_delta_pct: 2.5,
            engagement_impact: 0.95,
        }
    }

    pub fn pessimistic() -> Self {
        Self {
            growth_delta_pct: -2.5,
            engagement_impact: 1.10,
        }
    }
}

fn default_confidence_level() -> f64 {
    0.8
}

/// Parameters of one forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,

    #[serde(default)]
    pub kind: ScenarioKind,

    /// Month the forecast is anchored on; the first forecast month is the one after.
    /// Defaults to the latest month of history.
    #[serde(default)]
    pub base_month: Option<Month>,

    pub horizon_months: u32,

    /// Compound monthly member growth, percent
    #[serde(default)]
    pub member_growth_rate_pct: f64,

    /// Amplitude of the sinusoidal member modulation, in [0, 1]
    #[serde(default)]
    pub member_seasonal_amplitude: Option<f64>,

    /// Call-rate adjustment per segment, percent
    #[serde(default)]
    pub segment_adjustments_pct: BTreeMap<String, f64>,

    #[serde(default)]
    pub call_volume_factors: CallVolumeFactors,

    #[serde(default)]
    pub staffing_params: StaffingParams,

    #[serde(default)]
    pub monte_carlo_iterations: u32,

    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,

    /// Fixes the Monte Carlo random streams
    #[serde(default)]
    pub seed: Option<u64>,

    /// Fail on staffing non-convergence instead of falling back to workload staffing
    #[serde(default)]
    pub strict_staffing: bool,
}

impl Scenario {
    /// Zero-adjustment scenario with default factors and staffing parameters
    pub fn baseline(name: impl Into<String>, base_month: Option<Month>, horizon_months: u32, growth_pct: f64) -> Self {
        Self {
            name: name.into(),
            kind: ScenarioKind::Baseline,
            base_month,
            horizon_months,
            member_growth_rate_pct: growth_pct,
            member_seasonal_amplitude: None,
            segment_adjustments_pct: BTreeMap::new(),
            call_volume_factors: CallVolumeFactors::default(),
            staffing_params: StaffingParams::default(),
            monte_carlo_iterations: 0,
            confidence_level: default_confidence_level(),
            seed: None,
            strict_staffing: false,
        }
    }

    /// Optimistic variant of this scenario
    pub fn optimistic(&self) -> Self {
        self.shifted(ScenarioKind::Optimistic, &PresetShift::optimistic())
    }

    /// Pessimistic variant of this scenario
    pub fn pessimistic(&self) -> Self {
        self.shifted(ScenarioKind::Pessimistic, &PresetShift::pessimistic())
    }

    /// Apply a preset shift, tagging the result with `kind`
    pub fn shifted(&self, kind: ScenarioKind, shift: &PresetShift) -> Self {
        let suffix = match kind {
            ScenarioKind::Optimistic => "optimistic",
            ScenarioKind::Pessimistic => "pessimistic",
            ScenarioKind::Baseline => "baseline",
            ScenarioKind::Custom => "custom",
        };
        let mut scenario = self.clone();
        scenario.name = format!("{} ({})", self.name, suffix);
        scenario.kind = kind;
        scenario.member_growth_rate_pct += shift.growth_delta_pct;
        scenario.call_volume_factors.engagement_impact = shift.engagement_impact;
        scenario
    }

    pub fn with_monte_carlo(mut self, iterations: u32, seed: Option<u64>) -> Self {
        self.monte_carlo_iterations = iterations;
        self.seed = seed;
        self
    }

    /// Load a scenario from a JSON file
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Check every parameter against its domain and the engine limits
    pub fn validate(&self, config: &EngineConfig) -> Result<()> {
        if self.horizon_months == 0 || self.horizon_months > config.max_horizon_months {
            return Err(ForecastError::invalid(
                "horizon_months",
                format!("{} is outside 1..={}", self.horizon_months, config.max_horizon_months),
            ));
        }

        let growth = self.member_growth_rate_pct;
        if !growth.is_finite() || growth < config.growth_min_pct || growth > config.growth_max_pct {
            return Err(ForecastError::invalid(
                "member_growth_rate_pct",
                format!("{} is outside [{}, {}]", growth, config.growth_min_pct, config.growth_max_pct),
            ));
        }

        if let Some(amplitude) = self.member_seasonal_amplitude {
            if !(0.0..=1.0).contains(&amplitude) {
                return Err(ForecastError::invalid(
                    "member_seasonal_amplitude",
                    format!("{} is outside [0, 1]", amplitude),
                ));
            }
        }

        for (segment, pct) in &self.segment_adjustments_pct {
            if !pct.is_finite() || *pct < -100.0 {
                return Err(ForecastError::invalid(
                    "segment_adjustments_pct",
                    format!("{} for segment '{}' must be a number >= -100", pct, segment),
                ));
            }
        }

        let f = &self.call_volume_factors;
        for (field, value) in [
            ("seasonal_factor", f.seasonal_factor),
            ("engagement_impact", f.engagement_impact),
            ("product_mix_impact", f.product_mix_impact),
            ("regulatory_impact", f.regulatory_impact),
        ] {
            positive(field, value)?;
        }

        let s = &self.staffing_params;
        positive("avg_handle_time_minutes", s.avg_handle_time_minutes)?;
        positive("hours_per_agent_per_month", s.hours_per_agent_per_month)?;
        positive("target_answer_time_seconds", s.target_answer_time_seconds)?;
        open_unit("utilization_target", s.utilization_target)?;
        open_unit("target_service_level", s.target_service_level)?;
        if !(0.0..=1.0).contains(&s.supervisor_ratio) {
            return Err(ForecastError::invalid("supervisor_ratio", "must be within [0, 1]"));
        }

        if self.monte_carlo_iterations > config.max_monte_carlo_iterations {
            return Err(ForecastError::invalid(
                "monte_carlo_iterations",
                format!("{} exceeds the limit of {}", self.monte_carlo_iterations, config.max_monte_carlo_iterations),
            ));
        }
        open_unit("confidence_level", self.confidence_level)?;

        Ok(())
    }

    /// True when repeated runs give identical output
    pub fn is_reproducible(&self) -> bool {
        self.monte_carlo_iterations == 0 || self.seed.is_some()
    }
}

fn positive(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ForecastError::invalid(field, format!("{} must be positive", value)));
    }
    Ok(())
}

fn open_unit(field: &str, value: f64) -> Result<()> {
    if !(value > 0.0 && value < 1.0) {
        return Err(ForecastError::invalid(field, format!("{} is outside (0, 1)", value)));
    }
    Ok(())
}

/// One scenario's series for a compared metric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSeries {
    pub scenario: String,
    pub values: Vec<f64>,

    /// Sum over the horizon
    pub total: f64,
}

/// Side-by-side view of one metric across scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricComparison {
    pub metric: Metric,
    pub series: Vec<ScenarioSeries>,

    /// Spread of the horizon totals across scenarios
    pub mean_total: f64,
    pub std_dev_total: f64,
    pub min_total: f64,
    pub max_total: f64,
}

impl MetricComparison {
    fn from_outputs(metric: Metric, outputs: &[(String, ForecastOutput)]) -> Self {
        let series: Vec<ScenarioSeries> = outputs
            .iter()
            .map(|(name, output)| {
                let values: Vec<f64> = output.forecast_results.iter().map(|p| metric.value(p)).collect();
                let total = values.iter().sum();
                ScenarioSeries {
                    scenario: name.clone(),
                    values,
                    total,
                }
            })
            .collect();

        let totals: Vec<f64> = series.iter().map(|s| s.total).collect();
        let count = totals.len().max(1) as f64;
        let mean_total = totals.iter().sum::<f64>() / count;
        let variance = totals.iter().map(|t| (t - mean_total).powi(2)).sum::<f64>() / count;

        Self {
            metric,
            series,
            mean_total,
            std_dev_total: variance.sqrt(),
            min_total: totals.iter().copied().fold(f64::INFINITY, f64::min),
            max_total: totals.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Comparison of several scenarios run against the same history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioComparison {
    pub scenarios: Vec<String>,
    pub metrics: Vec<MetricComparison>,
}

impl ScenarioComparison {
    pub fn metric(&self, metric: Metric) -> Option<&MetricComparison> {
        self.metrics.iter().find(|m| m.metric == metric)
    }
}

/// Pre-configured scenario runner for batch forecasts
///
/// # Example
/// ```ignore
/// let runner = ScenarioRunner::from_csv()?;
/// let base = Scenario::baseline("plan", None, 12, 0.5);
/// let comparison = runner.compare(&history, &[base.pessimistic(), base.clone(), base.optimistic()])?;
/// ```
#[derive(Clone)]
pub struct ScenarioRunner {
    engine: ForecastEngine,
}

impl ScenarioRunner {
    /// Create runner with default configuration and built-in assumptions
    pub fn new() -> Self {
        Self {
            engine: ForecastEngine::default(),
        }
    }

    /// Create runner by loading assumptions from CSV files
    pub fn from_csv() -> Result<Self> {
        Ok(Self::with_assumptions(Assumptions::from_csv()?))
    }

    /// Create runner from a specific assumptions directory
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        Ok(Self::with_assumptions(Assumptions::from_csv_path(path)?))
    }

    /// Create runner with pre-built assumptions
    pub fn with_assumptions(assumptions: Assumptions) -> Self {
        Self {
            engine: ForecastEngine::new(EngineConfig::default().with_assumptions(assumptions)),
        }
    }

    /// Create runner around an existing engine (e.g. one with a cache)
    pub fn with_engine(engine: ForecastEngine) -> Self {
        Self { engine }
    }

    /// Run a single scenario
    pub fn run(&self, history: &[TimeSeriesRecord], scenario: &Scenario) -> Result<ForecastOutput> {
        self.engine.compute_forecast(history, scenario)
    }

    /// Run several scenarios in parallel, results in input order
    pub fn run_scenarios(
        &self,
        history: &[TimeSeriesRecord],
        scenarios: &[Scenario],
    ) -> Vec<Result<ForecastOutput>> {
        scenarios
            .par_iter()
            .map(|scenario| self.engine.compute_forecast(history, scenario))
            .collect()
    }

    /// Run scenarios and line up members, calls and staff side by side
    ///
    /// Fails on the first scenario that fails.
    pub fn compare(&self, history: &[TimeSeriesRecord], scenarios: &[Scenario]) -> Result<ScenarioComparison> {
        let outputs = self
            .run_scenarios(history, scenarios)
            .into_iter()
            .zip(scenarios)
            .map(|(result, scenario)| result.map(|output| (scenario.name.clone(), output)))
            .collect::<Result<Vec<_>>>()?;

        Ok(ScenarioComparison {
            scenarios: scenarios.iter().map(|s| s.name.clone()).collect(),
            metrics: Metric::ALL
                .iter()
                .map(|&metric| MetricComparison::from_outputs(metric, &outputs))
                .collect(),
        })
    }

    pub fn engine(&self) -> &ForecastEngine {
        &self.engine
    }

    /// Get reference to the engine configuration
    pub fn config(&self) -> &EngineConfig {
        self.engine.config()
    }
}

impl Default for ScenarioRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::load_default_history;

    fn flat_history(months: usize) -> Vec<TimeSeriesRecord> {
        let start = Month::new(2024, 1).unwrap();
        (0..months as i64)
            .map(|i| TimeSeriesRecord::new(start.plus_months(i), "", 10_000, 1_200))
            .collect()
    }

    #[test]
    fn test_presets() {
        let base = Scenario::baseline("plan", None, 12, 1.0);
        let up = base.optimistic();
        let down = base.pessimistic();

        assert_eq!(up.kind, ScenarioKind::Optimistic);
        assert_eq!(up.member_growth_rate_pct, 3.5);
        assert_eq!(up.call_volume_factors.engagement_impact, 0.95);
        assert_eq!(down.member_growth_rate_pct, -1.5);
        assert_eq!(down.call_volume_factors.engagement_impact, 1.10);
        assert!(up.name.contains("optimistic"));
    }

    #[test]
    fn test_validation() {
        let config = EngineConfig::default();
        let base = Scenario::baseline("plan", None, 12, 0.0);
        assert!(base.validate(&config).is_ok());

        let mut bad = base.clone();
        bad.horizon_months = 0;
        assert!(bad.validate(&config).is_err());

        let mut bad = base.clone();
        bad.staffing_params.utilization_target = 1.0;
        assert!(bad.validate(&config).is_err());

        let mut bad = base.clone();
        bad.call_volume_factors.product_mix_impact = 0.0;
        assert!(bad.validate(&config).is_err());

        let mut bad = base.clone();
        bad.member_growth_rate_pct = 101.0;
        assert!(bad.validate(&config).is_err());

        let mut bad = base;
        bad.confidence_level = 1.0;
        let err = bad.validate(&config).unwrap_err();
        assert!(err.to_string().contains("confidence_level"));
    }

    #[test]
    fn test_json_defaults() {
        let scenario: Scenario = serde_json::from_str(
            r#"{"name": "q3", "horizon_months": 3, "call_volume_factors": {"engagement_impact": 1.2}}"#,
        )
        .unwrap();
        assert_eq!(scenario.kind, ScenarioKind::Custom);
        assert_eq!(scenario.call_volume_factors.engagement_impact, 1.2);
        assert_eq!(scenario.call_volume_factors.regulatory_impact, 1.0);
        assert_eq!(scenario.staffing_params.avg_handle_time_minutes, 6.2);
        assert_eq!(scenario.confidence_level, 0.8);
        assert!(scenario.is_reproducible());
    }

    #[test]
    fn test_runner_compare() {
        let runner = ScenarioRunner::new();
        let history = flat_history(6);
        let base = Scenario::baseline("plan", None, 6, 0.0);
        let scenarios = [base.pessimistic(), base.clone(), base.optimistic()];

        let comparison = runner.compare(&history, &scenarios).unwrap();
        assert_eq!(comparison.scenarios.len(), 3);

        let members = comparison.metric(Metric::Members).unwrap();
        // Pessimistic shrinks, optimistic grows
        assert!(members.series[0].total < members.series[1].total);
        assert!(members.series[2].total > members.series[1].total);
        assert_eq!(members.min_total, members.series[0].total);
        assert_eq!(members.max_total, members.series[2].total);
        assert!(members.std_dev_total > 0.0);
    }

    #[test]
    fn test_runner_on_sample_history() {
        let runner = ScenarioRunner::from_csv().unwrap();
        let history = load_default_history().unwrap();
        let output = runner
            .run(&history, &Scenario::baseline("sample", None, 12, 0.3))
            .unwrap();
        assert_eq!(output.forecast_results.len(), 12);
        assert!(output.forecast_results.iter().all(|p| p.required_staff > 0));
    }
}
