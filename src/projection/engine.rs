//! Forecast engine: validated scenarios in, forecasts and backtests out

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::backtest::{AccuracyReport, BacktestEvaluator};
use crate::cache::{cache_key, ForecastCache, DEFAULT_CACHE_TTL};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::history::TimeSeriesRecord;
use crate::scenario::Scenario;
use crate::simulation::MonteCarloEngine;
use super::pipeline::Pipeline;
use super::results::ForecastOutput;

/// Main forecast engine
///
/// Stateless apart from its configuration and an optional injected cache; safe to
/// share between threads.
#[derive(Clone)]
pub struct ForecastEngine {
    config: EngineConfig,
    cache: Option<Arc<dyn ForecastCache>>,
    cache_ttl: Duration,
}

impl Default for ForecastEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl ForecastEngine {
    /// Create a new engine with the given configuration
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            cache: None,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }

    /// Memoise reproducible forecasts in `cache` for `ttl`
    pub fn with_cache(mut self, cache: Arc<dyn ForecastCache>, ttl: Duration) -> Self {
        self.cache = Some(cache);
        self.cache_ttl = ttl;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Forecast members, calls and staffing for every month of the scenario horizon
    ///
    /// The scenario is validated before anything is computed. Confidence intervals
    /// are produced only when `monte_carlo_iterations > 0`.
    pub fn compute_forecast(&self, history: &[TimeSeriesRecord], scenario: &Scenario) -> Result<ForecastOutput> {
        let started = Instant::now();
        scenario.validate(&self.config)?;

        let key = match &self.cache {
            Some(_) if scenario.is_reproducible() => Some(cache_key(history, scenario, &self.config)?),
            _ => None,
        };
        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(cached) = cache.get(key) {
                log::debug!("forecast '{}' served from cache", scenario.name);
                return Ok(cached);
            }
        }

        log::info!(
            "forecasting '{}': {} months, {} Monte Carlo trials",
            scenario.name,
            scenario.horizon_months,
            scenario.monte_carlo_iterations
        );

        let pipeline = Pipeline::prepare(history, &self.config)?;
        let run = pipeline.run(scenario, scenario.strict_staffing, None)?;
        let diagnostics = pipeline.diagnostics(scenario.base_month, run.segment_adjustment_factor)?;

        let monte_carlo = if scenario.monte_carlo_iterations > 0 {
            Some(MonteCarloEngine::new(&self.config)?.simulate(&pipeline, scenario)?)
        } else {
            None
        };
        let (confidence_intervals, monte_carlo) = match monte_carlo {
            Some(mc) => (Some(mc.intervals), Some(mc.summary)),
            None => (None, None),
        };

        let output = ForecastOutput {
            forecast_results: run.points,
            confidence_intervals,
            computation_time_ms: started.elapsed().as_millis() as u64,
            monte_carlo,
            staffing_issues: run.staffing_issues,
            diagnostics,
        };
        log::info!("forecast '{}' finished in {} ms", scenario.name, output.computation_time_ms);

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            cache.put(key, output.clone(), self.cache_ttl);
        }

        Ok(output)
    }

    /// Score the pipeline against history with a rolling `horizon_months` window
    pub fn backtest(&self, history: &[TimeSeriesRecord], horizon_months: u32) -> Result<Vec<AccuracyReport>> {
        BacktestEvaluator::new(&self.config).run(history, horizon_months)
    }
}
