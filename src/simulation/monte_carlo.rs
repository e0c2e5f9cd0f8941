//! Monte Carlo uncertainty bands
//!
//! Each trial perturbs the scenario (growth rate, seasonal factor, handle time), reruns
//! the pipeline with the scenario's own staffing mode and records its forecast points.
//! Trial `i` draws from a ChaCha stream seeded with `seed + i`, so results do not depend
//! on how rayon schedules trials. Failed trials are counted; too many failures fail the
//! forecast. Trials that fell back to workload staffing still count as completed.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;

use crate::config::{EngineConfig, PerturbationConfig};
use crate::error::{ForecastError, Result};
use crate::model::Deadline;
use crate::projection::pipeline::{Pipeline, PipelineRun};
use crate::projection::{ConfidenceInterval, ForecastPoint, Metric, MonteCarloSummary};
use crate::scenario::Scenario;
use super::percentile::Percentiles;

/// Floor for multiplicative draws, keeps perturbed factors positive
const MIN_MULTIPLIER: f64 = 0.01;

/// Random shifts applied to one trial
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Perturbation {
    pub growth_delta_pct: f64,
    pub seasonal_scale: f64,
    pub handle_time_scale: f64,
}

impl Perturbation {
    /// Perturbed copy of `scenario`; growth is kept inside the accepted range
    pub fn apply(&self, scenario: &Scenario, pipeline: &Pipeline) -> Scenario {
        let mut trial = scenario.clone();
        trial.member_growth_rate_pct = pipeline
            .growth()
            .clamp(scenario.member_growth_rate_pct + self.growth_delta_pct);
        trial.call_volume_factors.seasonal_factor *= self.seasonal_scale;
        trial.staffing_params.avg_handle_time_minutes *= self.handle_time_scale;
        trial.monte_carlo_iterations = 0;
        trial
    }
}

/// Normal samplers for the three perturbations
#[derive(Debug, Clone, Copy)]
pub struct PerturbationSampler {
    growth: Normal<f64>,
    seasonal: Normal<f64>,
    handle_time: Normal<f64>,
}

impl PerturbationSampler {
    pub fn new(config: &PerturbationConfig) -> Result<Self> {
        let normal = |field: &str, mean: f64, std: f64| {
            Normal::new(mean, std).map_err(|e| ForecastError::invalid(field, e.to_string()))
        };
        Ok(Self {
            growth: normal("growth_rate_pct_std", 0.0, config.growth_rate_pct_std)?,
            seasonal: normal("seasonal_factor_std", 1.0, config.seasonal_factor_std)?,
            handle_time: normal("handle_time_std", 1.0, config.handle_time_std)?,
        })
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Perturbation {
        Perturbation {
            growth_delta_pct: self.growth.sample(rng),
            seasonal_scale: self.seasonal.sample(rng).max(MIN_MULTIPLIER),
            handle_time_scale: self.handle_time.sample(rng).max(MIN_MULTIPLIER),
        }
    }
}

/// Bands and bookkeeping from a Monte Carlo run
#[derive(Debug, Clone)]
pub struct MonteCarloResult {
    pub intervals: Vec<ConfidenceInterval>,
    pub summary: MonteCarloSummary,
}

/// Runs trials on a rayon pool sized by the engine configuration
pub struct MonteCarloEngine<'a> {
    config: &'a EngineConfig,
    sampler: PerturbationSampler,
}

impl<'a> MonteCarloEngine<'a> {
    pub fn new(config: &'a EngineConfig) -> Result<Self> {
        Ok(Self {
            config,
            sampler: PerturbationSampler::new(&config.perturbation)?,
        })
    }

    /// Run one trial
    pub fn run_trial(
        &self,
        pipeline: &Pipeline,
        scenario: &Scenario,
        base_seed: u64,
        trial: usize,
    ) -> Result<PipelineRun> {
        let deadline = Deadline::start(trial, self.config.trial_timeout());
        let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(trial as u64));
        let perturbed = self.sampler.sample(&mut rng).apply(scenario, pipeline);
        pipeline.run(&perturbed, false, Some(&deadline))
    }

    /// Run `scenario.monte_carlo_iterations` trials and summarise them
    pub fn simulate(&self, pipeline: &Pipeline, scenario: &Scenario) -> Result<MonteCarloResult> {
        let requested = scenario.monte_carlo_iterations as usize;
        let base_seed = scenario.seed.unwrap_or_else(|| rand::thread_rng().gen());

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.worker_threads)
            .build()
            .map_err(|e| ForecastError::invalid("worker_threads", e.to_string()))?;

        let outcomes: Vec<Result<PipelineRun>> = pool.install(|| {
            (0..requested)
                .into_par_iter()
                .map(|trial| self.run_trial(pipeline, scenario, base_seed, trial))
                .collect()
        });

        let tally = TrialTally::from_outcomes(outcomes);
        tally.check(requested, self.config.max_failed_trial_fraction)?;

        Ok(MonteCarloResult {
            intervals: summarise(&tally.trials, scenario.confidence_level),
            summary: MonteCarloSummary {
                requested,
                completed: tally.trials.len(),
                failed: tally.failed,
                timed_out: tally.timed_out,
                staffing_fallbacks: tally.staffing_fallbacks,
                seed: base_seed,
                confidence_level: scenario.confidence_level,
            },
        })
    }
}

/// Completed trial points plus failure counts
#[derive(Debug, Default)]
struct TrialTally {
    trials: Vec<Vec<ForecastPoint>>,
    failed: usize,
    timed_out: usize,
    staffing_fallbacks: usize,
}

impl TrialTally {
    fn from_outcomes(outcomes: Vec<Result<PipelineRun>>) -> Self {
        let mut tally = Self::default();
        for outcome in outcomes {
            match outcome {
                Ok(run) => {
                    if !run.staffing_issues.is_empty() {
                        tally.staffing_fallbacks += 1;
                    }
                    tally.trials.push(run.points);
                }
                Err(err) => {
                    tally.failed += 1;
                    if matches!(err, ForecastError::TrialTimeout { .. }) {
                        tally.timed_out += 1;
                    }
                    log::debug!("trial failed: {}", err);
                }
            }
        }

        if tally.failed > 0 {
            log::warn!("{} Monte Carlo trials failed ({} timed out)", tally.failed, tally.timed_out);
        }
        if tally.staffing_fallbacks > 0 {
            log::info!("{} Monte Carlo trials used workload staffing", tally.staffing_fallbacks);
        }
        tally
    }

    /// Failed fractions up to and including the limit are tolerated
    fn check(&self, requested: usize, max_failed_fraction: f64) -> Result<()> {
        if self.trials.is_empty() || self.failed as f64 / requested as f64 > max_failed_fraction {
            return Err(ForecastError::InsufficientTrials {
                failed: self.failed,
                requested,
                max_failed_fraction,
            });
        }
        Ok(())
    }
}

/// Percentile bands per (month, metric), months in forecast order
fn summarise(trials: &[Vec<ForecastPoint>], confidence_level: f64) -> Vec<ConfidenceInterval> {
    let horizon = trials.iter().map(Vec::len).min().unwrap_or(0);
    let mut intervals = Vec::with_capacity(horizon * Metric::ALL.len());

    for index in 0..horizon {
        let month = trials[0][index].month;
        for metric in Metric::ALL {
            let mut samples: Vec<f64> = trials.iter().map(|t| metric.value(&t[index])).collect();
            if let Some(p) = Percentiles::from_samples(&mut samples, confidence_level) {
                intervals.push(ConfidenceInterval {
                    month,
                    metric,
                    p10: p.p10,
                    p25: p.p25,
                    median: p.median,
                    p75: p.p75,
                    p90: p.p90,
                    lower: p.lower,
                    upper: p.upper,
                });
            }
        }
    }

    intervals
}
