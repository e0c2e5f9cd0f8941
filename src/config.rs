//! Engine configuration
//!
//! Limits, Monte Carlo tuning and assumption tables shared by every forecast the
//! engine runs. Loadable from a JSON file; every field has a default.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::assumptions::Assumptions;
use crate::error::{ForecastError, Result};

/// Standard deviations of the per-trial perturbations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerturbationConfig {
    /// Additive noise on the growth rate, in percentage points
    pub growth_rate_pct_std: f64,

    /// Multiplicative noise on the seasonal factor (mean 1)
    pub seasonal_factor_std: f64,

    /// Multiplicative noise on handle time (mean 1)
    pub handle_time_std: f64,
}

impl Default for PerturbationConfig {
    fn default() -> Self {
        Self {
            growth_rate_pct_std: 0.5,
            seasonal_factor_std: 0.1,
            handle_time_std: 0.05,
        }
    }
}

/// Tunables for the calls-per-member anomaly detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Robust z-score above which a month is flagged
    pub z_threshold: f64,

    /// Upper bound on the fraction of months flagged
    pub contamination: f64,

    /// Detector is skipped below this many months
    pub min_months: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            z_threshold: 3.5,
            contamination: 0.1,
            min_months: 10,
        }
    }
}

/// Engine-wide configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Lowest accepted monthly member growth rate, percent
    pub growth_min_pct: f64,

    /// Highest accepted monthly member growth rate, percent
    pub growth_max_pct: f64,

    /// Erlang-C search gives up past this many agents
    pub max_agents: u32,

    pub max_horizon_months: u32,

    pub max_monte_carlo_iterations: u32,

    /// Rayon pool size for Monte Carlo; 0 uses every available core
    pub worker_threads: usize,

    /// Per-trial deadline in milliseconds
    pub trial_timeout_ms: u64,

    /// Fraction of failed trials tolerated before the forecast fails
    pub max_failed_trial_fraction: f64,

    pub perturbation: PerturbationConfig,

    pub anomaly: AnomalyConfig,

    pub assumptions: Assumptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            growth_min_pct: -50.0,
            growth_max_pct: 100.0,
            max_agents: 10_000,
            max_horizon_months: 120,
            max_monte_carlo_iterations: 10_000,
            worker_threads: 0,
            trial_timeout_ms: 30_000,
            max_failed_trial_fraction: 0.5,
            perturbation: PerturbationConfig::default(),
            anomaly: AnomalyConfig::default(),
            assumptions: Assumptions::default(),
        }
    }
}

impl EngineConfig {
    /// Load a configuration from a JSON file; missing fields take their defaults
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let config: EngineConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Replace the assumption tables
    pub fn with_assumptions(mut self, assumptions: Assumptions) -> Self {
        self.assumptions = assumptions;
        self
    }

    pub fn trial_timeout(&self) -> Duration {
        Duration::from_millis(self.trial_timeout_ms)
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.growth_min_pct >= self.growth_max_pct {
            return Err(ForecastError::invalid(
                "growth_min_pct",
                format!("{} must be below growth_max_pct {}", self.growth_min_pct, self.growth_max_pct),
            ));
        }
        if self.growth_min_pct <= -100.0 {
            return Err(ForecastError::invalid("growth_min_pct", "must be above -100"));
        }
        if self.max_agents == 0 {
            return Err(ForecastError::invalid("max_agents", "must be at least 1"));
        }
        if self.max_horizon_months == 0 {
            return Err(ForecastError::invalid("max_horizon_months", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.max_failed_trial_fraction) {
            return Err(ForecastError::invalid("max_failed_trial_fraction", "must be within [0, 1]"));
        }
        let p = &self.perturbation;
        for (field, value) in [
            ("growth_rate_pct_std", p.growth_rate_pct_std),
            ("seasonal_factor_std", p.seasonal_factor_std),
            ("handle_time_std", p.handle_time_std),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ForecastError::invalid(field, "must be a non-negative number"));
            }
        }
        if !(0.0..=1.0).contains(&self.anomaly.contamination) {
            return Err(ForecastError::invalid("contamination", "must be within [0, 1]"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_agents, 10_000);
        assert_eq!(config.max_horizon_months, 120);
        assert_eq!(config.trial_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_agents": 500, "perturbation": {{"handle_time_std": 0.0}}}}"#).unwrap();

        let config = EngineConfig::from_json_path(file.path()).unwrap();
        assert_eq!(config.max_agents, 500);
        assert_eq!(config.perturbation.handle_time_std, 0.0);
        assert_eq!(config.perturbation.growth_rate_pct_std, 0.5);
        assert_eq!(config.growth_max_pct, 100.0);
    }

    #[test]
    fn test_inverted_growth_range_rejected() {
        let config = EngineConfig {
            growth_min_pct: 10.0,
            growth_max_pct: 5.0,
            ..EngineConfig::default()
        };
        assert_eq!(config.validate().unwrap_err().kind(), "invalid_parameter");
    }
}
