//! Error taxonomy for the forecasting engine

use thiserror::Error;

use crate::history::Month;

/// Errors surfaced by the forecasting engine
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Not enough history to derive growth (fewer than 2 distinct months)
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// A scenario or model parameter is outside its documented domain
    #[error("invalid parameter `{field}`: {reason}")]
    InvalidParameter { field: String, reason: String },

    /// Erlang-C agent search exceeded the configured upper bound
    #[error(
        "staffing did not converge{}: no agent count up to {max_agents} meets the service level at {traffic_intensity:.2} Erlangs",
        .month.map(|m| format!(" for {}", m)).unwrap_or_default()
    )]
    StaffingNonConvergence {
        month: Option<Month>,
        max_agents: u32,
        traffic_intensity: f64,
    },

    /// A Monte Carlo trial ran past its deadline
    #[error("trial {trial} timed out after {elapsed_ms} ms")]
    TrialTimeout { trial: usize, elapsed_ms: u64 },

    /// Too many Monte Carlo trials failed for the percentiles to be meaningful
    #[error("insufficient Monte Carlo trials: {failed} of {requested} failed (limit {:.0}%)", .max_failed_fraction * 100.0)]
    InsufficientTrials {
        failed: usize,
        requested: usize,
        max_failed_fraction: f64,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ForecastError {
    /// Shorthand for building an `InvalidParameter` error
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ForecastError::InvalidParameter {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Stable machine-readable name of the error kind, for structured responses
    pub fn kind(&self) -> &'static str {
        match self {
            ForecastError::InsufficientData(_) => "insufficient_data",
            ForecastError::InvalidParameter { .. } => "invalid_parameter",
            ForecastError::StaffingNonConvergence { .. } => "staffing_non_convergence",
            ForecastError::TrialTimeout { .. } => "trial_timeout",
            ForecastError::InsufficientTrials { .. } => "insufficient_trials",
            ForecastError::Io(_) => "io",
            ForecastError::Csv(_) => "csv",
            ForecastError::Json(_) => "json",
        }
    }

    /// Attach the affected month to a staffing error raised by the calculator
    pub fn at_month(self, at: Month) -> Self {
        match self {
            ForecastError::StaffingNonConvergence {
                max_agents,
                traffic_intensity,
                ..
            } => ForecastError::StaffingNonConvergence {
                month: Some(at),
                max_agents,
                traffic_intensity,
            },
            other => other,
        }
    }
}

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, ForecastError>;
