//! Forecast pipeline and engine

pub mod pipeline;
mod engine;
mod results;

pub use engine::ForecastEngine;
pub use pipeline::{Pipeline, PipelineRun};
pub use results::{
    ConfidenceInterval, ForecastOutput, ForecastPoint, ForecastSummary, Metric, MonteCarloSummary,
    StaffingIssue,
};
