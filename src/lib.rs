//! Workforce Forecast - contact-centre demand and staffing forecasting engine
//!
//! This library provides:
//! - Monthly aggregation of membership, call and headcount history
//! - Additive seasonal decomposition and compound member growth
//! - Segment-weighted call rates and Erlang-C staffing
//! - Monte Carlo uncertainty bands on a rayon pool
//! - Rolling backtests scored by MAPE, RMSE and friends

pub mod error;
pub mod config;
pub mod history;
pub mod assumptions;
pub mod model;
pub mod projection;
pub mod simulation;
pub mod backtest;
pub mod diagnostics;
pub mod cache;
pub mod scenario;

// Re-export commonly used types
pub use error::{ForecastError, Result};
pub use config::EngineConfig;
pub use history::{Month, MonthlyAggregate, TimeSeriesRecord};
pub use assumptions::{Assumptions, CalendarSeasonality, SegmentImpactModel};
pub use projection::{ConfidenceInterval, ForecastEngine, ForecastOutput, ForecastPoint, Metric};
pub use backtest::{AccuracyMetrics, AccuracyReport};
pub use cache::{ForecastCache, InMemoryForecastCache};
pub use scenario::{Scenario, ScenarioKind, ScenarioRunner};
