//! Backtesting: replay the pipeline on truncated history and score it

pub mod evaluator;
pub mod metrics;

pub use evaluator::{AccuracyReport, BacktestEvaluator, BacktestSummary};
pub use metrics::AccuracyMetrics;
