//! Monte Carlo simulation and percentile helpers

pub mod monte_carlo;
pub mod percentile;

pub use monte_carlo::{MonteCarloEngine, MonteCarloResult, Perturbation, PerturbationSampler};
pub use percentile::{percentile, Percentiles};
