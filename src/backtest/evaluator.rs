//! Rolling-origin backtest
//!
//! For a horizon `h` and monthly series of length `len`, every index `i` in
//! `h..len` is one window: train on months `[0, i - h)`, forecast, and score the
//! predicted calls against the actuals of months `[i - h, i)`. A window whose actual
//! calls are all zero is skipped; a window whose forecast fails is reported with the
//! failure instead of aborting the whole run.

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{ForecastError, Result};
use crate::history::{aggregate_monthly, records_before, Month, MonthlyAggregate, TimeSeriesRecord};
use crate::model::historical_growth_rate_pct;
use crate::projection::pipeline::Pipeline;
use crate::scenario::Scenario;
use super::metrics::AccuracyMetrics;

/// Score of one backtest window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyReport {
    /// First month of the evaluated window
    pub period: Month,

    /// Actual calls were all zero, nothing was scored
    pub skipped: bool,

    pub metrics: Option<AccuracyMetrics>,

    pub actual: Vec<f64>,
    pub predicted: Vec<f64>,

    /// Why the window's forecast could not be produced
    pub failure: Option<String>,
}

impl AccuracyReport {
    fn skipped(period: Month, actual: Vec<f64>) -> Self {
        Self {
            period,
            skipped: true,
            metrics: None,
            actual,
            predicted: Vec::new(),
            failure: None,
        }
    }

    fn failed(period: Month, actual: Vec<f64>, err: &ForecastError) -> Self {
        Self {
            period,
            skipped: false,
            metrics: None,
            actual,
            predicted: Vec::new(),
            failure: Some(err.to_string()),
        }
    }

    /// True when the window was scored
    pub fn is_scored(&self) -> bool {
        self.metrics.is_some()
    }
}

/// Average accuracy across the scored windows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSummary {
    pub windows: usize,
    pub scored: usize,
    pub skipped: usize,
    pub failed: usize,

    /// Mean of each metric over scored windows; `None` when nothing was scored
    pub mean: Option<AccuracyMetrics>,
}

impl BacktestSummary {
    pub fn from_reports(reports: &[AccuracyReport]) -> Self {
        let scored: Vec<&AccuracyMetrics> = reports.iter().filter_map(|r| r.metrics.as_ref()).collect();
        let count = scored.len() as f64;
        let avg = |f: fn(&AccuracyMetrics) -> f64| scored.iter().map(|m| f(m)).sum::<f64>() / count;

        let mean = if scored.is_empty() {
            None
        } else {
            Some(AccuracyMetrics {
                mape: avg(|m| m.mape),
                mae: avg(|m| m.mae),
                rmse: avg(|m| m.rmse),
                wmape: avg(|m| m.wmape),
                smape: avg(|m| m.smape),
                r_squared: avg(|m| m.r_squared),
            })
        };

        Self {
            windows: reports.len(),
            scored: scored.len(),
            skipped: reports.iter().filter(|r| r.skipped).count(),
            failed: reports.iter().filter(|r| r.failure.is_some()).count(),
            mean,
        }
    }
}

/// Replays the forecast pipeline on truncated history
pub struct BacktestEvaluator<'a> {
    config: &'a EngineConfig,
}

impl<'a> BacktestEvaluator<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// One report per window, in window order
    ///
    /// Fails only for an invalid horizon or a history with fewer than two months.
    pub fn run(&self, history: &[TimeSeriesRecord], horizon_months: u32) -> Result<Vec<AccuracyReport>> {
        if horizon_months == 0 || horizon_months > self.config.max_horizon_months {
            return Err(ForecastError::invalid(
                "horizon_months",
                format!("{} is outside 1..={}", horizon_months, self.config.max_horizon_months),
            ));
        }

        let aggregates = aggregate_monthly(history)?;
        let h = horizon_months as usize;

        let reports: Vec<AccuracyReport> = (h..aggregates.len())
            .map(|i| self.evaluate_window(history, &aggregates[i - h..i]))
            .collect();

        let summary = BacktestSummary::from_reports(&reports);
        log::info!(
            "backtest h={}: {} windows, {} scored, {} skipped, {} failed",
            horizon_months,
            summary.windows,
            summary.scored,
            summary.skipped,
            summary.failed
        );

        Ok(reports)
    }

    fn evaluate_window(&self, history: &[TimeSeriesRecord], window: &[MonthlyAggregate]) -> AccuracyReport {
        let period = window[0].month;
        let actual: Vec<f64> = window.iter().map(|a| a.total_calls as f64).collect();

        if actual.iter().all(|&a| a == 0.0) {
            log::debug!("backtest window {} has no calls, skipping", period);
            return AccuracyReport::skipped(period, actual);
        }

        let training = records_before(history, period);
        match self.forecast_calls(&training, window) {
            Ok(predicted) => AccuracyReport {
                period,
                skipped: false,
                metrics: AccuracyMetrics::compute(&actual, &predicted),
                actual,
                predicted,
                failure: None,
            },
            Err(err) => {
                log::debug!("backtest window {} failed: {}", period, err);
                AccuracyReport::failed(period, actual, &err)
            }
        }
    }

    /// Baseline forecast from the training rows, read off at each window month
    fn forecast_calls(&self, training: &[TimeSeriesRecord], window: &[MonthlyAggregate]) -> Result<Vec<f64>> {
        let pipeline = Pipeline::prepare(training, self.config)?;
        let last_trained = pipeline
            .aggregates()
            .last()
            .map(|a| a.month)
            .ok_or_else(|| ForecastError::InsufficientData("empty training window".into()))?;
        let last_month = window.last().map(|a| a.month).unwrap_or(last_trained);
        let horizon = last_trained.months_until(last_month).max(1) as u32;

        let growth = pipeline.growth().clamp(historical_growth_rate_pct(pipeline.aggregates()));
        let scenario = Scenario::baseline("backtest", None, horizon, growth);
        let run = pipeline.run(&scenario, false, None)?;

        window
            .iter()
            .map(|actual| {
                run.points
                    .iter()
                    .find(|p| p.month == actual.month)
                    .map(|p| p.predicted_calls as f64)
                    .ok_or_else(|| {
                        ForecastError::InsufficientData(format!("no forecast for {}", actual.month))
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(calls: &[u32]) -> Vec<TimeSeriesRecord> {
        let start = Month::new(2024, 1).unwrap();
        calls
            .iter()
            .enumerate()
            .map(|(i, &c)| TimeSeriesRecord::new(start.plus_months(i as i64), "", 10_000, c))
            .collect()
    }

    #[test]
    fn test_window_layout() {
        let config = EngineConfig::default();
        let reports = BacktestEvaluator::new(&config).run(&history(&[1_200; 8]), 2).unwrap();

        // i = 2..8
        assert_eq!(reports.len(), 6);
        assert_eq!(reports[0].period, Month::new(2024, 1).unwrap());
        assert_eq!(reports[5].period, Month::new(2024, 6).unwrap());

        // Windows with under two training months cannot be forecast
        assert!(reports[0].failure.is_some());
        assert!(reports[1].failure.is_some());

        let scored = &reports[2];
        assert!(scored.is_scored());
        assert_eq!(scored.predicted, vec![1_200.0, 1_200.0]);
        assert_eq!(scored.metrics.unwrap().mape, 0.0);
    }

    #[test]
    fn test_zero_call_window_is_skipped() {
        let config = EngineConfig::default();
        let reports = BacktestEvaluator::new(&config)
            .run(&history(&[1_000, 1_000, 1_000, 1_000, 0, 0, 0]), 2)
            .unwrap();

        let last = reports.last().unwrap();
        assert_eq!(last.period, Month::new(2024, 5).unwrap());
        assert!(last.skipped);
        assert!(last.metrics.is_none());
        assert!(last.failure.is_none());

        let summary = BacktestSummary::from_reports(&reports);
        assert_eq!(summary.windows, 5);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.scored, 2);
    }

    #[test]
    fn test_invalid_horizon() {
        let config = EngineConfig::default();
        let evaluator = BacktestEvaluator::new(&config);
        assert!(evaluator.run(&history(&[1_000; 4]), 0).is_err());
        assert!(evaluator.run(&history(&[1_000; 4]), 500).is_err());
    }

    #[test]
    fn test_too_short_history_is_an_error() {
        let config = EngineConfig::default();
        let err = BacktestEvaluator::new(&config).run(&history(&[1_000]), 1).unwrap_err();
        assert_eq!(err.kind(), "insufficient_data");
    }

    #[test]
    fn test_horizon_longer_than_history() {
        let config = EngineConfig::default();
        let reports = BacktestEvaluator::new(&config).run(&history(&[1_000; 3]), 6).unwrap();
        assert!(reports.is_empty());
    }
}
