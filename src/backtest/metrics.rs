//! Forecast accuracy metrics

use serde::{Deserialize, Serialize};

/// Accuracy of one forecast window; percentages are 0-100
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccuracyMetrics {
    /// Mean absolute percentage error over months with non-zero actuals
    pub mape: f64,
    pub mae: f64,
    pub rmse: f64,

    /// Absolute error weighted by actual volume
    pub wmape: f64,

    /// Symmetric MAPE
    pub smape: f64,
    pub r_squared: f64,
}

impl AccuracyMetrics {
    /// Score `predicted` against `actual`, pairwise
    ///
    /// `None` when there is nothing to score or every actual is zero (MAPE undefined).
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Option<Self> {
        let n = actual.len().min(predicted.len());
        let actual = &actual[..n];
        let predicted = &predicted[..n];
        if n == 0 || actual.iter().all(|&a| a == 0.0) {
            return None;
        }

        let count = n as f64;
        let errors: Vec<f64> = actual.iter().zip(predicted).map(|(a, p)| a - p).collect();
        let abs_total: f64 = errors.iter().map(|e| e.abs()).sum();

        let mae = abs_total / count;
        let rmse = (errors.iter().map(|e| e * e).sum::<f64>() / count).sqrt();

        let ape: Vec<f64> = actual
            .iter()
            .zip(&errors)
            .filter(|(a, _)| **a != 0.0)
            .map(|(a, e)| (e / a).abs())
            .collect();
        let mape = 100.0 * ape.iter().sum::<f64>() / ape.len() as f64;

        let actual_total: f64 = actual.iter().map(|a| a.abs()).sum();
        let wmape = 100.0 * abs_total / actual_total;

        let smape = 100.0
            * actual
                .iter()
                .zip(predicted)
                .map(|(a, p)| {
                    let denominator = a.abs() + p.abs();
                    if denominator == 0.0 {
                        0.0
                    } else {
                        2.0 * (a - p).abs() / denominator
                    }
                })
                .sum::<f64>()
            / count;

        let mean_actual = actual.iter().sum::<f64>() / count;
        let ss_tot: f64 = actual.iter().map(|a| (a - mean_actual).powi(2)).sum();
        let ss_res: f64 = errors.iter().map(|e| e * e).sum();
        // Flat actuals: perfect fit scores 1, anything else 0
        let r_squared = if ss_tot == 0.0 {
            if ss_res == 0.0 { 1.0 } else { 0.0 }
        } else {
            1.0 - ss_res / ss_tot
        };

        Some(Self {
            mape,
            mae,
            rmse,
            wmape,
            smape,
            r_squared,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_known_values() {
        let m = AccuracyMetrics::compute(&[100.0, 200.0], &[110.0, 180.0]).unwrap();
        assert_relative_eq!(m.mae, 15.0);
        assert_relative_eq!(m.rmse, (250.0_f64).sqrt());
        assert_relative_eq!(m.mape, 10.0);
        assert_relative_eq!(m.wmape, 10.0);
        assert_relative_eq!(m.smape, 100.0 * (20.0 / 210.0 + 40.0 / 380.0) / 2.0);
        // ss_tot = 5000, ss_res = 500
        assert_relative_eq!(m.r_squared, 0.9);
    }

    #[test]
    fn test_perfect_forecast() {
        let m = AccuracyMetrics::compute(&[50.0, 60.0, 70.0], &[50.0, 60.0, 70.0]).unwrap();
        assert_eq!(m.mape, 0.0);
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.r_squared, 1.0);
    }

    #[test]
    fn test_zero_actuals_skip_mape_terms() {
        let m = AccuracyMetrics::compute(&[0.0, 100.0], &[5.0, 90.0]).unwrap();
        assert_relative_eq!(m.mape, 10.0);
        assert!(AccuracyMetrics::compute(&[0.0, 0.0], &[1.0, 2.0]).is_none());
        assert!(AccuracyMetrics::compute(&[], &[]).is_none());
    }

    #[test]
    fn test_flat_actuals() {
        let m = AccuracyMetrics::compute(&[100.0, 100.0], &[90.0, 110.0]).unwrap();
        assert_eq!(m.r_squared, 0.0);
    }
}
