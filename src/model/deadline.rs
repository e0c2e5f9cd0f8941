//! Cooperative time limit for Monte Carlo trials

use std::time::{Duration, Instant};

use crate::error::{ForecastError, Result};

/// Deadline for one trial, checked between months and inside the Erlang-C search
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    trial: usize,
    started: Instant,
    limit: Duration,
}

impl Deadline {
    /// Start the clock for `trial`
    pub fn start(trial: usize, limit: Duration) -> Self {
        Self {
            trial,
            started: Instant::now(),
            limit,
        }
    }

    pub fn trial(&self) -> usize {
        self.trial
    }

    pub fn is_expired(&self) -> bool {
        self.started.elapsed() >= self.limit
    }

    /// `TrialTimeout` once the limit has been reached
    pub fn check(&self) -> Result<()> {
        let elapsed = self.started.elapsed();
        if elapsed >= self.limit {
            return Err(ForecastError::TrialTimeout {
                trial: self.trial,
                elapsed_ms: elapsed.as_millis() as u64,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_limit_expires() {
        let deadline = Deadline::start(7, Duration::ZERO);
        let err = deadline.check().unwrap_err();
        assert_eq!(err.kind(), "trial_timeout");
        assert!(err.to_string().contains("trial 7"));
    }

    #[test]
    fn test_generous_limit_passes() {
        let deadline = Deadline::start(0, Duration::from_secs(60));
        assert!(deadline.check().is_ok());
        assert!(!deadline.is_expired());
    }
}
