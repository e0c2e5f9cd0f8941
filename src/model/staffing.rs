//! Erlang-C staffing
//!
//! Finds the smallest agent count whose probability of answering within the target
//! time meets the target service level:
//!
//! ```text
//! A         = calls_per_hour * aht / 3600                  (traffic, Erlangs)
//! B_k       = A * B_{k-1} / (k + A * B_{k-1}),  B_0 = 1    (Erlang B)
//! P_wait    = N * B_N / (N - A * (1 - B_N))                (Erlang C)
//! P_within  = 1 - P_wait * exp(-(N - A) * T / aht)
//! ```
//!
//! The search starts at `ceil(A) + 1` so the queue is always stable (`A / N < 1`).

use serde::{Deserialize, Serialize};

use super::Deadline;
use crate::error::{ForecastError, Result};

/// Agents are re-checked against the deadline this often during the search
const DEADLINE_CHECK_INTERVAL: u32 = 64;

/// Outcome of an Erlang-C search
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StaffingRequirement {
    pub agents: u32,

    /// Offered load in Erlangs
    pub traffic_intensity: f64,

    /// `A / agents`, 0 with no traffic
    pub utilization: f64,

    /// Probability a call is answered within the target time
    pub service_level: f64,

    /// Probability a call has to wait at all
    pub probability_of_wait: f64,
}

impl StaffingRequirement {
    fn idle() -> Self {
        Self {
            agents: 0,
            traffic_intensity: 0.0,
            utilization: 0.0,
            service_level: 1.0,
            probability_of_wait: 0.0,
        }
    }
}

/// Erlang-C calculator with an upper bound on the agent search
#[derive(Debug, Clone)]
pub struct ErlangC {
    max_agents: u32,
}

impl Default for ErlangC {
    fn default() -> Self {
        Self { max_agents: 10_000 }
    }
}

impl ErlangC {
    pub fn new(max_agents: u32) -> Self {
        Self { max_agents }
    }

    pub fn max_agents(&self) -> u32 {
        self.max_agents
    }

    /// Minimum agents meeting `target_service_level` within `answer_time_seconds`
    pub fn required_agents(
        &self,
        calls_per_hour: f64,
        aht_seconds: f64,
        target_service_level: f64,
        answer_time_seconds: f64,
    ) -> Result<StaffingRequirement> {
        self.required_agents_until(calls_per_hour, aht_seconds, target_service_level, answer_time_seconds, None)
    }

    /// As [`required_agents`](Self::required_agents), giving up with `TrialTimeout`
    /// once `deadline` passes
    pub fn required_agents_until(
        &self,
        calls_per_hour: f64,
        aht_seconds: f64,
        target_service_level: f64,
        answer_time_seconds: f64,
        deadline: Option<&Deadline>,
    ) -> Result<StaffingRequirement> {
        if !calls_per_hour.is_finite() || calls_per_hour < 0.0 {
            return Err(ForecastError::invalid("calls_per_hour", "must be a non-negative number"));
        }
        if !aht_seconds.is_finite() || aht_seconds <= 0.0 {
            return Err(ForecastError::invalid("avg_handle_time", "must be positive"));
        }
        if !(target_service_level > 0.0 && target_service_level < 1.0) {
            return Err(ForecastError::invalid("target_service_level", "must be within (0, 1)"));
        }
        if !answer_time_seconds.is_finite() || answer_time_seconds <= 0.0 {
            return Err(ForecastError::invalid("target_answer_time_seconds", "must be positive"));
        }

        let traffic = calls_per_hour * aht_seconds / 3600.0;
        if traffic <= 0.0 {
            return Ok(StaffingRequirement::idle());
        }

        let non_convergence = || ForecastError::StaffingNonConvergence {
            month: None,
            max_agents: self.max_agents,
            traffic_intensity: traffic,
        };

        let start = traffic.ceil() + 1.0;
        if start > self.max_agents as f64 {
            return Err(non_convergence());
        }
        let start = start as u32;

        // Erlang B up to the starting agent count
        let mut erlang_b = 1.0;
        for k in 1..=start {
            erlang_b = traffic * erlang_b / (k as f64 + traffic * erlang_b);
        }

        let mut agents = start;
        loop {
            let n = agents as f64;
            let p_wait = n * erlang_b / (n - traffic * (1.0 - erlang_b));
            let service_level =
                1.0 - p_wait * (-(n - traffic) * answer_time_seconds / aht_seconds).exp();

            if service_level >= target_service_level {
                return Ok(StaffingRequirement {
                    agents,
                    traffic_intensity: traffic,
                    utilization: traffic / n,
                    service_level,
                    probability_of_wait: p_wait,
                });
            }

            if agents >= self.max_agents {
                return Err(non_convergence());
            }
            if let Some(deadline) = deadline {
                if (agents - start) % DEADLINE_CHECK_INTERVAL == 0 {
                    deadline.check()?;
                }
            }

            agents += 1;
            erlang_b = traffic * erlang_b / (agents as f64 + traffic * erlang_b);
        }
    }
}

/// Probability of answering within `answer_time_seconds` with `agents` staffed
///
/// 0 when the queue is unstable (`agents <= traffic`).
pub fn service_level(traffic: f64, agents: u32, aht_seconds: f64, answer_time_seconds: f64) -> f64 {
    if traffic <= 0.0 {
        return 1.0;
    }
    let n = agents as f64;
    if n <= traffic {
        return 0.0;
    }
    let mut erlang_b = 1.0;
    for k in 1..=agents {
        erlang_b = traffic * erlang_b / (k as f64 + traffic * erlang_b);
    }
    let p_wait = n * erlang_b / (n - traffic * (1.0 - erlang_b));
    (1.0 - p_wait * (-(n - traffic) * answer_time_seconds / aht_seconds).exp()).clamp(0.0, 1.0)
}

/// Supervisors needed for `agents` at `ratio` supervisors per agent
pub fn required_supervisors(agents: u32, ratio: f64) -> u32 {
    if agents == 0 || ratio <= 0.0 {
        return 0;
    }
    // Tolerance keeps e.g. 100 * 0.12 from rounding up to 13
    (agents as f64 * ratio - 1e-9).ceil().max(0.0) as u32
}

/// Full-time agents needed to carry the workload at the target utilisation
pub fn workload_agents(
    monthly_calls: f64,
    aht_minutes: f64,
    hours_per_agent_per_month: f64,
    utilization_target: f64,
) -> u32 {
    let capacity_minutes = hours_per_agent_per_month * 60.0 * utilization_target;
    if monthly_calls <= 0.0 || capacity_minutes <= 0.0 {
        return 0;
    }
    (monthly_calls * aht_minutes / capacity_minutes - 1e-9).ceil().max(0.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::time::Duration;

    #[test]
    fn test_small_centre() {
        // 1200 calls over 160 hours at 6 minutes: 0.75 Erlangs
        let req = ErlangC::default().required_agents(7.5, 360.0, 0.8, 20.0).unwrap();
        assert_relative_eq!(req.traffic_intensity, 0.75, epsilon = 1e-12);
        assert_eq!(req.agents, 2);
        assert!(req.service_level >= 0.8);
        assert!(req.service_level < 0.82);
        assert_relative_eq!(req.utilization, 0.375, epsilon = 1e-12);
    }

    #[test]
    fn test_textbook_example() {
        // 360 calls/hour at 240 s AHT is 24 Erlangs; 28 agents give ~0.76, 29 give ~0.84
        let req = ErlangC::default().required_agents(360.0, 240.0, 0.8, 20.0).unwrap();
        assert_relative_eq!(req.traffic_intensity, 24.0, epsilon = 1e-12);
        assert_eq!(req.agents, 29);
        assert!(req.utilization < 1.0);
    }

    #[test]
    fn test_zero_calls() {
        let req = ErlangC::default().required_agents(0.0, 360.0, 0.8, 20.0).unwrap();
        assert_eq!(req.agents, 0);
        assert_eq!(req.utilization, 0.0);
        assert_eq!(req.service_level, 1.0);
    }

    #[test]
    fn test_more_calls_never_need_fewer_agents() {
        let calc = ErlangC::default();
        let mut previous = 0;
        for cph in (0..40).map(|i| i as f64 * 25.0) {
            let req = calc.required_agents(cph, 300.0, 0.8, 20.0).unwrap();
            assert!(req.agents >= previous);
            previous = req.agents;
        }
    }

    #[test]
    fn test_agent_cap() {
        let err = ErlangC::new(5).required_agents(360.0, 240.0, 0.8, 20.0).unwrap_err();
        assert_eq!(err.kind(), "staffing_non_convergence");
    }

    #[test]
    fn test_invalid_inputs() {
        let calc = ErlangC::default();
        assert!(calc.required_agents(10.0, 0.0, 0.8, 20.0).is_err());
        assert!(calc.required_agents(10.0, 300.0, 1.0, 20.0).is_err());
        assert!(calc.required_agents(10.0, 300.0, 0.8, 0.0).is_err());
        assert!(calc.required_agents(-1.0, 300.0, 0.8, 20.0).is_err());
    }

    #[test]
    fn test_expired_deadline_aborts_search() {
        let deadline = Deadline::start(3, Duration::ZERO);
        // Very tight target forces the search past the first check
        let err = ErlangC::default()
            .required_agents_until(3600.0, 300.0, 0.999, 1.0, Some(&deadline))
            .unwrap_err();
        assert_eq!(err.kind(), "trial_timeout");
    }

    #[test]
    fn test_supervisors_and_workload() {
        assert_eq!(required_supervisors(2, 0.12), 1);
        assert_eq!(required_supervisors(100, 0.12), 12);
        assert_eq!(required_supervisors(0, 0.12), 0);
        assert_eq!(workload_agents(1200.0, 6.0, 160.0, 0.85), 1);
        assert_eq!(workload_agents(0.0, 6.0, 160.0, 0.85), 0);
    }

    #[test]
    fn test_service_level_matches_search() {
        let req = ErlangC::default().required_agents(360.0, 240.0, 0.8, 20.0).unwrap();
        let sl = service_level(req.traffic_intensity, req.agents, 240.0, 20.0);
        assert_relative_eq!(sl, req.service_level, epsilon = 1e-12);
        assert!(service_level(24.0, req.agents + 3, 240.0, 20.0) > sl);
        assert_eq!(service_level(24.0, 24, 240.0, 20.0), 0.0);
    }
}
