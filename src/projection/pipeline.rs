//! The deterministic forecast pipeline
//!
//! `Pipeline::prepare` does everything that depends only on history (aggregation,
//! decomposition, per-month segment calibration) once; `run` applies a scenario.
//! Segment rates and mix are calibrated on the same month as the base call rate.
//! Monte Carlo trials and backtest windows reuse the same two steps.
//!
//! Per forecast month `m`, `n` months after the base month:
//!
//! ```text
//! members(m) = base_members * (1 + g/100)^n * (1 + amplitude * sin(2*pi*(n-1)/12))
//! rate       = base_rate / seasonal(base) * segment_factor          (calls per 1000)
//! calls(m)   = members(m) * rate / 1000 * factors * seasonal(m) * calendar(m)
//! staff(m)   = max(erlang_c(calls(m) / hours), workload(calls(m)))
//! ```

use std::collections::BTreeMap;

use crate::assumptions::{SegmentImpactModel, SegmentMix};
use crate::config::EngineConfig;
use crate::diagnostics::{data_quality_score, AnomalyDetector, Diagnostics};
use crate::error::{ForecastError, Result};
use crate::history::{aggregate_monthly, segment_mix_by_month, Month, MonthlyAggregate, TimeSeriesRecord};
use crate::model::{
    historical_growth_rate_pct, required_supervisors, service_level, workload_agents, Deadline, Decomposition,
    ErlangC, GrowthProjector, SeasonalDecomposer,
};
use crate::scenario::Scenario;
use super::results::{ForecastPoint, StaffingIssue};

/// Output of one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub points: Vec<ForecastPoint>,
    pub staffing_issues: Vec<StaffingIssue>,
    pub segment_adjustment_factor: f64,
}

/// History-derived state shared by every run against the same history
#[derive(Debug, Clone)]
pub struct Pipeline<'a> {
    config: &'a EngineConfig,
    aggregates: Vec<MonthlyAggregate>,
    decomposition: Decomposition,
    calibrations: BTreeMap<Month, (SegmentImpactModel, SegmentMix)>,
    growth: GrowthProjector,
    erlang: ErlangC,
}

impl<'a> Pipeline<'a> {
    /// Aggregate and decompose the history
    ///
    /// Fails with `InsufficientData` when fewer than two distinct months are present.
    pub fn prepare(history: &[TimeSeriesRecord], config: &'a EngineConfig) -> Result<Self> {
        let aggregates = aggregate_monthly(history)?;

        let months: Vec<Month> = aggregates.iter().map(|a| a.month).collect();
        let rates: Vec<f64> = aggregates.iter().map(|a| a.calls_per_thousand()).collect();
        let decomposition = SeasonalDecomposer::default().decompose(&months, &rates);
        if decomposition.degenerate {
            log::debug!(
                "{} months of history, seasonal decomposition falls back to a linear trend",
                aggregates.len()
            );
        }

        let calibrations = segment_mix_by_month(history)
            .into_iter()
            .map(|(month, totals)| (month, config.assumptions.segments.calibrated(&totals)))
            .collect();

        Ok(Self {
            config,
            aggregates,
            decomposition,
            calibrations,
            growth: GrowthProjector::new(config.growth_min_pct, config.growth_max_pct),
            erlang: ErlangC::new(config.max_agents),
        })
    }

    pub fn aggregates(&self) -> &[MonthlyAggregate] {
        &self.aggregates
    }

    pub fn decomposition(&self) -> &Decomposition {
        &self.decomposition
    }

    pub fn growth(&self) -> &GrowthProjector {
        &self.growth
    }

    /// Latest aggregate at or before `base_month` (the latest overall when `None`)
    fn base_aggregate(&self, base_month: Option<Month>) -> Result<&MonthlyAggregate> {
        match base_month {
            None => self.aggregates.last(),
            Some(base) => self.aggregates.iter().rev().find(|a| a.month <= base),
        }
        .ok_or_else(|| {
            ForecastError::InsufficientData(format!(
                "no history at or before base month {}",
                base_month.map(|m| m.to_string()).unwrap_or_default()
            ))
        })
    }

    /// Base calls per 1000 members with the base month's seasonal effect removed
    fn deseasonalised_rate(&self, base: &MonthlyAggregate) -> f64 {
        let multiplier = self.decomposition.seasonal_multiplier(base.month);
        let rate = base.calls_per_thousand();
        if multiplier > 0.0 {
            rate / multiplier
        } else {
            rate
        }
    }

    /// History diagnostics for a run anchored at `base_month`
    pub fn diagnostics(&self, base_month: Option<Month>, segment_adjustment_factor: f64) -> Result<Diagnostics> {
        let base = self.base_aggregate(base_month)?;
        Ok(Diagnostics {
            history_months: self.aggregates.len(),
            base_month: base_month.unwrap_or(base.month),
            data_quality_score: data_quality_score(&self.aggregates),
            anomalous_months: AnomalyDetector::from_config(&self.config.anomaly).detect(&self.aggregates),
            degenerate_decomposition: self.decomposition.degenerate,
            historical_growth_rate_pct: historical_growth_rate_pct(&self.aggregates),
            base_calls_per_thousand: base.calls_per_thousand(),
            segment_adjustment_factor,
        })
    }

    /// Run a scenario through the pipeline
    ///
    /// With `strict` (or the scenario's own `strict_staffing`) a staffing
    /// non-convergence fails the run; otherwise the month falls back to the workload
    /// estimate and the issue is recorded. `deadline` is checked between months and
    /// inside the Erlang-C search.
    pub fn run(&self, scenario: &Scenario, strict: bool, deadline: Option<&Deadline>) -> Result<PipelineRun> {
        let strict = strict || scenario.strict_staffing;
        let base = self.base_aggregate(scenario.base_month)?;
        let base_month = scenario.base_month.unwrap_or(base.month);
        let gap = base.month.months_until(base_month).max(0) as u32;

        let members = self.growth.project(
            base.total_members as f64,
            scenario.member_growth_rate_pct,
            gap + scenario.horizon_months,
            scenario.member_seasonal_amplitude,
        )?;

        let adjustment_factor = match self.calibrations.get(&base.month) {
            Some((segments, mix)) => segments.adjustment_factor(mix, &scenario.segment_adjustments_pct),
            None => 1.0,
        };
        let rate = self.deseasonalised_rate(base) * adjustment_factor;
        let factors = scenario.call_volume_factors.product();
        let staffing = &scenario.staffing_params;
        let aht_seconds = staffing.avg_handle_time_minutes * 60.0;

        let mut points = Vec::with_capacity(scenario.horizon_months as usize);
        let mut staffing_issues = Vec::new();

        for (offset, &projected_members) in members.iter().enumerate().skip(gap as usize) {
            if let Some(deadline) = deadline {
                deadline.check()?;
            }

            let n = offset as i64 + 1 - gap as i64;
            let month = base_month.plus_months(n);
            let predicted_members = projected_members.max(0.0).round() as u64;

            let calls = projected_members.max(0.0) * rate / 1000.0
                * factors
                * self.decomposition.seasonal_multiplier(month)
                * self.config.assumptions.calendar.multiplier(month);
            let predicted_calls = calls.max(0.0).round() as u64;

            let monthly_calls = predicted_calls as f64;
            let calls_per_hour = monthly_calls / staffing.hours_per_agent_per_month;
            let workload = workload_agents(
                monthly_calls,
                staffing.avg_handle_time_minutes,
                staffing.hours_per_agent_per_month,
                staffing.utilization_target,
            );

            let (required_staff, traffic, converged) = match self.erlang.required_agents_until(
                calls_per_hour,
                aht_seconds,
                staffing.target_service_level,
                staffing.target_answer_time_seconds,
                deadline,
            ) {
                Ok(req) => (req.agents.max(workload), req.traffic_intensity, true),
                Err(err @ ForecastError::StaffingNonConvergence { .. }) => {
                    let err = err.at_month(month);
                    if strict {
                        return Err(err);
                    }
                    log::warn!("{}; using workload staffing of {} agents", err, workload);
                    staffing_issues.push(StaffingIssue {
                        month,
                        message: err.to_string(),
                    });
                    (workload, calls_per_hour * aht_seconds / 3600.0, false)
                }
                Err(err) => return Err(err),
            };

            let (agent_utilization, achieved_service_level) = if required_staff == 0 {
                (0.0, 1.0)
            } else {
                (
                    traffic / required_staff as f64,
                    service_level(traffic, required_staff, aht_seconds, staffing.target_answer_time_seconds),
                )
            };

            points.push(ForecastPoint {
                month,
                predicted_members,
                predicted_calls,
                required_staff,
                required_supervisors: required_supervisors(required_staff, staffing.supervisor_ratio),
                calls_per_member: if predicted_members > 0 {
                    predicted_calls as f64 / predicted_members as f64
                } else {
                    0.0
                },
                agent_utilization,
                service_level: achieved_service_level,
                staffing_converged: converged,
            });
        }

        Ok(PipelineRun {
            points,
            staffing_issues,
            segment_adjustment_factor: adjustment_factor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_history(months: usize, members: u32, calls: u32) -> Vec<TimeSeriesRecord> {
        let start = Month::new(2024, 1).unwrap();
        (0..months as i64)
            .map(|i| TimeSeriesRecord::new(start.plus_months(i), "", members, calls))
            .collect()
    }

    fn scenario(horizon: u32, growth: f64) -> Scenario {
        let mut s = Scenario::baseline("test", None, horizon, growth);
        s.staffing_params.avg_handle_time_minutes = 6.0;
        s
    }

    #[test]
    fn test_flat_history_reproduces_rate() {
        let config = EngineConfig::default();
        let pipeline = Pipeline::prepare(&flat_history(6, 10_000, 1_200), &config).unwrap();
        let run = pipeline.run(&scenario(1, 0.0), false, None).unwrap();

        let point = &run.points[0];
        assert_eq!(point.month, Month::new(2024, 7).unwrap());
        assert_eq!(point.predicted_members, 10_000);
        assert_eq!(point.predicted_calls, 1_200);
        assert_eq!(point.required_staff, 2);
        assert_eq!(point.required_supervisors, 1);
        assert!(point.staffing_converged);
        assert!(point.service_level >= 0.8);
        assert!((point.calls_per_member - 0.12).abs() < 1e-12);
    }

    #[test]
    fn test_base_month_before_latest() {
        let config = EngineConfig::default();
        let pipeline = Pipeline::prepare(&flat_history(6, 10_000, 1_200), &config).unwrap();
        let mut s = scenario(2, 0.0);
        s.base_month = Some(Month::new(2024, 3).unwrap());

        let run = pipeline.run(&s, false, None).unwrap();
        assert_eq!(run.points[0].month, Month::new(2024, 4).unwrap());
        assert_eq!(run.points.len(), 2);
    }

    #[test]
    fn test_base_month_after_latest_compounds_gap() {
        let config = EngineConfig::default();
        let pipeline = Pipeline::prepare(&flat_history(6, 10_000, 1_200), &config).unwrap();
        let mut s = scenario(1, 10.0);
        s.base_month = Some(Month::new(2024, 7).unwrap());

        let run = pipeline.run(&s, false, None).unwrap();
        assert_eq!(run.points[0].month, Month::new(2024, 8).unwrap());
        assert_eq!(run.points[0].predicted_members, 12_100);
    }

    #[test]
    fn test_base_month_before_history() {
        let config = EngineConfig::default();
        let pipeline = Pipeline::prepare(&flat_history(6, 10_000, 1_200), &config).unwrap();
        let mut s = scenario(1, 0.0);
        s.base_month = Some(Month::new(2020, 1).unwrap());
        assert_eq!(pipeline.run(&s, false, None).unwrap_err().kind(), "insufficient_data");
    }

    #[test]
    fn test_zero_calls_need_no_staff() {
        let config = EngineConfig::default();
        let pipeline = Pipeline::prepare(&flat_history(3, 5_000, 0), &config).unwrap();
        let point = &pipeline.run(&scenario(1, 0.0), false, None).unwrap().points[0];
        assert_eq!(point.predicted_calls, 0);
        assert_eq!(point.required_staff, 0);
        assert_eq!(point.required_supervisors, 0);
        assert_eq!(point.agent_utilization, 0.0);
        assert_eq!(point.service_level, 1.0);
    }

    #[test]
    fn test_non_convergence_falls_back_or_fails() {
        let config = EngineConfig {
            max_agents: 5,
            ..EngineConfig::default()
        };
        let pipeline = Pipeline::prepare(&flat_history(3, 100_000, 60_000), &config).unwrap();

        let run = pipeline.run(&scenario(2, 0.0), false, None).unwrap();
        assert_eq!(run.staffing_issues.len(), 2);
        let point = &run.points[0];
        assert!(!point.staffing_converged);
        assert_eq!(point.required_staff, workload_agents(60_000.0, 6.0, 160.0, 0.85));

        let err = pipeline.run(&scenario(2, 0.0), true, None).unwrap_err();
        assert_eq!(err.kind(), "staffing_non_convergence");
        assert!(err.to_string().contains("2024-04"));
    }

    #[test]
    fn test_segment_adjustment_scales_calls() {
        let config = EngineConfig::default();
        let pipeline = Pipeline::prepare(&flat_history(6, 10_000, 1_200), &config).unwrap();
        let mut s = scenario(1, 0.0);
        for segment in ["Highly Engaged", "Reactive Engagers", "Content & Complacent", "Unengaged"] {
            s.segment_adjustments_pct.insert(segment.to_string(), 10.0);
        }

        let run = pipeline.run(&s, false, None).unwrap();
        assert!((run.segment_adjustment_factor - 1.1).abs() < 1e-12);
        assert_eq!(run.points[0].predicted_calls, 1_320);
    }

    #[test]
    fn test_segments_calibrated_on_base_month() {
        use crate::assumptions::{HIGHLY_ENGAGED, UNENGAGED};

        let jan = Month::new(2024, 1).unwrap();
        let history = vec![
            TimeSeriesRecord::new(jan, HIGHLY_ENGAGED, 1_000, 85),
            TimeSeriesRecord::new(jan, UNENGAGED, 1_000, 180),
            TimeSeriesRecord::new(jan.plus_months(1), HIGHLY_ENGAGED, 2_000, 170),
            TimeSeriesRecord::new(jan.plus_months(2), HIGHLY_ENGAGED, 2_000, 170),
        ];
        let config = EngineConfig::default();
        let pipeline = Pipeline::prepare(&history, &config).unwrap();

        let mut s = scenario(1, 0.0);
        s.base_month = Some(jan);
        s.segment_adjustments_pct.insert(UNENGAGED.to_string(), -50.0);
        let run = pipeline.run(&s, false, None).unwrap();

        // January still had Unengaged members, so the cut applies to its mix
        assert!((run.segment_adjustment_factor - 87.5 / 132.5).abs() < 1e-12);
        assert_eq!(run.points[0].predicted_calls, 175);

        // From March there is nothing left to adjust
        s.base_month = None;
        let latest = pipeline.run(&s, false, None).unwrap();
        assert_eq!(latest.segment_adjustment_factor, 1.0);
        assert_eq!(latest.points[0].predicted_calls, 170);
    }

    #[test]
    fn test_insufficient_history() {
        let config = EngineConfig::default();
        let err = Pipeline::prepare(&flat_history(1, 10_000, 1_200), &config).unwrap_err();
        assert_eq!(err.kind(), "insufficient_data");
    }
}
