//! Historical aggregation: raw rows to sorted monthly totals

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ForecastError, Result};
use super::data::{MonthlyAggregate, Month, TimeSeriesRecord};

/// Minimum number of distinct months needed to measure any growth
pub const MIN_HISTORY_MONTHS: usize = 2;

/// Running sums for one month
#[derive(Debug, Default)]
struct MonthAccumulator {
    members: u64,
    calls: u64,
    staff: u64,
    rows: u32,
    weighted_aht: f64,
    weighted_resolution: f64,
    sum_aht: f64,
    sum_resolution: f64,
}

impl MonthAccumulator {
    fn add(&mut self, record: &TimeSeriesRecord) {
        let calls = record.calls as f64;
        self.members += record.members as u64;
        self.calls += record.calls as u64;
        self.staff += record.staff as u64;
        self.rows += 1;
        self.weighted_aht += record.avg_handle_time_seconds * calls;
        self.weighted_resolution += record.resolution_rate * calls;
        self.sum_aht += record.avg_handle_time_seconds;
        self.sum_resolution += record.resolution_rate;
    }

    fn finish(self, month: Month) -> MonthlyAggregate {
        // Call-weighted where there were calls, plain mean otherwise
        let (aht, resolution) = if self.calls > 0 {
            let calls = self.calls as f64;
            (self.weighted_aht / calls, self.weighted_resolution / calls)
        } else if self.rows > 0 {
            let rows = self.rows as f64;
            (self.sum_aht / rows, self.sum_resolution / rows)
        } else {
            (0.0, 0.0)
        };

        MonthlyAggregate {
            month,
            total_members: self.members,
            total_calls: self.calls,
            total_staff: self.staff,
            avg_handle_time_seconds: aht,
            avg_resolution_rate: resolution,
        }
    }
}

/// Member and call totals for one dimension key in one month
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DimensionTotals {
    pub members: u64,
    pub calls: u64,
}

fn group_by_month<'a, I>(records: I) -> Result<Vec<MonthlyAggregate>>
where
    I: IntoIterator<Item = &'a TimeSeriesRecord>,
{
    let mut months: BTreeMap<Month, MonthAccumulator> = BTreeMap::new();
    for record in records {
        record.validate()?;
        months.entry(record.period).or_default().add(record);
    }

    Ok(months
        .into_iter()
        .map(|(month, acc)| acc.finish(month))
        .collect())
}

fn ensure_enough_months(distinct: usize) -> Result<()> {
    if distinct < MIN_HISTORY_MONTHS {
        return Err(ForecastError::InsufficientData(format!(
            "{} distinct month(s) of history, at least {} required",
            distinct, MIN_HISTORY_MONTHS
        )));
    }
    Ok(())
}

/// Aggregate all rows into company-wide monthly totals, ascending by month
///
/// Fails with `InsufficientData` when fewer than two distinct months are present.
pub fn aggregate_monthly(records: &[TimeSeriesRecord]) -> Result<Vec<MonthlyAggregate>> {
    let monthly = group_by_month(records)?;
    ensure_enough_months(monthly.len())?;
    Ok(monthly)
}

/// Aggregate rows per dimension key, each series ascending by month
///
/// The two-month requirement applies to the history as a whole, not to each key:
/// a segment that appeared last month is still reported.
pub fn aggregate_by_dimension(
    records: &[TimeSeriesRecord],
) -> Result<BTreeMap<String, Vec<MonthlyAggregate>>> {
    let distinct: BTreeSet<Month> = records.iter().map(|r| r.period).collect();
    ensure_enough_months(distinct.len())?;

    let mut by_key: BTreeMap<String, Vec<&TimeSeriesRecord>> = BTreeMap::new();
    for record in records {
        by_key.entry(record.dimension_key.clone()).or_default().push(record);
    }

    by_key
        .into_iter()
        .map(|(key, rows)| Ok((key, group_by_month(rows)?)))
        .collect()
}

/// Per-dimension member and call totals for every month in the history
pub fn segment_mix_by_month(records: &[TimeSeriesRecord]) -> BTreeMap<Month, BTreeMap<String, DimensionTotals>> {
    let mut months: BTreeMap<Month, BTreeMap<String, DimensionTotals>> = BTreeMap::new();
    for record in records {
        let entry = months
            .entry(record.period)
            .or_default()
            .entry(record.dimension_key.clone())
            .or_default();
        entry.members += record.members as u64;
        entry.calls += record.calls as u64;
    }
    months
}

/// Per-dimension totals for the most recent month in the history
///
/// Returns `None` for an empty history.
pub fn latest_segment_mix(
    records: &[TimeSeriesRecord],
) -> Option<(Month, BTreeMap<String, DimensionTotals>)> {
    segment_mix_by_month(records).pop_last()
}

/// Rows whose period falls strictly before `cutoff`
pub fn records_before(records: &[TimeSeriesRecord], cutoff: Month) -> Vec<TimeSeriesRecord> {
    records
        .iter()
        .filter(|r| r.period < cutoff)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(s: &str) -> Month {
        s.parse().unwrap()
    }

    #[test]
    fn test_aggregate_sorts_and_sums() {
        let records = vec![
            TimeSeriesRecord::new(month("2024-02"), "A", 100, 10).with_handle_time(300.0),
            TimeSeriesRecord::new(month("2024-01"), "A", 90, 9).with_handle_time(300.0),
            TimeSeriesRecord::new(month("2024-02"), "B", 50, 30).with_handle_time(400.0),
        ];

        let monthly = aggregate_monthly(&records).unwrap();
        assert_eq!(monthly.len(), 2);
        assert_eq!(monthly[0].month, month("2024-01"));
        assert_eq!(monthly[1].total_members, 150);
        assert_eq!(monthly[1].total_calls, 40);

        // (300*10 + 400*30) / 40
        assert!((monthly[1].avg_handle_time_seconds - 375.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_month_is_insufficient() {
        let records = vec![
            TimeSeriesRecord::new(month("2024-01"), "A", 100, 10),
            TimeSeriesRecord::new(month("2024-01"), "B", 100, 10),
        ];
        let err = aggregate_monthly(&records).unwrap_err();
        assert_eq!(err.kind(), "insufficient_data");
        assert!(aggregate_monthly(&[]).is_err());
    }

    #[test]
    fn test_zero_call_month_uses_plain_mean() {
        let records = vec![
            TimeSeriesRecord::new(month("2024-01"), "A", 100, 0).with_resolution_rate(0.6),
            TimeSeriesRecord::new(month("2024-01"), "B", 100, 0).with_resolution_rate(0.8),
            TimeSeriesRecord::new(month("2024-02"), "A", 100, 5).with_resolution_rate(0.5),
        ];
        let monthly = aggregate_monthly(&records).unwrap();
        assert!((monthly[0].avg_resolution_rate - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_by_dimension() {
        let records = vec![
            TimeSeriesRecord::new(month("2024-01"), "A", 100, 10),
            TimeSeriesRecord::new(month("2024-02"), "A", 110, 11),
            TimeSeriesRecord::new(month("2024-02"), "B", 40, 8),
        ];
        let by_dim = aggregate_by_dimension(&records).unwrap();
        assert_eq!(by_dim["A"].len(), 2);
        assert_eq!(by_dim["B"].len(), 1);
    }

    #[test]
    fn test_latest_segment_mix() {
        let records = vec![
            TimeSeriesRecord::new(month("2024-01"), "A", 100, 10),
            TimeSeriesRecord::new(month("2024-02"), "A", 110, 11),
            TimeSeriesRecord::new(month("2024-02"), "B", 40, 8),
        ];
        let (latest, totals) = latest_segment_mix(&records).unwrap();
        assert_eq!(latest, month("2024-02"));
        assert_eq!(totals.len(), 2);
        assert_eq!(totals["B"].calls, 8);
        assert!(latest_segment_mix(&[]).is_none());
    }

    #[test]
    fn test_segment_mix_every_month() {
        let records = vec![
            TimeSeriesRecord::new(month("2024-01"), "A", 100, 10),
            TimeSeriesRecord::new(month("2024-01"), "A", 50, 5),
            TimeSeriesRecord::new(month("2024-02"), "B", 40, 8),
        ];
        let by_month = segment_mix_by_month(&records);
        assert_eq!(by_month.len(), 2);
        assert_eq!(by_month[&month("2024-01")]["A"].members, 150);
        assert!(!by_month[&month("2024-01")].contains_key("B"));
    }

    #[test]
    fn test_invalid_record_rejected() {
        let records = vec![
            TimeSeriesRecord::new(month("2024-01"), "A", 100, 10).with_resolution_rate(2.0),
            TimeSeriesRecord::new(month("2024-02"), "A", 100, 10),
        ];
        assert_eq!(aggregate_monthly(&records).unwrap_err().kind(), "invalid_parameter");
    }
}
