//! Historical time-series structures matching the persistence-layer feed

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ForecastError, Result};

/// A calendar month, the engine's unit of time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    /// Create a month, validating the month number (1-12)
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(ForecastError::invalid(
                "month",
                format!("month number {} is outside 1..=12", month),
            ));
        }
        Ok(Self { year, month })
    }

    /// Month containing the given date
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// Calendar month number (1 = January)
    pub fn month(&self) -> u32 {
        self.month
    }

    /// Zero-based calendar position (0 = January), used for seasonal lookups
    pub fn calendar_index(&self) -> usize {
        (self.month - 1) as usize
    }

    /// Month `n` months after this one (negative `n` goes back)
    pub fn plus_months(self, n: i64) -> Self {
        let idx = self.ordinal() + n;
        Self {
            year: idx.div_euclid(12) as i32,
            month: (idx.rem_euclid(12) + 1) as u32,
        }
    }

    /// Signed number of months from `self` to `other`
    pub fn months_until(self, other: Month) -> i64 {
        other.ordinal() - self.ordinal()
    }

    fn ordinal(&self) -> i64 {
        self.year as i64 * 12 + (self.month as i64 - 1)
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = ForecastError;

    /// Accepts `YYYY-MM` or a full `YYYY-MM-DD` date
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d"))
            .map_err(|e| ForecastError::invalid("month", format!("cannot parse '{}': {}", s, e)))?;
        Ok(Month::from_date(date))
    }
}

impl Serialize for Month {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Month {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One raw row of history: a (month, dimension) observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesRecord {
    /// Month the observation covers
    pub period: Month,

    /// Segment or region key; empty when the row is a company-wide total
    #[serde(default)]
    pub dimension_key: String,

    /// Members enrolled
    pub members: u32,

    /// Calls received
    pub calls: u32,

    /// Agent headcount
    #[serde(default)]
    pub staff: u32,

    /// Average handle time in seconds
    #[serde(default)]
    pub avg_handle_time_seconds: f64,

    /// First-contact resolution rate in [0, 1]
    #[serde(default)]
    pub resolution_rate: f64,
}

impl TimeSeriesRecord {
    /// Create a record with no headcount, handle time or resolution data
    pub fn new(period: Month, dimension_key: impl Into<String>, members: u32, calls: u32) -> Self {
        Self {
            period,
            dimension_key: dimension_key.into(),
            members,
            calls,
            staff: 0,
            avg_handle_time_seconds: 0.0,
            resolution_rate: 0.0,
        }
    }

    pub fn with_staff(mut self, staff: u32) -> Self {
        self.staff = staff;
        self
    }

    pub fn with_handle_time(mut self, seconds: f64) -> Self {
        self.avg_handle_time_seconds = seconds;
        self
    }

    pub fn with_resolution_rate(mut self, rate: f64) -> Self {
        self.resolution_rate = rate;
        self
    }

    /// Check the fields that carry a documented domain
    pub fn validate(&self) -> Result<()> {
        if !self.avg_handle_time_seconds.is_finite() || self.avg_handle_time_seconds < 0.0 {
            return Err(ForecastError::invalid(
                "avg_handle_time_seconds",
                format!("{} for {} must be a non-negative number", self.avg_handle_time_seconds, self.period),
            ));
        }
        if !(0.0..=1.0).contains(&self.resolution_rate) {
            return Err(ForecastError::invalid(
                "resolution_rate",
                format!("{} for {} is outside [0, 1]", self.resolution_rate, self.period),
            ));
        }
        Ok(())
    }
}

/// Company-wide (or per-dimension) totals for one month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyAggregate {
    pub month: Month,
    pub total_members: u64,
    pub total_calls: u64,
    pub total_staff: u64,

    /// Call-weighted average handle time in seconds
    pub avg_handle_time_seconds: f64,

    /// Call-weighted average resolution rate
    pub avg_resolution_rate: f64,
}

impl MonthlyAggregate {
    /// Calls per 1000 members (0 when there are no members)
    pub fn calls_per_thousand(&self) -> f64 {
        if self.total_members == 0 {
            0.0
        } else {
            self.total_calls as f64 / self.total_members as f64 * 1000.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_parsing() {
        let m: Month = "2024-11".parse().unwrap();
        assert_eq!(m.year(), 2024);
        assert_eq!(m.month(), 11);

        let d: Month = "2024-11-15".parse().unwrap();
        assert_eq!(d, m);

        assert!("2024-13".parse::<Month>().is_err());
        assert!("november".parse::<Month>().is_err());
    }

    #[test]
    fn test_month_arithmetic() {
        let m = Month::new(2024, 11).unwrap();
        assert_eq!(m.plus_months(2), Month::new(2025, 1).unwrap());
        assert_eq!(m.plus_months(-11), Month::new(2023, 12).unwrap());
        assert_eq!(m.months_until(Month::new(2025, 11).unwrap()), 12);
        assert_eq!(m.to_string(), "2024-11");
    }

    #[test]
    fn test_month_serde() {
        let m = Month::new(2025, 3).unwrap();
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, "\"2025-03\"");
        let back: Month = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_record_validation() {
        let m = Month::new(2025, 1).unwrap();
        assert!(TimeSeriesRecord::new(m, "", 10, 1).with_resolution_rate(0.7).validate().is_ok());
        assert!(TimeSeriesRecord::new(m, "", 10, 1).with_resolution_rate(1.2).validate().is_err());
        assert!(TimeSeriesRecord::new(m, "", 10, 1).with_handle_time(-5.0).validate().is_err());
    }

    #[test]
    fn test_calls_per_thousand_zero_members() {
        let agg = MonthlyAggregate {
            month: Month::new(2025, 1).unwrap(),
            total_members: 0,
            total_calls: 10,
            total_staff: 0,
            avg_handle_time_seconds: 0.0,
            avg_resolution_rate: 0.0,
        };
        assert_eq!(agg.calls_per_thousand(), 0.0);
    }
}
