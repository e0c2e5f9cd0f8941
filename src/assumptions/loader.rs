//! CSV-based assumption loader
//!
//! Loads segment and calendar assumptions from CSV files in data/assumptions/

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ForecastError, Result};

/// Default path to assumptions directory
pub const DEFAULT_ASSUMPTIONS_PATH: &str = "data/assumptions";

#[derive(Debug, Deserialize)]
struct CallRateRow {
    segment: String,
    calls_per_1000: f64,
}

#[derive(Debug, Deserialize)]
struct MixRow {
    segment: String,
    share: f64,
}

#[derive(Debug, Deserialize)]
struct CalendarRow {
    month: u32,
    multiplier: f64,
}

fn non_negative(field: &str, value: f64) -> Result<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(ForecastError::invalid(field, format!("{} must be a non-negative number", value)));
    }
    Ok(value)
}

/// Load segment call rates per 1000 members
pub fn load_segment_call_rates(path: &Path) -> Result<BTreeMap<String, f64>> {
    let file = File::open(path.join("segment_call_rates.csv"))?;
    let mut reader = csv::Reader::from_reader(file);

    let mut rates = BTreeMap::new();
    for result in reader.deserialize() {
        let row: CallRateRow = result?;
        rates.insert(row.segment, non_negative("calls_per_1000", row.calls_per_1000)?);
    }

    Ok(rates)
}

/// Load the default segment mix, normalised so shares sum to 1
pub fn load_segment_mix(path: &Path) -> Result<BTreeMap<String, f64>> {
    let file = File::open(path.join("segment_mix.csv"))?;
    let mut reader = csv::Reader::from_reader(file);

    let mut shares = BTreeMap::new();
    for result in reader.deserialize() {
        let row: MixRow = result?;
        shares.insert(row.segment, non_negative("share", row.share)?);
    }

    let total: f64 = shares.values().sum();
    if total <= 0.0 {
        return Err(ForecastError::invalid("segment_mix", "shares sum to zero"));
    }
    for share in shares.values_mut() {
        *share /= total;
    }

    Ok(shares)
}

/// Load calendar multipliers; months missing from the file stay at 1.0
pub fn load_calendar_multipliers(path: &Path) -> Result<[f64; 12]> {
    let file = File::open(path.join("calendar_multipliers.csv"))?;
    let mut reader = csv::Reader::from_reader(file);

    let mut multipliers = [1.0; 12];
    for result in reader.deserialize() {
        let row: CalendarRow = result?;
        if !(1..=12).contains(&row.month) {
            return Err(ForecastError::invalid("month", format!("{} is outside 1..=12", row.month)));
        }
        multipliers[(row.month - 1) as usize] = non_negative("multiplier", row.multiplier)?;
    }

    Ok(multipliers)
}

/// Raw assumption tables loaded from a directory
pub struct LoadedAssumptions {
    pub segment_call_rates: BTreeMap<String, f64>,
    pub segment_mix: BTreeMap<String, f64>,
    pub calendar_multipliers: [f64; 12],
}

impl LoadedAssumptions {
    /// Load all assumptions from the default path
    pub fn load_default() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_ASSUMPTIONS_PATH))
    }

    /// Load all assumptions from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        Ok(Self {
            segment_call_rates: load_segment_call_rates(path)?,
            segment_mix: load_segment_mix(path)?,
            calendar_multipliers: load_calendar_multipliers(path)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_default_assumptions() {
        let result = LoadedAssumptions::load_default();
        assert!(result.is_ok(), "Failed to load assumptions: {:?}", result.err());

        let assumptions = result.unwrap();
        assert_eq!(assumptions.segment_call_rates.len(), 4);
        assert_eq!(assumptions.segment_call_rates["Unengaged"], 180.0);

        let share_total: f64 = assumptions.segment_mix.values().sum();
        assert!((share_total - 1.0).abs() < 1e-9);

        assert!(assumptions.calendar_multipliers.iter().all(|&m| m == 1.0));
    }

    #[test]
    fn test_mix_is_normalised_and_partial_calendar() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("segment_call_rates.csv"), "segment,calls_per_1000\nA,100\n").unwrap();
        fs::write(dir.path().join("segment_mix.csv"), "segment,share\nA,2\nB,6\n").unwrap();
        fs::write(dir.path().join("calendar_multipliers.csv"), "month,multiplier\n11,2.1\n").unwrap();

        let loaded = LoadedAssumptions::load_from(dir.path()).unwrap();
        assert!((loaded.segment_mix["B"] - 0.75).abs() < 1e-12);
        assert_eq!(loaded.calendar_multipliers[10], 2.1);
        assert_eq!(loaded.calendar_multipliers[0], 1.0);
    }

    #[test]
    fn test_negative_rate_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("segment_call_rates.csv"), "segment,calls_per_1000\nA,-1\n").unwrap();
        let err = load_segment_call_rates(dir.path()).unwrap_err();
        assert_eq!(err.kind(), "invalid_parameter");
    }
}
