//! Load historical records from CSV exports of the persistence layer

use std::io::Read;
use std::path::Path;

use csv::Reader;
use log::debug;

use super::{Month, TimeSeriesRecord};
use crate::error::Result;

/// Default location of the history export
pub const DEFAULT_HISTORY_PATH: &str = "data/history.csv";

/// Raw CSV row; optional columns may be missing or blank
#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    period: String,
    #[serde(default)]
    dimension_key: Option<String>,
    members: u32,
    calls: u32,
    #[serde(default)]
    staff: Option<u32>,
    #[serde(default)]
    avg_handle_time_seconds: Option<f64>,
    #[serde(default)]
    resolution_rate: Option<f64>,
}

impl CsvRow {
    fn to_record(self) -> Result<TimeSeriesRecord> {
        let period: Month = self.period.parse()?;

        let record = TimeSeriesRecord {
            period,
            dimension_key: self.dimension_key.unwrap_or_default().trim().to_string(),
            members: self.members,
            calls: self.calls,
            staff: self.staff.unwrap_or(0),
            avg_handle_time_seconds: self.avg_handle_time_seconds.unwrap_or(0.0),
            resolution_rate: self.resolution_rate.unwrap_or(0.0),
        };
        record.validate()?;
        Ok(record)
    }
}

/// Load all records from a CSV file
pub fn load_records<P: AsRef<Path>>(path: P) -> Result<Vec<TimeSeriesRecord>> {
    let file = std::fs::File::open(path.as_ref())?;
    let records = load_records_from_reader(file)?;
    debug!("Loaded {} history rows from {}", records.len(), path.as_ref().display());
    Ok(records)
}

/// Load records from any reader (e.g., string buffer, network stream)
pub fn load_records_from_reader<R: Read>(reader: R) -> Result<Vec<TimeSeriesRecord>> {
    let mut csv_reader = Reader::from_reader(reader);
    let mut records = Vec::new();

    for result in csv_reader.deserialize() {
        let row: CsvRow = result?;
        records.push(row.to_record()?);
    }

    Ok(records)
}

/// Load records from the default `data/history.csv` location
pub fn load_default_history() -> Result<Vec<TimeSeriesRecord>> {
    load_records(DEFAULT_HISTORY_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_reader_with_optional_columns() {
        let csv = "\
period,dimension_key,members,calls,staff,avg_handle_time_seconds,resolution_rate
2024-01,Unengaged,1000,180,4,372,0.71
2024-02-01,,2000,240,,,
";
        let records = load_records_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].dimension_key, "Unengaged");
        assert_eq!(records[0].staff, 4);
        assert_eq!(records[1].period, "2024-02".parse().unwrap());
        assert_eq!(records[1].dimension_key, "");
        assert_eq!(records[1].avg_handle_time_seconds, 0.0);
    }

    #[test]
    fn test_bad_period_is_rejected() {
        let csv = "period,members,calls\nlast month,10,1\n";
        let err = load_records_from_reader(csv.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), "invalid_parameter");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "period,members,calls").unwrap();
        writeln!(file, "2024-01,10000,1200").unwrap();
        writeln!(file, "2024-02,10100,1210").unwrap();

        let records = load_records(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].members, 10100);
    }

    #[test]
    fn test_load_default_history() {
        let records = load_default_history().expect("Failed to load data/history.csv");
        assert!(!records.is_empty());

        let months: std::collections::BTreeSet<_> = records.iter().map(|r| r.period).collect();
        assert!(months.len() >= 24);
    }
}
