//! Historical membership, call and headcount series

mod data;
pub mod aggregate;
pub mod loader;

pub use data::{Month, MonthlyAggregate, TimeSeriesRecord};
pub use aggregate::{
    aggregate_by_dimension, aggregate_monthly, latest_segment_mix, records_before, segment_mix_by_month,
    DimensionTotals, MIN_HISTORY_MONTHS,
};
pub use loader::{load_default_history, load_records, load_records_from_reader};
