//! Forecast assumptions: segment call rates, default segment mix and calendar seasonality

mod segments;
mod seasonality;
pub mod loader;

pub use segments::{
    SegmentImpactModel, SegmentMix, CONTENT_COMPLACENT, DEFAULT_UNKNOWN_SEGMENT_RATE,
    HIGHLY_ENGAGED, REACTIVE_ENGAGERS, UNENGAGED,
};
pub use seasonality::CalendarSeasonality;
pub use loader::LoadedAssumptions;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Container for all forecast assumptions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Assumptions {
    pub segments: SegmentImpactModel,
    pub calendar: CalendarSeasonality,
}

impl Assumptions {
    /// Built-in segment rates with the Medicare enrollment calendar
    pub fn medicare() -> Self {
        Self {
            segments: SegmentImpactModel::default(),
            calendar: CalendarSeasonality::medicare(),
        }
    }

    /// Load assumptions from CSV files in the default location (data/assumptions/)
    pub fn from_csv() -> Result<Self> {
        Self::from_csv_path(Path::new(loader::DEFAULT_ASSUMPTIONS_PATH))
    }

    /// Load assumptions from CSV files in a specific directory
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let loaded = LoadedAssumptions::load_from(path)?;

        Ok(Self {
            segments: SegmentImpactModel {
                call_rates: loaded.segment_call_rates,
                default_mix: loaded.segment_mix,
                ..SegmentImpactModel::default()
            },
            calendar: CalendarSeasonality {
                multipliers: loaded.calendar_multipliers,
            },
        })
    }
}
