//! Calendar-driven call multipliers (enrollment periods, summer lull, ...)

use serde::{Deserialize, Serialize};

use crate::history::Month;

/// One call-volume multiplier per calendar month, January first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarSeasonality {
    pub multipliers: [f64; 12],
}

impl Default for CalendarSeasonality {
    /// Flat calendar: every month 1.0
    fn default() -> Self {
        Self { multipliers: [1.0; 12] }
    }
}

impl CalendarSeasonality {
    /// Medicare calendar: annual enrollment (Oct-Dec) 2.1x, plan-year start
    /// (Jan) 1.6x, summer lull (Jun-Aug) 0.75x
    pub fn medicare() -> Self {
        let mut multipliers = [1.0; 12];
        multipliers[0] = 1.6;
        for m in [5, 6, 7] {
            multipliers[m] = 0.75;
        }
        for m in [9, 10, 11] {
            multipliers[m] = 2.1;
        }
        Self { multipliers }
    }

    pub fn multiplier(&self, month: Month) -> f64 {
        self.multipliers[month.calendar_index()]
    }

    /// True when every month is 1.0
    pub fn is_flat(&self) -> bool {
        self.multipliers.iter().all(|&m| m == 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_flat() {
        let cal = CalendarSeasonality::default();
        assert!(cal.is_flat());
        assert_eq!(cal.multiplier("2024-10".parse().unwrap()), 1.0);
    }

    #[test]
    fn test_medicare_periods() {
        let cal = CalendarSeasonality::medicare();
        assert_eq!(cal.multiplier("2024-11".parse().unwrap()), 2.1);
        assert_eq!(cal.multiplier("2025-01".parse().unwrap()), 1.6);
        assert_eq!(cal.multiplier("2025-07".parse().unwrap()), 0.75);
        assert_eq!(cal.multiplier("2025-03".parse().unwrap()), 1.0);
        assert!(!cal.is_flat());
    }
}
