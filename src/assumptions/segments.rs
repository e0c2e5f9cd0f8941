//! Segment impact model
//!
//! Blends per-segment call rates (calls per 1000 members) into one rate using the
//! member mix as weights, after applying each segment's scenario adjustment:
//!
//! ```text
//! adjusted[s] = base[s] * (1 + adjustment_pct[s] / 100)
//! blended     = sum(adjusted[s] * members[s]) / sum(members[s])
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::history::DimensionTotals;

/// Rate applied to segments missing from the rate table
pub const DEFAULT_UNKNOWN_SEGMENT_RATE: f64 = 120.0;

pub const HIGHLY_ENGAGED: &str = "Highly Engaged";
pub const REACTIVE_ENGAGERS: &str = "Reactive Engagers";
pub const CONTENT_COMPLACENT: &str = "Content & Complacent";
pub const UNENGAGED: &str = "Unengaged";

/// Member counts (or weights) by segment name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentMix {
    members: BTreeMap<String, f64>,
}

impl SegmentMix {
    /// Build a mix from (segment, members) pairs; negative counts are treated as zero
    pub fn from_members<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut mix = BTreeMap::new();
        for (segment, count) in members {
            *mix.entry(segment.into()).or_insert(0.0) += count.max(0.0);
        }
        Self { members: mix }
    }

    pub fn total_members(&self) -> f64 {
        self.members.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.members.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Same proportions, rescaled so the members sum to `total`
    pub fn scaled_to(&self, total: f64) -> Self {
        let current = self.total_members();
        if current <= 0.0 {
            return self.clone();
        }
        let factor = total / current;
        Self {
            members: self
                .members
                .iter()
                .map(|(k, v)| (k.clone(), v * factor))
                .collect(),
        }
    }
}

/// Segment call rates plus the mix used when history has no segment breakdown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentImpactModel {
    /// Base call rates per 1000 members, by segment
    pub call_rates: BTreeMap<String, f64>,

    /// Rate used for segments not in `call_rates`
    pub unknown_segment_rate: f64,

    /// Segment shares assumed when the history is not broken down by segment
    pub default_mix: BTreeMap<String, f64>,
}

impl Default for SegmentImpactModel {
    fn default() -> Self {
        let call_rates = [
            (HIGHLY_ENGAGED, 85.0),
            (REACTIVE_ENGAGERS, 145.0),
            (CONTENT_COMPLACENT, 95.0),
            (UNENGAGED, 180.0),
        ];
        let default_mix = [
            (HIGHLY_ENGAGED, 0.25),
            (REACTIVE_ENGAGERS, 0.35),
            (CONTENT_COMPLACENT, 0.25),
            (UNENGAGED, 0.15),
        ];

        Self {
            call_rates: call_rates.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            unknown_segment_rate: DEFAULT_UNKNOWN_SEGMENT_RATE,
            default_mix: default_mix.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }
}

impl SegmentImpactModel {
    /// Base rate for a segment, falling back to the unknown-segment rate
    pub fn base_rate(&self, segment: &str) -> f64 {
        self.call_rates
            .get(segment)
            .copied()
            .unwrap_or(self.unknown_segment_rate)
    }

    /// Member-weighted blend of adjusted segment rates (calls per 1000 members)
    ///
    /// Returns 0 when the mix has no members.
    pub fn blended_rate(&self, mix: &SegmentMix, adjustments_pct: &BTreeMap<String, f64>) -> f64 {
        let total = mix.total_members();
        if total <= 0.0 {
            return 0.0;
        }

        let weighted: f64 = mix
            .iter()
            .map(|(segment, members)| {
                let adjustment = adjustments_pct.get(segment).copied().unwrap_or(0.0);
                self.base_rate(segment) * (1.0 + adjustment / 100.0) * members
            })
            .sum();

        weighted / total
    }

    /// Ratio of the adjusted blend to the unadjusted blend for a mix
    ///
    /// 1.0 when the unadjusted blend is zero, so an empty mix leaves rates unchanged.
    pub fn adjustment_factor(&self, mix: &SegmentMix, adjustments_pct: &BTreeMap<String, f64>) -> f64 {
        let unadjusted = self.blended_rate(mix, &BTreeMap::new());
        if unadjusted <= 0.0 {
            return 1.0;
        }
        self.blended_rate(mix, adjustments_pct) / unadjusted
    }

    /// Default mix scaled to a member count
    pub fn default_mix_for(&self, members: f64) -> SegmentMix {
        SegmentMix::from_members(self.default_mix.iter().map(|(k, v)| (k.clone(), *v)))
            .scaled_to(members)
    }

    /// Calibrate the model against the latest month of a segmented history
    ///
    /// Segments with members take their observed rate; the mix is the observed member
    /// split. Without a segment breakdown (only blank keys) the defaults are kept.
    pub fn calibrated(&self, latest: &BTreeMap<String, DimensionTotals>) -> (Self, SegmentMix) {
        let segmented = latest.keys().any(|k| !k.is_empty());
        if !segmented {
            let members = latest.values().map(|t| t.members as f64).sum();
            return (self.clone(), self.default_mix_for(members));
        }

        let mut model = self.clone();
        for (segment, totals) in latest.iter().filter(|(_, t)| t.members > 0) {
            let observed = totals.calls as f64 / totals.members as f64 * 1000.0;
            model.call_rates.insert(segment.clone(), observed);
        }

        let mix = SegmentMix::from_members(
            latest.iter().map(|(k, t)| (k.clone(), t.members as f64)),
        );
        (model, mix)
    }
}
