//! Memoisation of reproducible forecasts
//!
//! The engine looks a forecast up by a blake3 digest of everything that determines
//! it (history, scenario, engine configuration) before computing it. Only results
//! that would come out identical on a rerun are stored: no Monte Carlo, or Monte
//! Carlo with a fixed seed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::history::TimeSeriesRecord;
use crate::projection::ForecastOutput;
use crate::scenario::Scenario;

/// Default time-to-live for cached forecasts
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Storage for computed forecasts, keyed by [`cache_key`]
pub trait ForecastCache: Send + Sync {
    fn get(&self, key: &str) -> Option<ForecastOutput>;

    fn put(&self, key: &str, result: ForecastOutput, ttl: Duration);
}

/// Digest of the inputs that determine a forecast
pub fn cache_key(history: &[TimeSeriesRecord], scenario: &Scenario, config: &EngineConfig) -> Result<String> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&serde_json::to_vec(history)?);
    hasher.update(b"\x00scenario\x00");
    hasher.update(&serde_json::to_vec(scenario)?);
    hasher.update(b"\x00config\x00");
    hasher.update(&serde_json::to_vec(config)?);
    Ok(hasher.finalize().to_hex().to_string())
}

/// Hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Fraction of lookups served from the cache
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

struct Entry {
    expires_at: Instant,
    result: ForecastOutput,
}

/// Process-local cache with per-entry expiry
#[derive(Default)]
pub struct InMemoryForecastCache {
    entries: Mutex<HashMap<String, Entry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl InMemoryForecastCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            cache_hits: self.hits.load(Ordering::Relaxed),
            cache_misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.lock().map(|e| e.len()).unwrap_or(0),
        }
    }

    /// Drop expired entries
    pub fn purge_expired(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            let now = Instant::now();
            entries.retain(|_, entry| entry.expires_at > now);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl ForecastCache for InMemoryForecastCache {
    fn get(&self, key: &str) -> Option<ForecastOutput> {
        let found = match self.entries.lock() {
            Ok(mut entries) => match entries.get(key).map(|e| e.expires_at > Instant::now()) {
                Some(true) => entries.get(key).map(|e| e.result.clone()),
                Some(false) => {
                    entries.remove(key);
                    None
                }
                None => None,
            },
            Err(_) => None,
        };

        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    fn put(&self, key: &str, result: ForecastOutput, ttl: Duration) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                key.to_string(),
                Entry {
                    expires_at: Instant::now() + ttl,
                    result,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::history::Month;

    fn output() -> ForecastOutput {
        ForecastOutput {
            forecast_results: Vec::new(),
            confidence_intervals: None,
            computation_time_ms: 3,
            monte_carlo: None,
            staffing_issues: Vec::new(),
            diagnostics: Diagnostics {
                history_months: 2,
                base_month: Month::new(2025, 1).unwrap(),
                data_quality_score: 0.5,
                anomalous_months: Vec::new(),
                degenerate_decomposition: true,
                historical_growth_rate_pct: 0.0,
                base_calls_per_thousand: 120.0,
                segment_adjustment_factor: 1.0,
            },
        }
    }

    #[test]
    fn test_hit_and_miss() {
        let cache = InMemoryForecastCache::new();
        assert!(cache.get("a").is_none());
        cache.put("a", output(), Duration::from_secs(60));
        assert_eq!(cache.get("a").unwrap().computation_time_ms, 3);

        let stats = cache.stats();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = InMemoryForecastCache::new();
        cache.put("a", output(), Duration::ZERO);
        assert!(cache.get("a").is_none());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_key_depends_on_inputs() {
        let month = Month::new(2025, 1).unwrap();
        let history = vec![TimeSeriesRecord::new(month, "", 100, 10)];
        let config = EngineConfig::default();
        let a = Scenario::baseline("a", None, 3, 0.0);
        let b = Scenario::baseline("a", None, 4, 0.0);

        let key_a = cache_key(&history, &a, &config).unwrap();
        assert_eq!(key_a, cache_key(&history, &a, &config).unwrap());
        assert_ne!(key_a, cache_key(&history, &b, &config).unwrap());
        assert_eq!(key_a.len(), 64);
    }
}
