//! Regime pattern memory: discretized market-condition fingerprints with
//! accumulated per-strategy outcome statistics.
//!
//! The discretization is the central hashing invariant: identical conditions
//! must always produce identical keys so statistics accumulate in one record.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;
use types::{MarketConditions, Regime};

/// Volume ratio is capped before bucketing so thin/illiquid spikes share a
/// bucket instead of fragmenting the memory.
const VOLUME_RATIO_CAP: f64 = 3.0;

/// Structured discretization of market conditions.
///
/// Equivalent to the string fingerprint
/// `{regime}_{vol}_{volume}_{sentiment}_{hour/4}`, realized as a composite
/// hash key so distinct bucket combinations can never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternKey {
    pub regime: Regime,
    /// floor(volatility * 10)
    pub vol_bucket: u8,
    /// floor(min(volume_ratio, 3.0) * 10)
    pub volume_bucket: u8,
    /// floor(sentiment * 10)
    pub sentiment_bucket: u8,
    /// hour / 4, six quadrants per day
    pub hour_quadrant: u8,
}

impl PatternKey {
    /// Deterministic discretization of conditions. Pure: same inputs, same key.
    pub fn from_conditions(conditions: &MarketConditions) -> Self {
        Self {
            regime: conditions.regime,
            vol_bucket: decile(conditions.volatility),
            volume_bucket: decile(conditions.volume_ratio.min(VOLUME_RATIO_CAP)),
            sentiment_bucket: decile(conditions.sentiment),
            hour_quadrant: (conditions.hour / 4) as u8,
        }
    }
}

impl std::fmt::Display for PatternKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}_{}",
            self.regime, self.vol_bucket, self.volume_bucket, self.sentiment_bucket,
            self.hour_quadrant
        )
    }
}

fn decile(value: f64) -> u8 {
    (value.max(0.0) * 10.0).min(u8::MAX as f64) as u8
}

/// Per-strategy statistics inside one pattern.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyPatternStats {
    pub trades: u64,
    pub wins: u64,
    pub profit: f64,
}

/// Accumulated statistics for one market pattern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternRecord {
    pub occurrences: u64,
    pub successes: u64,
    pub total_profit: f64,
    /// Running mean of confidence across all occurrences; never reset.
    pub avg_confidence: f64,
    pub strategies: HashMap<String, StrategyPatternStats>,
    /// Monotonic touch sequence used for least-recently-touched eviction.
    pub last_touched: u64,
}

/// Recommendation for a pattern: the strategies that historically worked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternRecommendation {
    pub strategy: String,
    /// win_rate * 20, the confidence boost suggested for this strategy.
    pub confidence_adjustment: f64,
    /// Mean profit per trade in this pattern.
    pub expected_profit: f64,
    pub sample_size: u64,
}

/// Summary row for learning metrics (patterns with enough occurrences).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternSummary {
    pub pattern: String,
    pub success_rate: f64,
    pub occurrences: u64,
    pub avg_profit: f64,
}

/// Accumulates per-pattern, per-strategy win/profit statistics and
/// recommends strategies for previously-seen conditions.
#[derive(Debug, Clone)]
pub struct RegimePatternMemory {
    patterns: HashMap<PatternKey, PatternRecord>,
    touch_seq: u64,
    max_patterns: usize,
}

impl RegimePatternMemory {
    pub fn new(max_patterns: usize) -> Self {
        Self {
            patterns: HashMap::new(),
            touch_seq: 0,
            max_patterns,
        }
    }

    /// Record one outcome against the pattern derived from `conditions`.
    pub fn record(
        &mut self,
        conditions: &MarketConditions,
        strategy: &str,
        profit: f64,
        success: bool,
        confidence: f64,
    ) {
        let key = PatternKey::from_conditions(conditions);
        self.touch_seq += 1;
        let is_new = !self.patterns.contains_key(&key);
        let record = self.patterns.entry(key).or_default();

        record.occurrences += 1;
        record.total_profit += profit;
        if success {
            record.successes += 1;
        }

        let stats = record.strategies.entry(strategy.to_string()).or_default();
        stats.trades += 1;
        stats.profit += profit;
        if success {
            stats.wins += 1;
        }

        // Running mean, never reset
        record.avg_confidence = (record.avg_confidence * (record.occurrences - 1) as f64
            + confidence)
            / record.occurrences as f64;
        record.last_touched = self.touch_seq;

        debug!(pattern = %key, occurrences = record.occurrences, "pattern recorded");

        if is_new {
            self.evict_if_over_cap();
        }
    }

    /// Top strategies for the matching pattern, ranked by profit per trade,
    /// filtered to at least `min_samples` trades. At most three entries.
    pub fn recommend(
        &self,
        conditions: &MarketConditions,
        min_samples: u64,
    ) -> Vec<PatternRecommendation> {
        let key = PatternKey::from_conditions(conditions);
        let Some(record) = self.patterns.get(&key) else {
            return Vec::new();
        };

        let mut ranked: Vec<(&String, &StrategyPatternStats)> = record
            .strategies
            .iter()
            .filter(|(_, stats)| stats.trades >= min_samples)
            .collect();
        ranked.sort_by(|a, b| {
            let per_trade_a = a.1.profit / a.1.trades.max(1) as f64;
            let per_trade_b = b.1.profit / b.1.trades.max(1) as f64;
            per_trade_b
                .partial_cmp(&per_trade_a)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        ranked
            .into_iter()
            .take(3)
            .map(|(name, stats)| {
                let win_rate = stats.wins as f64 / stats.trades as f64;
                PatternRecommendation {
                    strategy: name.clone(),
                    confidence_adjustment: win_rate * 20.0,
                    expected_profit: stats.profit / stats.trades as f64,
                    sample_size: stats.trades,
                }
            })
            .collect()
    }

    pub fn get(&self, key: &PatternKey) -> Option<&PatternRecord> {
        self.patterns.get(key)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Patterns with at least `min_occurrences`, for metrics reporting.
    pub fn summary(&self, min_occurrences: u64) -> Vec<PatternSummary> {
        self.patterns
            .iter()
            .filter(|(_, r)| r.occurrences >= min_occurrences)
            .map(|(key, r)| PatternSummary {
                pattern: key.to_string(),
                success_rate: r.successes as f64 / r.occurrences as f64,
                occurrences: r.occurrences,
                avg_profit: r.total_profit / r.occurrences as f64,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.patterns.clear();
        self.touch_seq = 0;
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&PatternKey, &PatternRecord)> {
        self.patterns.iter()
    }

    pub(crate) fn restore(&mut self, entries: Vec<(PatternKey, PatternRecord)>) {
        self.patterns = entries.into_iter().collect();
        self.touch_seq = self
            .patterns
            .values()
            .map(|r| r.last_touched)
            .max()
            .unwrap_or(0);
    }

    fn evict_if_over_cap(&mut self) {
        while self.patterns.len() > self.max_patterns {
            let Some(victim) = self
                .patterns
                .iter()
                .min_by_key(|(_, r)| r.last_touched)
                .map(|(k, _)| *k)
            else {
                break;
            };
            debug!(pattern = %victim, "evicting least-recently-touched pattern");
            self.patterns.remove(&victim);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conditions(volatility: f64, volume_ratio: f64, sentiment: f64, hour: u32) -> MarketConditions {
        MarketConditions {
            volatility,
            volume_ratio,
            sentiment,
            regime: Regime::Bull,
            hour,
            price_trend: 0.0,
        }
    }

    #[test]
    fn identical_conditions_share_a_key() {
        let a = PatternKey::from_conditions(&conditions(0.45, 1.2, 0.6, 10));
        let b = PatternKey::from_conditions(&conditions(0.45, 1.2, 0.6, 10));
        assert_eq!(a, b);
    }

    #[test]
    fn any_bucket_change_changes_the_key() {
        let base = PatternKey::from_conditions(&conditions(0.45, 1.2, 0.6, 10));
        assert_ne!(
            base,
            PatternKey::from_conditions(&conditions(0.55, 1.2, 0.6, 10))
        );
        assert_ne!(
            base,
            PatternKey::from_conditions(&conditions(0.45, 1.6, 0.6, 10))
        );
        assert_ne!(
            base,
            PatternKey::from_conditions(&conditions(0.45, 1.2, 0.8, 10))
        );
        assert_ne!(
            base,
            PatternKey::from_conditions(&conditions(0.45, 1.2, 0.6, 14))
        );
    }

    #[test]
    fn volume_ratio_is_capped_before_bucketing() {
        let capped = PatternKey::from_conditions(&conditions(0.5, 3.0, 0.5, 8));
        let excessive = PatternKey::from_conditions(&conditions(0.5, 9.9, 0.5, 8));
        assert_eq!(capped, excessive);
        assert_eq!(capped.volume_bucket, 30);
    }

    #[test]
    fn outcomes_with_equal_keys_accumulate_into_one_record() {
        let mut memory = RegimePatternMemory::new(100);
        let c = conditions(0.4, 1.1, 0.6, 12);
        memory.record(&c, "momentum", 25.0, true, 70.0);
        memory.record(&c, "momentum", -10.0, false, 60.0);

        assert_eq!(memory.len(), 1);
        let record = memory.get(&PatternKey::from_conditions(&c)).unwrap();
        assert_eq!(record.occurrences, 2);
        assert_eq!(record.successes, 1);
        assert!((record.total_profit - 15.0).abs() < 1e-9);
        assert!((record.avg_confidence - 65.0).abs() < 1e-9);
    }

    #[test]
    fn recommendations_filter_and_rank() {
        let mut memory = RegimePatternMemory::new(100);
        let c = conditions(0.4, 1.1, 0.6, 12);
        // "steady": 3 trades, 30 profit each
        for _ in 0..3 {
            memory.record(&c, "steady_grid", 30.0, true, 70.0);
        }
        // "better": 4 trades, 50 profit each
        for _ in 0..4 {
            memory.record(&c, "better_momentum", 50.0, true, 75.0);
        }
        // "thin": only 2 trades, filtered out
        for _ in 0..2 {
            memory.record(&c, "thin_scalping", 100.0, true, 80.0);
        }

        let recs = memory.recommend(&c, 3);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].strategy, "better_momentum");
        assert!((recs[0].expected_profit - 50.0).abs() < 1e-9);
        assert!((recs[0].confidence_adjustment - 20.0).abs() < 1e-9);
        assert_eq!(recs[1].strategy, "steady_grid");
    }

    #[test]
    fn lru_eviction_caps_pattern_count() {
        let mut memory = RegimePatternMemory::new(3);
        for hour in [0u32, 4, 8, 12] {
            let c = conditions(0.4, 1.1, 0.6, hour);
            memory.record(&c, "momentum", 10.0, true, 60.0);
        }
        assert_eq!(memory.len(), 3);
        // The first-touched pattern (hour quadrant 0) was evicted
        let evicted = PatternKey::from_conditions(&conditions(0.4, 1.1, 0.6, 0));
        assert!(memory.get(&evicted).is_none());
    }
}
