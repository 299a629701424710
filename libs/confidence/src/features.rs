//! Feature extraction: strategy + snapshot + history into a flat named
//! feature set.
//!
//! Extraction is a pure function of its inputs; missing snapshot sub-fields
//! never error, they resolve to the documented neutral defaults.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use types::{MarketSnapshot, Regime, StrategyCandidate};

use crate::performance::StrategyPerformance;

/// Fixed substring vocabulary for strategy-type encoding. First match wins;
/// names outside the vocabulary encode as 0.5.
pub const STRATEGY_ENCODING: &[(&str, f64)] = &[
    ("momentum", 0.1),
    ("mean_reversion", 0.2),
    ("breakout", 0.3),
    ("scalping", 0.4),
    ("swing", 0.5),
    ("arbitrage", 0.6),
    ("grid", 0.7),
    ("dca", 0.8),
    ("webhook_signal", 0.9),
];

/// Minimum history length before a price trend is computed.
const TREND_MIN_POINTS: usize = 10;

/// Historical trade count cap used for normalization.
const TRADES_CAP: f64 = 100.0;

/// Flat, ordered, named feature set produced for every scoring call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub strategy_type: f64,
    pub risk_reward_ratio: f64,
    pub expected_duration: f64,
    pub price_trend: f64,
    pub volatility: f64,
    pub volume_ratio: f64,
    pub sentiment_score: f64,
    pub sentiment_strength: f64,
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub implied_volatility: f64,
    pub historical_win_rate: f64,
    pub avg_profit: f64,
    pub sharpe_ratio: f64,
    /// Capped at 100 for normalization.
    pub total_trades: f64,
    /// Hour of day / 24.
    pub hour_of_day: f64,
    /// Weekday / 6, Monday = 0.
    pub day_of_week: f64,
    pub regime_bull: f64,
    pub regime_bear: f64,
    pub regime_volatile: f64,
}

impl FeatureSet {
    /// Fixed-order vector form, the input shape for injected predictors.
    pub fn as_vector(&self) -> [f64; 21] {
        [
            self.strategy_type,
            self.risk_reward_ratio,
            self.expected_duration,
            self.price_trend,
            self.volatility,
            self.volume_ratio,
            self.sentiment_score,
            self.sentiment_strength,
            self.delta,
            self.gamma,
            self.theta,
            self.implied_volatility,
            self.historical_win_rate,
            self.avg_profit,
            self.sharpe_ratio,
            self.total_trades,
            self.hour_of_day,
            self.day_of_week,
            self.regime_bull,
            self.regime_bear,
            self.regime_volatile,
        ]
    }
}

/// Turns a strategy description, market snapshot, and historical strategy
/// performance into a [`FeatureSet`].
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn extract(
        strategy: &StrategyCandidate,
        snapshot: &MarketSnapshot,
        performance: Option<&StrategyPerformance>,
        when: DateTime<Utc>,
    ) -> FeatureSet {
        let greeks = snapshot.greeks_or_default();

        let (win_rate, avg_profit, sharpe, trades) = match performance {
            Some(perf) => (
                perf.win_rate,
                perf.avg_profit,
                perf.sharpe_ratio,
                (perf.total_trades as f64).min(TRADES_CAP),
            ),
            // Neutral priors for strategies with no recorded history
            None => (0.5, 0.0, 0.0, 0.0),
        };

        FeatureSet {
            strategy_type: encode_strategy_type(&strategy.name),
            risk_reward_ratio: strategy.risk_reward_or_default(),
            expected_duration: strategy.expected_duration_or_default(),
            price_trend: price_trend(&snapshot.price_history),
            volatility: snapshot.volatility_or_default(),
            volume_ratio: snapshot.volume_ratio_or_default(),
            sentiment_score: snapshot.sentiment_unit(),
            sentiment_strength: snapshot.sentiment_strength_or_default(),
            delta: greeks.delta,
            gamma: greeks.gamma,
            theta: greeks.theta,
            implied_volatility: greeks.implied_volatility,
            historical_win_rate: win_rate,
            avg_profit,
            sharpe_ratio: sharpe,
            total_trades: trades,
            hour_of_day: when.hour() as f64 / 24.0,
            day_of_week: when.weekday().num_days_from_monday() as f64 / 6.0,
            regime_bull: flag(snapshot.regime == Regime::Bull),
            regime_bear: flag(snapshot.regime == Regime::Bear),
            regime_volatile: flag(snapshot.regime == Regime::Volatile),
        }
    }
}

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Scalar encoding of the strategy type via substring match.
pub fn encode_strategy_type(name: &str) -> f64 {
    let lowered = name.to_lowercase();
    for (key, value) in STRATEGY_ENCODING {
        if lowered.contains(key) {
            return *value;
        }
    }
    0.5
}

/// Least-squares slope of the recent price history, normalized by
/// (price range / window length) and clipped to [-1,1].
///
/// Returns 0.0 with fewer than 10 points or a flat range.
pub fn price_trend(history: &[f64]) -> f64 {
    let n = history.len();
    if n < TREND_MIN_POINTS {
        return 0.0;
    }

    let nf = n as f64;
    let x_mean = (nf - 1.0) / 2.0;
    let y_mean = history.iter().sum::<f64>() / nf;

    let mut covariance = 0.0;
    let mut variance = 0.0;
    for (i, &y) in history.iter().enumerate() {
        let dx = i as f64 - x_mean;
        covariance += dx * (y - y_mean);
        variance += dx * dx;
    }
    if variance == 0.0 {
        return 0.0;
    }
    let slope = covariance / variance;

    let max = history.iter().cloned().fold(f64::MIN, f64::max);
    let min = history.iter().cloned().fold(f64::MAX, f64::min);
    let range = max - min;
    if range <= 0.0 {
        return 0.0;
    }

    (slope / (range / nf)).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use types::TradeAction;

    fn at(hour: u32) -> DateTime<Utc> {
        // 2025-03-03 is a Monday
        Utc.with_ymd_and_hms(2025, 3, 3, hour, 0, 0).unwrap()
    }

    #[test]
    fn strategy_type_substring_matching() {
        assert_eq!(encode_strategy_type("momentum_btc"), 0.1);
        assert_eq!(encode_strategy_type("BTC_Mean_Reversion"), 0.2);
        assert_eq!(encode_strategy_type("webhook_signal"), 0.9);
        assert_eq!(encode_strategy_type("something_else"), 0.5);
    }

    #[test]
    fn short_history_yields_zero_trend() {
        assert_eq!(price_trend(&[1.0; 9]), 0.0);
        assert_eq!(price_trend(&[]), 0.0);
    }

    #[test]
    fn rising_history_yields_positive_clipped_trend() {
        let history: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let trend = price_trend(&history);
        assert!(trend > 0.0);
        assert!(trend <= 1.0);
    }

    #[test]
    fn falling_history_yields_negative_trend() {
        let history: Vec<f64> = (0..20).map(|i| 100.0 - i as f64 * 0.5).collect();
        assert!(price_trend(&history) < 0.0);
    }

    #[test]
    fn flat_history_yields_zero_trend() {
        assert_eq!(price_trend(&[42.0; 15]), 0.0);
    }

    #[test]
    fn defaults_for_unseen_strategy() {
        let strategy = StrategyCandidate::new("momentum_btc", TradeAction::Buy);
        let snapshot = MarketSnapshot::new("BTCUSDT", 50_000.0, Regime::Bull);
        let features = FeatureExtractor::extract(&strategy, &snapshot, None, at(10));

        assert_eq!(features.historical_win_rate, 0.5);
        assert_eq!(features.total_trades, 0.0);
        assert_eq!(features.volatility, 0.5);
        assert_eq!(features.volume_ratio, 1.0);
        assert_eq!(features.sentiment_score, 0.5);
        assert_eq!(features.delta, 0.5);
        assert_eq!(features.regime_bull, 1.0);
        assert_eq!(features.regime_bear, 0.0);
        assert_eq!(features.hour_of_day, 10.0 / 24.0);
        assert_eq!(features.day_of_week, 0.0);
    }

    #[test]
    fn extraction_is_deterministic() {
        let strategy = StrategyCandidate::new("scalping_eth", TradeAction::Sell);
        let mut snapshot = MarketSnapshot::new("ETHUSDT", 3_000.0, Regime::Volatile);
        snapshot.price_history = (0..30).map(|i| 3_000.0 + (i % 7) as f64).collect();
        snapshot.volatility = Some(0.8);

        let a = FeatureExtractor::extract(&strategy, &snapshot, None, at(14));
        let b = FeatureExtractor::extract(&strategy, &snapshot, None, at(14));
        assert_eq!(a, b);
    }
}
