//! Rule-based base confidence score.
//!
//! The breakpoints here are the scoring contract: downstream calibration is
//! measured against these exact thresholds, so changing any of them changes
//! the meaning of every stored calibration bucket.

use crate::features::FeatureSet;

/// Neutral starting score.
const NEUTRAL: f64 = 50.0;

/// Weight of the historical-performance term.
const HISTORICAL_WEIGHT: f64 = 0.4;

/// Trades needed before the historical win rate is fully trusted.
const FULL_TRUST_TRADES: f64 = 20.0;

/// Deterministic weighted combination of features into a [0,100] score.
///
/// Term order: historical performance, risk/reward tiers, market conditions
/// (volatility band, volume ratio), sentiment impact, directional Greeks.
pub fn base_confidence(features: &FeatureSet) -> f64 {
    let mut confidence = NEUTRAL;

    // Historical performance, discounted by sample size: full trust only
    // after 20 recorded trades.
    let sample_confidence = (features.total_trades / FULL_TRUST_TRADES).min(1.0);
    let historical_score = features.historical_win_rate * 100.0 * sample_confidence;
    confidence += (historical_score - NEUTRAL) * HISTORICAL_WEIGHT;

    // Risk/reward tiers
    let rr = features.risk_reward_ratio;
    if rr >= 2.0 {
        confidence += 15.0;
    } else if rr >= 1.5 {
        confidence += 10.0;
    } else if rr >= 1.0 {
        confidence += 5.0;
    } else {
        confidence -= 10.0;
    }

    // Moderate volatility is tradeable, extreme volatility is not
    if (0.3..=0.7).contains(&features.volatility) {
        confidence += 10.0;
    } else if features.volatility > 0.8 {
        confidence -= 5.0;
    }

    // Volume confirmation
    if features.volume_ratio > 1.5 {
        confidence += 10.0;
    } else if features.volume_ratio < 0.8 {
        confidence -= 5.0;
    }

    // Sentiment, scaled by how strongly it is held
    confidence += (features.sentiment_score - 0.5) * features.sentiment_strength * 20.0;

    // Strong directional exposure
    if features.delta.abs() > 0.7 {
        confidence += 5.0;
    }

    confidence.clamp(0.0, 100.0)
}
