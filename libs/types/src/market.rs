//! Per-symbol market view consumed by the confidence engine.
//!
//! A `MarketSnapshot` is assembled wholesale by external data collectors and
//! replaced each analysis cycle; the engine never mutates one in place.
//! Optional sub-fields resolve to neutral defaults through the accessor
//! methods rather than erroring.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::{require_finite, ValidationError};

/// Coarse market-state label attached to every snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    Bull,
    Bear,
    Sideways,
    Volatile,
}

impl Regime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::Bull => "bull",
            Regime::Bear => "bear",
            Regime::Sideways => "sideways",
            Regime::Volatile => "volatile",
        }
    }
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which numeric convention the sentiment source uses.
///
/// The engine-internal convention is [0,1] with 0.5 neutral; signed sources
/// ([-1,1]) are remapped by [`MarketSnapshot::sentiment_unit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentScale {
    /// Scores in [0,1], 0.5 neutral.
    #[default]
    Unit,
    /// Scores in [-1,1], 0.0 neutral.
    Signed,
}

/// Option Greeks attached to a snapshot when an options feed is available.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptionGreeks {
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub implied_volatility: f64,
}

impl Default for OptionGreeks {
    fn default() -> Self {
        // Neutral values used whenever the options feed is absent
        Self {
            delta: 0.5,
            gamma: 0.1,
            theta: -0.1,
            implied_volatility: 0.3,
        }
    }
}

/// Immutable per-symbol market view for one analysis cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    /// Current price, must be finite and positive.
    pub price: f64,
    /// Ordered price history, oldest to newest. May be empty.
    #[serde(default)]
    pub price_history: Vec<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
    /// Current volume over rolling average volume.
    #[serde(default)]
    pub volume_ratio: Option<f64>,
    #[serde(default)]
    pub volatility: Option<f64>,
    #[serde(default)]
    pub sentiment_score: Option<f64>,
    #[serde(default)]
    pub sentiment_strength: Option<f64>,
    #[serde(default)]
    pub sentiment_scale: SentimentScale,
    pub regime: Regime,
    #[serde(default)]
    pub greeks: Option<OptionGreeks>,
}

impl MarketSnapshot {
    /// Minimal snapshot with every optional field absent.
    pub fn new(symbol: impl Into<String>, price: f64, regime: Regime) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            price_history: Vec::new(),
            volume: None,
            volume_ratio: None,
            volatility: None,
            sentiment_score: None,
            sentiment_strength: None,
            sentiment_scale: SentimentScale::Unit,
            regime,
            greeks: None,
        }
    }

    pub fn volatility_or_default(&self) -> f64 {
        self.volatility.unwrap_or(0.5)
    }

    pub fn volume_ratio_or_default(&self) -> f64 {
        self.volume_ratio.unwrap_or(1.0)
    }

    /// Sentiment mapped into the engine-internal [0,1] convention.
    pub fn sentiment_unit(&self) -> f64 {
        let raw = self.sentiment_score.unwrap_or(match self.sentiment_scale {
            SentimentScale::Unit => 0.5,
            SentimentScale::Signed => 0.0,
        });
        match self.sentiment_scale {
            SentimentScale::Unit => raw,
            SentimentScale::Signed => (raw + 1.0) / 2.0,
        }
    }

    pub fn sentiment_strength_or_default(&self) -> f64 {
        self.sentiment_strength.unwrap_or(0.5)
    }

    pub fn greeks_or_default(&self) -> OptionGreeks {
        self.greeks.unwrap_or_default()
    }

    /// Boundary validation: rejects non-finite or non-positive prices before
    /// anything reaches scoring arithmetic.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_finite("price", self.price)?;
        if self.price <= 0.0 {
            return Err(ValidationError::NonPositivePrice {
                field: "price",
                price: self.price,
            });
        }
        for &p in &self.price_history {
            require_finite("price_history", p)?;
        }
        for (field, value) in [
            ("volume", self.volume),
            ("volume_ratio", self.volume_ratio),
            ("volatility", self.volatility),
            ("sentiment_score", self.sentiment_score),
            ("sentiment_strength", self.sentiment_strength),
        ] {
            if let Some(v) = value {
                require_finite(field, v)?;
            }
        }
        Ok(())
    }
}

/// Subset of market state persisted with each trade outcome.
///
/// This is what pattern keys and value-table state keys are re-derived from,
/// so it must carry every discretized dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketConditions {
    pub volatility: f64,
    pub volume_ratio: f64,
    /// Sentiment in the engine-internal [0,1] convention.
    pub sentiment: f64,
    pub regime: Regime,
    /// Hour of day at decision time, 0-23.
    pub hour: u32,
    /// Normalized price trend in [-1,1].
    pub price_trend: f64,
}

impl MarketConditions {
    /// Capture conditions from a snapshot at decision time.
    pub fn from_snapshot(snapshot: &MarketSnapshot, when: DateTime<Utc>, price_trend: f64) -> Self {
        Self {
            volatility: snapshot.volatility_or_default(),
            volume_ratio: snapshot.volume_ratio_or_default(),
            sentiment: snapshot.sentiment_unit(),
            regime: snapshot.regime,
            hour: when.hour(),
            price_trend,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_finite("volatility", self.volatility)?;
        require_finite("volume_ratio", self.volume_ratio)?;
        require_finite("sentiment", self.sentiment)?;
        require_finite("price_trend", self.price_trend)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_missing_fields() {
        let snap = MarketSnapshot::new("BTCUSDT", 50_000.0, Regime::Sideways);
        assert_eq!(snap.volatility_or_default(), 0.5);
        assert_eq!(snap.volume_ratio_or_default(), 1.0);
        assert_eq!(snap.sentiment_unit(), 0.5);
        assert_eq!(snap.greeks_or_default().delta, 0.5);
    }

    #[test]
    fn signed_sentiment_maps_to_unit_convention() {
        let mut snap = MarketSnapshot::new("ETHUSDT", 3_000.0, Regime::Bull);
        snap.sentiment_scale = SentimentScale::Signed;
        snap.sentiment_score = Some(0.0);
        assert_eq!(snap.sentiment_unit(), 0.5);
        snap.sentiment_score = Some(1.0);
        assert_eq!(snap.sentiment_unit(), 1.0);
        snap.sentiment_score = Some(-1.0);
        assert_eq!(snap.sentiment_unit(), 0.0);
    }

    #[test]
    fn validate_rejects_nan_price() {
        let snap = MarketSnapshot::new("BTCUSDT", f64::NAN, Regime::Bull);
        assert!(matches!(
            snap.validate(),
            Err(ValidationError::NonFinite { field: "price", .. })
        ));
    }

    #[test]
    fn regime_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Regime::Bull).unwrap(), "\"bull\"");
        assert_eq!(
            serde_json::from_str::<Regime>("\"volatile\"").unwrap(),
            Regime::Volatile
        );
    }
}
