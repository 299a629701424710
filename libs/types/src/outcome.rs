//! Closed-trade outcomes reported back by the execution layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{require_finite, MarketConditions, ValidationError};

/// Immutable record of a completed trade, consumed exactly once by the
/// engine's outcome-recording entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub trade_id: String,
    pub strategy: String,
    pub symbol: String,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    /// Realized profit or loss in quote currency.
    pub profit_loss: f64,
    /// Confidence the engine reported at decision time, [0,100].
    pub confidence: f64,
    /// Market conditions captured at decision time.
    pub conditions: MarketConditions,
    pub success: bool,
}

impl TradeOutcome {
    /// Holding time in minutes.
    pub fn holding_minutes(&self) -> f64 {
        (self.exit_time - self.entry_time).num_seconds() as f64 / 60.0
    }

    /// Holding time in hours, used by the reward time penalty.
    pub fn holding_hours(&self) -> f64 {
        self.holding_minutes() / 60.0
    }

    /// Boundary validation before the outcome enters the learning loop.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.strategy.trim().is_empty() {
            return Err(ValidationError::EmptyStrategyName);
        }
        require_finite("quantity", self.quantity)?;
        if self.quantity <= 0.0 {
            return Err(ValidationError::NonPositiveQuantity {
                quantity: self.quantity,
            });
        }
        for (field, price) in [
            ("entry_price", self.entry_price),
            ("exit_price", self.exit_price),
        ] {
            require_finite(field, price)?;
            if price <= 0.0 {
                return Err(ValidationError::NonPositivePrice { field, price });
            }
        }
        require_finite("profit_loss", self.profit_loss)?;
        require_finite("confidence", self.confidence)?;
        if !(0.0..=100.0).contains(&self.confidence) {
            return Err(ValidationError::ConfidenceOutOfRange {
                confidence: self.confidence,
            });
        }
        if self.exit_time < self.entry_time {
            return Err(ValidationError::ExitBeforeEntry {
                entry: self.entry_time.to_rfc3339(),
                exit: self.exit_time.to_rfc3339(),
            });
        }
        self.conditions.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Regime;
    use chrono::TimeZone;

    fn outcome() -> TradeOutcome {
        let entry = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        TradeOutcome {
            trade_id: "t-1".into(),
            strategy: "momentum_btc".into(),
            symbol: "BTCUSDT".into(),
            entry_time: entry,
            exit_time: entry + chrono::Duration::minutes(90),
            entry_price: 50_000.0,
            exit_price: 50_500.0,
            quantity: 0.1,
            profit_loss: 50.0,
            confidence: 72.0,
            conditions: MarketConditions {
                volatility: 0.4,
                volume_ratio: 1.2,
                sentiment: 0.6,
                regime: Regime::Bull,
                hour: 10,
                price_trend: 0.3,
            },
            success: true,
        }
    }

    #[test]
    fn valid_outcome_passes() {
        assert!(outcome().validate().is_ok());
        assert_eq!(outcome().holding_minutes(), 90.0);
    }

    #[test]
    fn rejects_negative_quantity() {
        let mut o = outcome();
        o.quantity = -1.0;
        assert!(matches!(
            o.validate(),
            Err(ValidationError::NonPositiveQuantity { .. })
        ));
    }

    #[test]
    fn rejects_nan_confidence() {
        let mut o = outcome();
        o.confidence = f64::NAN;
        assert!(matches!(
            o.validate(),
            Err(ValidationError::NonFinite { .. })
        ));
    }

    #[test]
    fn rejects_exit_before_entry() {
        let mut o = outcome();
        o.exit_time = o.entry_time - chrono::Duration::minutes(5);
        assert!(matches!(
            o.validate(),
            Err(ValidationError::ExitBeforeEntry { .. })
        ));
    }
}
