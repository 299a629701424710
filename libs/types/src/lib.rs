//! # Argos Types - Trading Decision Data Model
//!
//! ## Purpose
//!
//! Shared data model for the Argos confidence engine: per-symbol market
//! snapshots, candidate strategies produced by external strategy generators,
//! and closed-trade outcomes that feed the learning loop. All boundary
//! validation lives here so the engine never scores structurally invalid
//! input and never emits NaN/Inf confidence.
//!
//! ## Integration Points
//!
//! - **Input Sources**: market-data collectors (snapshots), strategy
//!   generators (candidates), execution layer (trade outcomes)
//! - **Output Destinations**: `argos-confidence` scoring and learning state
//! - **Serialization**: serde derives on every type; outcomes and conditions
//!   round-trip through the versioned learning-state snapshot
//!
//! ## Architecture Role
//!
//! ```text
//! Market Feeds → MarketSnapshot ─┐
//! Strategy Gen → StrategyCandidate ├→ ConfidenceEngine → confidence [0,100]
//! Execution   → TradeOutcome ────┘         ↓
//!                               learning state (calibration/patterns/values)
//! ```

pub mod market;
pub mod outcome;
pub mod strategy;

pub use market::{MarketConditions, MarketSnapshot, OptionGreeks, Regime, SentimentScale};
pub use outcome::TradeOutcome;
pub use strategy::{RiskLevel, StrategyCandidate, TradeAction};

use thiserror::Error;

/// Structured validation failures raised at the engine boundary.
///
/// These are the hard errors of the system: anything that would otherwise
/// let NaN/Inf or nonsensical values into scoring arithmetic. Soft gaps
/// (missing optional fields) never produce errors, they resolve to
/// documented defaults instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("field `{field}` is not a finite number: {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("quantity must be positive, got {quantity}")]
    NonPositiveQuantity { quantity: f64 },

    #[error("price must be positive, got {price} for field `{field}`")]
    NonPositivePrice { field: &'static str, price: f64 },

    #[error("confidence must be within [0,100], got {confidence}")]
    ConfidenceOutOfRange { confidence: f64 },

    #[error("risk/reward ratio must be positive, got {ratio}")]
    NonPositiveRiskReward { ratio: f64 },

    #[error("exit time {exit} precedes entry time {entry}")]
    ExitBeforeEntry { entry: String, exit: String },

    #[error("strategy name must not be empty")]
    EmptyStrategyName,
}

/// Require a finite value for `field`, rejecting NaN and infinities.
pub(crate) fn require_finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NonFinite { field, value })
    }
}
