//! # Argos Confidence - Scoring & Adaptive Feedback Engine
//!
//! ## Purpose
//!
//! Converts heterogeneous market and strategy signals into a bounded [0,100]
//! confidence score, keeps that score calibrated against realized success
//! rates, and biases future strategy selection through a regime pattern
//! memory and a tabular value function updated after every closed trade.
//!
//! ## Integration Points
//!
//! - **Input Sources**: `MarketSnapshot` from market-data collectors,
//!   `StrategyCandidate` from strategy generators, `TradeOutcome` from the
//!   execution layer
//! - **Output Destinations**: decision generators consume the confidence
//!   score and the pattern/value recommendations
//! - **State Dependencies**: a single owned [`state::LearningState`] behind a
//!   write-serialized lock; externally-owned load/save via [`state::StateStore`]
//! - **Configuration**: [`config::EngineConfig`] with JSON file loading and
//!   environment overrides
//! - **Error Handling**: soft gaps degrade to documented defaults; only
//!   structurally invalid input is rejected, at the boundary
//!
//! ## Architecture Role
//!
//! ```text
//! snapshot + strategy → [FeatureSet] → [base score] → [learning adjustment]
//!          ↓                 ↓              ↓                 ↓
//! price history slope   rule weights   optional ML blend  calibration nudge
//! regime / sentiment    rr breakpoints hour + regime      pattern memory
//! option greeks         sample trust   stop-size penalty  value table (TD)
//!          ↑______________________ trade outcomes ________________↓
//! ```

pub mod calibration;
pub mod config;
pub mod engine;
pub mod features;
pub mod patterns;
pub mod performance;
pub mod predictor;
pub mod scoring;
pub mod state;
pub mod value_table;

pub use calibration::CalibrationTracker;
pub use config::EngineConfig;
pub use engine::{ConfidenceEngine, Recommendation, RecommendationSource};
pub use features::{FeatureExtractor, FeatureSet};
pub use patterns::{PatternKey, RegimePatternMemory};
pub use performance::StrategyPerformance;
pub use predictor::ConfidencePredictor;
pub use state::{FileStateStore, LearningState, LearningStateSnapshot, PersistenceError, StateStore};
pub use value_table::{ActionKey, StateKey, StrategyClass, ValueTable};
