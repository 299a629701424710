//! The engine's owned learning state and its persistence boundary.
//!
//! All mutable learning structures live in one `LearningState` so a single
//! lock serializes every write path. Persistence goes through an explicit
//! versioned snapshot with every field of the data model listed, so
//! round-trip tests can assert lossless reloads.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use types::TradeOutcome;

use crate::calibration::CalibrationTracker;
use crate::config::LearningConfig;
use crate::patterns::{PatternKey, PatternRecord, RegimePatternMemory};
use crate::performance::StrategyPerformance;
use crate::value_table::{ValueSnapshotEntry, ValueTable};

/// Current snapshot schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Persistence failures. Recoverable: the engine logs and keeps its
/// in-memory state; a failed load starts from empty defaults.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("state io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("state serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unsupported snapshot schema version {found}, expected {expected}")]
    UnsupportedSchema { found: u32, expected: u32 },
}

/// All mutable learning structures, owned together.
#[derive(Debug)]
pub struct LearningState {
    pub strategies: HashMap<String, StrategyPerformance>,
    pub calibration: CalibrationTracker,
    pub patterns: RegimePatternMemory,
    pub values: ValueTable,
    /// Bounded history of consumed outcomes, most recent last.
    pub outcomes: VecDeque<TradeOutcome>,
    /// Recorded final confidences, most recent last; gates the predictor
    /// blend and feeds distribution stats.
    pub confidence_history: VecDeque<f64>,
}

impl LearningState {
    pub fn new(config: &LearningConfig) -> Self {
        Self {
            strategies: HashMap::new(),
            calibration: CalibrationTracker::new(),
            patterns: RegimePatternMemory::new(config.max_patterns),
            values: ValueTable::new(config.learning_rate, config.discount, config.max_value_entries),
            outcomes: VecDeque::new(),
            confidence_history: VecDeque::new(),
        }
    }

    /// Full, deterministic snapshot of every learning structure.
    pub fn snapshot(&self) -> LearningStateSnapshot {
        let mut strategies: Vec<(String, StrategyPerformance)> = self
            .strategies
            .iter()
            .map(|(name, perf)| (name.clone(), perf.clone()))
            .collect();
        strategies.sort_by(|a, b| a.0.cmp(&b.0));

        let mut patterns: Vec<(PatternKey, PatternRecord)> = self
            .patterns
            .entries()
            .map(|(k, r)| (*k, r.clone()))
            .collect();
        patterns.sort_by_key(|(_, r)| r.last_touched);

        LearningStateSnapshot {
            schema_version: SCHEMA_VERSION,
            saved_at: Utc::now(),
            strategies,
            calibration: self.calibration.clone(),
            patterns,
            values: self.values.entries(),
            outcomes: self.outcomes.iter().cloned().collect(),
            confidence_history: self.confidence_history.iter().copied().collect(),
        }
    }

    /// Rebuild state from a snapshot, enforcing the schema version.
    pub fn from_snapshot(
        snapshot: LearningStateSnapshot,
        config: &LearningConfig,
    ) -> Result<Self, PersistenceError> {
        if snapshot.schema_version != SCHEMA_VERSION {
            return Err(PersistenceError::UnsupportedSchema {
                found: snapshot.schema_version,
                expected: SCHEMA_VERSION,
            });
        }

        let mut state = Self::new(config);
        state.strategies = snapshot.strategies.into_iter().collect();
        state.calibration = snapshot.calibration;
        state.patterns.restore(snapshot.patterns);
        state.values.restore(snapshot.values);
        state.outcomes = snapshot.outcomes.into();
        state.confidence_history = snapshot.confidence_history.into();
        Ok(state)
    }

    /// Drop every learned structure. Use with caution.
    pub fn reset(&mut self) {
        self.strategies.clear();
        self.calibration.clear();
        self.patterns.clear();
        self.values.clear();
        self.outcomes.clear();
        self.confidence_history.clear();
    }
}

/// Versioned, round-trippable serialization of the learning state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningStateSnapshot {
    pub schema_version: u32,
    pub saved_at: DateTime<Utc>,
    pub strategies: Vec<(String, StrategyPerformance)>,
    pub calibration: CalibrationTracker,
    pub patterns: Vec<(PatternKey, PatternRecord)>,
    pub values: Vec<ValueSnapshotEntry>,
    pub outcomes: Vec<TradeOutcome>,
    pub confidence_history: Vec<f64>,
}

/// Externally-owned storage for learning-state snapshots. The engine is
/// agnostic to the backing format; it only needs load-at-startup and
/// save-after-update.
pub trait StateStore: Send + Sync {
    /// `Ok(None)` when no prior state exists (first run).
    fn load(&self) -> Result<Option<LearningStateSnapshot>, PersistenceError>;
    fn save(&self, snapshot: &LearningStateSnapshot) -> Result<(), PersistenceError>;
}

/// JSON-file store, the default deployment shape.
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<Option<LearningStateSnapshot>, PersistenceError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no prior learning state, starting fresh");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let snapshot: LearningStateSnapshot = serde_json::from_str(&contents)?;
        info!(
            path = %self.path.display(),
            strategies = snapshot.strategies.len(),
            patterns = snapshot.patterns.len(),
            values = snapshot.values.len(),
            "loaded learning state"
        );
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &LearningStateSnapshot) -> Result<(), PersistenceError> {
        let json = serde_json::to_string(snapshot)?;
        // Write-then-rename so a failed save never truncates good state
        let tmp = self.path.with_extension("tmp");
        if let Err(e) = std::fs::write(&tmp, &json) {
            warn!(path = %tmp.display(), error = %e, "state snapshot write failed");
            return Err(e.into());
        }
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
