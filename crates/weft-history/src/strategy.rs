//! One interface over both history stores.
//!
//! ## Learning: Trait Objects for Strategy Selection
//!
//! The strategy is picked at runtime from configuration, so the editor
//! holds a `Box<dyn HistoryStrategy<D>>`. For that to work the trait must
//! be object-safe: no generic methods, no `Self` in return position.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::clone::deep_clone;
use crate::diff::{Diff, Diffable};
use crate::hybrid::HybridHistory;
use crate::snapshot::SnapshotHistory;
use crate::{HistoryError, HistoryResult};

/// Which history store to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// A full document copy per edit
    #[default]
    Snapshot,
    /// Periodic snapshots plus per-edit diffs
    Hybrid,
}

impl Strategy {
    /// Returns the configuration name of this strategy.
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Snapshot => "snapshot",
            Strategy::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Strategy {
    type Err = HistoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "snapshot" | "full" => Ok(Strategy::Snapshot),
            "hybrid" | "diff" => Ok(Strategy::Hybrid),
            other => Err(HistoryError::InvalidConfig(format!(
                "unknown history strategy: {other}"
            ))),
        }
    }
}

/// Counters describing a history store, for status bars and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistoryStats {
    /// Which store produced these numbers
    pub strategy: Strategy,
    /// Recorded edits that can be undone
    ///
    /// A hybrid store may need extra `undo` calls to cross snapshot
    /// boundaries; those return an unchanged document and are not counted.
    pub undo_depth: usize,
    /// Recorded edits that can be redone
    pub redo_depth: usize,
    /// Full document copies held (including the present)
    pub snapshot_count: usize,
    /// Diff records held
    pub total_diffs: usize,
}

/// A history store an editing session can record into and rewind.
///
/// `record` receives both the new document and the diff that produced it;
/// each store keeps whichever it needs.
pub trait HistoryStrategy<D: Diffable>: fmt::Debug {
    /// Records one mutation that turned the present into `document`.
    ///
    /// Clears any redo branch. On error nothing is recorded.
    fn record(&mut self, document: &D, diff: Diff<D>) -> HistoryResult<()>;

    /// Steps back from `current`. `None` if there is nothing to undo.
    fn undo(&mut self, current: &D) -> Option<D>;

    /// Steps forward from `current`. `None` if there is nothing to redo.
    fn redo(&mut self, current: &D) -> Option<D>;

    /// Returns true if there is anything to undo.
    fn can_undo(&self) -> bool;

    /// Returns true if there is anything to redo.
    fn can_redo(&self) -> bool;

    /// Forgets all history; `document` becomes the only state.
    fn reset(&mut self, document: &D) -> HistoryResult<()>;

    /// Moves the cursor onto an equivalent canonical position, if the
    /// store has more than one position for the same document.
    fn settle(&mut self) {}

    /// Returns counters describing the store.
    fn stats(&self) -> HistoryStats;

    /// Returns which store this is.
    fn strategy(&self) -> Strategy;
}

impl<D: Diffable> HistoryStrategy<D> for SnapshotHistory<D> {
    fn record(&mut self, document: &D, _diff: Diff<D>) -> HistoryResult<()> {
        self.commit(document)?;
        Ok(())
    }

    fn undo(&mut self, _current: &D) -> Option<D> {
        SnapshotHistory::undo(self).cloned()
    }

    fn redo(&mut self, _current: &D) -> Option<D> {
        SnapshotHistory::redo(self).cloned()
    }

    fn can_undo(&self) -> bool {
        SnapshotHistory::can_undo(self)
    }

    fn can_redo(&self) -> bool {
        SnapshotHistory::can_redo(self)
    }

    fn reset(&mut self, document: &D) -> HistoryResult<()> {
        self.clear(deep_clone(document)?);
        Ok(())
    }

    fn stats(&self) -> HistoryStats {
        HistoryStats {
            strategy: Strategy::Snapshot,
            undo_depth: self.past_len(),
            redo_depth: self.future_len(),
            snapshot_count: self.past_len() + self.future_len() + 1,
            total_diffs: 0,
        }
    }

    fn strategy(&self) -> Strategy {
        Strategy::Snapshot
    }
}

impl<D: Diffable> HistoryStrategy<D> for HybridHistory<D> {
    fn record(&mut self, _document: &D, diff: Diff<D>) -> HistoryResult<()> {
        self.push(diff)?;
        Ok(())
    }

    fn undo(&mut self, current: &D) -> Option<D> {
        HybridHistory::undo(self, current)
    }

    fn redo(&mut self, current: &D) -> Option<D> {
        HybridHistory::redo(self, current)
    }

    fn can_undo(&self) -> bool {
        HybridHistory::can_undo(self)
    }

    fn can_redo(&self) -> bool {
        HybridHistory::can_redo(self)
    }

    fn reset(&mut self, document: &D) -> HistoryResult<()> {
        self.clear(deep_clone(document)?);
        Ok(())
    }

    fn settle(&mut self) {
        HybridHistory::settle(self);
    }

    fn stats(&self) -> HistoryStats {
        HistoryStats {
            strategy: Strategy::Hybrid,
            undo_depth: self.undo_depth(),
            redo_depth: self.redo_depth(),
            snapshot_count: self.snapshot_count(),
            total_diffs: self.total_diffs(),
        }
    }

    fn strategy(&self) -> Strategy {
        Strategy::Hybrid
    }
}

/// History configuration.
///
/// `#[serde(default)]` lets a config file name only the fields it cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Which store to use
    pub strategy: Strategy,

    /// Undo depth of the snapshot store
    pub max_history: usize,

    /// Snapshot count of the hybrid store
    pub max_snapshots: usize,

    /// Diff log length that triggers a fold in the hybrid store
    pub max_diffs_per_snapshot: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Snapshot,
            max_history: 50,
            max_snapshots: 10,
            max_diffs_per_snapshot: 20,
        }
    }
}

impl HistoryConfig {
    /// Checks that every bound is usable.
    pub fn validate(&self) -> HistoryResult<()> {
        let bounds = [
            ("max_history", self.max_history),
            ("max_snapshots", self.max_snapshots),
            ("max_diffs_per_snapshot", self.max_diffs_per_snapshot),
        ];
        for (name, value) in bounds {
            if value == 0 {
                return Err(HistoryError::InvalidConfig(format!(
                    "{name} must be at least 1"
                )));
            }
        }
        Ok(())
    }

    /// Builds the configured store with `initial` as its present.
    pub fn build<D>(&self, initial: &D) -> HistoryResult<Box<dyn HistoryStrategy<D>>>
    where
        D: Diffable + 'static,
    {
        self.validate()?;
        let initial = deep_clone(initial)?;

        tracing::debug!(strategy = %self.strategy, "building history store");
        Ok(match self.strategy {
            Strategy::Snapshot => Box::new(SnapshotHistory::new(initial, self.max_history)),
            Strategy::Hybrid => Box::new(HybridHistory::new(
                initial,
                self.max_snapshots,
                self.max_diffs_per_snapshot,
            )),
        })
    }
}
