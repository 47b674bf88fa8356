//! Full-snapshot history.
//!
//! Every commit stores a complete copy of the document. Undo and redo just
//! swap copies around, which makes this the simplest correct strategy and
//! the reference the hybrid store is checked against.
//!
//! ## Learning: VecDeque
//!
//! `past` is a `VecDeque` because it is pushed at the back and, once it is
//! over capacity, trimmed at the front. `future` is a `VecDeque` because
//! undo pushes onto its front and redo takes from its front.

use std::collections::VecDeque;
use std::mem;

use crate::clone::{deep_clone, PlainData};
use crate::HistoryResult;

/// Bounded stack of whole-document snapshots.
///
/// ## Invariants
///
/// - `past.len() <= max_history`; the oldest entries are dropped first
/// - `future` is non-empty only right after one or more undos, and any
///   commit empties it
#[derive(Debug, Clone)]
pub struct SnapshotHistory<D> {
    /// States before the present, oldest first
    past: VecDeque<D>,
    /// The state the document is in now
    present: D,
    /// Undone states, nearest first
    future: VecDeque<D>,
    /// Maximum number of past states to keep
    max_history: usize,
}

impl<D: PlainData> SnapshotHistory<D> {
    /// Creates a history whose present is `initial`.
    pub fn new(initial: D, max_history: usize) -> Self {
        Self {
            past: VecDeque::with_capacity(max_history.min(64)),
            present: initial,
            future: VecDeque::new(),
            max_history,
        }
    }

    /// Records `next` as the new present.
    ///
    /// The old present moves onto `past` and the redo stack is cleared.
    /// Returns how many redo states were discarded. If `next` is not plain
    /// data nothing changes.
    pub fn commit(&mut self, next: &D) -> HistoryResult<usize> {
        let next = deep_clone(next)?;

        let previous = mem::replace(&mut self.present, next);
        self.past.push_back(previous);
        self.enforce_capacity();

        let discarded = self.future.len();
        if discarded > 0 {
            tracing::debug!(discarded, "commit truncated redo branch");
        }
        self.future.clear();

        Ok(discarded)
    }

    /// Steps back one state.
    ///
    /// Returns the new present, or `None` if there is nothing to undo.
    pub fn undo(&mut self) -> Option<&D> {
        let previous = self.past.pop_back()?;
        let current = mem::replace(&mut self.present, previous);
        self.future.push_front(current);
        Some(&self.present)
    }

    /// Steps forward one state.
    ///
    /// Returns the new present, or `None` if there is nothing to redo.
    pub fn redo(&mut self) -> Option<&D> {
        let next = self.future.pop_front()?;
        let current = mem::replace(&mut self.present, next);
        self.past.push_back(current);
        self.enforce_capacity();
        Some(&self.present)
    }

    /// Returns true if there are states to undo.
    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    /// Returns true if there are states to redo.
    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Returns the current state.
    pub fn present(&self) -> &D {
        &self.present
    }

    /// Returns the number of undo steps available.
    pub fn past_len(&self) -> usize {
        self.past.len()
    }

    /// Returns the number of redo steps available.
    pub fn future_len(&self) -> usize {
        self.future.len()
    }

    /// Returns the configured capacity.
    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Drops all history and makes `present` the only state.
    pub fn clear(&mut self, present: D) {
        self.past.clear();
        self.future.clear();
        self.present = present;
    }

    fn enforce_capacity(&mut self) {
        while self.past.len() > self.max_history {
            self.past.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Board, Item};

    fn commit_values(history: &mut SnapshotHistory<Board>, values: &[i32]) {
        let mut board = history.present().clone();
        for (id, value) in values.iter().enumerate() {
            board = board.with(Item::new(id as u32, *value));
            history.commit(&board).unwrap();
        }
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let mut history = SnapshotHistory::new(Board::default(), 100);
        commit_values(&mut history, &[1, 2, 3]);
        let latest = history.present().clone();

        for _ in 0..3 {
            assert!(history.undo().is_some());
        }
        assert!(history.present().items.is_empty());
        assert!(history.undo().is_none());

        for _ in 0..3 {
            assert!(history.redo().is_some());
        }
        assert_eq!(history.present(), &latest);
        assert!(history.redo().is_none());
    }

    #[test]
    fn test_commit_clears_future() {
        let mut history = SnapshotHistory::new(Board::default(), 100);
        commit_values(&mut history, &[1, 2, 3]);

        history.undo();
        history.undo();
        assert_eq!(history.future_len(), 2);

        let branch = history.present().with(Item::new(42, 42));
        assert_eq!(history.commit(&branch).unwrap(), 2);
        assert!(!history.can_redo());
        assert!(history.redo().is_none());
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut history = SnapshotHistory::new(Board::default(), 3);
        commit_values(&mut history, &[1, 2, 3, 4, 5]);

        assert_eq!(history.past_len(), 3);
        while history.undo().is_some() {}
        // The empty board and the first item were dropped
        assert_eq!(history.present().items.len(), 2);
    }

    #[test]
    fn test_stored_state_does_not_alias_input() {
        let mut history = SnapshotHistory::new(Board::default(), 10);
        let mut board = Board::default().with(Item::new(1, 1));
        history.commit(&board).unwrap();

        board.items[0].value = 99.0;
        assert_eq!(history.present().items[0].value, 1.0);
    }

    #[test]
    fn test_failed_commit_changes_nothing() {
        let mut history = SnapshotHistory::new(Board::default(), 10);
        commit_values(&mut history, &[1]);
        history.undo();

        let bad = Board::default().with(Item::new(7, f64::NAN));
        assert!(history.commit(&bad).is_err());
        assert!(history.can_redo());
        assert!(history.present().items.is_empty());
    }
}
