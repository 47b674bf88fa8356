//! Snapshot + diff hybrid history.
//!
//! Most edits are stored as small diff records. Every
//! `max_diffs_per_snapshot` edits the pending log is folded into a fresh
//! full snapshot, so memory grows with the number of snapshots times the
//! document size, plus the number of edits times the diff size.
//!
//! ## Cursor Model
//!
//! ```text
//! snapshots:  S0 ─────────────── S1 ─────────────── S2
//! diff_logs:  [d0 d1 d2 d3]      [d0 d1 d2 d3]      [d0 d1]
//!                                                      ^
//!                              snapshot_index = 2, diff_index = Some(1)
//! ```
//!
//! The live document is `S[snapshot_index]` with `diff_logs[snapshot_index]`
//! applied up to and including `diff_index`. `diff_index == None` means no
//! diff is applied yet. Every log before the last one is full, and
//! `S[k + 1]` is exactly `S[k]` with all of log `k` applied.
//!
//! ## Boundary Crossings
//!
//! Stepping across a snapshot boundary never replays a diff. An undo at
//! `(k + 1, None)` moves the cursor to the end of log `k` and returns the
//! folded state `S[k + 1]`. The next undo resumes diff-based stepping. Redo
//! is symmetric. Each call does at most one diff application or one
//! snapshot copy.

use std::fmt;

use crate::clone::PlainData;
use crate::diff::{Diff, Diffable};
use crate::HistoryResult;

/// History made of periodic snapshots and per-snapshot diff logs.
pub struct HybridHistory<D: Diffable> {
    /// Fully materialized states, oldest first
    snapshots: Vec<D>,
    /// Diffs recorded on top of each snapshot (same length as `snapshots`)
    diff_logs: Vec<Vec<Diff<D>>>,
    /// Snapshot the cursor is in
    snapshot_index: usize,
    /// Last applied diff in the active log
    diff_index: Option<usize>,
    /// Maximum number of snapshots to keep
    max_snapshots: usize,
    /// Log length that triggers a fold
    max_diffs_per_snapshot: usize,
}

impl<D: Diffable> HybridHistory<D> {
    /// Creates a history with `initial` as its only snapshot.
    ///
    /// Both bounds are clamped to at least one.
    pub fn new(initial: D, max_snapshots: usize, max_diffs_per_snapshot: usize) -> Self {
        Self {
            snapshots: vec![initial],
            diff_logs: vec![Vec::new()],
            snapshot_index: 0,
            diff_index: None,
            max_snapshots: max_snapshots.max(1),
            max_diffs_per_snapshot: max_diffs_per_snapshot.max(1),
        }
    }

    /// Records one mutation.
    ///
    /// Any diffs past the cursor and any later snapshots are discarded
    /// first. If the active log fills up it is folded into a new snapshot,
    /// and if that leaves too many snapshots the oldest are dropped.
    /// Returns how many redo edits were discarded.
    ///
    /// The record is the only thing checked, and it is checked before
    /// anything changes; on error the history is untouched. Every later
    /// step is infallible.
    pub fn push(&mut self, diff: Diff<D>) -> HistoryResult<usize> {
        diff.check_plain()?;

        self.settle();
        let discarded = self.truncate_future();

        let log = &mut self.diff_logs[self.snapshot_index];
        log.push(diff);
        self.diff_index = Some(log.len() - 1);

        if log.len() >= self.max_diffs_per_snapshot {
            self.fold();
        }
        self.evict();

        Ok(discarded)
    }

    /// Steps back one position, starting from `current`.
    ///
    /// Returns the resulting document, or `None` if there is nothing to undo.
    pub fn undo(&mut self, current: &D) -> Option<D> {
        if let Some(index) = self.diff_index {
            let diff = &self.diff_logs[self.snapshot_index][index];
            self.diff_index = index.checked_sub(1);
            return Some(current.revert(diff));
        }

        if self.snapshot_index > 0 {
            let boundary = self.snapshot_index;
            self.snapshot_index -= 1;
            self.diff_index = self.diff_logs[self.snapshot_index].len().checked_sub(1);
            tracing::debug!(
                from = boundary,
                to = self.snapshot_index,
                "undo crossed snapshot boundary"
            );
            return Some(self.snapshots[boundary].clone());
        }

        None
    }

    /// Steps forward one position, starting from `current`.
    ///
    /// Returns the resulting document, or `None` if there is nothing to redo.
    pub fn redo(&mut self, current: &D) -> Option<D> {
        let log = &self.diff_logs[self.snapshot_index];
        let next = self.applied();

        if next < log.len() {
            self.diff_index = Some(next);
            return Some(current.apply(&log[next]));
        }

        if self.snapshot_index + 1 < self.snapshots.len() {
            self.snapshot_index += 1;
            self.diff_index = None;
            tracing::debug!(to = self.snapshot_index, "redo crossed snapshot boundary");
            return Some(self.snapshots[self.snapshot_index].clone());
        }

        None
    }

    /// Returns true if there is anything to undo.
    pub fn can_undo(&self) -> bool {
        self.diff_index.is_some() || self.snapshot_index > 0
    }

    /// Returns true if there is anything to redo.
    pub fn can_redo(&self) -> bool {
        self.applied() < self.active_log_len() || self.snapshot_index + 1 < self.snapshots.len()
    }

    /// Returns the number of recorded edits behind the cursor.
    ///
    /// Boundary crossings are not edits and are not counted, so this can be
    /// smaller than the number of `undo` calls that would succeed.
    pub fn undo_depth(&self) -> usize {
        let earlier: usize = self.diff_logs[..self.snapshot_index].iter().map(Vec::len).sum();
        self.applied() + earlier
    }

    /// Returns the number of recorded edits ahead of the cursor.
    ///
    /// Like [`undo_depth`](Self::undo_depth), crossings are not counted.
    pub fn redo_depth(&self) -> usize {
        let later: usize = self.diff_logs[self.snapshot_index + 1..].iter().map(Vec::len).sum();
        self.active_log_len() - self.applied() + later
    }

    /// Returns the number of stored snapshots.
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    /// Returns the index of the snapshot the cursor is in.
    pub fn snapshot_index(&self) -> usize {
        self.snapshot_index
    }

    /// Returns the last applied diff in the active log, if any.
    pub fn diff_cursor(&self) -> Option<usize> {
        self.diff_index
    }

    /// Returns the length of the active diff log.
    pub fn active_log_len(&self) -> usize {
        self.diff_logs[self.snapshot_index].len()
    }

    /// Returns the number of diffs stored across all logs.
    pub fn total_diffs(&self) -> usize {
        self.diff_logs.iter().map(Vec::len).sum()
    }

    /// Returns a stored snapshot.
    pub fn snapshot(&self, index: usize) -> Option<&D> {
        self.snapshots.get(index)
    }

    /// Drops all history and makes `base` the only snapshot.
    pub fn clear(&mut self, base: D) {
        self.snapshots = vec![base];
        self.diff_logs = vec![Vec::new()];
        self.snapshot_index = 0;
        self.diff_index = None;
    }

    /// Number of diffs applied in the active log.
    fn applied(&self) -> usize {
        self.diff_index.map_or(0, |index| index + 1)
    }

    /// Moves a cursor parked at the end of a folded log onto its fold.
    ///
    /// The end of a full log and the start of the next snapshot describe the
    /// same document. Settling onto the snapshot keeps that fold when the
    /// next edit truncates, and stops the log from growing past its limit.
    /// Returns true if the cursor moved.
    pub fn settle(&mut self) -> bool {
        let at_end = self.applied() == self.active_log_len() && self.active_log_len() > 0;
        if at_end && self.snapshot_index + 1 < self.snapshots.len() {
            self.snapshot_index += 1;
            self.diff_index = None;
            return true;
        }
        false
    }

    /// Discards everything past the cursor. Returns the redo edits lost.
    fn truncate_future(&mut self) -> usize {
        if !self.can_redo() {
            return 0;
        }
        let discarded = self.redo_depth();

        let keep = self.applied();
        self.diff_logs[self.snapshot_index].truncate(keep);
        self.snapshots.truncate(self.snapshot_index + 1);
        self.diff_logs.truncate(self.snapshot_index + 1);

        tracing::debug!(discarded, "new edit truncated redo branch");
        discarded
    }

    /// Materializes the active log into a new snapshot.
    ///
    /// The base snapshot and every diff in the log were checked on the way
    /// in, so a plain `clone` is already a deep copy here.
    fn fold(&mut self) {
        let base = self.snapshots[self.snapshot_index].clone();
        let folded = self.diff_logs[self.snapshot_index]
            .iter()
            .fold(base, |doc, diff| doc.apply(diff));

        self.snapshots.push(folded);
        self.diff_logs.push(Vec::new());
        self.snapshot_index += 1;
        self.diff_index = None;

        tracing::debug!(snapshots = self.snapshots.len(), "folded diff log into snapshot");
    }

    /// Drops the oldest snapshots and their logs once over capacity.
    fn evict(&mut self) {
        if self.snapshots.len() <= self.max_snapshots {
            return;
        }

        let remove = self.snapshots.len() - self.max_snapshots;
        self.snapshots.drain(..remove);
        self.diff_logs.drain(..remove);
        self.snapshot_index = self.snapshot_index.saturating_sub(remove);

        tracing::debug!(removed = remove, "evicted oldest snapshots");
    }
}

impl<D: Diffable> fmt::Debug for HybridHistory<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HybridHistory")
            .field("snapshots", &self.snapshots.len())
            .field("total_diffs", &self.total_diffs())
            .field("snapshot_index", &self.snapshot_index)
            .field("diff_index", &self.diff_index)
            .field("max_snapshots", &self.max_snapshots)
            .field("max_diffs_per_snapshot", &self.max_diffs_per_snapshot)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Board;
    use crate::SnapshotHistory;
    use proptest::prelude::*;

    /// Pushes `count` appends and returns every intermediate board.
    fn push_adds(history: &mut HybridHistory<Board>, count: u32) -> Vec<Board> {
        let mut states = vec![Board::default()];
        for id in 0..count {
            let (next, diff) = states[states.len() - 1].add(id, id * 10);
            history.push(diff).unwrap();
            states.push(next);
        }
        states
    }

    #[test]
    fn test_diff_undo_redo_within_log() {
        let mut history = HybridHistory::new(Board::default(), 10, 20);
        let states = push_adds(&mut history, 3);
        assert_eq!(history.diff_cursor(), Some(2));

        let mut doc = states[3].clone();
        doc = history.undo(&doc).unwrap();
        assert_eq!(doc, states[2]);
        doc = history.undo(&doc).unwrap();
        assert_eq!(doc, states[1]);
        assert_eq!(history.diff_cursor(), Some(0));

        doc = history.redo(&doc).unwrap();
        doc = history.redo(&doc).unwrap();
        assert_eq!(doc, states[3]);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_fold_after_full_log() {
        let mut history = HybridHistory::new(Board::default(), 10, 4);
        let states = push_adds(&mut history, 4);

        assert_eq!(history.snapshot_count(), 2);
        assert_eq!(history.snapshot_index(), 1);
        assert_eq!(history.active_log_len(), 0);
        assert_eq!(history.diff_cursor(), None);
        assert_eq!(history.snapshot(1), Some(&states[4]));
    }

    #[test]
    fn test_fold_matches_full_snapshot_history() {
        let mut hybrid = HybridHistory::new(Board::default(), 10, 5);
        let mut full = SnapshotHistory::new(Board::default(), 100);

        let mut board = Board::default();
        for (id, value) in [(1, 5), (2, 6), (3, 7)] {
            let (next, diff) = board.add(id, value);
            hybrid.push(diff).unwrap();
            full.commit(&next).unwrap();
            board = next;
        }
        let (next, diff) = board.set(2, 60);
        hybrid.push(diff).unwrap();
        full.commit(&next).unwrap();
        board = next;
        let (next, diff) = board.remove(1);
        hybrid.push(diff).unwrap();
        full.commit(&next).unwrap();

        assert_eq!(hybrid.snapshot_count(), 2);
        assert_eq!(hybrid.snapshot(1), Some(full.present()));
    }

    #[test]
    fn test_boundary_crossing_is_its_own_step() {
        let mut history = HybridHistory::new(Board::default(), 10, 2);
        let states = push_adds(&mut history, 2);
        assert_eq!(history.snapshot_index(), 1);

        // Crossing back lands on the folded state, cursor at end of log 0
        let doc = history.undo(&states[2]).unwrap();
        assert_eq!(doc, states[2]);
        assert_eq!(history.snapshot_index(), 0);
        assert_eq!(history.diff_cursor(), Some(1));

        // Then diffs resume
        let doc = history.undo(&doc).unwrap();
        assert_eq!(doc, states[1]);
        let doc = history.undo(&doc).unwrap();
        assert_eq!(doc, states[0]);
        assert!(!history.can_undo());

        let doc = history.redo(&doc).unwrap();
        let doc = history.redo(&doc).unwrap();
        assert_eq!(doc, states[2]);
        let doc = history.redo(&doc).unwrap();
        assert_eq!(doc, states[2]);
        assert_eq!(history.snapshot_index(), 1);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_push_truncates_within_log() {
        let mut history = HybridHistory::new(Board::default(), 10, 20);
        let states = push_adds(&mut history, 3);

        let doc = history.undo(&states[3]).unwrap();
        let doc = history.undo(&doc).unwrap();
        assert_eq!(history.redo_depth(), 2);

        let (_, diff) = doc.add(99, 99);
        assert_eq!(history.push(diff).unwrap(), 2);
        assert!(!history.can_redo());
        assert_eq!(history.total_diffs(), 2);
    }

    #[test]
    fn test_push_truncates_later_snapshots() {
        let mut history = HybridHistory::new(Board::default(), 10, 2);
        let states = push_adds(&mut history, 5);
        assert_eq!(history.snapshot_count(), 3);

        let mut doc = states[5].clone();
        for _ in 0..3 {
            doc = history.undo(&doc).unwrap();
        }
        // Back inside log 1 with one diff applied
        assert_eq!(history.snapshot_index(), 1);
        assert_eq!(doc, states[3]);

        let (_, diff) = doc.add(99, 99);
        history.push(diff).unwrap();
        assert!(!history.can_redo());
        assert_eq!(history.snapshot_count(), 3);
        assert_eq!(history.active_log_len(), 0);
    }

    #[test]
    fn test_push_at_folded_end_keeps_fold() {
        let mut history = HybridHistory::new(Board::default(), 10, 2);
        let states = push_adds(&mut history, 2);

        // Cross back, then edit from the same document
        let doc = history.undo(&states[2]).unwrap();
        let (_, diff) = doc.add(7, 7);
        history.push(diff).unwrap();

        assert_eq!(history.snapshot_count(), 2);
        assert_eq!(history.snapshot(1), Some(&states[2]));
        assert_eq!(history.active_log_len(), 1);
        assert_eq!(history.diff_logs[0].len(), 2);
    }

    #[test]
    fn test_eviction_bounds_undo_depth() {
        let mut history = HybridHistory::new(Board::default(), 2, 2);
        let states = push_adds(&mut history, 6);

        assert_eq!(history.snapshot_count(), 2);
        assert_eq!(history.snapshot_index(), 1);
        assert_eq!(history.snapshot(0), Some(&states[4]));

        let mut doc = states[6].clone();
        while let Some(prev) = history.undo(&doc) {
            doc = prev;
        }
        assert_eq!(doc, states[4]);
    }

    #[test]
    fn test_rejected_record_changes_nothing() {
        let mut history = HybridHistory::new(Board::default(), 10, 20);
        push_adds(&mut history, 1);

        let (_, diff) = Board::default().add(5, f64::NAN);
        assert!(history.push(diff).is_err());
        assert_eq!(history.total_diffs(), 1);
        assert_eq!(history.diff_cursor(), Some(0));
    }

    #[test]
    fn test_depths_track_cursor() {
        let mut history = HybridHistory::new(Board::default(), 10, 2);
        let states = push_adds(&mut history, 3);
        // Log 0 full (2) + 1 diff in log 1; the crossing is not an edit
        assert_eq!(history.undo_depth(), 3);
        assert_eq!(history.redo_depth(), 0);

        let mut doc = states[3].clone();
        let mut undos = 0;
        let mut changed = 0;
        while let Some(prev) = history.undo(&doc) {
            if prev != doc {
                changed += 1;
            }
            doc = prev;
            undos += 1;
        }
        assert_eq!(undos, 4);
        assert_eq!(changed, 3);
        assert_eq!(history.undo_depth(), 0);
        assert_eq!(history.redo_depth(), 3);
    }

    #[test]
    fn test_rejected_record_at_fold_threshold() {
        let mut history = HybridHistory::new(Board::default(), 10, 2);
        let states = push_adds(&mut history, 3);

        // Undo back into log 0 so a push would truncate and then fold
        let mut doc = states[3].clone();
        for _ in 0..3 {
            doc = history.undo(&doc).unwrap();
        }
        assert_eq!(doc, states[1]);
        let cursor = (history.snapshot_index(), history.diff_cursor());

        let (_, diff) = doc.add(9, f64::NAN);
        assert!(history.push(diff).is_err());
        assert_eq!((history.snapshot_index(), history.diff_cursor()), cursor);
        assert_eq!(history.snapshot_count(), 2);
        assert_eq!(history.total_diffs(), 3);
        assert_eq!(history.redo_depth(), 2);
        assert!(history.can_redo());

        let (next, diff) = doc.add(9, 90.0);
        assert_eq!(history.push(diff).unwrap(), 2);
        assert_eq!(history.snapshot_count(), 2);
        assert_eq!(history.snapshot(1), Some(&next));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_settle_after_redo_to_fold() {
        let mut history = HybridHistory::new(Board::default(), 10, 2);
        let states = push_adds(&mut history, 2);

        let doc = history.undo(&states[2]).unwrap();
        let doc = history.undo(&doc).unwrap();
        let doc = history.redo(&doc).unwrap();
        assert_eq!(doc, states[2]);
        assert!(history.can_redo());

        assert!(history.settle());
        assert_eq!(history.snapshot_index(), 1);
        assert!(!history.can_redo());
        assert!(!history.settle());
    }

    proptest! {
        #[test]
        fn prop_undo_then_redo_restores(count in 1u32..40, per_log in 1usize..6, back in 0usize..50) {
            let mut history = HybridHistory::new(Board::default(), 1000, per_log);
            let states = push_adds(&mut history, count);
            let latest = states[states.len() - 1].clone();

            let mut doc = latest.clone();
            let mut undone = 0;
            while undone < back {
                match history.undo(&doc) {
                    Some(prev) => {
                        prop_assert!(states.contains(&prev));
                        doc = prev;
                        undone += 1;
                    }
                    None => break,
                }
            }
            for _ in 0..undone {
                doc = history.redo(&doc).unwrap();
            }
            prop_assert_eq!(doc, latest);
            prop_assert!(!history.can_redo());
        }
    }
}
