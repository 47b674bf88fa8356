//! # Weft History
//!
//! Versioned document history with two interchangeable strategies.
//!
//! ## Strategies
//!
//! | Aspect | [`SnapshotHistory`] | [`HybridHistory`] |
//! |--------|---------------------|-------------------|
//! | Per edit | One full document copy | One small [`DiffRecord`] |
//! | Memory | O(edits × document) | O(snapshots × document + edits × diff) |
//! | Undo/redo | Swap snapshots | Reverse/replay one diff, or jump to a snapshot |
//!
//! Both sit behind [`HistoryStrategy`], so an editing session never needs to
//! know which one it is talking to. [`HistoryConfig::build`] picks one.
//!
//! ## Key Concepts for Learning Rust
//!
//! ### Value Semantics
//! - Stored states are owned values; nothing in history borrows the live document
//! - Entering history and leaving it both go through [`deep_clone`]
//! - A later edit of the live document can never reach back into a stored state
//!
//! ### Option Instead of Sentinels
//! - "Nothing to undo" is `None`, not an error
//! - The hybrid diff cursor is `Option<usize>`; `None` means "at the snapshot"

mod clone;
mod diff;
mod hybrid;
mod snapshot;
mod strategy;

#[cfg(test)]
mod testing;

pub use clone::{deep_clone, CloneError, PlainData};
pub use diff::{Diff, DiffKind, DiffRecord, Diffable};
pub use hybrid::HybridHistory;
pub use snapshot::SnapshotHistory;
pub use strategy::{HistoryConfig, HistoryStats, HistoryStrategy, Strategy};

/// Result type for history operations
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Errors that can occur while recording history.
///
/// Running out of undo or redo steps is not listed here: both are reported
/// as `None` by the stores.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("Clone failed: {0}")]
    Clone(#[from] CloneError),

    #[error("Invalid diff record: {0}")]
    InvalidRecord(String),

    #[error("Invalid history configuration: {0}")]
    InvalidConfig(String),
}
