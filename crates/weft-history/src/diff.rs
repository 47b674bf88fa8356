//! Diff records: the atomic description of one mutation.
//!
//! ## Learning: The Command Pattern, Inverted
//!
//! A diff is not a command to run; it is the *result* of running one. It
//! stores enough of the before and after images that the history can:
//! - Replay it (apply `after`)
//! - Reverse it (restore `before`)
//!
//! without going back through the operation that produced it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::clone::{CloneError, PlainData};
use crate::{HistoryError, HistoryResult};

/// The type of mutation a diff describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    /// New data was inserted
    Add,
    /// Existing data was overwritten
    Update,
    /// Existing data was removed
    Delete,
    /// An entity changed its position in the document order
    Move,
}

impl DiffKind {
    /// Returns true if this kind removes or overwrites existing data.
    pub fn needs_before(self) -> bool {
        matches!(self, DiffKind::Update | DiffKind::Delete)
    }

    /// Returns true if this kind produces new data.
    pub fn needs_after(self) -> bool {
        matches!(self, DiffKind::Add | DiffKind::Update)
    }
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiffKind::Add => "add",
            DiffKind::Update => "update",
            DiffKind::Delete => "delete",
            DiffKind::Move => "move",
        };
        f.write_str(name)
    }
}

/// A single recorded mutation.
///
/// `K` identifies the entity, `E` is the payload type holding the before
/// and after images.
///
/// ## Invariants
///
/// - `before` is set whenever the mutation overwrote or removed data
/// - `after` is set whenever the mutation produced data
/// - `Move` carries both `position` (target) and `prior_position` (origin)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffRecord<K, E> {
    /// What kind of mutation this is
    pub kind: DiffKind,
    /// The entity the mutation is about
    pub entity_id: K,
    /// Image of the data before the mutation
    pub before: Option<E>,
    /// Image of the data after the mutation
    pub after: Option<E>,
    /// Target index for moves
    pub position: Option<usize>,
    /// Origin index for moves
    pub prior_position: Option<usize>,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
}

impl<K, E> DiffRecord<K, E> {
    /// Builds a record from raw parts, checking the population invariant.
    ///
    /// A `Move` needs both indices: `position` to replay it and
    /// `prior_position` to reverse it.
    pub fn new(
        kind: DiffKind,
        entity_id: K,
        before: Option<E>,
        after: Option<E>,
        position: Option<usize>,
        prior_position: Option<usize>,
    ) -> HistoryResult<Self> {
        if kind.needs_before() && before.is_none() {
            return Err(HistoryError::InvalidRecord(format!(
                "{kind} record is missing its before image"
            )));
        }
        if kind.needs_after() && after.is_none() {
            return Err(HistoryError::InvalidRecord(format!(
                "{kind} record is missing its after image"
            )));
        }
        if kind == DiffKind::Move && position.is_none() {
            return Err(HistoryError::InvalidRecord(
                "move record is missing its target position".to_string(),
            ));
        }
        if kind == DiffKind::Move && prior_position.is_none() {
            return Err(HistoryError::InvalidRecord(
                "move record is missing its prior position".to_string(),
            ));
        }

        Ok(Self {
            kind,
            entity_id,
            before,
            after,
            position,
            prior_position,
            timestamp: now_millis(),
        })
    }

    /// Creates an add record.
    pub fn add(entity_id: K, after: E) -> Self {
        Self::unchecked(DiffKind::Add, entity_id, None, Some(after))
    }

    /// Creates an update record.
    pub fn update(entity_id: K, before: E, after: E) -> Self {
        Self::unchecked(DiffKind::Update, entity_id, Some(before), Some(after))
    }

    /// Creates a delete record.
    pub fn delete(entity_id: K, before: E) -> Self {
        Self::unchecked(DiffKind::Delete, entity_id, Some(before), None)
    }

    /// Creates a move record from `from` to `to`.
    pub fn moved(entity_id: K, from: usize, to: usize) -> Self {
        Self {
            position: Some(to),
            prior_position: Some(from),
            ..Self::unchecked(DiffKind::Move, entity_id, None, None)
        }
    }

    fn unchecked(kind: DiffKind, entity_id: K, before: Option<E>, after: Option<E>) -> Self {
        Self {
            kind,
            entity_id,
            before,
            after,
            position: None,
            prior_position: None,
            timestamp: now_millis(),
        }
    }
}

impl<K: Clone, E: PlainData> PlainData for DiffRecord<K, E> {
    fn check_plain(&self) -> Result<(), CloneError> {
        self.before.check_plain()?;
        self.after.check_plain()
    }
}

/// A document that knows how to replay and reverse its own diffs.
///
/// Both methods are pure: they return a new document and leave `self`
/// untouched.
pub trait Diffable: PlainData + fmt::Debug {
    /// Identifier type for entities inside the document
    type Key: Clone + PartialEq + fmt::Debug;
    /// Payload type for before/after images
    type Entity: PlainData + fmt::Debug;

    /// Returns the document with `diff` applied forward.
    fn apply(&self, diff: &Diff<Self>) -> Self;

    /// Returns the document with `diff` reversed.
    ///
    /// - `Add` reverses to removing what was added
    /// - `Update` reverses to restoring the `before` image
    /// - `Delete` reverses to reinserting the `before` image
    /// - `Move` reverses to moving back to `prior_position`
    fn revert(&self, diff: &Diff<Self>) -> Self;
}

/// The diff record type for a given document.
pub type Diff<D> = DiffRecord<<D as Diffable>::Key, <D as Diffable>::Entity>;

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
