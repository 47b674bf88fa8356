//! Diff payloads for the workflow document.
//!
//! One operation can touch several entities: deleting a node also removes
//! every relation attached to it. A [`Fragment`] holds all of them, each
//! with the index it occupied, so a diff can put them back exactly where
//! they were.
//!
//! ## Learning: Implementing a Foreign Trait
//!
//! `Diffable` lives in `weft-history` and `Document` lives here. Rust's
//! orphan rule allows the impl because `Document` is local to this crate.

use serde::{Deserialize, Serialize};

use weft_history::{CloneError, DiffKind, DiffRecord, Diffable, PlainData};

use crate::document::{Document, EntityId, Metadata, Node, Relation};

/// The diff record type for workflow documents.
pub type Diff = DiffRecord<EntityId, Fragment>;

/// An item together with the index it occupies in its list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placed<T> {
    /// Index in the document's list
    pub index: usize,
    /// The item itself
    pub item: T,
}

impl<T> Placed<T> {
    /// Pairs an item with its index.
    pub fn new(index: usize, item: T) -> Self {
        Self { index, item }
    }
}

impl<T: PlainData> PlainData for Placed<T> {
    fn check_plain(&self) -> Result<(), CloneError> {
        self.item.check_plain()
    }
}

/// A set of nodes and relations with their positions, and optionally the
/// document metadata.
///
/// Both lists are kept in ascending index order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Fragment {
    pub nodes: Vec<Placed<Node>>,
    pub relations: Vec<Placed<Relation>>,
    /// Only present in metadata updates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Fragment {
    /// Creates a fragment, sorting both lists by index.
    pub fn new(mut nodes: Vec<Placed<Node>>, mut relations: Vec<Placed<Relation>>) -> Self {
        nodes.sort_by_key(|p| p.index);
        relations.sort_by_key(|p| p.index);
        Self {
            nodes,
            relations,
            metadata: None,
        }
    }

    /// Creates a fragment holding only the document metadata.
    pub fn metadata(metadata: Metadata) -> Self {
        Self {
            metadata: Some(metadata),
            ..Self::default()
        }
    }

    /// Creates a fragment holding one node.
    pub fn node(index: usize, node: Node) -> Self {
        Self::new(vec![Placed::new(index, node)], Vec::new())
    }

    /// Creates a fragment holding one relation.
    pub fn relation(index: usize, relation: Relation) -> Self {
        Self::new(Vec::new(), vec![Placed::new(index, relation)])
    }

    /// Returns true if the fragment holds nothing.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relations.is_empty() && self.metadata.is_none()
    }

    /// Returns every ID in the fragment, nodes first.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.nodes
            .iter()
            .map(|p| p.item.id)
            .chain(self.relations.iter().map(|p| p.item.id))
    }
}

impl PlainData for Fragment {
    fn check_plain(&self) -> Result<(), CloneError> {
        self.nodes.check_plain()?;
        self.relations.check_plain()
    }
}

// ==================== Replay helpers ====================

impl Document {
    /// Inserts every item at its recorded index.
    ///
    /// Ascending insertion restores the original order as long as the
    /// fragment's items were removed from (or appended to) this same state.
    fn insert_fragment(&mut self, fragment: &Fragment) {
        let nodes = self.nodes_mut();
        for placed in &fragment.nodes {
            let index = placed.index.min(nodes.len());
            nodes.insert(index, placed.item.clone());
        }

        let relations = self.relations_mut();
        for placed in &fragment.relations {
            let index = placed.index.min(relations.len());
            relations.insert(index, placed.item.clone());
        }
    }

    /// Removes every item whose ID appears in the fragment.
    fn remove_fragment(&mut self, fragment: &Fragment) {
        let ids: Vec<EntityId> = fragment.ids().collect();
        self.nodes_mut().retain(|n| !ids.contains(&n.id));
        self.relations_mut().retain(|r| !ids.contains(&r.id));
    }

    /// Overwrites items (and metadata, if present) with the fragment's
    /// versions.
    fn replace_fragment(&mut self, fragment: &Fragment) {
        if let Some(metadata) = &fragment.metadata {
            *self.metadata_mut() = metadata.clone();
        }
        for placed in &fragment.nodes {
            if let Some(slot) = self.nodes_mut().iter_mut().find(|n| n.id == placed.item.id) {
                *slot = placed.item.clone();
            }
        }
        for placed in &fragment.relations {
            if let Some(slot) = self
                .relations_mut()
                .iter_mut()
                .find(|r| r.id == placed.item.id)
            {
                *slot = placed.item.clone();
            }
        }
    }

    /// Moves a node to `index` in drawing order.
    fn move_node(&mut self, id: EntityId, index: Option<usize>) {
        let (Some(from), Some(to)) = (self.node_index(id), index) else {
            return;
        };
        let nodes = self.nodes_mut();
        let node = nodes.remove(from);
        let to = to.min(nodes.len());
        nodes.insert(to, node);
    }
}

impl Diffable for Document {
    type Key = EntityId;
    type Entity = Fragment;

    fn apply(&self, diff: &Diff) -> Self {
        let mut next = self.clone();
        match diff.kind {
            DiffKind::Add => {
                if let Some(after) = &diff.after {
                    next.insert_fragment(after);
                }
            }
            DiffKind::Update => {
                if let Some(after) = &diff.after {
                    next.replace_fragment(after);
                }
            }
            DiffKind::Delete => {
                if let Some(before) = &diff.before {
                    next.remove_fragment(before);
                }
            }
            DiffKind::Move => next.move_node(diff.entity_id, diff.position),
        }
        next
    }

    fn revert(&self, diff: &Diff) -> Self {
        let mut next = self.clone();
        match diff.kind {
            DiffKind::Add => {
                if let Some(after) = &diff.after {
                    next.remove_fragment(after);
                }
            }
            DiffKind::Update => {
                if let Some(before) = &diff.before {
                    next.replace_fragment(before);
                }
            }
            DiffKind::Delete => {
                if let Some(before) = &diff.before {
                    next.insert_fragment(before);
                }
            }
            DiffKind::Move => next.move_node(diff.entity_id, diff.prior_position),
        }
        next
    }
}
