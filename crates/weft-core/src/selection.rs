//! Transient selection state.
//!
//! Selection is what the user is pointing at, not part of the document. It
//! is never recorded in history; undo and redo clear it instead of trying
//! to restore it.

use crate::document::{Document, EntityId, Position};

/// The currently highlighted nodes and relations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    nodes: Vec<EntityId>,
    relations: Vec<EntityId>,
}

impl Selection {
    /// Creates an empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the selected node IDs in selection order.
    pub fn nodes(&self) -> &[EntityId] {
        &self.nodes
    }

    /// Returns the selected relation IDs in selection order.
    pub fn relations(&self) -> &[EntityId] {
        &self.relations
    }

    /// Returns true if `id` is a selected node.
    pub fn contains_node(&self, id: EntityId) -> bool {
        self.nodes.contains(&id)
    }

    /// Returns true if `id` is a selected relation.
    pub fn contains_relation(&self, id: EntityId) -> bool {
        self.relations.contains(&id)
    }

    /// Returns true if nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relations.is_empty()
    }

    /// Selects a node.
    ///
    /// With `multi` the node is toggled in or out of the current node
    /// selection; otherwise it replaces it. Either way relations are
    /// deselected.
    pub fn select_node(&mut self, id: EntityId, multi: bool) {
        Self::pick(&mut self.nodes, id, multi);
        self.relations.clear();
    }

    /// Selects a relation. Mirrors [`select_node`](Self::select_node).
    pub fn select_relation(&mut self, id: EntityId, multi: bool) {
        Self::pick(&mut self.relations, id, multi);
        self.nodes.clear();
    }

    /// Replaces the node selection with `ids`.
    pub fn set_nodes(&mut self, ids: impl IntoIterator<Item = EntityId>) {
        self.nodes = ids.into_iter().collect();
        self.relations.clear();
    }

    /// Selects every node and relation in the document.
    pub fn select_all(&mut self, document: &Document) {
        self.nodes = document.nodes().iter().map(|n| n.id).collect();
        self.relations = document.relations().iter().map(|r| r.id).collect();
    }

    /// Selects the nodes lying entirely inside the rectangle spanned by two
    /// corners, in any order.
    pub fn select_area(&mut self, document: &Document, start: Position, end: Position) {
        let min = Position::new(start.x.min(end.x), start.y.min(end.y));
        let max = Position::new(start.x.max(end.x), start.y.max(end.y));
        self.nodes = document
            .nodes()
            .iter()
            .filter(|n| n.is_inside(min, max))
            .map(|n| n.id)
            .collect();
        self.relations.clear();
    }

    /// Deselects everything.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.relations.clear();
    }

    /// Drops IDs that no longer exist in `document`.
    ///
    /// Returns true if anything was dropped.
    pub fn retain_existing(&mut self, document: &Document) -> bool {
        let before = self.nodes.len() + self.relations.len();
        self.nodes.retain(|id| document.node(*id).is_some());
        self.relations.retain(|id| document.relation(*id).is_some());
        before != self.nodes.len() + self.relations.len()
    }

    fn pick(ids: &mut Vec<EntityId>, id: EntityId, multi: bool) {
        if !multi {
            ids.clear();
            ids.push(id);
        } else if let Some(index) = ids.iter().position(|x| *x == id) {
            ids.remove(index);
        } else {
            ids.push(id);
        }
    }
}
