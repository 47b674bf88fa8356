//! Copied nodes and relations, ready to paste.

use serde::{Deserialize, Serialize};

use crate::document::{Document, Node, Relation};
use crate::selection::Selection;

/// A detached copy of part of a document.
///
/// Clipboard items keep their original IDs; pasting remaps them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Clipboard {
    pub nodes: Vec<Node>,
    pub relations: Vec<Relation>,
}

impl Clipboard {
    /// Copies the selection out of `document`.
    ///
    /// Takes the selected nodes, plus every relation that is either
    /// selected itself or joins two selected nodes. Items keep document
    /// order.
    pub fn copy(document: &Document, selection: &Selection) -> Self {
        let nodes = document
            .nodes()
            .iter()
            .filter(|n| selection.contains_node(n.id))
            .cloned()
            .collect();

        let relations = document
            .relations()
            .iter()
            .filter(|r| {
                selection.contains_relation(r.id)
                    || (selection.contains_node(r.source) && selection.contains_node(r.target))
            })
            .cloned()
            .collect();

        Self { nodes, relations }
    }

    /// Returns true if there is nothing to paste.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
