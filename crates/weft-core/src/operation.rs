//! Document mutation operations.
//!
//! ## Learning: Pure Functions Over Owned Data
//!
//! [`Operation::apply`] takes `&Document` and returns a brand-new document.
//! It never edits its input, so a failed validation cannot leave anything
//! half-changed, and the caller decides whether the result becomes the
//! live document.
//!
//! Each operation also returns the [`Diff`] that turns the old document
//! into the new one. The snapshot history ignores it; the hybrid history
//! stores nothing else.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use weft_history::DiffRecord;

use crate::change::{Diff, Fragment, Placed};
use crate::clipboard::Clipboard;
use crate::document::{Document, EntityId, Metadata, Node, Position, Relation, Size};
use crate::{CoreError, CoreResult};

/// How far a duplicated node is shifted from its source.
pub const DUPLICATE_OFFSET: Position = Position::new(50.0, 50.0);

/// A partial update to a node.
///
/// `None` fields are left alone. Properties are merged key by key; a JSON
/// `null` value removes the key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodePatch {
    pub label: Option<String>,
    /// An empty string clears the description
    pub description: Option<String>,
    pub position: Option<Position>,
    pub size: Option<Size>,
    pub properties: Map<String, Value>,
}

impl NodePatch {
    /// Sets the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the position.
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Sets the size.
    pub fn with_size(mut self, size: Size) -> Self {
        self.size = Some(size);
        self
    }

    /// Sets (or with `Value::Null`, removes) one property.
    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Returns true if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.label.is_none()
            && self.description.is_none()
            && self.position.is_none()
            && self.size.is_none()
            && self.properties.is_empty()
    }

    /// Returns a copy of `node` with the patch applied.
    pub fn applied_to(&self, node: &Node) -> Node {
        let mut next = node.clone();
        if let Some(label) = &self.label {
            next.label = label.clone();
        }
        if let Some(description) = &self.description {
            next.description = (!description.is_empty()).then(|| description.clone());
        }
        if let Some(position) = self.position {
            next.position = position;
        }
        if let Some(size) = self.size {
            next.size = size;
        }
        for (key, value) in &self.properties {
            if value.is_null() {
                next.properties.remove(key);
            } else {
                next.properties.insert(key.clone(), value.clone());
            }
        }
        next
    }
}

/// A partial update to the document metadata.
///
/// `None` fields are left alone; `tags` replaces the whole list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl MetadataPatch {
    /// Sets the workflow name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the version string.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets the author.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Replaces the tag list.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Returns a copy of `metadata` with the patch applied.
    pub fn applied_to(&self, metadata: &Metadata) -> Metadata {
        let pick = |field: &Option<String>, current: &String| {
            field.clone().unwrap_or_else(|| current.clone())
        };
        Metadata {
            name: pick(&self.name, &metadata.name),
            description: pick(&self.description, &metadata.description),
            version: pick(&self.version, &metadata.version),
            author: pick(&self.author, &metadata.author),
            tags: self.tags.clone().unwrap_or_else(|| metadata.tags.clone()),
        }
    }
}

/// One edit to a workflow document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "args", rename_all = "snake_case")]
pub enum Operation {
    /// Append a node on top of the drawing order
    AddNode(Node),
    /// Change some fields of a node
    UpdateNode { id: EntityId, patch: NodePatch },
    /// Remove a node and every relation attached to it
    DeleteNode(EntityId),
    /// Copy a node under a fresh ID, shifted by [`DUPLICATE_OFFSET`]
    DuplicateNode(EntityId),
    /// Add a relation between two existing ports
    Connect(Relation),
    /// Remove a relation
    Disconnect(EntityId),
    /// Insert clipboard contents under fresh IDs
    Paste { clipboard: Clipboard, offset: Position },
    /// Move a node to another place in the drawing order
    Reorder { id: EntityId, index: usize },
    /// Change the workflow's name, description, version, author or tags
    UpdateMetadata(MetadataPatch),
}

/// The outcome of a successful operation.
#[derive(Debug, Clone)]
pub struct Change {
    /// The document after the operation
    pub document: Document,
    /// The diff that turns the old document into `document`
    pub diff: Diff,
    /// IDs of entities the operation created
    pub created: Vec<EntityId>,
}

impl Operation {
    /// Returns a short name for logs and menus.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::AddNode(_) => "add node",
            Operation::UpdateNode { .. } => "update node",
            Operation::DeleteNode(_) => "delete node",
            Operation::DuplicateNode(_) => "duplicate node",
            Operation::Connect(_) => "connect",
            Operation::Disconnect(_) => "disconnect",
            Operation::Paste { .. } => "paste",
            Operation::Reorder { .. } => "reorder",
            Operation::UpdateMetadata(_) => "update metadata",
        }
    }

    /// Validates the operation against `document` and computes the result.
    ///
    /// `document` is never modified. On error nothing has happened.
    pub fn apply(&self, document: &Document) -> CoreResult<Change> {
        match self {
            Operation::AddNode(node) => add_node(document, node.clone()),
            Operation::UpdateNode { id, patch } => update_node(document, *id, patch),
            Operation::DeleteNode(id) => delete_node(document, *id),
            Operation::DuplicateNode(id) => {
                let source = document.node(*id).ok_or(CoreError::NodeNotFound(*id))?;
                let copy = Node {
                    id: EntityId::new(),
                    position: source.position.offset(DUPLICATE_OFFSET),
                    ..source.clone()
                };
                add_node(document, copy)
            }
            Operation::Connect(relation) => connect(document, relation.clone()),
            Operation::Disconnect(id) => disconnect(document, *id),
            Operation::Paste { clipboard, offset } => paste(document, clipboard, *offset),
            Operation::Reorder { id, index } => reorder(document, *id, *index),
            Operation::UpdateMetadata(patch) => update_metadata(document, patch),
        }
    }
}

fn add_node(document: &Document, node: Node) -> CoreResult<Change> {
    if document.contains(node.id) {
        return Err(CoreError::DuplicateId(node.id));
    }

    let id = node.id;
    let index = document.nodes().len();
    let mut next = document.clone();
    next.nodes_mut().push(node.clone());

    Ok(Change {
        document: next,
        diff: DiffRecord::add(id, Fragment::node(index, node)),
        created: vec![id],
    })
}

fn update_node(document: &Document, id: EntityId, patch: &NodePatch) -> CoreResult<Change> {
    let index = document.node_index(id).ok_or(CoreError::NodeNotFound(id))?;
    let before = document.nodes()[index].clone();
    let after = patch.applied_to(&before);
    if after == before {
        return Err(CoreError::InvalidOperation(format!(
            "patch leaves node {id} unchanged"
        )));
    }

    let mut next = document.clone();
    next.nodes_mut()[index] = after.clone();

    Ok(Change {
        document: next,
        diff: DiffRecord::update(id, Fragment::node(index, before), Fragment::node(index, after)),
        created: Vec::new(),
    })
}

fn update_metadata(document: &Document, patch: &MetadataPatch) -> CoreResult<Change> {
    let before = document.metadata().clone();
    let after = patch.applied_to(&before);
    if after == before {
        return Err(CoreError::InvalidOperation(
            "patch leaves the metadata unchanged".to_string(),
        ));
    }

    let mut next = document.clone();
    *next.metadata_mut() = after.clone();

    Ok(Change {
        document: next,
        diff: DiffRecord::update(
            EntityId::DOCUMENT,
            Fragment::metadata(before),
            Fragment::metadata(after),
        ),
        created: Vec::new(),
    })
}

fn delete_node(document: &Document, id: EntityId) -> CoreResult<Change> {
    let index = document.node_index(id).ok_or(CoreError::NodeNotFound(id))?;

    let attached: Vec<Placed<Relation>> = document
        .relations()
        .iter()
        .enumerate()
        .filter(|(_, r)| r.touches(id))
        .map(|(i, r)| Placed::new(i, r.clone()))
        .collect();

    let mut next = document.clone();
    let node = next.nodes_mut().remove(index);
    next.relations_mut().retain(|r| !r.touches(id));

    tracing::debug!(node = %id.short(), relations = attached.len(), "cascading delete");
    let before = Fragment::new(vec![Placed::new(index, node)], attached);
    Ok(Change {
        document: next,
        diff: DiffRecord::delete(id, before),
        created: Vec::new(),
    })
}

fn connect(document: &Document, relation: Relation) -> CoreResult<Change> {
    if document.contains(relation.id) {
        return Err(CoreError::DuplicateId(relation.id));
    }

    let source = document
        .node(relation.source)
        .ok_or(CoreError::NodeNotFound(relation.source))?;
    let target = document
        .node(relation.target)
        .ok_or(CoreError::NodeNotFound(relation.target))?;

    if !source.has_output(&relation.source_port) {
        return Err(CoreError::UnknownPort {
            node: source.id,
            port: relation.source_port.clone(),
            direction: "output",
        });
    }
    if !target.has_input(&relation.target_port) {
        return Err(CoreError::UnknownPort {
            node: target.id,
            port: relation.target_port.clone(),
            direction: "input",
        });
    }

    if let Some(existing) = document
        .relations()
        .iter()
        .find(|r| r.same_endpoints(&relation))
    {
        return Err(CoreError::DuplicateRelation(existing.id));
    }

    let id = relation.id;
    let index = document.relations().len();
    let mut next = document.clone();
    next.relations_mut().push(relation.clone());

    Ok(Change {
        document: next,
        diff: DiffRecord::add(id, Fragment::relation(index, relation)),
        created: vec![id],
    })
}

fn disconnect(document: &Document, id: EntityId) -> CoreResult<Change> {
    let index = document
        .relations()
        .iter()
        .position(|r| r.id == id)
        .ok_or(CoreError::RelationNotFound(id))?;

    let mut next = document.clone();
    let relation = next.relations_mut().remove(index);

    Ok(Change {
        document: next,
        diff: DiffRecord::delete(id, Fragment::relation(index, relation)),
        created: Vec::new(),
    })
}

/// Inserts clipboard contents with every ID replaced.
///
/// A relation survives only if both of its endpoints were pasted with it
/// (and their ports still exist); anything else would dangle.
fn paste(document: &Document, clipboard: &Clipboard, offset: Position) -> CoreResult<Change> {
    if clipboard.is_empty() {
        return Err(CoreError::EmptyClipboard);
    }

    let mut remap: HashMap<EntityId, usize> = HashMap::new();
    let nodes: Vec<Node> = clipboard
        .nodes
        .iter()
        .enumerate()
        .map(|(i, node)| {
            remap.insert(node.id, i);
            Node {
                id: EntityId::new(),
                position: node.position.offset(offset),
                ..node.clone()
            }
        })
        .collect();

    let relations: Vec<Relation> = clipboard
        .relations
        .iter()
        .filter_map(|relation| {
            let source = &nodes[*remap.get(&relation.source)?];
            let target = &nodes[*remap.get(&relation.target)?];
            let valid = source.has_output(&relation.source_port)
                && target.has_input(&relation.target_port);
            valid.then(|| Relation {
                id: EntityId::new(),
                source: source.id,
                target: target.id,
                ..relation.clone()
            })
        })
        .collect();

    let dropped = clipboard.relations.len() - relations.len();
    if dropped > 0 {
        tracing::debug!(dropped, "paste dropped relations leaving the copied set");
    }

    let node_base = document.nodes().len();
    let relation_base = document.relations().len();
    let created: Vec<EntityId> = nodes
        .iter()
        .map(|n| n.id)
        .chain(relations.iter().map(|r| r.id))
        .collect();

    let mut next = document.clone();
    next.nodes_mut().extend(nodes.iter().cloned());
    next.relations_mut().extend(relations.iter().cloned());

    let after = Fragment::new(
        nodes
            .into_iter()
            .enumerate()
            .map(|(i, n)| Placed::new(node_base + i, n))
            .collect(),
        relations
            .into_iter()
            .enumerate()
            .map(|(i, r)| Placed::new(relation_base + i, r))
            .collect(),
    );

    Ok(Change {
        document: next,
        diff: DiffRecord::add(created[0], after),
        created,
    })
}

fn reorder(document: &Document, id: EntityId, index: usize) -> CoreResult<Change> {
    let from = document.node_index(id).ok_or(CoreError::NodeNotFound(id))?;
    let len = document.nodes().len();
    if index >= len {
        return Err(CoreError::InvalidOperation(format!(
            "index {index} is out of range for {len} nodes"
        )));
    }
    if index == from {
        return Err(CoreError::InvalidOperation(format!(
            "node {id} is already at index {index}"
        )));
    }

    let mut next = document.clone();
    let node = next.nodes_mut().remove(from);
    next.nodes_mut().insert(index, node);

    Ok(Change {
        document: next,
        diff: DiffRecord::moved(id, from, index),
        created: Vec::new(),
    })
}
