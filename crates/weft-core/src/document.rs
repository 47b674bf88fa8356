//! The workflow document: nodes, their ports, and the relations between them.
//!
//! ## Learning: Type Aliases and Newtypes
//!
//! `EntityId` is a newtype wrapper around `Uuid`. This provides:
//! - Type safety: Can't accidentally use a port name as an entity ID
//! - Encapsulation: Can change the underlying type without breaking APIs
//! - Documentation: The type name explains its purpose
//!
//! ## Plain Data Only
//!
//! Everything in here is owned data: no `Rc`, no callbacks, no handles.
//! That makes `Clone` a true deep copy, which is what lets the history store
//! copies of the document without aliasing the live one.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use weft_history::{CloneError, PlainData};

use crate::{CoreError, CoreResult};

/// Unique identifier for a node or relation.
///
/// Assigned at creation and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(Uuid);

impl EntityId {
    /// The document itself, as the subject of metadata edits.
    pub const DOCUMENT: EntityId = EntityId(Uuid::nil());

    /// Creates a new unique ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the first eight hex digits, for display.
    pub fn short(&self) -> String {
        let mut text = self.0.simple().to_string();
        text.truncate(8);
        text
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A point on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    /// Creates a position.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns this position shifted by `offset`.
    pub fn offset(self, offset: Position) -> Self {
        Self::new(self.x + offset.x, self.y + offset.y)
    }
}

/// Width and height of a node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    /// Creates a size.
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// What a node does in the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Input,
    Agent,
    Condition,
    Output,
    Transform,
    Delay,
    Parallel,
    Merge,
}

impl NodeKind {
    /// All node kinds, in palette order.
    pub const ALL: [NodeKind; 8] = [
        NodeKind::Input,
        NodeKind::Agent,
        NodeKind::Condition,
        NodeKind::Output,
        NodeKind::Transform,
        NodeKind::Delay,
        NodeKind::Parallel,
        NodeKind::Merge,
    ];

    /// Returns the lowercase name used in documents and commands.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Input => "input",
            NodeKind::Agent => "agent",
            NodeKind::Condition => "condition",
            NodeKind::Output => "output",
            NodeKind::Transform => "transform",
            NodeKind::Delay => "delay",
            NodeKind::Parallel => "parallel",
            NodeKind::Merge => "merge",
        }
    }

    /// Returns the label a fresh node of this kind gets.
    pub fn default_label(&self) -> &'static str {
        match self {
            NodeKind::Input => "Input",
            NodeKind::Agent => "Agent",
            NodeKind::Condition => "Condition",
            NodeKind::Output => "Output",
            NodeKind::Transform => "Transform",
            NodeKind::Delay => "Delay",
            NodeKind::Parallel => "Parallel",
            NodeKind::Merge => "Merge",
        }
    }

    /// Returns the default footprint on the canvas.
    pub fn default_size(&self) -> Size {
        match self {
            NodeKind::Input | NodeKind::Output => Size::new(180.0, 100.0),
            NodeKind::Condition => Size::new(200.0, 120.0),
            NodeKind::Agent => Size::new(220.0, 140.0),
            NodeKind::Transform => Size::new(200.0, 130.0),
            NodeKind::Parallel | NodeKind::Merge => Size::new(180.0, 110.0),
            NodeKind::Delay => Size::new(200.0, 120.0),
        }
    }

    /// Returns the default input and output ports.
    pub fn default_ports(&self) -> (Vec<Port>, Vec<Port>) {
        let input = || vec![Port::input("input", "Input")];
        let output = || vec![Port::output("output", "Output")];

        match self {
            NodeKind::Input => (Vec::new(), output()),
            NodeKind::Output => (input(), Vec::new()),
            NodeKind::Condition => (
                input(),
                vec![Port::output("true", "True"), Port::output("false", "False")],
            ),
            NodeKind::Parallel => (
                input(),
                vec![
                    Port::output("success", "Success"),
                    Port::output("error", "Error"),
                ],
            ),
            NodeKind::Merge => (
                vec![Port::input("input1", "Input 1"), Port::input("input2", "Input 2")],
                output(),
            ),
            NodeKind::Agent | NodeKind::Transform | NodeKind::Delay => (input(), output()),
        }
    }

    /// Returns the kind-specific settings a fresh node starts with.
    pub fn default_properties(&self) -> Map<String, Value> {
        let value = match self {
            NodeKind::Input => json!({ "inputType": "text", "defaultValue": "", "required": true }),
            NodeKind::Agent => json!({
                "agentType": "llm",
                "model": "gpt-3.5-turbo",
                "prompt": "",
                "temperature": 0.7,
                "maxTokens": 1000
            }),
            NodeKind::Condition => json!({ "condition": "", "operator": "equals", "value": "" }),
            NodeKind::Output => json!({ "outputType": "json", "format": "", "target": "" }),
            NodeKind::Transform => json!({
                "transformation": "map",
                "script": "return input;",
                "language": "javascript"
            }),
            NodeKind::Delay => json!({ "duration": 1000, "unit": "ms" }),
            NodeKind::Parallel => json!({ "maxConcurrency": 3, "strategy": "all" }),
            NodeKind::Merge => json!({ "strategy": "waitAll", "timeout": 30000 }),
        };

        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        NodeKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lower)
            .ok_or_else(|| CoreError::InvalidOperation(format!("unknown node kind: {s}")))
    }
}

/// Which way data flows through a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    Input,
    Output,
}

/// A named connection point on a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    /// Port name, unique within its node and direction
    pub id: String,
    /// Input or output
    pub direction: PortDirection,
    /// Display label
    pub label: String,
}

impl Port {
    /// Creates an input port.
    pub fn input(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            direction: PortDirection::Input,
            label: label.into(),
        }
    }

    /// Creates an output port.
    pub fn output(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            direction: PortDirection::Output,
            label: label.into(),
        }
    }
}

/// A single workflow step on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Stable identifier
    pub id: EntityId,
    /// What the node does
    pub kind: NodeKind,
    /// Top-left corner on the canvas
    pub position: Position,
    /// Footprint on the canvas
    pub size: Size,
    /// Display label
    pub label: String,
    /// Optional longer description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Kind-specific settings
    #[serde(default)]
    pub properties: Map<String, Value>,
    /// Ports data flows in through
    #[serde(default)]
    pub inputs: Vec<Port>,
    /// Ports data flows out through
    #[serde(default)]
    pub outputs: Vec<Port>,
}

impl Node {
    /// Creates a node of `kind` at `position` with the kind's defaults.
    pub fn new(kind: NodeKind, position: Position) -> Self {
        let (inputs, outputs) = kind.default_ports();
        Self {
            id: EntityId::new(),
            kind,
            position,
            size: kind.default_size(),
            label: kind.default_label().to_string(),
            description: None,
            properties: kind.default_properties(),
            inputs,
            outputs,
        }
    }

    /// Returns true if the node has an output port named `port`.
    pub fn has_output(&self, port: &str) -> bool {
        self.outputs.iter().any(|p| p.id == port)
    }

    /// Returns true if the node has an input port named `port`.
    pub fn has_input(&self, port: &str) -> bool {
        self.inputs.iter().any(|p| p.id == port)
    }

    /// Returns true if the node lies entirely inside the rectangle.
    pub fn is_inside(&self, min: Position, max: Position) -> bool {
        self.position.x >= min.x
            && self.position.y >= min.y
            && self.position.x + self.size.width <= max.x
            && self.position.y + self.size.height <= max.y
    }
}

impl PlainData for Node {
    fn check_plain(&self) -> Result<(), CloneError> {
        let fields = [
            ("position.x", self.position.x),
            ("position.y", self.position.y),
            ("size.width", self.size.width),
            ("size.height", self.size.height),
        ];
        for (field, value) in fields {
            CloneError::check_finite(format_args!("node {} {field}", self.id.short()), value)?;
        }
        Ok(())
    }
}

/// How a relation is drawn and what outcome it represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    #[default]
    Default,
    Success,
    Error,
    ConditionTrue,
    ConditionFalse,
}

/// A directed link from one node's output port to another node's input port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Stable identifier
    pub id: EntityId,
    /// Node data flows out of
    pub source: EntityId,
    /// Output port on `source`
    pub source_port: String,
    /// Node data flows into
    pub target: EntityId,
    /// Input port on `target`
    pub target_port: String,
    /// Relation flavor
    #[serde(default)]
    pub kind: RelationKind,
    /// Optional label drawn on the link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Relation {
    /// Creates a default relation with a fresh ID.
    pub fn new(
        source: EntityId,
        source_port: impl Into<String>,
        target: EntityId,
        target_port: impl Into<String>,
    ) -> Self {
        Self {
            id: EntityId::new(),
            source,
            source_port: source_port.into(),
            target,
            target_port: target_port.into(),
            kind: RelationKind::Default,
            label: None,
        }
    }

    /// Returns true if either end of this relation is `node`.
    pub fn touches(&self, node: EntityId) -> bool {
        self.source == node || self.target == node
    }

    /// Returns true if both relations link the same ports of the same nodes.
    pub fn same_endpoints(&self, other: &Relation) -> bool {
        self.source == other.source
            && self.target == other.target
            && self.source_port == other.source_port
            && self.target_port == other.target_port
    }
}

impl PlainData for Relation {}

/// Descriptive information about a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub name: String,
    pub description: String,
    pub version: String,
    pub author: String,
    pub tags: Vec<String>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            name: "Untitled workflow".to_string(),
            description: String::new(),
            version: "1.0.0".to_string(),
            author: String::new(),
            tags: Vec::new(),
        }
    }
}

/// A workflow document.
///
/// Node order is drawing order (later nodes on top). Relation order is
/// creation order. Both orders are part of the document's value and are
/// restored exactly by undo.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    /// Descriptive information
    #[serde(default)]
    metadata: Metadata,

    /// All nodes, in drawing order
    #[serde(default)]
    nodes: Vec<Node>,

    /// All relations, in creation order
    #[serde(default)]
    relations: Vec<Relation>,
}

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty document with a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            metadata: Metadata {
                name: name.into(),
                ..Metadata::default()
            },
            ..Self::default()
        }
    }

    // ==================== Getters ====================

    /// Returns the document metadata.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Returns all nodes in drawing order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Returns all relations.
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Returns a node by ID.
    pub fn node(&self, id: EntityId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Returns a relation by ID.
    pub fn relation(&self, id: EntityId) -> Option<&Relation> {
        self.relations.iter().find(|r| r.id == id)
    }

    /// Returns the drawing-order index of a node.
    pub fn node_index(&self, id: EntityId) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    /// Returns the relations with `node` at either end.
    pub fn relations_of(&self, node: EntityId) -> impl Iterator<Item = &Relation> {
        self.relations.iter().filter(move |r| r.touches(node))
    }

    /// Returns true if any node or relation uses `id`.
    pub fn contains(&self, id: EntityId) -> bool {
        self.node(id).is_some() || self.relation(id).is_some()
    }

    /// Returns every ID (nodes and relations) that starts with `prefix`.
    pub fn ids_with_prefix(&self, prefix: &str) -> Vec<EntityId> {
        let prefix = prefix.to_ascii_lowercase();
        self.nodes
            .iter()
            .map(|n| n.id)
            .chain(self.relations.iter().map(|r| r.id))
            .filter(|id| id.to_string().starts_with(&prefix))
            .collect()
    }

    /// Returns true if the document has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ==================== Crate-internal editing ====================
    //
    // Operations and diff replay build new documents by cloning and then
    // editing the clone through these helpers. The live document is never
    // edited in place.

    pub(crate) fn nodes_mut(&mut self) -> &mut Vec<Node> {
        &mut self.nodes
    }

    pub(crate) fn relations_mut(&mut self) -> &mut Vec<Relation> {
        &mut self.relations
    }

    pub(crate) fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    // ==================== Serialization ====================

    /// Serializes the document to pretty-printed JSON.
    pub fn to_json(&self) -> CoreResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Parses a document from JSON and checks its structure.
    pub fn from_json(bytes: &[u8]) -> CoreResult<Self> {
        let document: Self = serde_json::from_slice(bytes)?;
        document.validate()?;
        Ok(document)
    }

    /// Checks that IDs are unique, relations point at existing nodes and
    /// ports, and all geometry is finite.
    pub fn validate(&self) -> CoreResult<()> {
        let mut seen = HashSet::new();
        for id in self.nodes.iter().map(|n| n.id).chain(self.relations.iter().map(|r| r.id)) {
            if !seen.insert(id) {
                return Err(CoreError::InvalidDocument(format!("duplicate id {id}")));
            }
        }

        for relation in &self.relations {
            let source = self.node(relation.source).ok_or_else(|| {
                CoreError::InvalidDocument(format!(
                    "relation {} has missing source {}",
                    relation.id, relation.source
                ))
            })?;
            let target = self.node(relation.target).ok_or_else(|| {
                CoreError::InvalidDocument(format!(
                    "relation {} has missing target {}",
                    relation.id, relation.target
                ))
            })?;
            if !source.has_output(&relation.source_port) || !target.has_input(&relation.target_port)
            {
                return Err(CoreError::InvalidDocument(format!(
                    "relation {} uses a port its nodes do not have",
                    relation.id
                )));
            }
        }

        self.check_plain()
            .map_err(|e| CoreError::InvalidDocument(e.to_string()))
    }
}

impl PlainData for Document {
    fn check_plain(&self) -> Result<(), CloneError> {
        self.nodes.check_plain()?;
        self.relations.check_plain()
    }
}
