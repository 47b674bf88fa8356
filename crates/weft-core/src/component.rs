//! Nested component trees: the page-layout document.
//!
//! A layout is a forest. Containers, rows and columns hold children;
//! text, buttons and images are leaves. [`ComponentTree`] implements
//! [`Diffable`], so both history stores run on it exactly as they run on
//! the workflow [`Document`](crate::Document).
//!
//! ## Learning: Recursive Search Over Owned Data
//!
//! Every lookup walks the tree depth-first. Mutable lookups hand back the
//! `&mut Vec<Component>` that holds a component, so insertion and removal
//! happen on the sibling list without a borrow on the parent kept alive.
//!
//! ```text
//! components ─┬─ Container ─┬─ Text
//! (roots)     │             └─ Row ─── Button
//!             └─ Image
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

use weft_history::{
    DiffKind, DiffRecord, Diffable, HistoryConfig, HistoryStats, HistoryStrategy, PlainData,
};

use crate::document::EntityId;
use crate::{CoreError, CoreResult};

/// The diff record type for component trees.
pub type ComponentDiff = DiffRecord<EntityId, ComponentSlot>;

/// What a component renders as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    Text,
    Button,
    Image,
    Container,
    Row,
    Column,
}

impl ComponentKind {
    /// All component kinds, in palette order.
    pub const ALL: [ComponentKind; 6] = [
        ComponentKind::Text,
        ComponentKind::Button,
        ComponentKind::Image,
        ComponentKind::Container,
        ComponentKind::Row,
        ComponentKind::Column,
    ];

    /// Returns the name used in layouts and commands.
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Text => "Text",
            ComponentKind::Button => "Button",
            ComponentKind::Image => "Image",
            ComponentKind::Container => "Container",
            ComponentKind::Row => "Row",
            ComponentKind::Column => "Column",
        }
    }

    /// Returns true if components of this kind may have children.
    pub fn holds_children(&self) -> bool {
        matches!(
            self,
            ComponentKind::Container | ComponentKind::Row | ComponentKind::Column
        )
    }

    /// Returns the props a fresh component of this kind starts with.
    pub fn default_props(&self) -> Map<String, Value> {
        let value = match self {
            ComponentKind::Text => json!({ "content": "Text", "fontSize": 14 }),
            ComponentKind::Button => json!({ "text": "Button", "type": "primary" }),
            ComponentKind::Image => json!({
                "src": "https://via.placeholder.com/150",
                "alt": "Image"
            }),
            ComponentKind::Container => json!({ "width": "100%", "height": "200px" }),
            ComponentKind::Row => json!({ "justify": "start", "align": "middle" }),
            ComponentKind::Column => json!({ "span": 12 }),
        };

        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComponentKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::InvalidOperation(format!("unknown component kind: {s}")))
    }
}

/// One node of a layout, with its subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Stable identifier
    pub id: EntityId,
    /// What the component renders as
    #[serde(rename = "type")]
    pub kind: ComponentKind,
    /// Kind-specific settings
    #[serde(default)]
    pub props: Map<String, Value>,
    /// Nested components, in render order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Component>,
}

impl Component {
    /// Creates a childless component of `kind` with the kind's defaults.
    pub fn new(kind: ComponentKind) -> Self {
        Self {
            id: EntityId::new(),
            kind,
            props: kind.default_props(),
            children: Vec::new(),
        }
    }

    /// Appends a child.
    pub fn with_child(mut self, child: Component) -> Self {
        self.children.push(child);
        self
    }

    /// Returns the number of components in this subtree, itself included.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Component::count).sum::<usize>()
    }

    /// Returns every ID in this subtree, depth-first.
    pub fn ids(&self) -> Vec<EntityId> {
        let mut ids = vec![self.id];
        for child in &self.children {
            ids.extend(child.ids());
        }
        ids
    }

    /// Returns a copy of this subtree where every component has a new ID.
    pub fn with_fresh_ids(&self) -> Self {
        Self {
            id: EntityId::new(),
            kind: self.kind,
            props: self.props.clone(),
            children: self.children.iter().map(Component::with_fresh_ids).collect(),
        }
    }

    /// Returns this component without its children.
    fn shallow(&self) -> Self {
        Self {
            id: self.id,
            kind: self.kind,
            props: self.props.clone(),
            children: Vec::new(),
        }
    }
}

/// A component together with where it sits in the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSlot {
    /// Parent component, or `None` for a root
    pub parent: Option<EntityId>,
    /// Index among its siblings
    pub index: usize,
    /// The component and its subtree
    pub component: Component,
}

impl PlainData for ComponentSlot {}

/// A layout: the root components and everything below them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComponentTree {
    /// Root components, in render order
    #[serde(default)]
    components: Vec<Component>,
}

impl PlainData for ComponentTree {}

impl ComponentTree {
    /// Creates an empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the root components.
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Returns the number of components at every depth.
    pub fn len(&self) -> usize {
        self.components.iter().map(Component::count).sum()
    }

    /// Returns true if the layout has no components.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Returns a component by ID, searching every depth.
    pub fn find(&self, id: EntityId) -> Option<&Component> {
        find_in(&self.components, id)
    }

    /// Returns true if any component uses `id`.
    pub fn contains(&self, id: EntityId) -> bool {
        self.find(id).is_some()
    }

    /// Returns the parent (or `None` for a root) and sibling index of a
    /// component.
    pub fn locate(&self, id: EntityId) -> Option<(Option<EntityId>, usize)> {
        locate_in(&self.components, None, id)
    }

    /// Parses a layout from JSON, rejecting duplicate IDs.
    pub fn from_json(bytes: &[u8]) -> CoreResult<Self> {
        let tree: Self = serde_json::from_slice(bytes)?;
        let mut seen = std::collections::HashSet::new();
        for id in tree.components.iter().flat_map(Component::ids) {
            if !seen.insert(id) {
                return Err(CoreError::InvalidDocument(format!("duplicate id {id}")));
            }
        }
        Ok(tree)
    }

    /// Serializes the layout to pretty-printed JSON.
    pub fn to_json(&self) -> CoreResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    // ==================== Replay helpers ====================

    fn find_mut(&mut self, id: EntityId) -> Option<&mut Component> {
        find_mut_in(&mut self.components, id)
    }

    fn siblings_mut(&mut self, parent: Option<EntityId>) -> Option<&mut Vec<Component>> {
        match parent {
            None => Some(&mut self.components),
            Some(parent) => self.find_mut(parent).map(|c| &mut c.children),
        }
    }

    /// Puts a slot's component back at its recorded place.
    fn insert(&mut self, slot: &ComponentSlot) {
        if let Some(siblings) = self.siblings_mut(slot.parent) {
            let index = slot.index.min(siblings.len());
            siblings.insert(index, slot.component.clone());
        }
    }

    /// Removes a component and its subtree.
    fn remove(&mut self, id: EntityId) -> Option<ComponentSlot> {
        let (parent, index) = self.locate(id)?;
        let component = self.siblings_mut(parent)?.remove(index);
        Some(ComponentSlot {
            parent,
            index,
            component,
        })
    }

    fn set_props(&mut self, id: EntityId, props: &Map<String, Value>) {
        if let Some(component) = self.find_mut(id) {
            component.props = props.clone();
        }
    }

    fn move_to(&mut self, id: EntityId, index: Option<usize>) {
        let (Some((parent, from)), Some(to)) = (self.locate(id), index) else {
            return;
        };
        if let Some(siblings) = self.siblings_mut(parent) {
            let component = siblings.remove(from);
            let to = to.min(siblings.len());
            siblings.insert(to, component);
        }
    }
}

fn find_in(components: &[Component], id: EntityId) -> Option<&Component> {
    components.iter().find_map(|c| {
        if c.id == id {
            Some(c)
        } else {
            find_in(&c.children, id)
        }
    })
}

fn find_mut_in(components: &mut [Component], id: EntityId) -> Option<&mut Component> {
    components.iter_mut().find_map(|c| {
        if c.id == id {
            Some(c)
        } else {
            find_mut_in(&mut c.children, id)
        }
    })
}

fn locate_in(
    components: &[Component],
    parent: Option<EntityId>,
    id: EntityId,
) -> Option<(Option<EntityId>, usize)> {
    components.iter().enumerate().find_map(|(index, c)| {
        if c.id == id {
            Some((parent, index))
        } else {
            locate_in(&c.children, Some(c.id), id)
        }
    })
}

impl Diffable for ComponentTree {
    type Key = EntityId;
    type Entity = ComponentSlot;

    fn apply(&self, diff: &ComponentDiff) -> Self {
        let mut next = self.clone();
        match diff.kind {
            DiffKind::Add => {
                if let Some(after) = &diff.after {
                    next.insert(after);
                }
            }
            DiffKind::Update => {
                if let Some(after) = &diff.after {
                    next.set_props(diff.entity_id, &after.component.props);
                }
            }
            DiffKind::Delete => {
                next.remove(diff.entity_id);
            }
            DiffKind::Move => next.move_to(diff.entity_id, diff.position),
        }
        next
    }

    fn revert(&self, diff: &ComponentDiff) -> Self {
        let mut next = self.clone();
        match diff.kind {
            DiffKind::Add => {
                next.remove(diff.entity_id);
            }
            DiffKind::Update => {
                if let Some(before) = &diff.before {
                    next.set_props(diff.entity_id, &before.component.props);
                }
            }
            DiffKind::Delete => {
                if let Some(before) = &diff.before {
                    next.insert(before);
                }
            }
            DiffKind::Move => next.move_to(diff.entity_id, diff.prior_position),
        }
        next
    }
}

// ==================== Operations ====================

/// One edit to a layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "args", rename_all = "snake_case")]
pub enum ComponentOperation {
    /// Append a component (with its subtree) under `parent`, or as a root
    Add {
        parent: Option<EntityId>,
        component: Component,
    },
    /// Merge props into a component; a JSON `null` removes the key
    Update {
        id: EntityId,
        props: Map<String, Value>,
    },
    /// Remove a component and everything below it
    Delete(EntityId),
    /// Move a component to another index among its siblings
    Move { id: EntityId, index: usize },
}

/// The outcome of a successful layout operation.
#[derive(Debug, Clone)]
pub struct ComponentChange {
    /// The layout after the operation
    pub tree: ComponentTree,
    /// The diff that turns the old layout into `tree`
    pub diff: ComponentDiff,
}

impl ComponentOperation {
    /// Returns a short name for logs and menus.
    pub fn name(&self) -> &'static str {
        match self {
            ComponentOperation::Add { .. } => "add component",
            ComponentOperation::Update { .. } => "update component",
            ComponentOperation::Delete(_) => "delete component",
            ComponentOperation::Move { .. } => "move component",
        }
    }

    /// Validates the operation against `tree` and computes the result.
    ///
    /// `tree` is never modified. On error nothing has happened.
    pub fn apply(&self, tree: &ComponentTree) -> CoreResult<ComponentChange> {
        match self {
            ComponentOperation::Add { parent, component } => add(tree, *parent, component),
            ComponentOperation::Update { id, props } => update(tree, *id, props),
            ComponentOperation::Delete(id) => delete(tree, *id),
            ComponentOperation::Move { id, index } => move_component(tree, *id, *index),
        }
    }
}

fn add(
    tree: &ComponentTree,
    parent: Option<EntityId>,
    component: &Component,
) -> CoreResult<ComponentChange> {
    let mut incoming = std::collections::HashSet::new();
    for id in component.ids() {
        if tree.contains(id) || !incoming.insert(id) {
            return Err(CoreError::DuplicateId(id));
        }
    }

    if let Some(parent) = parent {
        let holder = tree
            .find(parent)
            .ok_or(CoreError::ComponentNotFound(parent))?;
        if !holder.kind.holds_children() {
            return Err(CoreError::InvalidOperation(format!(
                "{} {parent} cannot hold children",
                holder.kind
            )));
        }
    }

    let mut next = tree.clone();
    let siblings = next
        .siblings_mut(parent)
        .ok_or_else(|| CoreError::InvalidOperation("parent vanished".to_string()))?;
    let index = siblings.len();
    siblings.push(component.clone());

    let slot = ComponentSlot {
        parent,
        index,
        component: component.clone(),
    };
    Ok(ComponentChange {
        tree: next,
        diff: DiffRecord::add(component.id, slot),
    })
}

fn update(
    tree: &ComponentTree,
    id: EntityId,
    props: &Map<String, Value>,
) -> CoreResult<ComponentChange> {
    let (parent, index) = tree.locate(id).ok_or(CoreError::ComponentNotFound(id))?;
    let before = tree
        .find(id)
        .ok_or(CoreError::ComponentNotFound(id))?
        .shallow();

    let mut after = before.clone();
    for (key, value) in props {
        if value.is_null() {
            after.props.remove(key);
        } else {
            after.props.insert(key.clone(), value.clone());
        }
    }
    if after == before {
        return Err(CoreError::InvalidOperation(format!(
            "props leave component {id} unchanged"
        )));
    }

    let mut next = tree.clone();
    next.set_props(id, &after.props);

    let slot = |component| ComponentSlot {
        parent,
        index,
        component,
    };
    Ok(ComponentChange {
        tree: next,
        diff: DiffRecord::update(id, slot(before), slot(after)),
    })
}

fn delete(tree: &ComponentTree, id: EntityId) -> CoreResult<ComponentChange> {
    let mut next = tree.clone();
    let slot = next.remove(id).ok_or(CoreError::ComponentNotFound(id))?;

    tracing::debug!(
        component = %id.short(),
        removed = slot.component.count(),
        "deleted component subtree"
    );
    Ok(ComponentChange {
        tree: next,
        diff: DiffRecord::delete(id, slot),
    })
}

fn move_component(tree: &ComponentTree, id: EntityId, index: usize) -> CoreResult<ComponentChange> {
    let (parent, from) = tree.locate(id).ok_or(CoreError::ComponentNotFound(id))?;

    let mut next = tree.clone();
    let siblings = next
        .siblings_mut(parent)
        .ok_or(CoreError::ComponentNotFound(id))?;
    let len = siblings.len();
    if index >= len {
        return Err(CoreError::InvalidOperation(format!(
            "index {index} is out of range for {len} siblings"
        )));
    }
    if index == from {
        return Err(CoreError::InvalidOperation(format!(
            "component {id} is already at index {index}"
        )));
    }

    let component = siblings.remove(from);
    siblings.insert(index, component);

    Ok(ComponentChange {
        tree: next,
        diff: DiffRecord::moved(id, from, index),
    })
}

// ==================== Editing session ====================

/// An editing session over a layout: the live tree, its history, the
/// selected component and a one-component clipboard.
#[derive(Debug)]
pub struct ComponentEditor {
    tree: ComponentTree,
    history: Box<dyn HistoryStrategy<ComponentTree>>,
    selected: Option<EntityId>,
    clipboard: Option<Component>,
}

impl ComponentEditor {
    /// Creates a session for `tree` with the history store `config` names.
    pub fn new(config: &HistoryConfig, tree: ComponentTree) -> CoreResult<Self> {
        let history = config.build(&tree)?;
        tracing::info!(
            strategy = %history.strategy(),
            components = tree.len(),
            "layout session started"
        );
        Ok(Self {
            tree,
            history,
            selected: None,
            clipboard: None,
        })
    }

    /// Returns the live layout.
    pub fn tree(&self) -> &ComponentTree {
        &self.tree
    }

    /// Returns the selected component, if any.
    pub fn selected(&self) -> Option<EntityId> {
        self.selected
    }

    /// Returns the copied component, if any.
    pub fn clipboard(&self) -> Option<&Component> {
        self.clipboard.as_ref()
    }

    /// Applies one operation and records it in history.
    ///
    /// A selection pointing into a deleted subtree is cleared. On error the
    /// layout, history and selection are unchanged.
    pub fn apply(&mut self, operation: ComponentOperation) -> CoreResult<&ComponentTree> {
        let change = operation.apply(&self.tree)?;
        self.history.record(&change.tree, change.diff)?;
        self.tree = change.tree;
        self.drop_stale_selection();

        tracing::debug!(operation = operation.name(), "applied");
        Ok(&self.tree)
    }

    /// Adds a fresh component of `kind` and returns its ID.
    pub fn add(&mut self, parent: Option<EntityId>, kind: ComponentKind) -> CoreResult<EntityId> {
        let component = Component::new(kind);
        let id = component.id;
        self.apply(ComponentOperation::Add { parent, component })?;
        Ok(id)
    }

    /// Selects a component, or clears the selection with `None`.
    pub fn select(&mut self, id: Option<EntityId>) -> CoreResult<()> {
        if let Some(id) = id {
            if !self.tree.contains(id) {
                return Err(CoreError::ComponentNotFound(id));
            }
        }
        self.selected = id;
        Ok(())
    }

    /// Copies a component and its subtree to the clipboard.
    pub fn copy(&mut self, id: EntityId) -> CoreResult<()> {
        let component = self.tree.find(id).ok_or(CoreError::ComponentNotFound(id))?;
        self.clipboard = Some(component.clone());
        Ok(())
    }

    /// Pastes the clipboard under `parent` with fresh IDs and returns the
    /// new root's ID.
    pub fn paste(&mut self, parent: Option<EntityId>) -> CoreResult<EntityId> {
        let component = self
            .clipboard
            .as_ref()
            .ok_or(CoreError::EmptyClipboard)?
            .with_fresh_ids();
        let id = component.id;
        self.apply(ComponentOperation::Add { parent, component })?;
        Ok(id)
    }

    /// Steps back one edit. Returns false if there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        self.step(true)
    }

    /// Steps forward one edit. Returns false if there is nothing to redo.
    pub fn redo(&mut self) -> bool {
        self.step(false)
    }

    /// Returns true if there is anything to undo.
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Returns true if there is anything to redo.
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Forgets every undo and redo step, keeping the live layout.
    pub fn clear_history(&mut self) -> CoreResult<()> {
        self.history.reset(&self.tree)?;
        tracing::info!("layout history cleared");
        Ok(())
    }

    /// Returns counters describing the history store.
    pub fn history_stats(&self) -> HistoryStats {
        self.history.stats()
    }

    /// Steps until the layout changes, skipping hybrid boundary crossings.
    fn step(&mut self, back: bool) -> bool {
        loop {
            let next = if back {
                self.history.undo(&self.tree)
            } else {
                self.history.redo(&self.tree)
            };
            let Some(tree) = next else {
                return false;
            };
            if tree == self.tree {
                continue;
            }
            self.tree = tree;
            self.history.settle();
            self.drop_stale_selection();
            return true;
        }
    }

    fn drop_stale_selection(&mut self) {
        if self.selected.is_some_and(|id| !self.tree.contains(id)) {
            self.selected = None;
        }
    }
}
