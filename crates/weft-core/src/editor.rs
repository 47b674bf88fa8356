//! The editing session.
//!
//! ## Learning: The Facade Pattern
//!
//! `Editor` acts as a facade, providing a simple interface to
//! complex subsystems. External code only needs to interact with
//! `Editor`, not with the history store, the selection or the clipboard.
//!
//! ## Mutation Flow
//!
//! ```text
//! Operation ──apply──► Change ──record──► history
//!                         │
//!                         └──────────────► live document
//! ```
//!
//! History is written first. If recording fails the new document is
//! dropped and the session is exactly as it was.

use weft_history::{HistoryStats, HistoryStrategy, SnapshotHistory, Strategy};

use crate::clipboard::Clipboard;
use crate::config::Config;
use crate::document::{Document, EntityId, Node, NodeKind, Position, Relation};
use crate::event::{EditorEvent, EventBus};
use crate::operation::Operation;
use crate::selection::Selection;
use crate::{CoreError, CoreResult};

/// One editing session: a live document and its undo history.
///
/// ## Ownership
///
/// The session owns everything it touches. There is no global state;
/// two editors never share a document or a history.
#[derive(Debug)]
pub struct Editor {
    /// The live document
    document: Document,

    /// Undo/redo store, chosen by configuration
    history: Box<dyn HistoryStrategy<Document>>,

    /// What the user is pointing at (not versioned)
    selection: Selection,

    /// Last copied nodes
    clipboard: Option<Clipboard>,

    /// Session configuration
    config: Config,

    /// Event bus for notifications
    event_bus: EventBus,
}

impl Editor {
    /// Creates an editor with an empty document and default settings.
    pub fn new() -> Self {
        let config = Config::default();
        let document = Document::new();
        let history = SnapshotHistory::new(document.clone(), config.history.max_history);
        let event_bus = EventBus::with_capacity(config.editor.event_capacity);

        Self {
            document,
            history: Box::new(history),
            selection: Selection::new(),
            clipboard: None,
            config,
            event_bus,
        }
    }

    /// Creates an editor for `document` with custom configuration.
    pub fn with_config(config: Config, document: Document) -> CoreResult<Self> {
        config.validate()?;
        document.validate()?;
        let history = config.history.build(&document)?;
        let event_bus = EventBus::with_capacity(config.editor.event_capacity);

        tracing::info!(
            strategy = %history.strategy(),
            nodes = document.nodes().len(),
            "editor session started"
        );

        Ok(Self {
            document,
            history,
            selection: Selection::new(),
            clipboard: None,
            config,
            event_bus,
        })
    }

    // ==================== Accessors ====================

    /// Returns the live document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Returns the current selection.
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Returns the clipboard contents, if anything was copied.
    pub fn clipboard(&self) -> Option<&Clipboard> {
        self.clipboard.as_ref()
    }

    /// Returns the session configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns which history store is in use.
    pub fn strategy(&self) -> Strategy {
        self.history.strategy()
    }

    // ==================== Mutation ====================

    /// Applies one operation and records it in history.
    ///
    /// Returns the new live document. On error the document, the history
    /// and the selection are all unchanged.
    pub fn mutate(&mut self, operation: Operation) -> CoreResult<&Document> {
        self.commit(&operation)?;
        Ok(&self.document)
    }

    /// Adds a fresh node of `kind` and returns its ID.
    pub fn add_node(&mut self, kind: NodeKind, position: Option<Position>) -> CoreResult<EntityId> {
        let position = position.unwrap_or(self.config.editor.default_position);
        let node = Node::new(kind, position);
        let id = node.id;
        self.commit(&Operation::AddNode(node))?;
        Ok(id)
    }

    /// Duplicates a node and returns the copy's ID.
    pub fn duplicate(&mut self, id: EntityId) -> CoreResult<EntityId> {
        let created = self.commit(&Operation::DuplicateNode(id))?;
        created
            .first()
            .copied()
            .ok_or_else(|| CoreError::InvalidOperation("duplicate created nothing".to_string()))
    }

    /// Connects an output port to an input port and returns the relation ID.
    pub fn connect(
        &mut self,
        source: EntityId,
        source_port: &str,
        target: EntityId,
        target_port: &str,
    ) -> CoreResult<EntityId> {
        let relation = Relation::new(source, source_port, target, target_port);
        let id = relation.id;
        self.commit(&Operation::Connect(relation))?;
        Ok(id)
    }

    /// Deletes every selected node, then every selected relation that is
    /// still present. Each deletion is its own undo step.
    ///
    /// Returns how many entities were deleted.
    pub fn delete_selected(&mut self) -> CoreResult<usize> {
        let nodes = self.selection.nodes().to_vec();
        let relations = self.selection.relations().to_vec();
        let mut deleted = 0;

        for id in nodes {
            self.commit(&Operation::DeleteNode(id))?;
            deleted += 1;
        }
        for id in relations {
            if self.document.relation(id).is_some() {
                self.commit(&Operation::Disconnect(id))?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    fn commit(&mut self, operation: &Operation) -> CoreResult<Vec<EntityId>> {
        let change = operation.apply(&self.document)?;
        let truncates = self.history.can_redo();

        self.history.record(&change.document, change.diff)?;
        self.document = change.document;

        tracing::debug!(operation = operation.name(), created = change.created.len(), "applied");
        if truncates {
            self.emit(EditorEvent::HistoryTruncated);
        }
        if self.selection.retain_existing(&self.document) {
            self.emit(EditorEvent::SelectionChanged);
        }
        self.emit(EditorEvent::DocumentChanged {
            operation: operation.name(),
        });

        Ok(change.created)
    }

    // ==================== History ====================

    /// Steps back one edit.
    ///
    /// Returns false (and changes nothing) if there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        if !self.step(Direction::Back) {
            tracing::debug!("nothing to undo");
            return false;
        }
        self.reset_selection();
        self.emit(EditorEvent::Undone);
        true
    }

    /// Steps forward one edit.
    ///
    /// Returns false (and changes nothing) if there is nothing to redo.
    pub fn redo(&mut self) -> bool {
        if !self.step(Direction::Forward) {
            tracing::debug!("nothing to redo");
            return false;
        }
        self.reset_selection();
        self.emit(EditorEvent::Redone);
        true
    }

    /// Moves through history until the document actually changes.
    ///
    /// A hybrid store spends one step on each snapshot boundary, and that
    /// step lands on the state the document is already in. Such steps are
    /// taken silently so every successful undo or redo is visible.
    fn step(&mut self, direction: Direction) -> bool {
        loop {
            let next = match direction {
                Direction::Back => self.history.undo(&self.document),
                Direction::Forward => self.history.redo(&self.document),
            };
            let Some(document) = next else {
                return false;
            };
            if document == self.document {
                tracing::trace!(?direction, "history step left the document unchanged");
                continue;
            }
            self.document = document;
            self.history.settle();
            return true;
        }
    }

    /// Returns true if there is anything to undo.
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Returns true if there is anything to redo.
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Forgets every undo and redo step, keeping the live document.
    ///
    /// The current document becomes the new history base.
    pub fn clear_history(&mut self) -> CoreResult<()> {
        self.history.reset(&self.document)?;
        tracing::info!(strategy = %self.history.strategy(), "history cleared");
        self.emit(EditorEvent::HistoryCleared);
        Ok(())
    }

    /// Returns counters describing the history store.
    pub fn history_stats(&self) -> HistoryStats {
        self.history.stats()
    }

    // ==================== Clipboard ====================

    /// Copies the selection to the clipboard.
    ///
    /// Returns how many nodes were copied.
    pub fn copy(&mut self) -> CoreResult<usize> {
        if self.selection.nodes().is_empty() {
            return Err(CoreError::InvalidOperation(
                "no nodes selected to copy".to_string(),
            ));
        }

        let clipboard = Clipboard::copy(&self.document, &self.selection);
        let (nodes, relations) = (clipboard.nodes.len(), clipboard.relations.len());
        self.clipboard = Some(clipboard);

        self.emit(EditorEvent::ClipboardChanged { nodes, relations });
        Ok(nodes)
    }

    /// Pastes the clipboard shifted by the configured paste offset.
    pub fn paste(&mut self) -> CoreResult<Vec<EntityId>> {
        self.paste_at(self.config.editor.paste_offset)
    }

    /// Pastes the clipboard shifted by `offset`.
    ///
    /// The pasted nodes become the selection. Returns every created ID.
    pub fn paste_at(&mut self, offset: Position) -> CoreResult<Vec<EntityId>> {
        let clipboard = self.clipboard.clone().ok_or(CoreError::EmptyClipboard)?;
        let created = self.commit(&Operation::Paste { clipboard, offset })?;

        let pasted: Vec<EntityId> = created
            .iter()
            .copied()
            .filter(|id| self.document.node(*id).is_some())
            .collect();
        self.selection.set_nodes(pasted);
        self.emit(EditorEvent::SelectionChanged);

        Ok(created)
    }

    // ==================== Selection ====================

    /// Selects a node; with `multi` toggles it instead.
    pub fn select_node(&mut self, id: EntityId, multi: bool) -> CoreResult<()> {
        if self.document.node(id).is_none() {
            return Err(CoreError::NodeNotFound(id));
        }
        self.selection.select_node(id, multi);
        self.emit(EditorEvent::SelectionChanged);
        Ok(())
    }

    /// Selects a relation; with `multi` toggles it instead.
    pub fn select_relation(&mut self, id: EntityId, multi: bool) -> CoreResult<()> {
        if self.document.relation(id).is_none() {
            return Err(CoreError::RelationNotFound(id));
        }
        self.selection.select_relation(id, multi);
        self.emit(EditorEvent::SelectionChanged);
        Ok(())
    }

    /// Selects everything.
    pub fn select_all(&mut self) {
        self.selection.select_all(&self.document);
        self.emit(EditorEvent::SelectionChanged);
    }

    /// Selects the nodes inside the rectangle spanned by two corners.
    pub fn select_area(&mut self, start: Position, end: Position) {
        self.selection.select_area(&self.document, start, end);
        self.emit(EditorEvent::SelectionChanged);
    }

    /// Deselects everything.
    pub fn clear_selection(&mut self) {
        self.reset_selection();
    }

    fn reset_selection(&mut self) {
        if !self.selection.is_empty() {
            self.selection.clear();
            self.emit(EditorEvent::SelectionChanged);
        }
    }

    // ==================== Persistence ====================

    /// Serializes the live document. History is not included.
    pub fn serialize(&self) -> CoreResult<Vec<u8>> {
        self.document.to_json()
    }

    /// Parses and validates a serialized document.
    pub fn deserialize(bytes: &[u8]) -> CoreResult<Document> {
        Document::from_json(bytes)
    }

    /// Replaces the live document and starts a fresh history.
    pub fn load(&mut self, document: Document) -> CoreResult<()> {
        document.validate()?;
        self.history.reset(&document)?;
        self.document = document;
        self.selection.clear();

        tracing::info!(
            name = %self.document.metadata().name,
            nodes = self.document.nodes().len(),
            "document loaded, history reset"
        );
        self.emit(EditorEvent::DocumentLoaded);
        Ok(())
    }

    /// Deserializes `bytes` and loads the result.
    pub fn open(&mut self, bytes: &[u8]) -> CoreResult<()> {
        let document = Self::deserialize(bytes)?;
        self.load(document)
    }

    // ==================== Events ====================

    /// Subscribes to editor events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<EditorEvent> {
        self.event_bus.subscribe()
    }

    fn emit(&self, event: EditorEvent) {
        self.event_bus.emit(event);
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Back,
    Forward,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventHandler;
    use crate::operation::NodePatch;
    use weft_history::HistoryConfig;

    fn editor(strategy: Strategy) -> Editor {
        let config = Config {
            history: HistoryConfig {
                strategy,
                max_diffs_per_snapshot: 2,
                ..HistoryConfig::default()
            },
            ..Config::default()
        };
        Editor::with_config(config, Document::new()).unwrap()
    }

    fn both() -> [Editor; 2] {
        [editor(Strategy::Snapshot), editor(Strategy::Hybrid)]
    }

    #[test]
    fn test_new_editor_is_empty() {
        let editor = Editor::new();
        assert!(editor.document().is_empty());
        assert!(!editor.can_undo());
        assert!(!editor.can_redo());
        assert_eq!(editor.strategy(), Strategy::Snapshot);
    }

    #[test]
    fn test_add_connect_undo_scenario() {
        for mut editor in both() {
            let a = editor.add_node(NodeKind::Input, None).unwrap();
            let b = editor.add_node(NodeKind::Output, None).unwrap();
            editor.connect(a, "output", b, "input").unwrap();

            assert!(editor.undo());
            assert!(editor.document().relations().is_empty());
            assert_eq!(editor.document().nodes().len(), 2);

            assert!(editor.undo());
            assert!(editor.document().node(b).is_none());
            assert!(editor.document().node(a).is_some());

            let c = editor.add_node(NodeKind::Agent, None).unwrap();
            assert!(!editor.can_redo());
            assert!(!editor.redo());
            assert!(editor.document().node(b).is_none());
            assert!(editor.document().node(c).is_some());
        }
    }

    #[test]
    fn test_failed_mutation_changes_nothing() {
        for mut editor in both() {
            let a = editor.add_node(NodeKind::Input, None).unwrap();
            let before = editor.document().clone();
            let stats = editor.history_stats();

            let err = editor.mutate(Operation::DeleteNode(EntityId::new()));
            assert!(matches!(err, Err(CoreError::NodeNotFound(_))));
            assert_eq!(editor.document(), &before);
            assert_eq!(editor.history_stats(), stats);

            editor.select_node(a, false).unwrap();
            assert!(editor.connect(a, "nope", a, "input").is_err());
            assert_eq!(editor.selection().nodes(), &[a]);
        }
    }

    #[test]
    fn test_clone_failure_aborts() {
        for mut editor in both() {
            editor.add_node(NodeKind::Input, None).unwrap();
            let before = editor.document().clone();

            let bad = Node::new(NodeKind::Delay, Position::new(f64::NAN, 0.0));
            let err = editor.mutate(Operation::AddNode(bad)).unwrap_err();
            assert!(matches!(err, CoreError::History(_)));
            assert_eq!(editor.document(), &before);

            assert!(editor.undo());
            assert!(editor.document().is_empty());
        }
    }

    #[test]
    fn test_undo_resets_selection() {
        for mut editor in both() {
            let a = editor.add_node(NodeKind::Agent, None).unwrap();
            editor
                .mutate(Operation::UpdateNode {
                    id: a,
                    patch: NodePatch::default().with_label("Planner"),
                })
                .unwrap();
            editor.select_node(a, false).unwrap();

            assert!(editor.undo());
            assert!(editor.selection().is_empty());
            assert_eq!(editor.document().node(a).unwrap().label, "Agent");

            assert!(editor.redo());
            assert_eq!(editor.document().node(a).unwrap().label, "Planner");
        }
    }

    #[test]
    fn test_copy_paste_selects_pasted_nodes() {
        for mut editor in both() {
            let a = editor.add_node(NodeKind::Input, None).unwrap();
            let b = editor.add_node(NodeKind::Output, None).unwrap();
            editor.connect(a, "output", b, "input").unwrap();

            assert!(matches!(editor.paste(), Err(CoreError::EmptyClipboard)));

            editor.select_all();
            assert_eq!(editor.copy().unwrap(), 2);
            let created = editor.paste().unwrap();

            assert_eq!(created.len(), 3);
            assert_eq!(editor.document().nodes().len(), 4);
            assert_eq!(editor.document().relations().len(), 2);
            assert_eq!(editor.selection().nodes(), &created[..2]);

            assert!(editor.undo());
            assert_eq!(editor.document().nodes().len(), 2);
        }
    }

    #[test]
    fn test_delete_selected() {
        for mut editor in both() {
            let a = editor.add_node(NodeKind::Input, None).unwrap();
            let b = editor.add_node(NodeKind::Agent, None).unwrap();
            editor.add_node(NodeKind::Output, None).unwrap();
            editor.connect(a, "output", b, "input").unwrap();

            editor.select_node(a, true).unwrap();
            editor.select_node(b, true).unwrap();
            assert_eq!(editor.delete_selected().unwrap(), 2);
            assert_eq!(editor.document().nodes().len(), 1);
            assert!(editor.selection().is_empty());

            assert!(editor.undo());
            assert!(editor.undo());
            assert_eq!(editor.document().nodes().len(), 3);
            assert_eq!(editor.document().relations().len(), 1);
        }
    }

    #[test]
    fn test_hybrid_boundary_steps_are_invisible() {
        let mut editor = editor(Strategy::Hybrid);
        let a = editor.add_node(NodeKind::Input, None).unwrap();
        let b = editor.add_node(NodeKind::Output, None).unwrap();
        assert_eq!(editor.history_stats().snapshot_count, 2);

        assert!(editor.undo());
        assert!(editor.document().node(b).is_none());
        assert!(editor.undo());
        assert!(editor.document().node(a).is_none());
        assert!(!editor.undo());

        assert!(editor.redo());
        assert!(editor.redo());
        assert_eq!(editor.document().nodes().len(), 2);
        assert!(!editor.can_redo());
    }

    #[test]
    fn test_stats_count_visible_undos() {
        for mut editor in both() {
            for kind in [NodeKind::Input, NodeKind::Agent, NodeKind::Output] {
                editor.add_node(kind, None).unwrap();
            }
            assert_eq!(editor.history_stats().undo_depth, 3);

            let mut undos = 0;
            while editor.undo() {
                undos += 1;
                assert_eq!(editor.history_stats().undo_depth, 3 - undos);
            }
            assert_eq!(undos, 3);
            assert_eq!(editor.history_stats().redo_depth, 3);
        }
    }

    #[test]
    fn test_clear_history_keeps_document() {
        for mut editor in both() {
            editor.add_node(NodeKind::Input, None).unwrap();
            editor.add_node(NodeKind::Agent, None).unwrap();
            editor.add_node(NodeKind::Output, None).unwrap();
            editor.undo();
            let current = editor.document().clone();
            let mut handler = EventHandler::new(editor.subscribe());

            editor.clear_history().unwrap();
            assert_eq!(editor.document(), &current);
            assert!(!editor.can_undo());
            assert!(!editor.can_redo());
            assert_eq!(editor.history_stats().snapshot_count, 1);
            assert_eq!(handler.drain(), vec![EditorEvent::HistoryCleared]);

            // Edits after the clear undo back to the cleared state only
            editor.add_node(NodeKind::Delay, None).unwrap();
            assert!(editor.undo());
            assert_eq!(editor.document(), &current);
            assert!(!editor.undo());
        }
    }

    #[test]
    fn test_metadata_edit_is_undoable() {
        for mut editor in both() {
            let patch = crate::operation::MetadataPatch::default().with_name("Intake");
            editor.mutate(Operation::UpdateMetadata(patch)).unwrap();
            assert_eq!(editor.document().metadata().name, "Intake");

            assert!(editor.undo());
            assert_eq!(editor.document().metadata().name, "Untitled workflow");
            assert!(editor.redo());
            assert_eq!(editor.document().metadata().name, "Intake");
        }
    }

    #[test]
    fn test_load_resets_history() {
        let mut editor = editor(Strategy::Hybrid);
        editor.add_node(NodeKind::Input, None).unwrap();
        let bytes = editor.serialize().unwrap();

        editor.add_node(NodeKind::Output, None).unwrap();
        editor.open(&bytes).unwrap();

        assert_eq!(editor.document().nodes().len(), 1);
        assert!(!editor.can_undo());
        assert!(!editor.can_redo());
    }

    #[test]
    fn test_events_follow_mutations() {
        let mut editor = Editor::new();
        let mut handler = EventHandler::new(editor.subscribe());

        let a = editor.add_node(NodeKind::Input, None).unwrap();
        editor.undo();
        editor.add_node(NodeKind::Output, None).unwrap();
        assert!(editor.document().node(a).is_none());

        assert_eq!(
            handler.drain(),
            vec![
                EditorEvent::DocumentChanged { operation: "add node" },
                EditorEvent::Undone,
                EditorEvent::HistoryTruncated,
                EditorEvent::DocumentChanged { operation: "add node" },
            ]
        );
    }

    #[test]
    fn test_truncation_event() {
        let mut editor = Editor::new();
        editor.add_node(NodeKind::Input, None).unwrap();
        editor.add_node(NodeKind::Output, None).unwrap();
        editor.undo();

        let mut handler = EventHandler::new(editor.subscribe());
        editor.add_node(NodeKind::Agent, None).unwrap();
        assert_eq!(handler.drain()[0], EditorEvent::HistoryTruncated);
    }
}
