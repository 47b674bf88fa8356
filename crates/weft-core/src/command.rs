//! Command system for editor actions.
//!
//! ## Learning: The Command Pattern
//!
//! Commands encapsulate actions as values:
//! - Actions become first-class values
//! - Can be stored, queued, bound to keys or menu entries
//!
//! Shortcut handlers and menus build a [`Command`] and hand it to the
//! [`CommandRegistry`]; they never call into history directly.
//!
//! ## Trait Objects vs Enums
//!
//! We use an enum for built-in commands (exhaustive, no allocation)
//! and trait objects for custom commands (extensible, heap allocated).

use std::collections::HashMap;

use crate::document::Position;
use crate::editor::Editor;
use crate::operation::Operation;
use crate::{CoreError, CoreResult};

/// Built-in editor commands.
///
/// With `#[non_exhaustive]`, we signal that new variants may be added.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Command {
    // History
    Undo,
    Redo,
    ClearHistory,

    // Clipboard
    Copy,
    Paste,
    /// Paste shifted by an explicit offset
    PasteAt(Position),

    // Selection
    SelectAll,
    ClearSelection,
    DeleteSelection,
    DuplicateSelection,

    /// Apply one document operation
    Apply(Operation),

    /// Custom command (name, arguments)
    Custom { name: String, args: Vec<String> },
}

impl Command {
    /// Returns the command's display name.
    pub fn display_name(&self) -> &str {
        match self {
            Command::Undo => "Undo",
            Command::Redo => "Redo",
            Command::ClearHistory => "Clear History",
            Command::Copy => "Copy",
            Command::Paste | Command::PasteAt(_) => "Paste",
            Command::SelectAll => "Select All",
            Command::ClearSelection => "Clear Selection",
            Command::DeleteSelection => "Delete Selection",
            Command::DuplicateSelection => "Duplicate Selection",
            Command::Apply(operation) => operation.name(),
            Command::Custom { name, .. } => name,
        }
    }
}

/// Context passed to command execution.
pub struct CommandContext<'a> {
    pub editor: &'a mut Editor,
}

/// Trait for custom command handlers.
///
/// ## Learning: Trait Objects
///
/// `dyn CommandHandler` allows storing different types that
/// implement this trait in the same collection. The `Send + Sync`
/// bounds ensure thread safety.
pub trait CommandHandler: Send + Sync {
    /// Returns the command name.
    fn name(&self) -> &str;

    /// Executes the command.
    fn execute(&self, ctx: &mut CommandContext, args: &[String]) -> CoreResult<()>;

    /// Returns a description for the command palette.
    fn description(&self) -> &str {
        self.name()
    }
}

/// Registry for commands.
///
/// ## Learning: Type Erasure
///
/// `Box<dyn CommandHandler>` erases the concrete type, allowing
/// different handler types in the same HashMap. The vtable (virtual
/// table) enables dynamic dispatch.
pub struct CommandRegistry {
    /// Custom command handlers
    handlers: HashMap<String, Box<dyn CommandHandler>>,
}

impl CommandRegistry {
    /// Creates a new registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers a custom command handler.
    pub fn register(&mut self, handler: Box<dyn CommandHandler>) {
        let name = handler.name().to_string();
        self.handlers.insert(name, handler);
    }

    /// Executes a command.
    ///
    /// Undo and redo with nothing to step over succeed quietly; the UI is
    /// expected to grey them out through `can_undo`/`can_redo`.
    pub fn execute(&self, cmd: &Command, editor: &mut Editor) -> CoreResult<()> {
        let mut ctx = CommandContext { editor };

        match cmd {
            Command::Undo => {
                ctx.editor.undo();
                Ok(())
            }
            Command::Redo => {
                ctx.editor.redo();
                Ok(())
            }
            Command::ClearHistory => ctx.editor.clear_history(),
            Command::Copy => ctx.editor.copy().map(|_| ()),
            Command::Paste => ctx.editor.paste().map(|_| ()),
            Command::PasteAt(offset) => ctx.editor.paste_at(*offset).map(|_| ()),
            Command::SelectAll => {
                ctx.editor.select_all();
                Ok(())
            }
            Command::ClearSelection => {
                ctx.editor.clear_selection();
                Ok(())
            }
            Command::DeleteSelection => ctx.editor.delete_selected().map(|_| ()),
            Command::DuplicateSelection => {
                let selected = ctx.editor.selection().nodes().to_vec();
                for id in selected {
                    ctx.editor.duplicate(id)?;
                }
                Ok(())
            }
            Command::Apply(operation) => ctx.editor.mutate(operation.clone()).map(|_| ()),
            Command::Custom { name, args } => {
                if let Some(handler) = self.handlers.get(name) {
                    handler.execute(&mut ctx, args)
                } else {
                    Err(CoreError::CommandNotFound(name.clone()))
                }
            }
        }
    }

    /// Returns all registered command names.
    pub fn list(&self) -> Vec<&str> {
        self.handlers.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::NodeKind;

    struct ResetHandler;

    impl CommandHandler for ResetHandler {
        fn name(&self) -> &str {
            "reset"
        }

        fn execute(&self, ctx: &mut CommandContext, _args: &[String]) -> CoreResult<()> {
            ctx.editor.load(crate::Document::named("fresh"))
        }
    }

    #[test]
    fn test_command_display_name() {
        assert_eq!(Command::Undo.display_name(), "Undo");
        assert_eq!(
            Command::Apply(Operation::DeleteNode(crate::EntityId::new())).display_name(),
            "delete node"
        );
        assert_eq!(
            Command::Custom {
                name: "my_cmd".to_string(),
                args: vec![]
            }
            .display_name(),
            "my_cmd"
        );
    }

    #[test]
    fn test_builtin_commands_drive_editor() {
        let registry = CommandRegistry::new();
        let mut editor = Editor::new();
        let id = editor
            .add_node(NodeKind::Agent, Some(Position::new(0.0, 0.0)))
            .unwrap();

        registry.execute(&Command::SelectAll, &mut editor).unwrap();
        registry.execute(&Command::DuplicateSelection, &mut editor).unwrap();
        assert_eq!(editor.document().nodes().len(), 2);

        registry.execute(&Command::Undo, &mut editor).unwrap();
        assert_eq!(editor.document().nodes().len(), 1);
        registry.execute(&Command::Redo, &mut editor).unwrap();
        assert_eq!(editor.document().nodes().len(), 2);

        registry
            .execute(&Command::Apply(Operation::DeleteNode(id)), &mut editor)
            .unwrap();
        assert!(editor.document().node(id).is_none());

        registry.execute(&Command::ClearHistory, &mut editor).unwrap();
        assert!(!editor.can_undo());
        assert_eq!(editor.document().nodes().len(), 1);
    }

    #[test]
    fn test_paste_at_offset() {
        let registry = CommandRegistry::new();
        let mut editor = Editor::new();
        editor
            .add_node(NodeKind::Input, Some(Position::new(0.0, 0.0)))
            .unwrap();

        registry.execute(&Command::SelectAll, &mut editor).unwrap();
        registry.execute(&Command::Copy, &mut editor).unwrap();
        registry
            .execute(&Command::PasteAt(Position::new(5.0, 7.0)), &mut editor)
            .unwrap();

        let pasted = editor.document().nodes().last().unwrap();
        assert_eq!(pasted.position, Position::new(5.0, 7.0));
        assert_eq!(Command::PasteAt(Position::default()).display_name(), "Paste");
    }

    #[test]
    fn test_custom_commands() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(ResetHandler));
        assert_eq!(registry.list(), vec!["reset"]);

        let mut editor = Editor::new();
        editor.add_node(NodeKind::Input, None).unwrap();

        let reset = Command::Custom {
            name: "reset".to_string(),
            args: Vec::new(),
        };
        registry.execute(&reset, &mut editor).unwrap();
        assert!(editor.document().is_empty());
        assert!(!editor.can_undo());

        let missing = Command::Custom {
            name: "nope".to_string(),
            args: Vec::new(),
        };
        assert!(matches!(
            registry.execute(&missing, &mut editor),
            Err(CoreError::CommandNotFound(_))
        ));
    }
}
