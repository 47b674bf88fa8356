//! # Weft Core
//!
//! The workflow document, the operations that edit it, and the editing
//! session that ties them to history.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                         Editor                            │
//! │  ┌───────────┐ ┌───────────┐ ┌───────────┐ ┌───────────┐ │
//! │  │ Selection │ │ Clipboard │ │  Config   │ │ EventBus  │ │
//! │  └───────────┘ └───────────┘ └───────────┘ └───────────┘ │
//! │        │                                                  │
//! │  ┌─────┴─────────┐  Operation::apply  ┌────────────────┐  │
//! │  │   Document    │ ─────────────────► │ Change + Diff  │  │
//! │  └───────────────┘                    └───────┬────────┘  │
//! │        ▲                                      │ record    │
//! │        │ undo / redo      ┌───────────────────▼────────┐  │
//! │        └───────────────── │  Box<dyn HistoryStrategy>  │  │
//! │                           └────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! [`ComponentTree`] is the second document shape: nested page layouts
//! edited through [`ComponentEditor`] on the same history stores.
//!
//! ## Learning: Module Organization
//!
//! Rust modules map to files:
//! - `mod foo;` looks for `foo.rs` or `foo/mod.rs`
//! - `pub use` re-exports items for cleaner public APIs

pub mod change;
pub mod clipboard;
pub mod command;
pub mod component;
pub mod config;
pub mod document;
pub mod editor;
pub mod event;
pub mod operation;
pub mod selection;

pub use change::{Diff, Fragment, Placed};
pub use clipboard::Clipboard;
pub use command::{Command, CommandContext, CommandHandler, CommandRegistry};
pub use component::{
    Component, ComponentChange, ComponentDiff, ComponentEditor, ComponentKind, ComponentOperation,
    ComponentSlot, ComponentTree,
};
pub use config::{Config, ConfigError, EditorConfig};
pub use document::{
    Document, EntityId, Metadata, Node, NodeKind, Port, PortDirection, Position, Relation,
    RelationKind, Size,
};
pub use editor::Editor;
pub use event::{EditorEvent, EventBus, EventHandler};
pub use operation::{Change, MetadataPatch, NodePatch, Operation, DUPLICATE_OFFSET};
pub use selection::Selection;

pub use weft_history::{HistoryConfig, HistoryStats, Strategy};

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations.
///
/// Every validation variant is raised before anything changes, so a failed
/// operation leaves the document and its history exactly as they were.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Node not found: {0}")]
    NodeNotFound(EntityId),

    #[error("Relation not found: {0}")]
    RelationNotFound(EntityId),

    #[error("Component not found: {0}")]
    ComponentNotFound(EntityId),

    #[error("Duplicate id: {0}")]
    DuplicateId(EntityId),

    #[error("Duplicate relation: {0} already links these ports")]
    DuplicateRelation(EntityId),

    #[error("Unknown port: node {node} has no {direction} port '{port}'")]
    UnknownPort {
        node: EntityId,
        port: String,
        direction: &'static str,
    },

    #[error("Clipboard is empty")]
    EmptyClipboard,

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("History error: {0}")]
    History(#[from] weft_history::HistoryError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl From<weft_history::CloneError> for CoreError {
    fn from(err: weft_history::CloneError) -> Self {
        CoreError::History(err.into())
    }
}
