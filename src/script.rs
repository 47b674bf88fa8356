//! Line-oriented commands read by the `weft` binary.
//!
//! ## Learning: Parse, Then Resolve
//!
//! Parsing turns a line into an [`Action`] without looking at the
//! document. IDs stay as the text the user typed, because a short prefix
//! only means something against the document that exists when the action
//! runs. Resolution happens in [`Session::run`].
//!
//! Actions that have a [`Command`] counterpart are dispatched through the
//! session's [`CommandRegistry`], the same path a menu or key binding
//! takes.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};

use weft_core::{
    Command, CommandRegistry, Document, Editor, EntityId, MetadataPatch, NodeKind, NodePatch,
    Operation, Position,
};

/// One parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Add {
        kind: NodeKind,
        at: Option<Position>,
    },
    Label {
        id: String,
        text: String,
    },
    Move {
        id: String,
        to: Position,
    },
    /// Delete one node or relation, or the selection when no ID is given
    Delete(Option<String>),
    /// Duplicate one node, or every selected node when no ID is given
    Duplicate(Option<String>),
    Connect {
        source: String,
        source_port: String,
        target: String,
        target_port: String,
    },
    Disconnect(String),
    Raise {
        id: String,
        index: usize,
    },
    Select(Vec<String>),
    SelectAll,
    /// Rename the workflow
    Title(String),
    /// Run a command registered with the session
    Invoke {
        name: String,
        args: Vec<String>,
    },
    Copy,
    Paste(Option<Position>),
    Undo,
    Redo,
    ClearHistory,
    Show,
    Stats,
    Save(PathBuf),
    Quit,
}

impl Action {
    /// Parses one line.
    ///
    /// Returns `None` for blank lines and `#` comments.
    pub fn parse(line: &str) -> anyhow::Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let args: Vec<&str> = rest.split_whitespace().collect();

        let action = match (word, args.as_slice()) {
            ("add", [kind]) => Action::Add {
                kind: kind.parse()?,
                at: None,
            },
            ("add", [kind, x, y]) => Action::Add {
                kind: kind.parse()?,
                at: Some(position(x, y)?),
            },
            ("label", [id, ..]) => {
                let text = rest[id.len()..].trim();
                if text.is_empty() {
                    bail!("usage: label <id> <text>");
                }
                Action::Label {
                    id: id.to_string(),
                    text: text.to_string(),
                }
            }
            ("move", [id, x, y]) => Action::Move {
                id: id.to_string(),
                to: position(x, y)?,
            },
            ("delete", []) => Action::Delete(None),
            ("delete", [id]) => Action::Delete(Some(id.to_string())),
            ("dup", []) => Action::Duplicate(None),
            ("dup", [id]) => Action::Duplicate(Some(id.to_string())),
            ("connect", [source, source_port, target, target_port]) => Action::Connect {
                source: source.to_string(),
                source_port: source_port.to_string(),
                target: target.to_string(),
                target_port: target_port.to_string(),
            },
            ("disconnect", [id]) => Action::Disconnect(id.to_string()),
            ("raise", [id, index]) => Action::Raise {
                id: id.to_string(),
                index: index
                    .parse()
                    .with_context(|| format!("invalid index '{index}'"))?,
            },
            ("select", ["all"]) => Action::SelectAll,
            ("select", ids) => Action::Select(ids.iter().map(|s| s.to_string()).collect()),
            ("title", [_, ..]) => Action::Title(rest.to_string()),
            ("run", [name, args @ ..]) => Action::Invoke {
                name: name.to_string(),
                args: args.iter().map(|s| s.to_string()).collect(),
            },
            ("copy", []) => Action::Copy,
            ("paste", []) => Action::Paste(None),
            ("paste", [dx, dy]) => Action::Paste(Some(position(dx, dy)?)),
            ("undo", []) => Action::Undo,
            ("redo", []) => Action::Redo,
            ("clear-history", []) => Action::ClearHistory,
            ("show", []) => Action::Show,
            ("stats", []) => Action::Stats,
            ("save", [path]) => Action::Save(PathBuf::from(path)),
            ("quit" | "exit", []) => Action::Quit,
            _ => bail!("unknown command or wrong arguments: '{line}'"),
        };
        Ok(Some(action))
    }
}

fn position(x: &str, y: &str) -> anyhow::Result<Position> {
    let x: f64 = x.parse().with_context(|| format!("invalid coordinate '{x}'"))?;
    let y: f64 = y.parse().with_context(|| format!("invalid coordinate '{y}'"))?;
    Ok(Position::new(x, y))
}

/// Finds the single node or relation whose ID starts with `prefix`.
pub fn resolve(document: &Document, prefix: &str) -> anyhow::Result<EntityId> {
    match document.ids_with_prefix(prefix).as_slice() {
        [id] => Ok(*id),
        [] => Err(anyhow!("no node or relation matches '{prefix}'")),
        many => Err(anyhow!("'{prefix}' is ambiguous ({} matches)", many.len())),
    }
}

/// Whether the driver loop should keep reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// An editor, the commands it accepts, and the output stream results are
/// written to.
pub struct Session<W: Write> {
    pub editor: Editor,
    registry: CommandRegistry,
    out: W,
}

impl<W: Write> Session<W> {
    /// Creates a session around `editor`.
    ///
    /// Built-in commands always work; `registry` adds the custom ones.
    pub fn new(editor: Editor, registry: CommandRegistry, out: W) -> Self {
        Self {
            editor,
            registry,
            out,
        }
    }

    /// Runs one action against the editor.
    pub fn run(&mut self, action: Action) -> anyhow::Result<Flow> {
        match action {
            Action::Add { kind, at } => {
                let id = self.editor.add_node(kind, at)?;
                writeln!(self.out, "added {kind} {}", id.short())?;
            }
            Action::Label { id, text } => {
                let id = resolve(self.editor.document(), &id)?;
                let patch = NodePatch::default().with_label(text);
                self.apply(Operation::UpdateNode { id, patch })?;
            }
            Action::Move { id, to } => {
                let id = resolve(self.editor.document(), &id)?;
                let patch = NodePatch::default().with_position(to);
                self.apply(Operation::UpdateNode { id, patch })?;
            }
            Action::Delete(None) => {
                let (nodes, relations) = self.counts();
                self.execute(&Command::DeleteSelection)?;
                let (nodes_left, relations_left) = self.counts();
                writeln!(
                    self.out,
                    "deleted {} nodes {} relations",
                    nodes - nodes_left,
                    relations - relations_left
                )?;
            }
            Action::Delete(Some(id)) => {
                let id = resolve(self.editor.document(), &id)?;
                let operation = if self.editor.document().node(id).is_some() {
                    Operation::DeleteNode(id)
                } else {
                    Operation::Disconnect(id)
                };
                self.apply(operation)?;
            }
            Action::Duplicate(None) => {
                let (nodes, _) = self.counts();
                self.execute(&Command::DuplicateSelection)?;
                let duplicated = self.counts().0 - nodes;
                writeln!(self.out, "duplicated {duplicated}")?;
            }
            Action::Duplicate(Some(id)) => {
                let id = resolve(self.editor.document(), &id)?;
                let copy = self.editor.duplicate(id)?;
                writeln!(self.out, "duplicated as {}", copy.short())?;
            }
            Action::Connect {
                source,
                source_port,
                target,
                target_port,
            } => {
                let source = resolve(self.editor.document(), &source)?;
                let target = resolve(self.editor.document(), &target)?;
                let id = self
                    .editor
                    .connect(source, &source_port, target, &target_port)?;
                writeln!(self.out, "connected {}", id.short())?;
            }
            Action::Disconnect(id) => {
                let id = resolve(self.editor.document(), &id)?;
                self.apply(Operation::Disconnect(id))?;
            }
            Action::Raise { id, index } => {
                let id = resolve(self.editor.document(), &id)?;
                self.apply(Operation::Reorder { id, index })?;
            }
            Action::Title(name) => {
                self.apply(Operation::UpdateMetadata(MetadataPatch::default().with_name(name)))?;
            }
            Action::Select(ids) => {
                if ids.is_empty() {
                    self.execute(&Command::ClearSelection)?;
                }
                for (i, prefix) in ids.iter().enumerate() {
                    let id = resolve(self.editor.document(), prefix)?;
                    let multi = i > 0;
                    if self.editor.document().node(id).is_some() {
                        self.editor.select_node(id, multi)?;
                    } else {
                        self.editor.select_relation(id, multi)?;
                    }
                }
            }
            Action::SelectAll => self.execute(&Command::SelectAll)?,
            Action::Invoke { name, args } => self.execute(&Command::Custom { name, args })?,
            Action::Copy => {
                self.execute(&Command::Copy)?;
                let copied = self.editor.clipboard().map_or(0, |c| c.nodes.len());
                writeln!(self.out, "copied {copied}")?;
            }
            Action::Paste(offset) => {
                let (nodes, relations) = self.counts();
                let command = match offset {
                    Some(offset) => Command::PasteAt(offset),
                    None => Command::Paste,
                };
                self.execute(&command)?;
                let (nodes_now, relations_now) = self.counts();
                writeln!(self.out, "pasted {}", nodes_now + relations_now - nodes - relations)?;
            }
            Action::Undo => {
                if self.editor.can_undo() {
                    self.execute(&Command::Undo)?;
                } else {
                    writeln!(self.out, "nothing to undo")?;
                }
            }
            Action::Redo => {
                if self.editor.can_redo() {
                    self.execute(&Command::Redo)?;
                } else {
                    writeln!(self.out, "nothing to redo")?;
                }
            }
            Action::ClearHistory => {
                self.execute(&Command::ClearHistory)?;
                writeln!(self.out, "history cleared")?;
            }
            Action::Show => self.show()?,
            Action::Stats => {
                let stats = self.editor.history_stats();
                writeln!(
                    self.out,
                    "{}: undo {} redo {} snapshots {} diffs {}",
                    stats.strategy,
                    stats.undo_depth,
                    stats.redo_depth,
                    stats.snapshot_count,
                    stats.total_diffs
                )?;
            }
            Action::Save(path) => {
                let bytes = self.editor.serialize()?;
                std::fs::write(&path, bytes)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                writeln!(self.out, "saved {}", path.display())?;
            }
            Action::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    fn execute(&mut self, command: &Command) -> anyhow::Result<()> {
        tracing::debug!(command = command.display_name(), "executing");
        self.registry.execute(command, &mut self.editor)?;
        Ok(())
    }

    fn apply(&mut self, operation: Operation) -> anyhow::Result<()> {
        self.execute(&Command::Apply(operation))
    }

    /// Node and relation counts of the live document.
    fn counts(&self) -> (usize, usize) {
        let document = self.editor.document();
        (document.nodes().len(), document.relations().len())
    }

    fn show(&mut self) -> anyhow::Result<()> {
        let document = self.editor.document();
        let selection = self.editor.selection();
        writeln!(self.out, "{}", document.metadata().name)?;
        for node in document.nodes() {
            let mark = if selection.nodes().contains(&node.id) { '*' } else { ' ' };
            writeln!(
                self.out,
                "{mark} {} {:<10} {:<20} ({}, {})",
                node.id.short(),
                node.kind,
                node.label,
                node.position.x,
                node.position.y
            )?;
        }
        for relation in document.relations() {
            let mark = if selection.relations().contains(&relation.id) { '*' } else { ' ' };
            writeln!(
                self.out,
                "{mark} {} {}.{} -> {}.{}",
                relation.id.short(),
                relation.source.short(),
                relation.source_port,
                relation.target.short(),
                relation.target_port
            )?;
        }
        Ok(())
    }

    /// Consumes the session and returns the output stream.
    pub fn into_output(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::{CommandContext, CommandHandler, CoreResult};

    /// Adds one node of each kind named in its arguments.
    struct Scaffold;

    impl CommandHandler for Scaffold {
        fn name(&self) -> &str {
            "scaffold"
        }

        fn execute(&self, ctx: &mut CommandContext, args: &[String]) -> CoreResult<()> {
            for kind in args {
                ctx.editor.add_node(kind.parse()?, None)?;
            }
            Ok(())
        }
    }

    fn session() -> Session<Vec<u8>> {
        Session::new(Editor::new(), CommandRegistry::new(), Vec::new())
    }

    fn run(session: &mut Session<Vec<u8>>, line: &str) -> Flow {
        let action = Action::parse(line).unwrap().unwrap();
        session.run(action).unwrap()
    }

    #[test]
    fn test_parse_basic_commands() {
        assert_eq!(
            Action::parse("add agent 10 -20").unwrap(),
            Some(Action::Add {
                kind: NodeKind::Agent,
                at: Some(Position::new(10.0, -20.0)),
            })
        );
        assert_eq!(Action::parse("undo").unwrap(), Some(Action::Undo));
        assert_eq!(
            Action::parse("delete").unwrap(),
            Some(Action::Delete(None))
        );
        assert_eq!(
            Action::parse("paste 5 5").unwrap(),
            Some(Action::Paste(Some(Position::new(5.0, 5.0))))
        );
    }

    #[test]
    fn test_parse_label_keeps_spaces() {
        assert_eq!(
            Action::parse("label ab12 Fetch the   page").unwrap(),
            Some(Action::Label {
                id: "ab12".to_string(),
                text: "Fetch the   page".to_string(),
            })
        );
        assert!(Action::parse("label ab12").is_err());
    }

    #[test]
    fn test_parse_skips_blank_and_comments() {
        assert_eq!(Action::parse("   ").unwrap(), None);
        assert_eq!(Action::parse("# setup").unwrap(), None);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Action::parse("frobnicate").is_err());
        assert!(Action::parse("add spaceship").is_err());
        assert!(Action::parse("move a x 1").is_err());
        assert!(Action::parse("raise a -1").is_err());
    }

    #[test]
    fn test_resolve_prefix() {
        let mut editor = Editor::new();
        let id = editor.add_node(NodeKind::Input, None).unwrap();
        let full = id.to_string();

        assert_eq!(resolve(editor.document(), &full[..8]).unwrap(), id);
        assert!(resolve(editor.document(), "zzzz").is_err());
        // The empty prefix matches everything
        editor.add_node(NodeKind::Output, None).unwrap();
        assert!(resolve(editor.document(), "").is_err());
    }

    #[test]
    fn test_session_edits_and_undo() {
        let mut session = session();
        run(&mut session, "add input 0 0");
        run(&mut session, "add output 300 0");

        let ids: Vec<String> = session
            .editor
            .document()
            .nodes()
            .iter()
            .map(|n| n.id.to_string())
            .collect();
        run(
            &mut session,
            &format!("connect {} output {} input", ids[0], ids[1]),
        );
        run(&mut session, &format!("label {} Start here", ids[0]));
        assert_eq!(session.editor.document().relations().len(), 1);
        assert_eq!(session.editor.document().nodes()[0].label, "Start here");

        run(&mut session, "undo");
        run(&mut session, "undo");
        assert!(session.editor.document().relations().is_empty());
        run(&mut session, "redo");
        assert_eq!(session.editor.document().relations().len(), 1);

        assert_eq!(run(&mut session, "quit"), Flow::Quit);
    }

    #[test]
    fn test_session_copy_paste_and_stats() {
        let mut session = session();
        run(&mut session, "add agent 0 0");
        let id = session.editor.document().nodes()[0].id.to_string();

        run(&mut session, &format!("select {id}"));
        run(&mut session, "copy");
        run(&mut session, "paste 10 10");
        assert_eq!(session.editor.document().nodes().len(), 2);

        run(&mut session, "stats");
        run(&mut session, "undo");
        run(&mut session, "undo");
        run(&mut session, "undo");

        let output = String::from_utf8(session.into_output()).unwrap();
        assert!(output.contains("copied 1"));
        assert!(output.contains("pasted 1"));
        assert!(output.contains("snapshot: undo 2 redo 0"));
        assert!(output.contains("nothing to undo"));
    }

    #[test]
    fn test_parse_registry_actions() {
        assert_eq!(Action::parse("select all").unwrap(), Some(Action::SelectAll));
        assert_eq!(Action::parse("dup").unwrap(), Some(Action::Duplicate(None)));
        assert_eq!(
            Action::parse("clear-history").unwrap(),
            Some(Action::ClearHistory)
        );
        assert_eq!(
            Action::parse("title Support  triage").unwrap(),
            Some(Action::Title("Support  triage".to_string()))
        );
        assert_eq!(
            Action::parse("run scaffold input output").unwrap(),
            Some(Action::Invoke {
                name: "scaffold".to_string(),
                args: vec!["input".to_string(), "output".to_string()],
            })
        );
        assert!(Action::parse("title").is_err());
        assert!(Action::parse("run").is_err());
    }

    #[test]
    fn test_session_dispatches_through_registry() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(Scaffold));
        let mut session = Session::new(Editor::new(), registry, Vec::new());

        run(&mut session, "run scaffold input agent");
        assert_eq!(session.editor.document().nodes().len(), 2);

        run(&mut session, "select all");
        assert_eq!(session.editor.selection().nodes().len(), 2);
        run(&mut session, "dup");
        assert_eq!(session.editor.document().nodes().len(), 4);

        run(&mut session, "undo");
        assert_eq!(session.editor.document().nodes().len(), 3);

        let missing = Action::parse("run nope").unwrap().unwrap();
        assert!(session.run(missing).is_err());

        let output = String::from_utf8(session.into_output()).unwrap();
        assert!(output.contains("duplicated 2"));
    }

    #[test]
    fn test_session_title_and_clear_history() {
        let mut session = session();
        run(&mut session, "add input");
        run(&mut session, "title Nightly import");
        assert_eq!(session.editor.document().metadata().name, "Nightly import");

        run(&mut session, "clear-history");
        assert!(!session.editor.can_undo());
        run(&mut session, "undo");
        assert_eq!(session.editor.document().metadata().name, "Nightly import");
        assert_eq!(session.editor.document().nodes().len(), 1);

        let output = String::from_utf8(session.into_output()).unwrap();
        assert!(output.contains("history cleared"));
        assert!(output.contains("nothing to undo"));
    }

    #[test]
    fn test_session_delete_selection_reports_cascade() {
        let mut session = session();
        let a = session.editor.add_node(NodeKind::Input, None).unwrap();
        let b = session.editor.add_node(NodeKind::Output, None).unwrap();
        session.editor.connect(a, "output", b, "input").unwrap();

        run(&mut session, &format!("select {a}"));
        run(&mut session, "delete");
        assert_eq!(session.editor.document().nodes().len(), 1);

        let output = String::from_utf8(session.into_output()).unwrap();
        assert!(output.contains("deleted 1 nodes 1 relations"));
    }

    #[test]
    fn test_session_delete_relation_by_id() {
        let mut session = session();
        let a = session.editor.add_node(NodeKind::Input, None).unwrap();
        let b = session.editor.add_node(NodeKind::Output, None).unwrap();
        let link = session.editor.connect(a, "output", b, "input").unwrap();

        run(&mut session, &format!("delete {link}"));
        assert!(session.editor.document().relations().is_empty());
        assert_eq!(session.editor.document().nodes().len(), 2);
    }

    #[test]
    fn test_session_errors_do_not_stop() {
        let mut session = session();
        let action = Action::parse("dup deadbeef").unwrap().unwrap();
        assert!(session.run(action).is_err());
        assert_eq!(run(&mut session, "show"), Flow::Continue);
    }
}
