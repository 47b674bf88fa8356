//! # Weft - A Workflow Graph Editor Engine
//!
//! Drives an editing session from the command line: every line read from
//! stdin is one command, and every edit can be undone.
//!
//! ## Quick Start
//!
//! ```bash
//! # Start with an empty workflow
//! cargo run
//!
//! # Open a saved workflow with the hybrid history store
//! cargo run -- flow.json --strategy hybrid
//!
//! # Replay a script
//! cargo run -- flow.json < edits.txt
//! ```

mod script;

use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use anyhow::Context;
use weft_core::{CommandRegistry, Config, Document, Editor, Strategy};

use script::{Action, Flow, Session};

/// Weft - edit workflow graphs with bounded undo/redo
#[derive(Parser, Debug)]
#[command(name = "weft")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Workflow document to open (JSON)
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Config file to use instead of the default location
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// History store: snapshot or hybrid
    #[arg(short, long, value_name = "STRATEGY")]
    strategy: Option<Strategy>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    let log_level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(io::stderr),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    tracing::info!("Starting Weft v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args)?;
    let document = open_document(args.file.as_ref())?;
    let editor = Editor::with_config(config, document)?;
    tracing::info!(strategy = %editor.strategy(), "session ready");

    let stdout = io::stdout();
    let mut session = Session::new(editor, CommandRegistry::new(), stdout.lock());

    for line in io::stdin().lock().lines() {
        let line = line.context("failed to read stdin")?;
        let action = match Action::parse(&line) {
            Ok(Some(action)) => action,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("error: {e:#}");
                continue;
            }
        };
        match session.run(action) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(e) => eprintln!("error: {e:#}"),
        }
    }

    session.into_output().flush()?;
    Ok(())
}

/// Loads the config file, then applies command line overrides.
fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::load(),
    };
    if let Some(strategy) = args.strategy {
        config.history.strategy = strategy;
    }
    Ok(config)
}

/// Opens `file` if it exists; otherwise starts an empty document named
/// after it.
fn open_document(file: Option<&PathBuf>) -> anyhow::Result<Document> {
    let Some(path) = file else {
        return Ok(Document::new());
    };

    if path.exists() {
        let bytes =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let document = Editor::deserialize(&bytes)
            .with_context(|| format!("failed to open {}", path.display()))?;
        tracing::info!(path = %path.display(), nodes = document.nodes().len(), "opened");
        return Ok(document);
    }

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Untitled".to_string());
    tracing::info!(path = %path.display(), "new document");
    Ok(Document::named(name))
}
