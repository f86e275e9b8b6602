//! tsync - Browse mounted directory trees and run batch file operations.
//!
//! Usage:
//!   tsync ls [PATH]                  List a directory
//!   tsync tree [PATH]                Show a directory tree
//!   tsync mkdir PARENT NAME          Create a directory
//!   tsync touch PARENT NAME          Create an empty file
//!   tsync rename PATH NEW_NAME       Rename in place, with sidecars
//!   tsync cp SOURCES... TARGET       Copy into a directory
//!   tsync mv SOURCES... TARGET       Move into a directory
//!   tsync rm PATHS...                Delete
//!   tsync --help                     Show help

use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail, eyre};
use serde::Serialize;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use treesync_core::{
    FileSystem, FileTree, LocalFs, MountConfig, NodeId, NodeKind, SyncConfig,
};
use treesync_ops::{
    BatchEngine, BatchResult, Conflict, ConflictResolution, FileOperation, OperationEvent,
    OperationExecutor, OverwritePolicy,
};
use treesync_sync::SyncEngine;

#[derive(Parser)]
#[command(
    name = "tsync",
    version,
    about = "Browse mounted directory trees and run batch file operations",
    long_about = "tsync keeps a lazily loaded view of one or more mounted directories \
                  and runs move, copy and delete batches over them. Sidecar files \
                  (e.g. `report.aadl.prefs`) follow their primary file."
)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Mount a directory as NAME=PATH (repeatable; defaults to the current directory)
    #[arg(short, long = "mount", value_name = "NAME=PATH", global = true)]
    mounts: Vec<MountConfig>,

    /// Output format
    #[arg(short, long, default_value = "text", global = true)]
    format: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the entries of a directory
    Ls {
        /// Directory to list
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Show a directory tree
    Tree {
        /// Directory to show
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Maximum depth to display
        #[arg(short, long, default_value = "3")]
        depth: usize,
    },

    /// Create a directory
    Mkdir {
        /// Parent directory
        parent: PathBuf,
        /// Name of the new directory
        name: String,
    },

    /// Create an empty file
    Touch {
        /// Parent directory
        parent: PathBuf,
        /// Name of the new file
        name: String,
    },

    /// Rename an entry within its directory
    Rename {
        /// Entry to rename
        path: PathBuf,
        /// New name
        new_name: String,
    },

    /// Copy entries into a directory
    Cp {
        /// Sources followed by the target directory
        #[arg(required = true, num_args = 2..)]
        paths: Vec<PathBuf>,

        /// What to do when a name is taken
        #[arg(long, default_value = "ask")]
        conflict: ConflictMode,
    },

    /// Move entries into a directory
    Mv {
        /// Sources followed by the target directory
        #[arg(required = true, num_args = 2..)]
        paths: Vec<PathBuf>,

        /// What to do when a name is taken
        #[arg(long, default_value = "ask")]
        conflict: ConflictMode,
    },

    /// Delete entries
    Rm {
        /// Entries to delete
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Move to the trash instead of deleting permanently
        #[arg(short, long)]
        trash: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ConflictMode {
    /// Prompt for each conflict (skips when stdin is not a terminal)
    Ask,
    Skip,
    Overwrite,
    /// Keep both, naming the new entry "name (1).ext"
    Rename,
}

/// One listed entry, as printed by `ls`.
#[derive(Debug, Serialize)]
struct ListingEntry {
    name: String,
    path: PathBuf,
    kind: NodeKind,
    size: Option<u64>,
    modified: Option<DateTime<Local>>,
}

/// A subtree, as printed by `tree --format json`.
#[derive(Debug, Serialize)]
struct TreeEntry {
    name: String,
    kind: NodeKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<TreeEntry>,
}

/// Everything a command needs.
struct Session {
    config: SyncConfig,
    fs: Arc<dyn FileSystem>,
    sync: SyncEngine,
    tree: FileTree,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref(), cli.mounts)?;
    let fs: Arc<dyn FileSystem> = Arc::new(LocalFs::new());
    let sync = SyncEngine::from_config(fs.clone(), &config).context("Invalid configuration")?;
    let tree = FileTree::from_config(&config);
    let mut session = Session {
        config,
        fs,
        sync,
        tree,
    };

    match cli.command {
        Command::Ls { path } => run_ls(&mut session, &path, cli.format)?,
        Command::Tree { path, depth } => run_tree(&mut session, &path, depth, cli.format)?,
        Command::Mkdir { parent, name } => run_create(&mut session, &parent, &name, true)?,
        Command::Touch { parent, name } => run_create(&mut session, &parent, &name, false)?,
        Command::Rename { path, new_name } => {
            run_rename(&mut session, &path, &new_name, cli.format)?
        }
        Command::Cp { paths, conflict } => {
            let (sources, target) = split_target(paths)?;
            let operation = FileOperation::copy(sources, target);
            run_batch(&session, operation, conflict, cli.format).await?;
        }
        Command::Mv { paths, conflict } => {
            let (sources, target) = split_target(paths)?;
            let operation = FileOperation::move_to(sources, target);
            run_batch(&session, operation, conflict, cli.format).await?;
        }
        Command::Rm { paths, trash } => {
            let targets = paths.iter().map(|p| absolute(p)).collect::<Result<_>>()?;
            let use_trash = trash || session.config.use_trash;
            let operation = FileOperation::delete(targets, use_trash);
            run_batch(&session, operation, ConflictMode::Skip, cli.format).await?;
        }
    }

    Ok(())
}

/// Install the stderr log subscriber. `RUST_LOG` takes precedence over `-v`.
fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .compact()
        .init();
}

/// Load the config file, add `--mount` flags and fall back to the current
/// directory when nothing is mounted.
fn load_config(path: Option<&Path>, extra_mounts: Vec<MountConfig>) -> Result<SyncConfig> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            toml::from_str::<SyncConfig>(&text)
                .with_context(|| format!("Failed to parse config {}", path.display()))?
        }
        None => SyncConfig::new(Vec::new()),
    };
    config.mounts.extend(extra_mounts);

    if config.mounts.is_empty() {
        let cwd = std::env::current_dir().context("Cannot determine current directory")?;
        let name = cwd
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "root".to_string());
        config.mounts.push(MountConfig::new(name, cwd));
    }
    for mount in &mut config.mounts {
        mount.path = absolute(&mount.path)?;
    }

    config.validate().context("Invalid configuration")?;
    debug!(mounts = config.mounts.len(), "configuration loaded");
    Ok(config)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("Invalid path {}", path.display()))
}

fn split_target(mut paths: Vec<PathBuf>) -> Result<(Vec<PathBuf>, PathBuf)> {
    let target = paths.pop().ok_or_else(|| eyre!("Missing target directory"))?;
    let sources = paths.iter().map(|p| absolute(p)).collect::<Result<_>>()?;
    Ok((sources, absolute(&target)?))
}

/// Resolve a path to its node, loading every directory on the way.
fn resolve(session: &mut Session, path: &Path) -> Result<NodeId> {
    let path = absolute(path)?;
    session
        .sync
        .resolve_path(&mut session.tree, &path)?
        .and_then(|chain| chain.last().copied())
        .ok_or_else(|| eyre!("No such entry: {}", path.display()))
}

fn run_ls(session: &mut Session, path: &Path, format: OutputFormat) -> Result<()> {
    let dir = resolve(session, path)?;
    session.sync.refresh(&mut session.tree, dir)?;

    let entries: Vec<ListingEntry> = session
        .tree
        .child_nodes(dir)
        .map(|node| ListingEntry {
            name: node.name().to_string(),
            path: node.path().to_path_buf(),
            kind: node.kind(),
            size: node.is_file().then(|| session.fs.file_size(node.path())),
            modified: node.last_modified().map(DateTime::<Local>::from),
        })
        .collect();

    match format {
        OutputFormat::Text => {
            for entry in &entries {
                let marker = if entry.kind.is_dir() { "/" } else { "" };
                println!(
                    "{:<40} {:>10}  {}",
                    truncate(&format!("{}{marker}", entry.name), 40),
                    entry.size.map(format_size).unwrap_or_default(),
                    entry
                        .modified
                        .map(|m| m.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_default()
                );
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }
    Ok(())
}

fn run_tree(session: &mut Session, path: &Path, depth: usize, format: OutputFormat) -> Result<()> {
    let root = resolve(session, path)?;
    let entry = load_subtree(session, root, depth)?;

    match format {
        OutputFormat::Text => {
            println!("{}", session.tree.node(root)?.path().display());
            print_entries(&entry.children, 1);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }
    }
    Ok(())
}

fn load_subtree(session: &mut Session, id: NodeId, depth: usize) -> Result<TreeEntry> {
    let node = session.tree.node(id)?;
    let mut entry = TreeEntry {
        name: node.display_name().to_string(),
        kind: node.kind(),
        children: Vec::new(),
    };
    if depth == 0 || !node.is_dir() {
        return Ok(entry);
    }

    session.sync.refresh(&mut session.tree, id)?;
    let children = session.tree.children(id).to_vec();
    for child in children {
        entry.children.push(load_subtree(session, child, depth - 1)?);
    }
    Ok(entry)
}

fn print_entries(entries: &[TreeEntry], depth: usize) {
    let indent = "  ".repeat(depth);
    for entry in entries {
        let marker = if entry.kind.is_dir() { "/" } else { "" };
        println!("{indent}{}{marker}", entry.name);
        print_entries(&entry.children, depth + 1);
    }
}

fn run_create(session: &mut Session, parent: &Path, name: &str, directory: bool) -> Result<()> {
    let parent = resolve(session, parent)?;
    let id = if directory {
        session.sync.create_directory(&mut session.tree, parent, name)?
    } else {
        session.sync.create_file(&mut session.tree, parent, name)?
    };
    println!("{}", session.tree.node(id)?.path().display());
    Ok(())
}

fn run_rename(session: &mut Session, path: &Path, new_name: &str, format: OutputFormat) -> Result<()> {
    let id = resolve(session, path)?;
    let outcome = session.sync.rename(&mut session.tree, id, new_name)?;

    match format {
        OutputFormat::Text => {
            println!("{} -> {}", outcome.from.display(), outcome.to.display());
            for sidecar in &outcome.sidecars {
                println!("  sidecar {}", sidecar.display());
            }
            for warning in &outcome.warnings {
                eprintln!("warning: {}", warning.message);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }
    Ok(())
}

async fn run_batch(
    session: &Session,
    operation: FileOperation,
    conflict: ConflictMode,
    format: OutputFormat,
) -> Result<()> {
    let engine = BatchEngine::from_config(session.fs.clone(), &session.config)
        .context("Invalid configuration")?;
    let executor = OperationExecutor::new(Arc::new(engine)).with_policy(overwrite_policy(conflict));
    let operation_type = operation.operation_type();
    let items = operation.sources().len();
    let mut handle = executor.execute(operation);

    let token = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, finishing current item");
            token.cancel();
        }
    });

    let mut done = 0;
    let mut result: Option<BatchResult> = None;
    while let Some(event) = handle.recv().await {
        match event {
            OperationEvent::TotalKnown(files) => {
                eprintln!("{operation_type}: {items} items, {files} files");
            }
            OperationEvent::ItemStarted(path) => debug!(path = %path.display(), "item started"),
            OperationEvent::ItemDone { path, outcome } => {
                done += 1;
                eprintln!("[{done}/{items}] {:<14} {}", outcome.to_string(), path.display());
            }
            OperationEvent::FileCopied { path, bytes } => {
                debug!(path = %path.display(), bytes, "file copied");
            }
            OperationEvent::Complete(r) => result = Some(r),
            OperationEvent::Failed(err) => return Err(err.into()),
        }
    }
    let result = result.ok_or_else(|| eyre!("Operation ended without a result"))?;
    debug!(parents = ?result.affected_parents(), "directories changed");

    match format {
        OutputFormat::Text => print_batch(&result),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
    }

    if result.failed() > 0 {
        bail!("{} of {} items failed", result.failed(), result.items.len());
    }
    Ok(())
}

fn print_batch(result: &BatchResult) {
    println!("{}", result.summary());
    if result.bytes_processed() > 0 {
        println!("  {} transferred", format_size(result.bytes_processed()));
    }
    for (path, err) in result.failures() {
        println!("  failed  {}: {err}", path.display());
    }
    for warning in result.warnings() {
        println!("  warning {}: {}", warning.path.display(), warning.message);
    }
}

fn overwrite_policy(mode: ConflictMode) -> OverwritePolicy {
    match mode {
        ConflictMode::Skip => OverwritePolicy::Skip,
        ConflictMode::Overwrite => OverwritePolicy::Overwrite,
        ConflictMode::Rename => OverwritePolicy::ask(|_: &Conflict| ConflictResolution::AutoRename),
        ConflictMode::Ask if std::io::stdin().is_terminal() => OverwritePolicy::ask(prompt_conflict),
        ConflictMode::Ask => OverwritePolicy::Skip,
    }
}

/// Ask on the terminal how to handle a conflict.
fn prompt_conflict(conflict: &Conflict) -> ConflictResolution {
    let mut stderr = std::io::stderr();
    let _ = write!(
        stderr,
        "{}: {}. [o]verwrite, [s]kip, [r]ename, [O]verwrite all, [S]kip all, [a]bort? ",
        conflict.destination.display(),
        conflict.kind
    );
    let _ = stderr.flush();

    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return ConflictResolution::Abort;
    }
    match answer.trim() {
        "o" => ConflictResolution::Overwrite,
        "r" => ConflictResolution::AutoRename,
        "O" => ConflictResolution::OverwriteAll,
        "S" => ConflictResolution::SkipAll,
        "a" | "A" => ConflictResolution::Abort,
        _ => ConflictResolution::Skip,
    }
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Truncate a string to max length.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 1).collect();
        format!("{kept}…")
    }
}
