//! restage - apply media restaging plans with an undoable journal.
//!
//! Usage:
//!   restage apply PLAN             Rename/move entries as the plan says
//!   restage apply PLAN --link DIR  Link entries into a library under DIR
//!   restage history                List recorded sessions
//!   restage show ID                Show the operations of one session
//!   restage undo [ID]              Undo a session (latest by default)
//!   restage cleanup [--days N]     Remove old session journals
//!   restage --help                 Show help

use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail, eyre};
use tracing_subscriber::EnvFilter;

use restage_core::{Config, JournalConfig, MediaTree};
use restage_ops::{
    EngineOptions, Journal, Mode, Operation, OperationEngine, OsFileSystem, QueueBuilder, Session,
    UndoEngine, planned_destination,
};

/// Environment variable holding a tracing filter directive.
const LOG_ENV: &str = "RESTAGE_LOG";

#[derive(Parser)]
#[command(
    name = "restage",
    version,
    about = "Apply media restaging plans with an undoable journal",
    long_about = "restage executes a plan (an annotated media tree in JSON) by renaming, \
                  moving or linking files, records every change in a session journal, \
                  and can undo a recorded session later."
)]
struct Cli {
    /// Settings file (defaults to the per-user config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding session journals (overrides the settings file)
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a plan
    Apply {
        /// Plan file (JSON media tree)
        plan: PathBuf,

        /// Link into a library rooted here instead of renaming in place
        #[arg(short, long, value_name = "ROOT")]
        link: Option<PathBuf>,

        /// Print the operation queue without touching anything
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Write the updated tree (statuses, new paths) to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List recorded sessions, most recent first
    History {
        /// Maximum number of sessions to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the operations of one session
    Show {
        /// Session id
        id: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Undo a recorded session
    Undo {
        /// Session id (defaults to the most recent session)
        id: Option<String>,

        /// Print what would be undone without touching anything
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Remove session journals older than the retention period
    Cleanup {
        /// Age in days (defaults to the configured retention)
        #[arg(short, long)]
        days: Option<u32>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let journal_config = journal_config(cli.config.as_deref(), cli.log_dir)?;

    match cli.command {
        Command::Apply {
            plan,
            link,
            dry_run,
            output,
        } => run_apply(journal_config, &plan, link, dry_run, output)?,
        Command::History { limit, format } => run_history(journal_config, limit, format)?,
        Command::Show { id, format } => run_show(journal_config, &id, format)?,
        Command::Undo { id, dry_run } => run_undo(journal_config, id.as_deref(), dry_run)?,
        Command::Cleanup { days } => run_cleanup(journal_config, days)?,
    }

    Ok(())
}

/// Install the stderr subscriber. `RESTAGE_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Resolve the journal settings from the settings file and overrides.
fn journal_config(config: Option<&Path>, log_dir: Option<PathBuf>) -> Result<JournalConfig> {
    let settings = match config {
        Some(path) => Config::load(path)
            .wrap_err_with(|| format!("Cannot load settings from {}", path.display()))?,
        None => Config::load_or_default(&Config::default_path()).context("Cannot load settings")?,
    };
    let mut journal = settings.journal;
    if let Some(dir) = log_dir {
        journal.log_dir = dir;
    }
    Ok(journal)
}

/// Execute a plan and report progress.
fn run_apply(
    journal_config: JournalConfig,
    plan: &Path,
    link: Option<PathBuf>,
    dry_run: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut tree = MediaTree::load(plan)
        .wrap_err_with(|| format!("Cannot load plan {}", plan.display()))?;

    let mode = if link.is_some() { Mode::Link } else { Mode::Rename };
    if dry_run {
        let mut builder = QueueBuilder::new(mode);
        if let Some(root) = &link {
            builder = builder.with_link_root(root);
        }
        print_queue(&tree, &builder.build(&tree));
        return Ok(());
    }

    let mut options =
        EngineOptions::new(mode).with_command("restage", std::env::args().skip(1).collect());
    if let Some(root) = link {
        options = options.with_link_root(root);
    }

    let mut journal = Journal::open(journal_config).context("Cannot open journal")?;
    let done = {
        let mut engine = OperationEngine::new(&mut tree, &mut journal, OsFileSystem, options);
        eprintln!(
            "Applying {} operations ({} mode)...",
            engine.total_operations(),
            mode
        );
        engine.run_with(|progress| {
            let kind = progress.kind.map(|k| k.to_string()).unwrap_or_default();
            let path = progress
                .current_file
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            eprintln!("[{:>5.1}%] {} {}", progress.percentage(), kind, path);
        })
    };

    println!();
    println!(" {}", done.summary());
    if !done.errors.is_empty() {
        println!();
        println!(" Errors:");
        for error in &done.errors {
            println!("   {error}");
        }
    }
    match (&done.journal_path, &done.journal_error) {
        (Some(path), _) => println!(" Journal: {}", path.display()),
        (None, Some(error)) => println!(" Journal could not be written: {error}"),
        (None, None) => {}
    }

    if let Some(output) = output {
        tree.save(&output)
            .wrap_err_with(|| format!("Cannot write tree to {}", output.display()))?;
        eprintln!("Updated tree written to {}", output.display());
    }

    if done.failed > 0 || !done.errors.is_empty() {
        bail!("{} operation(s) failed", done.errors.len());
    }
    Ok(())
}

fn print_queue(tree: &MediaTree, queue: &[Operation]) {
    if queue.is_empty() {
        println!(" Nothing to do.");
        return;
    }
    for (i, op) in queue.iter().enumerate() {
        let Some(node) = tree.get(op.node()) else {
            continue;
        };
        let detail = match op {
            Operation::VirtualDir { path, .. } | Operation::EnsureDir { path, .. } => {
                path.display().to_string()
            }
            Operation::Delete { .. } => node.path.display().to_string(),
            Operation::Rename { .. } => match planned_destination(node) {
                Ok(dest) => format!("{} -> {}", node.path.display(), dest.display()),
                Err(e) => format!("{} ({e})", node.path.display()),
            },
            Operation::Link { destination, .. } => {
                format!("{} -> {}", node.path.display(), destination.display())
            }
        };
        println!(" {:>4}. {:<18} {}", i + 1, op.kind(), detail);
    }
}

/// List recorded sessions.
fn run_history(journal_config: JournalConfig, limit: usize, format: OutputFormat) -> Result<()> {
    let journal = Journal::new(journal_config);
    let sessions = journal.list_sessions().context("Cannot read journal")?;
    let shown: Vec<&Session> = sessions.iter().take(limit).map(|f| &f.session).collect();

    match format {
        OutputFormat::Text => {
            if shown.is_empty() {
                println!(" No sessions recorded in {}.", journal.log_dir().display());
                return Ok(());
            }
            println!(
                " {:<20} {:<20} {:>6} {:>6} {:>6}  {}",
                "ID", "TIME (UTC)", "TOTAL", "OK", "FAILED", "COMMAND"
            );
            for session in shown {
                let meta = &session.metadata;
                println!(
                    " {:<20} {:<20} {:>6} {:>6} {:>6}  {}",
                    meta.session_id,
                    meta.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    meta.total_operations,
                    meta.successful_operations,
                    meta.failed_operations,
                    meta.command_args.join(" ")
                );
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
    }
    Ok(())
}

/// Show one session.
fn run_show(journal_config: JournalConfig, id: &str, format: OutputFormat) -> Result<()> {
    let journal = Journal::new(journal_config);
    let file = journal.find_session(id)?;
    let session = &file.session;

    match format {
        OutputFormat::Text => {
            let meta = &session.metadata;
            println!(" Session {}", meta.session_id);
            println!(" File:      {}", file.path.display());
            println!(" Started:   {}", meta.timestamp.to_rfc3339());
            println!(" Directory: {}", meta.working_dir.display());
            println!(" Command:   {}", meta.command_args.join(" "));
            println!(
                " Totals:    {} operations, {} succeeded, {} failed",
                meta.total_operations, meta.successful_operations, meta.failed_operations
            );
            println!();
            for op in &session.operations {
                let target = op
                    .dest_path
                    .as_deref()
                    .map(|d| format!(" -> {}", d.display()))
                    .unwrap_or_default();
                let outcome = match &op.error {
                    None if op.success => "ok".to_string(),
                    None => "failed".to_string(),
                    Some(error) => format!("failed: {error}"),
                };
                println!(
                    " {:>4} {:<10} {}{}  [{}]",
                    op.id,
                    op.kind,
                    op.source_path.display(),
                    target,
                    outcome
                );
            }
        }
        OutputFormat::Json => {
            println!("{}", session.to_json()?);
        }
    }
    Ok(())
}

/// Undo a session, the most recent one unless `id` is given.
fn run_undo(journal_config: JournalConfig, id: Option<&str>, dry_run: bool) -> Result<()> {
    let journal = Journal::new(journal_config);
    let file = match id {
        Some(id) => journal.find_session(id)?,
        None => journal
            .latest_session()
            .context("Cannot read journal")?
            .ok_or_else(|| eyre!("No sessions recorded in {}", journal.log_dir().display()))?,
    };
    let session = &file.session;

    if dry_run {
        for op in UndoEngine::<OsFileSystem>::plan(session) {
            let target = op
                .dest_path
                .as_deref()
                .map(|d| format!("{} -> ", d.display()))
                .unwrap_or_default();
            println!(" undo {:<10} {}{}", op.kind, target, op.source_path.display());
        }
        return Ok(());
    }

    eprintln!("Undoing session {}...", session.id());
    let report = UndoEngine::new(OsFileSystem).undo_session(session);

    println!(" {}", report.summary());
    if !report.errors.is_empty() {
        println!();
        println!(" Errors:");
        for error in &report.errors {
            println!("   {error}");
        }
    }

    if !report.is_success() {
        bail!("{} undo operation(s) failed", report.fail_count);
    }
    Ok(())
}

/// Remove old session journals.
fn run_cleanup(journal_config: JournalConfig, days: Option<u32>) -> Result<()> {
    let days = days.unwrap_or(journal_config.retention_days);
    if days == 0 {
        bail!("--days must be at least 1");
    }
    let journal = Journal::new(journal_config);
    let removed = journal
        .cleanup_older_than(days)
        .context("Cannot clean up journal")?;
    println!(
        " Removed {} session journal(s) older than {} days from {}",
        removed,
        days,
        journal.log_dir().display()
    );
    Ok(())
}
