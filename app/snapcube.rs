//! Command-line interface for snapcube.
//!
//! `clone` snapshots a local directory, `clone-repo` a GitHub or GitLab
//! repository, and `create` rebuilds a tree from a snapshot file.

use clap::{Args, Parser, Subcommand};
use snapcube::{
    BinaryDetection, CancellationFlag, Capture, Mode, PathIssue, SnapcubeBuilder, SnapcubeError, SnapcubeOptions,
    SourceDescriptor, capture_to_file, restore_from_file,
};
use std::path::PathBuf;
use std::process::exit;
use tracing_subscriber::EnvFilter;

/// Snapshot a project into one JSON file and rebuild it anywhere
#[derive(Parser)]
#[command(name = "snapcube", version, about, long_about = None)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Snapshot a local directory
    Clone {
        /// Directory to snapshot
        path: PathBuf,

        #[command(flatten)]
        capture: CaptureArgs,

        /// Ignore patterns (can be repeated)
        #[arg(short = 'I', long = "ignore")]
        ignore_patterns: Vec<String>,

        /// Honour .gitignore files
        #[arg(long)]
        respect_gitignore: bool,

        /// Skip hidden files and directories
        #[arg(long)]
        no_hidden: bool,

        /// Follow symlinks
        #[arg(long)]
        follow_links: bool,

        /// Max depth (unlimited if not set)
        #[arg(long)]
        max_depth: Option<usize>,
    },
    /// Snapshot a hosted repository (github:owner/repo[@ref] or gitlab:owner/repo[@ref])
    CloneRepo {
        /// Repository descriptor
        repo: String,

        #[command(flatten)]
        capture: CaptureArgs,

        /// Personal access token for private repositories
        #[arg(long, env = "SNAPCUBE_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Maximum concurrent blob requests (defaults to --workers when given)
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Rebuild a tree from a snapshot file
    Create {
        /// Snapshot file
        manifest: PathBuf,

        /// Destination directory (defaults to the snapshot file name without
        /// `.snapcube.json`). Entries keep their root folder, so
        /// `create my-project.snapcube.json` writes into `my-project/my-project/`.
        destination: Option<PathBuf>,

        /// Restore a structure-only snapshot as empty files
        #[arg(long)]
        skeleton: bool,
    },
}

#[derive(Args)]
struct CaptureArgs {
    /// Leave binary files out
    #[arg(long, conflicts_with = "structure_only")]
    ignore_binaries: bool,

    /// Record file paths only
    #[arg(long)]
    structure_only: bool,

    /// Output file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Worker threads for reads and fetches
    #[arg(long)]
    workers: Option<usize>,

    /// Binary detection strategy
    #[arg(long, default_value = "simple", value_parser = parse_binary_detection)]
    binary_detection: BinaryDetection,

    /// Write compact JSON
    #[arg(long)]
    compact: bool,
}

impl CaptureArgs {
    fn mode(&self) -> Mode {
        if self.structure_only {
            Mode::StructureOnly
        } else if self.ignore_binaries {
            Mode::IgnoreBinaries
        } else {
            Mode::Full
        }
    }

    fn builder(&self) -> SnapcubeBuilder {
        let builder = SnapcubeBuilder::new()
            .mode(self.mode())
            .binary_detection(self.binary_detection)
            .pretty(!self.compact);
        match self.workers {
            Some(workers) => builder.workers(workers),
            None => builder,
        }
    }
}

/// Parse string into BinaryDetection enum.
fn parse_binary_detection(s: &str) -> Result<BinaryDetection, String> {
    match s {
        "simple" => Ok(BinaryDetection::Simple),
        "accurate" => Ok(BinaryDetection::Accurate),
        _ => Err(format!("invalid binary detection method: {}", s)),
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "snapcube=debug" } else { "snapcube=info" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cancel = CancellationFlag::new();
    let handler = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler.cancel()) {
        tracing::warn!("Could not install interrupt handler: {}", e);
    }

    let result = match cli.command {
        Command::Clone {
            path,
            capture,
            ignore_patterns,
            respect_gitignore,
            no_hidden,
            follow_links,
            max_depth,
        } => {
            let mut builder = capture
                .builder()
                .ignore_patterns(ignore_patterns)
                .respect_gitignore(respect_gitignore)
                .include_hidden(!no_hidden)
                .follow_links(follow_links);
            builder = if let Some(depth) = max_depth {
                builder.max_depth(depth)
            } else {
                builder.no_limit_depth()
            };
            run_capture(
                SourceDescriptor::Local(path),
                builder.build(),
                capture.output,
                &cancel,
            )
        }
        Command::CloneRepo {
            repo,
            capture,
            token,
            concurrency,
        } => SourceDescriptor::parse_remote(&repo).and_then(|remote| {
            let mut builder = capture.builder();
            if let Some(limit) = concurrency.or(capture.workers) {
                builder = builder.remote_concurrency(limit);
            }
            run_capture(
                SourceDescriptor::Remote(remote.with_token(token)),
                builder.build(),
                capture.output,
                &cancel,
            )
        }),
        Command::Create {
            manifest,
            destination,
            skeleton,
        } => run_restore(manifest, destination, skeleton, &cancel),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        exit(1);
    }
}

fn run_capture(
    source: SourceDescriptor,
    options: SnapcubeOptions,
    output: Option<PathBuf>,
    cancel: &CancellationFlag,
) -> Result<(), SnapcubeError> {
    let (path, Capture { manifest, report, .. }) =
        capture_to_file(&source, &options, output.as_deref(), cancel)?;
    println!(
        "Wrote {} ({} {})",
        path.display(),
        manifest.len(),
        if manifest.is_structure_only() { "paths" } else { "files" }
    );
    if !report.excluded.is_empty() {
        println!("Excluded {} binary files", report.excluded.len());
    }
    if report.retries > 0 {
        println!("Retried {} requests", report.retries);
    }
    print_issues("Skipped", &report.warnings);
    Ok(())
}

fn run_restore(
    manifest: PathBuf,
    destination: Option<PathBuf>,
    skeleton: bool,
    cancel: &CancellationFlag,
) -> Result<(), SnapcubeError> {
    let (destination, report) =
        restore_from_file(&manifest, destination.as_deref(), skeleton, cancel)?;
    println!(
        "Restored into {} ({} files, {} directories created)",
        destination.display(),
        report.files_written,
        report.directories_created
    );
    print_issues("Failed", &report.failures);
    Ok(())
}

fn print_issues(label: &str, issues: &[PathIssue]) {
    if issues.is_empty() {
        return;
    }
    println!("{} {}:", label, issues.len());
    for issue in issues {
        println!("  {} {}: {}", issue.kind, issue.path, issue.message);
    }
}
