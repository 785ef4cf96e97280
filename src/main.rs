use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use diffscope_core::{
    ChangeKind, ClassChangeRecord, DiffConfig, DiffReport, FileChangeEntry, OutputFormat,
};
use diffscope_engine::{DiffEngine, FileCache};
use miette::{Context, IntoDiagnostic, Result};
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "diffscope",
    version,
    about = "Method-level diff between two revisions of a Java repository",
    long_about = "diffscope finds exactly which methods were added or changed between two revisions,\n\
                   so coverage and test analysis can be scoped to the code that actually moved.\n\n\
                   Examples:\n  \
                     diffscope diff feature/login              Diff a branch against master\n  \
                     diffscope diff HEAD --base v1.4.0         Diff HEAD against a tag\n  \
                     diffscope files HEAD --kind add           List added source files\n  \
                     diffscope touched com.acme.Billing HEAD   Exit 0 if Billing changed\n  \
                     diffscope init                            Write a default .diffscope.toml"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .diffscope.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable summaries (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Show debug logging on stderr
    #[arg(long, short, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Report added and changed methods between two revisions
    #[command(long_about = "Report added and changed methods between two revisions.\n\n\
        Compares the trees of BASE and NEW, then parses every changed source file on both\n\
        sides and matches methods by name and parameter list. Deleted files, test sources,\n\
        and interfaces produce no record; files that fail to parse are listed separately.\n\n\
        Examples:\n  diffscope diff feature/login\n  diffscope diff HEAD --base main --format json\n  diffscope diff HEAD --batch-size 20 --workers 4 --cache .diffscope/cache")]
    Diff {
        /// New revision (branch, tag, or commit)
        new: String,

        /// Old revision (default: revisions.base from config, else "master")
        #[arg(long)]
        base: Option<String>,

        /// Repository path (default: current directory)
        #[arg(long, default_value = ".")]
        repo: PathBuf,

        /// Source file suffix (default: .java)
        #[arg(long)]
        suffix: Option<String>,

        /// Path segments marking test sources; replaces the configured list
        #[arg(long)]
        test_path: Vec<String>,

        /// Extra glob patterns for files to leave out
        #[arg(long)]
        exclude: Vec<String>,

        /// Files per batch (default: 100)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Maximum worker threads (0 = one per batch)
        #[arg(long)]
        workers: Option<usize>,

        /// Reuse and store reports in this directory
        #[arg(long)]
        cache: Option<PathBuf>,
    },
    /// List changed source files between two revisions
    #[command(long_about = "List changed source files between two revisions.\n\n\
        Only paths ending in the configured suffix are listed. Renames show up as a\n\
        delete plus an add.\n\n\
        Examples:\n  diffscope files HEAD\n  diffscope files HEAD --base main --kind not-deleted")]
    Files {
        /// New revision (branch, tag, or commit)
        new: String,

        /// Old revision (default: revisions.base from config, else "master")
        #[arg(long)]
        base: Option<String>,

        /// Repository path (default: current directory)
        #[arg(long, default_value = ".")]
        repo: PathBuf,

        /// Only list entries of this kind
        #[arg(long)]
        kind: Option<KindFilter>,
    },
    /// Check whether a class's source file changed
    #[command(long_about = "Check whether a class's source file changed.\n\n\
        Exits 0 when an added or modified file declares CLASS by path, 1 otherwise.\n\
        CLASS may be a simple name, a dotted name, or a slash path.\n\n\
        Examples:\n  diffscope touched Billing HEAD\n  diffscope touched com.acme.Billing feature/x --base main")]
    Touched {
        /// Class name to look for
        class: String,

        /// New revision (branch, tag, or commit)
        new: String,

        /// Old revision (default: revisions.base from config, else "master")
        #[arg(long)]
        base: Option<String>,

        /// Repository path (default: current directory)
        #[arg(long, default_value = ".")]
        repo: PathBuf,
    },
    /// Create a default .diffscope.toml configuration file
    #[command(long_about = "Create a default .diffscope.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .diffscope.toml already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum KindFilter {
    /// Newly added files
    Add,
    /// Files changed in place
    Modify,
    /// Removed files
    Delete,
    /// Added and modified files
    NotDeleted,
}

impl KindFilter {
    fn matches(self, kind: ChangeKind) -> bool {
        match self {
            KindFilter::Add => kind == ChangeKind::Add,
            KindFilter::Modify => kind == ChangeKind::Modify,
            KindFilter::Delete => kind == ChangeKind::Delete,
            KindFilter::NotDeleted => kind != ChangeKind::Delete,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonReport<'a> {
    generated_at: DateTime<Utc>,
    #[serde(flatten)]
    report: &'a DiffReport,
}

const DEFAULT_CONFIG: &str = r#"# diffscope configuration
# See: https://github.com/Meru143/diffscope

[filter]
# Source file suffix
# suffix = ".java"
# Path segments that mark test sources (matched at any depth)
# test_paths = ["src/test/java"]
# Extra glob patterns to leave out
# exclude = ["**/generated/**"]

[engine]
# Files analyzed per batch
# batch_size = 100
# Upper bound on worker threads (0 = one per batch, capped by CPU count)
# max_workers = 0

[revisions]
# Old revision used when only the new one is given
# base = "master"
"#;

fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();
}

fn load_config(path: Option<&Path>) -> Result<DiffConfig> {
    match path {
        Some(path) => Ok(DiffConfig::from_file(path)
            .wrap_err_with(|| format!("loading {}", path.display()))?),
        None => {
            let default_path = Path::new(".diffscope.toml");
            if default_path.exists() {
                Ok(DiffConfig::from_file(default_path).wrap_err("loading .diffscope.toml")?)
            } else {
                Ok(DiffConfig::default())
            }
        }
    }
}

fn spinner(message: &'static str, quiet: bool) -> Result<Option<indicatif::ProgressBar>> {
    if quiet || !std::io::stderr().is_terminal() {
        return Ok(None);
    }
    let pb = indicatif::ProgressBar::new_spinner();
    pb.set_style(
        indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
            .into_diagnostic()?,
    );
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    Ok(Some(pb))
}

fn sorted_records(report: &DiffReport) -> Vec<&ClassChangeRecord> {
    let mut records: Vec<&ClassChangeRecord> = report.records.iter().collect();
    records.sort_by_key(|r| r.qualified_name());
    records
}

fn spans(spans: &[diffscope_core::LineSpan]) -> String {
    spans
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_report_text(report: &DiffReport) {
    let stats = &report.stats;
    println!(
        "{}..{}: {} changed classes, {} methods ({} files, {} batches, {} workers, {}ms)",
        report.old_revision,
        report.new_revision,
        report.records.len(),
        report.changed_method_count(),
        stats.files_changed,
        stats.batches,
        stats.workers,
        stats.duration_ms,
    );

    for record in sorted_records(report) {
        println!();
        println!("{:<8} {}  ({})", record.kind, record.qualified_name(), record.path);
        for method in &record.changed_methods {
            println!("  {:<9} {}", method.change, method.method.key);
        }
        if !record.added_lines.is_empty() {
            println!("  + lines  {}", spans(&record.added_lines));
        }
        if !record.deleted_lines.is_empty() {
            println!("  - lines  {}", spans(&record.deleted_lines));
        }
    }

    if !report.skipped.is_empty() {
        println!("\nSkipped:");
        for skipped in &report.skipped {
            println!("  {} ({})", skipped.path, skipped.reason);
        }
    }
    if !report.failures.is_empty() {
        println!("\nFailed:");
        for failure in &report.failures {
            match &failure.revision {
                Some(rev) => println!("  {} at {}: {}", failure.path, rev, failure.error),
                None => println!("  {}: {}", failure.path, failure.error),
            }
        }
    }
}

fn print_report_markdown(report: &DiffReport) {
    println!(
        "## Method changes: `{}`..`{}`\n",
        report.old_revision, report.new_revision
    );
    if report.records.is_empty() {
        println!("No changed classes.");
    } else {
        println!("| Kind | Class | Changed methods | Added lines | Deleted lines |");
        println!("|------|-------|-----------------|-------------|---------------|");
        for record in sorted_records(report) {
            let methods: Vec<String> = record
                .changed_methods
                .iter()
                .map(|m| format!("`{}`", m.method.key))
                .collect();
            println!(
                "| {} | `{}` | {} | {} | {} |",
                record.kind,
                record.qualified_name(),
                methods.join(", "),
                spans(&record.added_lines),
                spans(&record.deleted_lines),
            );
        }
    }
    if !report.failures.is_empty() {
        println!("\n### Failed files\n");
        for failure in &report.failures {
            println!("- `{}`: {}", failure.path, failure.error);
        }
    }
}

fn print_entries(entries: &[&FileChangeEntry], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(entries).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            println!("| Kind | Path |");
            println!("|------|------|");
            for entry in entries {
                println!("| {} | `{}` |", entry.kind, entry.path());
            }
        }
        OutputFormat::Text => {
            for entry in entries {
                println!("{:<7} {}", entry.kind, entry.path());
            }
        }
    }
    Ok(())
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!("diffscope v{version}: method-level diffs for scoped coverage\n");

    println!("Quick start:");
    println!("  diffscope init                  Create a .diffscope.toml config file");
    println!("  diffscope diff <branch>         Changed methods against master\n");

    println!("All commands:");
    println!("  diff      Added and changed methods between two revisions");
    println!("  files     Changed source files between two revisions");
    println!("  touched   Check whether a class changed");
    println!("  init      Create default configuration\n");

    println!("Run 'diffscope <command> --help' for details.");
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let mut config = load_config(cli.config.as_deref())?;
    tracing::debug!(format = %cli.format, "configuration loaded");

    match cli.command {
        None => print_welcome(),
        Some(Command::Diff {
            new,
            base,
            repo,
            suffix,
            test_path,
            exclude,
            batch_size,
            workers,
            cache,
        }) => {
            if let Some(suffix) = suffix {
                config.filter.suffix = suffix;
            }
            if !test_path.is_empty() {
                config.filter.test_paths = test_path;
            }
            config.filter.exclude.extend(exclude);
            if let Some(batch_size) = batch_size {
                config.engine.batch_size = batch_size;
            }
            if let Some(workers) = workers {
                config.engine.max_workers = workers;
            }
            let base = base.unwrap_or_else(|| config.revisions.base.clone());

            let engine = DiffEngine::new(&repo, config)?;
            let pb = spinner("Diffing methods...", cli.quiet)?;
            let result = match &cache {
                Some(dir) => engine.run_cached(&base, &new, &FileCache::new(dir)),
                None => engine.run(&base, &new),
            };
            if let Some(pb) = &pb {
                pb.finish_and_clear();
            }
            let report = result.wrap_err_with(|| format!("diffing {base}..{new}"))?;

            match cli.format {
                OutputFormat::Json => {
                    let out = JsonReport {
                        generated_at: Utc::now(),
                        report: &report,
                    };
                    println!("{}", serde_json::to_string_pretty(&out).into_diagnostic()?);
                }
                OutputFormat::Markdown => print_report_markdown(&report),
                OutputFormat::Text => print_report_text(&report),
            }
        }
        Some(Command::Files {
            new,
            base,
            repo,
            kind,
        }) => {
            let base = base.unwrap_or_else(|| config.revisions.base.clone());
            let engine = DiffEngine::new(&repo, config)?;
            let changes = engine
                .changes(&base, &new)
                .wrap_err_with(|| format!("comparing {base}..{new}"))?;
            let entries: Vec<&FileChangeEntry> = changes
                .entries()
                .iter()
                .filter(|e| kind.map_or(true, |k| k.matches(e.kind)))
                .collect();
            print_entries(&entries, cli.format)?;
        }
        Some(Command::Touched {
            class,
            new,
            base,
            repo,
        }) => {
            let base = base.unwrap_or_else(|| config.revisions.base.clone());
            let engine = DiffEngine::new(&repo, config)?;
            let changes = engine
                .changes(&base, &new)
                .wrap_err_with(|| format!("comparing {base}..{new}"))?;
            let touched = changes.touches(&class);

            match cli.format {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::json!({ "class": class, "touched": touched })
                ),
                OutputFormat::Markdown | OutputFormat::Text => {
                    let verdict = if touched { "changed" } else { "unchanged" };
                    println!("{class}: {verdict} between {base} and {new}");
                }
            }
            if !touched {
                std::process::exit(1);
            }
        }
        Some(Command::Init) => {
            let path = Path::new(".diffscope.toml");
            if path.exists() {
                miette::bail!(".diffscope.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .diffscope.toml with default configuration");
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "diffscope", &mut std::io::stdout());
        }
    }

    Ok(())
}
