use std::collections::HashSet;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use tracemark::error::Error;
use tracemark::known::read_known;
use tracemark::manifest::{
    Injected, RUNTIME_PACKAGE, find_project_root, inject_runtime_dependency,
    inject_runtime_path_dependency,
};
use tracemark::probe::DEFAULT_RUNTIME_CRATE;
use tracemark::report::{format_table, scan_tree};
use tracemark::rewrite::{InstrumentOptions, Layout, instrument_source};
use tracemark::sources::{discover, file_identifier, read_source};
use tracemark::strip::{StripOptions, strip_source};

/// Version of tracemark-runtime this binary was built against.
const RUNTIME_VERSION: &str = env!("TRACEMARK_RUNTIME_VERSION");

#[derive(Parser)]
#[command(
    name = "tracemark",
    about = "Find functions that never run: probe them, exercise the program, strip what fired",
    version,
    after_help = "Workflow: tracemark instrument, run with TRACEMARK_DUMP=calls.txt, \
                  tracemark strip --known calls.txt, tracemark suspects"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert a probe at the start of every function, rewriting files in place.
    Instrument {
        /// Project root (defaults to current directory).
        #[arg(long, default_value = ".")]
        project: PathBuf,

        /// Source directory to instrument (defaults to <project>/src).
        #[arg(long)]
        src: Option<PathBuf>,

        /// How rewritten files are laid out.
        #[arg(long, value_enum, default_value_t = Layout::Retain)]
        layout: Layout,

        /// Filename suffix of declaration-only files to leave alone
        /// (repeatable, defaults to .d.rs).
        #[arg(long = "decl-suffix", value_name = "SUFFIX")]
        decl_suffixes: Vec<String>,

        /// Path to tracemark-runtime source (for development before publishing).
        #[arg(long)]
        runtime_path: Option<PathBuf>,

        /// Do not add tracemark-runtime to the project's Cargo.toml.
        #[arg(long)]
        no_manifest: bool,
    },
    /// Remove the probes of functions known to have run.
    Strip {
        /// Project root (defaults to current directory).
        #[arg(long, default_value = ".")]
        project: PathBuf,

        /// Source directory to strip (defaults to <project>/src).
        #[arg(long)]
        src: Option<PathBuf>,

        /// File of observed identity keys, one per line. Read from stdin if
        /// omitted.
        #[arg(long, value_name = "FILE")]
        known: Option<PathBuf>,

        /// How rewritten files are laid out.
        #[arg(long, value_enum, default_value_t = Layout::Retain)]
        layout: Layout,
    },
    /// List the probes still in the tree: functions never observed.
    Suspects {
        /// Project root (defaults to current directory).
        #[arg(long, default_value = ".")]
        project: PathBuf,

        /// Source directory to scan (defaults to <project>/src).
        #[arg(long)]
        src: Option<PathBuf>,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("TRACEMARK_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), Error> {
    match cli.command {
        Commands::Instrument {
            project,
            src,
            layout,
            decl_suffixes,
            runtime_path,
            no_manifest,
        } => cmd_instrument(
            project,
            src,
            layout,
            decl_suffixes,
            runtime_path,
            no_manifest,
        ),
        Commands::Strip {
            project,
            src,
            known,
            layout,
        } => cmd_strip(project, src, known, layout),
        Commands::Suspects { project, src, json } => cmd_suspects(project, src, json),
    }
}

/// Resolve the project root and the source directory to work on.
fn locate(project: &Path, src: Option<PathBuf>) -> Result<(PathBuf, PathBuf), Error> {
    let project = find_project_root(project)?;
    let src_dir = src.unwrap_or_else(|| project.join("src"));
    Ok((project, src_dir))
}

fn relative<'a>(path: &'a Path, root: &Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}

fn cmd_instrument(
    project: PathBuf,
    src: Option<PathBuf>,
    layout: Layout,
    decl_suffixes: Vec<String>,
    runtime_path: Option<PathBuf>,
    no_manifest: bool,
) -> Result<(), Error> {
    let (project, src_dir) = locate(&project, src)?;
    let files = discover(&src_dir)?;

    let mut options = InstrumentOptions {
        layout,
        runtime_crate: DEFAULT_RUNTIME_CRATE.to_string(),
        ..InstrumentOptions::default()
    };
    if !decl_suffixes.is_empty() {
        options.declaration_suffixes = decl_suffixes;
    }

    let mut probes = 0;
    let mut touched = 0;
    let mut failed = 0;
    for path in &files {
        let shown = relative(path, &project);
        match instrument_file(path, &options) {
            Ok(0) => tracing::info!("unchanged {}", shown.display()),
            Ok(n) => {
                tracing::info!("instrumented {} ({n} probe(s))", shown.display());
                probes += n;
                touched += 1;
            }
            Err(e) => {
                eprintln!("✗ {}: {e}", shown.display());
                failed += 1;
            }
        }
    }
    eprintln!("instrumented {probes} function(s) across {touched} file(s)");

    if !no_manifest && probes > 0 {
        let injected = match &runtime_path {
            Some(p) => inject_runtime_path_dependency(&project, &std::fs::canonicalize(p)?)?,
            None => inject_runtime_dependency(&project, RUNTIME_VERSION)?,
        };
        if injected == Injected::Added {
            eprintln!("added {RUNTIME_PACKAGE} to Cargo.toml");
        }
    }

    if failed > 0 {
        return Err(Error::FilesFailed { count: failed });
    }
    Ok(())
}

/// Instrument one file in place. Returns the number of probes inserted.
fn instrument_file(path: &Path, options: &InstrumentOptions) -> Result<usize, Error> {
    let source = read_source(path)?;
    let id = file_identifier(path)?;
    let result = instrument_source(&id, &source, options)?;
    if !result.inserted.is_empty() {
        std::fs::write(path, result.source)?;
    }
    Ok(result.inserted.len())
}

fn load_known(known: Option<&Path>) -> HashSet<String> {
    match known {
        Some(path) => match std::fs::File::open(path) {
            Ok(file) => read_known(file),
            Err(e) => {
                eprintln!(
                    "warning: cannot read {}: {e}; no probes will be removed",
                    path.display()
                );
                HashSet::new()
            }
        },
        None => {
            let stdin = std::io::stdin();
            if stdin.is_terminal() {
                eprintln!("reading observed identities from stdin (end with Ctrl-D)");
            }
            read_known(stdin.lock())
        }
    }
}

fn cmd_strip(
    project: PathBuf,
    src: Option<PathBuf>,
    known: Option<PathBuf>,
    layout: Layout,
) -> Result<(), Error> {
    let (project, src_dir) = locate(&project, src)?;
    let files = discover(&src_dir)?;
    let known = load_known(known.as_deref());
    eprintln!("loaded {} known identities", known.len());

    let options = StripOptions { layout };
    let mut removed = 0;
    let mut remaining = 0;
    let mut failed = 0;
    for path in &files {
        let shown = relative(path, &project);
        match strip_file(path, &known, &options) {
            Ok((r, m)) => {
                tracing::info!("stripped {} ({r} removed, {m} remaining)", shown.display());
                removed += r;
                remaining += m;
            }
            Err(e) => {
                eprintln!("✗ {}: {e}", shown.display());
                failed += 1;
            }
        }
    }
    eprintln!("removed {removed} probe(s), {remaining} remaining");

    if failed > 0 {
        return Err(Error::FilesFailed { count: failed });
    }
    Ok(())
}

/// Strip one file in place. Returns (removed, remaining) probe counts.
fn strip_file(
    path: &Path,
    known: &HashSet<String>,
    options: &StripOptions,
) -> Result<(usize, usize), Error> {
    let source = read_source(path)?;
    let id = file_identifier(path)?;
    let result = strip_source(&id, &source, known, options)?;
    if result.source != source {
        std::fs::write(path, &result.source)?;
    }
    Ok((result.removed.len(), result.remaining.len()))
}

fn cmd_suspects(project: PathBuf, src: Option<PathBuf>, json: bool) -> Result<(), Error> {
    let (project, src_dir) = locate(&project, src)?;
    let files = discover(&src_dir)?;
    let report = scan_tree(&files);

    for failure in &report.failures {
        eprintln!(
            "✗ {}: {}",
            relative(&failure.path, &project).display(),
            failure.error
        );
    }
    if json {
        let out = serde_json::to_string_pretty(&report).map_err(std::io::Error::other)?;
        println!("{out}");
    } else {
        anstream::print!("{}", format_table(&report, &project));
    }

    if !report.failures.is_empty() {
        return Err(Error::FilesFailed {
            count: report.failures.len(),
        });
    }
    Ok(())
}
