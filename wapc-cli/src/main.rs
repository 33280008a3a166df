//! # wapc
//!
//! Command-line entry point for schema-driven code generation.
//!
//! ## Usage
//!
//! ```bash
//! # Generate every output listed in a configuration file
//! wapc generate codegen.yaml
//!
//! # Print what would be written without touching the disk
//! wapc generate codegen.yaml --dry-run
//!
//! # Regenerate whenever the configuration or a local schema changes
//! wapc generate codegen.yaml --watch
//!
//! # Print version and platform
//! wapc version
//! ```

use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use wapc_cli::{
    bundler::EsbuildBundler,
    error::CliError,
    formatter::{FormatterOrchestrator, TypeScriptFormatter},
    generator::{GenerationReport, Generator},
    home::{WapcHome, HOME_ENV},
    watcher::FileWatcher,
    writer::{FileWriter, WriteResult},
};

#[derive(Parser)]
#[command(name = "wapc")]
#[command(author, version, about = "Generate waPC code from WIDL schemas", long_about = None)]
struct Cli {
    /// Tool home directory holding modules, definitions and templates
    #[arg(long, global = true, env = HOME_ENV)]
    home: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate code from a configuration file
    Generate {
        /// Generation configuration (YAML, one or more documents)
        config: PathBuf,

        /// Preview generated output without writing files
        #[arg(long)]
        dry_run: bool,

        /// Watch the configuration and local schemas and regenerate.
        /// Imported definitions and generator modules in the home
        /// directory are not watched.
        #[arg(short, long)]
        watch: bool,

        /// esbuild executable used to bundle generator modules
        #[arg(long, env = "WAPC_ESBUILD", default_value = "esbuild")]
        esbuild: String,

        /// TypeScript formatter script (defaults to the one in the home directory)
        #[arg(long)]
        ts_formatter: Option<PathBuf>,
    },

    /// Print the version and platform
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(&e);
            ExitCode::FAILURE
        }
    }
}

/// Install the log subscriber. `RUST_LOG` takes precedence over `-v`.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Generate {
            config,
            dry_run,
            watch,
            esbuild,
            ts_formatter,
        } => cmd_generate(cli.home, config, dry_run, watch, esbuild, ts_formatter),

        Commands::Version => {
            println!("{}", version_line());
            Ok(())
        }
    }
}

fn version_line() -> String {
    format!(
        "wapc version {} {}/{}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Generate command implementation.
fn cmd_generate(
    home: Option<PathBuf>,
    config: PathBuf,
    dry_run: bool,
    watch: bool,
    esbuild: String,
    ts_formatter: Option<PathBuf>,
) -> Result<(), CliError> {
    let home = WapcHome::locate(home.as_deref())?;
    let ts_formatter = ts_formatter.unwrap_or_else(|| home.typescript_formatter());
    tracing::info!(home = %home.root().display(), esbuild = %esbuild, "starting generation");

    let mut generator = Generator::new(
        home,
        Box::new(EsbuildBundler::new(esbuild)),
        FormatterOrchestrator::with_default_tools(TypeScriptFormatter::new(ts_formatter)),
        FileWriter::new(dry_run),
    );

    if watch {
        run_watch_mode(&mut generator, &config)
    } else {
        run_generate(&mut generator, &config)
    }
}

/// Run generation once and report the outcome.
fn run_generate(generator: &mut Generator, config: &Path) -> Result<(), CliError> {
    let report = generator.run(config)?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &GenerationReport) {
    let mut written = 0;
    for result in &report.generated {
        match result {
            WriteResult::Written { .. } => written += 1,
            WriteResult::DryRun { path, content } => {
                println!(
                    "{} Would write to {}:",
                    "[dry-run]".yellow(),
                    path.display()
                );
                println!("{}", "─".repeat(60).dimmed());
                println!("{}", content);
                println!("{}", "─".repeat(60).dimmed());
            }
        }
    }

    if written > 0 {
        println!(
            "{} Generated {} file(s), skipped {}",
            "✓".green(),
            written.to_string().green(),
            report.skipped.len()
        );
    }
}

/// Run in watch mode.
fn run_watch_mode(generator: &mut Generator, config: &Path) -> Result<(), CliError> {
    println!("{}", "Starting watch mode...".cyan());
    println!("  Press Ctrl+C to stop\n");

    if let Err(e) = run_generate(generator, config) {
        println!("{} {}", "Generation error:".red(), e);
    }

    let paths = Generator::watch_paths(config)?;
    for path in &paths {
        println!("  Watching: {}", path.display());
    }

    let watcher = FileWatcher::new(paths);
    let (_debouncer, rx) = watcher.watch()?;

    println!("\n{}", "Watching for changes...".cyan());

    while let Ok(event) = rx.recv() {
        if event.is_error() {
            println!(
                "{} {}",
                "Watch error:".red(),
                event.error_message().unwrap_or("Unknown error")
            );
            continue;
        }

        if let Some(path) = event.path() {
            println!("\n{} {}", "File changed:".cyan(), path.display());
        }

        if let Err(e) = run_generate(generator, config) {
            println!("{} {}", "Generation error:".red(), e);
        }

        println!("\n{}", "Watching for changes...".cyan());
    }

    Ok(())
}

/// Print an error with formatting.
fn print_error(error: &CliError) {
    eprintln!("{} {}", "Error:".red().bold(), error);
}
