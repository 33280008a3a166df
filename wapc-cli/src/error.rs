//! Error types for the CLI.
//!
//! Every stage of the generation pipeline has its own error enum. They are
//! aggregated by [`CliError`], which is what commands return and what the
//! binary prints before exiting with a failure status.

use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Result type alias for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// Main error type for CLI operations.
#[derive(Debug, Error)]
pub enum CliError {
    /// Malformed or unreadable generation configuration.
    #[error("Failed to load configuration: {0}")]
    Config(#[from] ConfigError),

    /// Schema source could not be read or fetched.
    #[error("Failed to read schema: {0}")]
    Source(#[from] SourceError),

    /// The bundler rejected the generator module.
    #[error("Failed to bundle generator: {0}")]
    Bundle(#[from] BundleError),

    /// The generator script failed. Displayed without a prefix so the
    /// script's own message is what the user sees.
    #[error("{0}")]
    Sandbox(#[from] SandboxError),

    /// A formatter failed.
    #[error("Failed to format output: {0}")]
    Format(#[from] FormatError),

    /// Error writing output files.
    #[error("Failed to write output: {0}")]
    Write(#[from] WriteError),

    /// Error during file watching.
    #[error("Watch error: {0}")]
    Watch(#[from] WatchError),

    /// The tool home directory is unusable.
    #[error("Home directory error: {0}")]
    Home(#[from] HomeError),

    /// Checking whether an `ifNotExists` output exists failed.
    #[error("Failed to stat {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Error loading generation configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// A document in the configuration could not be decoded.
    #[error("Invalid document #{index} in {origin}: {message}")]
    Parse {
        origin: String,
        index: usize,
        message: String,
    },

    /// IO error reading config.
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Error reading a schema from disk or over HTTP.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Local file could not be read.
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The HTTP request itself failed.
    #[error("GET {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("GET {url}: unexpected status {status}")]
    Status { url: String, status: u16 },
}

/// A single message reported by the bundler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Human-readable diagnostic text.
    pub message: String,
}

/// Error produced while bundling a generator module.
#[derive(Debug, Error)]
pub enum BundleError {
    /// The bundler reported one or more errors.
    #[error("esbuild returned errors:\n{}", format_diagnostics(.0))]
    Diagnostics(Vec<Diagnostic>),

    /// The bundler succeeded but produced no script.
    #[error("esbuild did not produce any output")]
    EmptyOutput,

    /// The bundler executable could not be started.
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Error raised by a script sandbox.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The script engine itself failed (allocation, context creation).
    #[error("Script engine error: {0}")]
    Engine(String),

    /// The script threw. The message is already normalized.
    #[error("{message}")]
    Exception { message: String },

    /// The requested export is not registered in `js_exports`.
    #[error("Script does not export '{name}'")]
    MissingExport { name: String },

    /// An argument or result could not cross the script boundary.
    #[error("Failed to marshal value: {0}")]
    Marshal(String),

    /// The export returned something other than source text.
    #[error("Export '{export}' returned a non-string result")]
    UnexpectedResult { export: String },
}

/// Error resolving an imported schema location.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Stat or read of a candidate path failed.
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Remote location could not be fetched.
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Error produced while formatting generated output.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The formatter executable could not be started.
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The formatter exited unsuccessfully.
    #[error("{program} failed on {path}: {status}")]
    ExitStatus {
        program: String,
        path: PathBuf,
        status: ExitStatus,
    },

    /// The in-process formatter script could not be loaded.
    #[error("Failed to read formatter script {path}: {source}")]
    Script {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The in-process formatter failed.
    #[error("{0}")]
    Sandbox(#[from] SandboxError),

    /// The in-process formatter returned something other than text.
    #[error("Formatter returned a non-string result")]
    UnexpectedResult,
}

/// Error writing output files.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Failed to create directory.
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write file.
    #[error("Failed to write file {path}: {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Error during file watching.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Failed to initialize watcher.
    #[error("Failed to initialize file watcher: {0}")]
    Init(String),

    /// Error from notify crate.
    #[error("Watch notification error: {0}")]
    Notify(String),
}

/// Error locating or preparing the tool home directory.
#[derive(Debug, Error)]
pub enum HomeError {
    /// Neither an override nor a user home directory is available.
    #[error("Could not determine the user home directory; set WAPC_HOME")]
    NoHomeDirectory,

    /// A home subdirectory could not be created.
    #[error("Failed to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Format bundler diagnostics for display.
fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .enumerate()
        .map(|(i, d)| format!("  {}. {}", i + 1, d.message))
        .collect::<Vec<_>>()
        .join("\n")
}

impl ConfigError {
    /// Create a not found error.
    pub fn not_found(path: PathBuf) -> Self {
        Self::NotFound { path }
    }

    /// Create a document parse error.
    pub fn parse(origin: impl Into<String>, index: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            origin: origin.into(),
            index,
            message: message.into(),
        }
    }
}

impl SandboxError {
    /// Create an exception error, normalizing the message.
    pub fn exception(message: impl AsRef<str>) -> Self {
        Self::Exception {
            message: normalize_message(message.as_ref()).to_string(),
        }
    }
}

impl Diagnostic {
    /// Create a diagnostic from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Strip the conventional `Error: ` prefix scripts put on thrown messages.
pub fn normalize_message(message: &str) -> &str {
    message.strip_prefix("Error: ").unwrap_or(message)
}
