//! # wapc-cli
//!
//! Schema-driven code generation for waPC projects.
//!
//! A YAML configuration names a WIDL schema and a set of output files, each
//! produced by a generator module. Generators are bundled into a single
//! script, executed in an embedded JavaScript sandbox against the schema
//! text, and their output is formatted and written to disk.
//!
//! ## Architecture
//!
//! - [`config`] - Generation configuration documents and config merging
//! - [`home`] - The tool home directory (`~/.wapc`)
//! - [`source`] - Reading schemas from disk or over HTTP
//! - [`bundler`] - Driver script rendering and the bundler seam
//! - [`sandbox`] - Embedded script execution with host callbacks
//! - [`resolver`] - Import resolution for schemas
//! - [`formatter`] - In-memory and post-write output formatting
//! - [`writer`] - File output and dry-run support
//! - [`generator`] - The generation pipeline
//! - [`watcher`] - File system watching for `--watch`
//! - [`error`] - Error types and handling

pub mod bundler;
pub mod config;
pub mod error;
pub mod formatter;
pub mod generator;
pub mod home;
pub mod resolver;
pub mod sandbox;
pub mod source;
pub mod watcher;
pub mod writer;

// Re-export main types for convenience
pub use bundler::{Bundler, EsbuildBundler};
pub use config::{ConfigLoader, GenerationDocument, GenerationTarget};
pub use error::{CliError, CliResult};
pub use formatter::{FormatterOrchestrator, TypeScriptFormatter};
pub use generator::{GenerationReport, Generator};
pub use home::WapcHome;
pub use resolver::SchemaResolver;
pub use sandbox::{HostCallbacks, ScriptSandbox, ScriptValue};
pub use watcher::FileWatcher;
pub use writer::{FileWriter, WriteResult};
