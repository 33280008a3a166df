//! Post-generation formatting.
//!
//! TypeScript output is formatted in-process, on the generated string,
//! before it is written. Other languages are formatted by external tools
//! against the written file, and only once every output of a document is on
//! disk: some of those tools resolve types across files.

use crate::error::FormatError;
use crate::sandbox::{ScriptSandbox, ScriptValue};
use colored::Colorize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Export the TypeScript formatter script must provide.
pub const FORMAT_TYPESCRIPT_EXPORT: &str = "formatTypeScript";

/// Extensions handled by the in-process formatter.
const IN_PROCESS_EXTENSIONS: &[&str] = &["ts"];

/// Formats a file that has already been written.
pub trait ExternalFormatter {
    /// Format `path` in place.
    fn format(&self, path: &Path) -> Result<(), FormatError>;
}

/// Runs a formatter executable as a blocking subprocess.
///
/// Output streams are inherited so the tool's own messages reach the user.
#[derive(Debug, Clone)]
pub struct CommandFormatter {
    program: String,
    args: Vec<String>,
}

impl CommandFormatter {
    /// Run `program` with `args` followed by the file path.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// `rustfmt <file>`.
    pub fn rustfmt() -> Self {
        Self::new("rustfmt", Vec::<String>::new())
    }

    /// `gofmt -w <file>`.
    pub fn gofmt() -> Self {
        Self::new("gofmt", ["-w"])
    }
}

impl ExternalFormatter for CommandFormatter {
    fn format(&self, path: &Path) -> Result<(), FormatError> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .status()
            .map_err(|e| FormatError::Spawn {
                program: self.program.clone(),
                source: e,
            })?;

        if !status.success() {
            return Err(FormatError::ExitStatus {
                program: self.program.clone(),
                path: path.to_path_buf(),
                status,
            });
        }
        Ok(())
    }
}

/// In-process TypeScript formatter.
///
/// The formatter script is only compiled the first time it is needed, and
/// the resulting sandbox is reused for every later file until this value is
/// dropped.
pub struct TypeScriptFormatter {
    script_path: PathBuf,
    sandbox: Option<ScriptSandbox>,
}

impl TypeScriptFormatter {
    /// Formatter backed by the script at `script_path`.
    pub fn new(script_path: impl Into<PathBuf>) -> Self {
        Self {
            script_path: script_path.into(),
            sandbox: None,
        }
    }

    /// Whether the formatter sandbox has been created.
    pub fn is_initialized(&self) -> bool {
        self.sandbox.is_some()
    }

    /// Format TypeScript source text.
    ///
    /// Fails with [`FormatError::Script`] when the formatter script cannot
    /// be read.
    pub fn format(&mut self, source: &str) -> Result<String, FormatError> {
        let sandbox = self.sandbox()?;
        match sandbox.invoke(FORMAT_TYPESCRIPT_EXPORT, &[Value::String(source.to_string())])? {
            ScriptValue::String(formatted) => Ok(formatted),
            _ => Err(FormatError::UnexpectedResult),
        }
    }

    fn sandbox(&mut self) -> Result<&ScriptSandbox, FormatError> {
        let sandbox = match self.sandbox.take() {
            Some(sandbox) => sandbox,
            None => {
                let script = std::fs::read_to_string(&self.script_path).map_err(|e| {
                    FormatError::Script {
                        path: self.script_path.clone(),
                        source: e,
                    }
                })?;
                let sandbox = ScriptSandbox::new(&script, None)?;
                tracing::debug!(path = %self.script_path.display(), "TypeScript formatter loaded");
                sandbox
            }
        };
        Ok(self.sandbox.insert(sandbox))
    }
}

/// Dispatches generated outputs to formatters by file extension.
pub struct FormatterOrchestrator {
    typescript: TypeScriptFormatter,
    external: BTreeMap<String, Box<dyn ExternalFormatter>>,
}

impl FormatterOrchestrator {
    /// Orchestrator with only the in-process TypeScript formatter.
    pub fn new(typescript: TypeScriptFormatter) -> Self {
        Self {
            typescript,
            external: BTreeMap::new(),
        }
    }

    /// Orchestrator with `rustfmt` for `.rs` and `gofmt` for `.go`.
    pub fn with_default_tools(typescript: TypeScriptFormatter) -> Self {
        Self::new(typescript)
            .with_external("rs", CommandFormatter::rustfmt())
            .with_external("go", CommandFormatter::gofmt())
    }

    /// Register an external formatter for an extension (without the dot).
    pub fn with_external(
        mut self,
        extension: impl Into<String>,
        formatter: impl ExternalFormatter + 'static,
    ) -> Self {
        self.external.insert(extension.into(), Box::new(formatter));
        self
    }

    /// Format generated text before it is written.
    ///
    /// Only extensions with an in-process formatter are changed.
    pub fn format_source(&mut self, path: &Path, source: String) -> Result<String, FormatError> {
        match extension(path) {
            Some(ext) if IN_PROCESS_EXTENSIONS.contains(&ext) => self.typescript.format(&source),
            _ => Ok(source),
        }
    }

    /// Run external formatters over written outputs, in order.
    ///
    /// Returns the paths that were formatted. Stops at the first failure.
    pub fn format_outputs<'a, I>(&self, paths: I) -> Result<Vec<PathBuf>, FormatError>
    where
        I: IntoIterator<Item = &'a Path>,
    {
        let mut formatted = Vec::new();
        for path in paths {
            let Some(formatter) = extension(path).and_then(|ext| self.external.get(ext)) else {
                continue;
            };
            println!("{}", format!("Formatting {}...", path.display()).cyan());
            formatter.format(path)?;
            formatted.push(path.to_path_buf());
        }
        Ok(formatted)
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}
