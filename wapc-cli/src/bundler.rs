//! Generator bundling.
//!
//! A generator module plus its dependency graph is compiled into a single
//! self-contained script before it is handed to the sandbox. The bundling
//! itself is done by an external tool; this module renders the driver
//! script that wires a visitor to the schema parser and defines the
//! [`Bundler`] seam the pipeline depends on.

use crate::error::{BundleError, Diagnostic};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Name of the export every driver registers.
pub const GENERATE_EXPORT: &str = "generate";

/// Virtual file name the driver is bundled as.
const DRIVER_SOURCEFILE: &str = "generate.ts";

const DRIVER_TEMPLATE: &str = r#"import { parse } from "@wapc/widl";
import { Context, Writer } from "@wapc/widl/ast";
import { {{visitorClass}} } from "{{module}}";

function resolver(location, from) {
  return resolverCallback(location, from);
}

export function generate(widl, config) {
  const doc = parse(widl, resolver);
  const context = new Context(config);

  const writer = new Writer();
  const visitor = new {{visitorClass}}(writer);
  doc.accept(context, visitor);
  let source = writer.string();

  return source;
}

js_exports["generate"] = generate;
"#;

/// Render the driver script for one generation target.
pub fn driver_script(module: &str, visitor_class: &str) -> String {
    DRIVER_TEMPLATE
        .replace("{{module}}", module)
        .replace("{{visitorClass}}", visitor_class)
}

/// Compiles a script and its imports into one self-contained script.
pub trait Bundler {
    /// Bundle `script`, resolving its imports under `resolve_dir`.
    fn bundle(&self, script: &str, resolve_dir: &Path) -> Result<String, BundleError>;
}

/// [`Bundler`] backed by the `esbuild` executable.
#[derive(Debug, Clone)]
pub struct EsbuildBundler {
    program: String,
}

impl EsbuildBundler {
    /// Use the given esbuild executable.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for EsbuildBundler {
    fn default() -> Self {
        Self::new("esbuild")
    }
}

impl Bundler for EsbuildBundler {
    fn bundle(&self, script: &str, resolve_dir: &Path) -> Result<String, BundleError> {
        tracing::debug!(
            program = %self.program,
            resolve_dir = %resolve_dir.display(),
            "bundling generator"
        );

        let spawn_err = |e: std::io::Error| BundleError::Spawn {
            program: self.program.clone(),
            source: e,
        };

        let mut child = Command::new(&self.program)
            .args([
                "--bundle",
                "--loader=ts",
                &format!("--sourcefile={DRIVER_SOURCEFILE}"),
                "--log-level=warning",
                "--color=false",
            ])
            .current_dir(resolve_dir)
            .env("NODE_PATH", resolve_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;

        // esbuild may exit before reading its input; its exit status and
        // diagnostics take precedence over the failed write.
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(script.as_bytes()),
            None => Ok(()),
        };

        let output = child.wait_with_output().map_err(spawn_err)?;
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            let mut diagnostics = parse_diagnostics(&stderr);
            if diagnostics.is_empty() {
                diagnostics.push(Diagnostic::new(format!(
                    "{} exited with {}",
                    self.program, output.status
                )));
            }
            return Err(BundleError::Diagnostics(diagnostics));
        }
        written.map_err(spawn_err)?;

        for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
            tracing::warn!(target: "esbuild", "{line}");
        }

        let bundle = String::from_utf8_lossy(&output.stdout).into_owned();
        if bundle.trim().is_empty() {
            return Err(BundleError::EmptyOutput);
        }
        Ok(bundle)
    }
}

/// Extract error messages from esbuild's stderr.
///
/// Error headers look like `✘ [ERROR] Could not resolve "x"` (or
/// `error: ...` on older releases). The location lines that follow are
/// folded into the preceding message.
pub fn parse_diagnostics(stderr: &str) -> Vec<Diagnostic> {
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let mut in_error = false;

    for line in stderr.lines() {
        let trimmed = line.trim();
        if let Some(message) = error_header(trimmed) {
            diagnostics.push(Diagnostic::new(message));
            in_error = true;
        } else if trimmed.starts_with('▲') {
            in_error = false;
        } else if in_error && trimmed.contains(':') && !trimmed.starts_with('╵') {
            if let Some(last) = diagnostics.last_mut() {
                if !last.message.contains(" at ") {
                    last.message = format!("{} at {}", last.message, trimmed);
                }
            }
        }
    }

    diagnostics
}

fn error_header(line: &str) -> Option<&str> {
    if let Some(idx) = line.find("[ERROR]") {
        return Some(line[idx + "[ERROR]".len()..].trim());
    }
    line.strip_prefix("error: ").map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_script_substitutes_all_placeholders() {
        let script = driver_script("@wapc/widl-codegen/rust", "ModuleVisitor");

        assert!(script.contains(r#"import { ModuleVisitor } from "@wapc/widl-codegen/rust";"#));
        assert!(script.contains("new ModuleVisitor(writer)"));
        assert!(script.contains(r#"js_exports["generate"] = generate;"#));
        assert!(!script.contains("{{"));
    }

    #[test]
    fn test_driver_calls_resolver_callback() {
        let script = driver_script("m", "V");
        assert!(script.contains("resolverCallback(location, from)"));
        assert!(!script.contains("error: "));
    }

    #[test]
    fn test_parse_diagnostics_modern_format() {
        let stderr = "✘ [ERROR] Could not resolve \"@wapc/widl\"\n\n    generate.ts:1:22:\n      1 │ import { parse } from \"@wapc/widl\";\n        ╵                       ~~~~~~~~~~~~\n\n✘ [ERROR] No matching export in \"m.ts\" for import \"V\"\n\n1 error\n";
        let diagnostics = parse_diagnostics(stderr);

        assert_eq!(diagnostics.len(), 2);
        assert_eq!(
            diagnostics[0].message,
            "Could not resolve \"@wapc/widl\" at generate.ts:1:22:"
        );
        assert_eq!(
            diagnostics[1].message,
            "No matching export in \"m.ts\" for import \"V\""
        );
    }

    #[test]
    fn test_parse_diagnostics_legacy_format() {
        let diagnostics = parse_diagnostics("error: Could not resolve \"m\"\n");
        assert_eq!(diagnostics, vec![Diagnostic::new("Could not resolve \"m\"")]);
    }

    #[test]
    fn test_parse_diagnostics_ignores_warnings() {
        let stderr = "▲ [WARNING] Comparison with -0\n\n    m.ts:3:4:\n";
        assert!(parse_diagnostics(stderr).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_early_exit_reports_diagnostics() {
        // `sh` rejects the esbuild flags and exits without reading stdin.
        let bundler = EsbuildBundler::new("sh");
        let dir = tempfile::TempDir::new().unwrap();
        let script = "x".repeat(1 << 20);

        let err = bundler.bundle(&script, dir.path()).unwrap_err();
        match err {
            BundleError::Diagnostics(diagnostics) => assert!(!diagnostics.is_empty()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_executable_is_spawn_error() {
        let bundler = EsbuildBundler::new("wapc-test-no-such-esbuild");
        let dir = tempfile::TempDir::new().unwrap();
        let err = bundler.bundle("export {}", dir.path()).unwrap_err();
        assert!(matches!(err, BundleError::Spawn { ref program, .. } if program == "wapc-test-no-such-esbuild"));
    }
}
