//! The generation pipeline.
//!
//! For every document in a configuration file: read the schema, then for
//! each target either skip it (`ifNotExists`) or bundle its generator, run
//! it in a fresh sandbox, format the text in memory where possible and
//! write it. Once every target of the document is done, external
//! formatters run over the files that were written.

use crate::bundler::{self, Bundler, GENERATE_EXPORT};
use crate::config::{ConfigLoader, GenerationDocument, GenerationTarget};
use crate::error::{CliError, CliResult, SandboxError};
use crate::formatter::FormatterOrchestrator;
use crate::home::WapcHome;
use crate::resolver::SchemaResolver;
use crate::sandbox::{HostCallbacks, ScriptSandbox, ScriptValue};
use crate::source;
use crate::writer::{FileWriter, WriteResult};
use colored::Colorize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// What a generation run did.
#[derive(Debug, Default)]
pub struct GenerationReport {
    /// Outputs produced, in processing order.
    pub generated: Vec<WriteResult>,
    /// `ifNotExists` outputs left alone.
    pub skipped: Vec<PathBuf>,
    /// Outputs passed through an external formatter.
    pub formatted: Vec<PathBuf>,
}

/// Runs generation for configuration files.
///
/// Owns the formatter orchestrator, so the shared TypeScript formatter
/// sandbox lives exactly as long as the generator.
pub struct Generator {
    home: WapcHome,
    bundler: Box<dyn Bundler>,
    formatters: FormatterOrchestrator,
    writer: FileWriter,
}

impl Generator {
    /// Create a generator.
    pub fn new(
        home: WapcHome,
        bundler: Box<dyn Bundler>,
        formatters: FormatterOrchestrator,
        writer: FileWriter,
    ) -> Self {
        Self {
            home,
            bundler,
            formatters,
            writer,
        }
    }

    /// Generate every document in the configuration file at `config_path`.
    ///
    /// The first failure aborts the run. Outputs already written stay on
    /// disk.
    pub fn run(&mut self, config_path: &Path) -> CliResult<GenerationReport> {
        self.home.ensure()?;
        let documents = ConfigLoader::load(config_path)?;

        let mut report = GenerationReport::default();
        for document in documents {
            self.generate_document(document, &mut report)?;
        }
        Ok(report)
    }

    /// Generate all targets of one document, then run external formatters.
    pub fn generate_document(
        &mut self,
        mut document: GenerationDocument,
        report: &mut GenerationReport,
    ) -> CliResult<()> {
        let schema = source::read_source(&document.schema)?;
        document.merge_global_config();

        let resolver: Rc<dyn HostCallbacks> =
            Rc::new(SchemaResolver::new(self.home.definitions_dir()));
        let mut written = Vec::new();

        for (filename, target) in &document.generates {
            let path = Path::new(filename);

            let skip = target.should_skip(path).map_err(|e| CliError::Stat {
                path: path.to_path_buf(),
                source: e,
            })?;
            if skip {
                println!("{}", format!("Skipping {filename}...").yellow());
                report.skipped.push(path.to_path_buf());
                continue;
            }

            println!("{}", format!("Generating {filename}...").cyan());
            let source = self.generate_target(&schema, target, resolver.clone())?;
            let source = self.formatters.format_source(path, source)?;
            let result = self.writer.write(path, &source)?;
            written.push(result);
        }

        let on_disk = written.iter().filter(|r| r.was_written()).map(WriteResult::path);
        let formatted = self.formatters.format_outputs(on_disk)?;

        report.formatted.extend(formatted);
        report.generated.extend(written);
        Ok(())
    }

    /// Bundle a target's generator and run it against `schema`.
    fn generate_target(
        &self,
        schema: &str,
        target: &GenerationTarget,
        resolver: Rc<dyn HostCallbacks>,
    ) -> CliResult<String> {
        let driver = bundler::driver_script(&target.module, &target.visitor_class);
        let bundle = self.bundler.bundle(&driver, &self.home.src_dir())?;

        let sandbox = ScriptSandbox::new(&bundle, Some(resolver))?;
        let result = sandbox.invoke(
            GENERATE_EXPORT,
            &[Value::String(schema.to_string()), target.effective_config()],
        );
        sandbox.dispose();

        match result? {
            ScriptValue::String(source) => Ok(source),
            _ => Err(SandboxError::UnexpectedResult {
                export: GENERATE_EXPORT.to_string(),
            }
            .into()),
        }
    }

    /// Local files a run of `config_path` reads: the file itself and every
    /// non-remote schema it names.
    pub fn watch_paths(config_path: &Path) -> CliResult<Vec<PathBuf>> {
        let mut paths = vec![config_path.to_path_buf()];
        for document in ConfigLoader::load(config_path)? {
            if source::is_remote(&document.schema) {
                continue;
            }
            let schema = PathBuf::from(&document.schema);
            if !paths.contains(&schema) {
                paths.push(schema);
            }
        }
        Ok(paths)
    }
}
