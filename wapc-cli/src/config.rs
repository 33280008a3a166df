//! Generation configuration loading and merging.
//!
//! A configuration file holds one or more YAML documents separated by `---`.
//! Each document names a schema, optional global generator config, and a
//! mapping of output paths to generator targets.

use crate::error::{CliResult, ConfigError};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Free-form generator configuration passed into the script as-is.
pub type ConfigMap = Map<String, Value>;

/// One parsed configuration document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GenerationDocument {
    /// Schema location: a local path or an `http(s)://` URL.
    pub schema: String,

    /// Global defaults applied to every target that does not set the key.
    #[serde(default)]
    pub config: Option<ConfigMap>,

    /// Output path to target. Sorted so runs are reproducible.
    pub generates: BTreeMap<String, GenerationTarget>,
}

/// A single output file and the generator that produces it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationTarget {
    /// Module specifier resolved by the bundler.
    pub module: String,

    /// Visitor class exported by the module.
    pub visitor_class: String,

    /// Leave the output alone once it exists.
    #[serde(default)]
    pub if_not_exists: bool,

    /// Per-target config; wins over the document's global config.
    #[serde(default)]
    pub config: Option<ConfigMap>,
}

impl GenerationDocument {
    /// Fill every target's config with global keys it does not define.
    pub fn merge_global_config(&mut self) {
        let Some(global) = self.config.as_ref() else {
            return;
        };
        for target in self.generates.values_mut() {
            target.merge_config(global);
        }
    }
}

impl GenerationTarget {
    /// Copy absent keys from `global` into this target's config.
    ///
    /// Keys the target already sets are never overwritten.
    pub fn merge_config(&mut self, global: &ConfigMap) {
        let config = self.config.get_or_insert_with(ConfigMap::new);
        for (key, value) in global {
            if !config.contains_key(key) {
                config.insert(key.clone(), value.clone());
            }
        }
    }

    /// Config value handed to the generator export.
    pub fn effective_config(&self) -> Value {
        Value::Object(self.config.clone().unwrap_or_default())
    }

    /// Whether generation for `output` should be skipped.
    ///
    /// Only `ifNotExists` targets are ever skipped, and only when the output
    /// already exists. A stat failure other than absence is returned.
    pub fn should_skip(&self, output: &Path) -> std::io::Result<bool> {
        if !self.if_not_exists {
            return Ok(false);
        }
        match std::fs::metadata(output) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Loader for multi-document generation configuration files.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and parse every document in a configuration file.
    pub fn load(path: &Path) -> CliResult<Vec<GenerationDocument>> {
        if !path.exists() {
            return Err(ConfigError::not_found(path.to_path_buf()).into());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(Self::parse_str(&content, &path.display().to_string())?)
    }

    /// Parse configuration text into its documents.
    ///
    /// Documents are split by the YAML parser rather than by searching for
    /// `---`, so a separator inside a quoted scalar stays part of the value.
    /// Empty documents are ignored. `origin` labels errors.
    pub fn parse_str(content: &str, origin: &str) -> Result<Vec<GenerationDocument>, ConfigError> {
        let mut documents = Vec::new();

        for (i, de) in serde_yaml::Deserializer::from_str(content).enumerate() {
            let index = i + 1;
            let value = serde_yaml::Value::deserialize(de)
                .map_err(|e| ConfigError::parse(origin, index, e.to_string()))?;
            if value.is_null() {
                continue;
            }
            let document: GenerationDocument = serde_yaml::from_value(value)
                .map_err(|e| ConfigError::parse(origin, index, e.to_string()))?;
            documents.push(document);
        }

        tracing::debug!(origin, documents = documents.len(), "parsed configuration");
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn object(value: Value) -> ConfigMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_parse_single_document() {
        let yaml = r#"
schema: schema.widl
config:
  package: greeting
generates:
  src/lib.rs:
    module: "@wapc/widl-codegen/rust"
    visitorClass: ModuleVisitor
  src/main.rs:
    module: "@wapc/widl-codegen/rust"
    visitorClass: ScaffoldVisitor
    ifNotExists: true
    config:
      logging: true
"#;

        let docs = ConfigLoader::parse_str(yaml, "test").unwrap();
        assert_eq!(docs.len(), 1);
        let doc = &docs[0];
        assert_eq!(doc.schema, "schema.widl");
        assert_eq!(doc.config, Some(object(json!({"package": "greeting"}))));
        assert_eq!(doc.generates.len(), 2);

        let lib = &doc.generates["src/lib.rs"];
        assert_eq!(lib.visitor_class, "ModuleVisitor");
        assert!(!lib.if_not_exists);
        assert!(lib.config.is_none());

        let main = &doc.generates["src/main.rs"];
        assert!(main.if_not_exists);
        assert_eq!(main.config, Some(object(json!({"logging": true}))));
    }

    #[test]
    fn test_parse_multiple_documents() {
        let yaml = "schema: a.widl\ngenerates: {}\n---\nschema: b.widl\ngenerates: {}\n";
        let docs = ConfigLoader::parse_str(yaml, "test").unwrap();
        let schemas: Vec<_> = docs.iter().map(|d| d.schema.as_str()).collect();
        assert_eq!(schemas, vec!["a.widl", "b.widl"]);
    }

    #[test]
    fn test_separator_inside_quoted_scalar_does_not_split() {
        let yaml = r#"
schema: a.widl
config:
  banner: "---"
generates: {}
"#;
        let docs = ConfigLoader::parse_str(yaml, "test").unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(
            docs[0].config.as_ref().unwrap()["banner"],
            Value::String("---".into())
        );
    }

    #[test]
    fn test_empty_documents_are_skipped() {
        let yaml = "---\nschema: a.widl\ngenerates: {}\n---\n";
        let docs = ConfigLoader::parse_str(yaml, "test").unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn test_generates_must_be_mapping() {
        let yaml = "schema: a.widl\ngenerates: {}\n---\nschema: b.widl\ngenerates:\n  - out.ts\n";
        let err = ConfigLoader::parse_str(yaml, "codegen.yaml").unwrap_err();
        match err {
            ConfigError::Parse { origin, index, .. } => {
                assert_eq!(origin, "codegen.yaml");
                assert_eq!(index, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_schema_is_parse_error() {
        let err = ConfigLoader::parse_str("generates: {}\n", "test").unwrap_err();
        assert!(err.to_string().contains("schema"));
    }

    #[test]
    fn test_merge_fills_only_absent_keys() {
        let mut target = GenerationTarget {
            module: "m".into(),
            visitor_class: "V".into(),
            if_not_exists: false,
            config: Some(object(json!({"package": "mine"}))),
        };
        target.merge_config(&object(json!({"package": "global", "logging": true})));

        assert_eq!(
            target.config,
            Some(object(json!({"package": "mine", "logging": true})))
        );
    }

    #[test]
    fn test_merge_initializes_missing_config() {
        let yaml = r#"
schema: s.widl
config:
  package: p
generates:
  out.ts:
    module: m
    visitorClass: V
"#;
        let mut doc = ConfigLoader::parse_str(yaml, "test").unwrap().remove(0);
        doc.merge_global_config();
        assert_eq!(
            doc.generates["out.ts"].config,
            Some(object(json!({"package": "p"})))
        );
    }

    #[test]
    fn test_merge_without_global_leaves_targets_alone() {
        let yaml = "schema: s.widl\ngenerates:\n  out.ts:\n    module: m\n    visitorClass: V\n";
        let mut doc = ConfigLoader::parse_str(yaml, "test").unwrap().remove(0);
        doc.merge_global_config();
        assert!(doc.generates["out.ts"].config.is_none());
        assert_eq!(doc.generates["out.ts"].effective_config(), json!({}));
    }

    #[test]
    fn test_should_skip() {
        let dir = TempDir::new().unwrap();
        let existing = dir.path().join("exists.rs");
        std::fs::write(&existing, "fn main() {}").unwrap();
        let missing = dir.path().join("missing.rs");

        let mut target = GenerationTarget {
            module: "m".into(),
            visitor_class: "V".into(),
            if_not_exists: true,
            config: None,
        };
        assert!(target.should_skip(&existing).unwrap());
        assert!(!target.should_skip(&missing).unwrap());

        target.if_not_exists = false;
        assert!(!target.should_skip(&existing).unwrap());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = ConfigLoader::load(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(
            err,
            crate::error::CliError::Config(ConfigError::NotFound { .. })
        ));
    }
}
