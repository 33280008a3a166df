//! Schema import resolution.
//!
//! When a schema imports another (`import * from "wapc/core"`), the parser
//! running inside the sandbox asks the host for the imported text. Locations
//! are slash-delimited and resolved under the definitions root.

use crate::error::ResolveError;
use crate::sandbox::HostCallbacks;
use crate::source;
use std::path::{Path, PathBuf};

/// Extension of schema files, without the dot.
pub const SCHEMA_EXTENSION: &str = "widl";

/// File read when a location names a directory.
pub const DIRECTORY_INDEX: &str = "index.widl";

/// Resolves import locations to schema source text.
#[derive(Debug, Clone)]
pub struct SchemaResolver {
    definitions_root: PathBuf,
}

impl SchemaResolver {
    /// Create a resolver rooted at `definitions_root`.
    pub fn new(definitions_root: impl Into<PathBuf>) -> Self {
        Self {
            definitions_root: definitions_root.into(),
        }
    }

    /// Pick the file a location refers to.
    ///
    /// In order: a location that already has the schema extension is used
    /// as-is; then `<candidate>.widl` if it is a regular file; then
    /// `<candidate>/index.widl` if the candidate is a directory; otherwise
    /// `<candidate>.widl`, without checking that it exists. The only
    /// failure is a stat error on the bare candidate.
    pub fn resolve_path(&self, location: &str) -> Result<PathBuf, ResolveError> {
        let candidate = location
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.definitions_root.clone(), |path, segment| path.join(segment));

        if has_schema_extension(&candidate) {
            return Ok(candidate);
        }

        let with_extension = append_extension(&candidate);
        if std::fs::metadata(&with_extension).is_ok_and(|m| m.is_file()) {
            return Ok(with_extension);
        }

        let metadata = std::fs::metadata(&candidate).map_err(|e| ResolveError::Io {
            path: candidate.clone(),
            source: e,
        })?;
        if metadata.is_dir() {
            Ok(candidate.join(DIRECTORY_INDEX))
        } else {
            Ok(with_extension)
        }
    }

    /// Resolve a location and read its contents.
    ///
    /// `http(s)://` locations are fetched directly instead of being mapped
    /// under the definitions root.
    pub fn resolve(&self, location: &str) -> Result<String, ResolveError> {
        if source::is_remote(location) {
            return Ok(source::read_source(location)?);
        }

        let path = self.resolve_path(location)?;
        tracing::debug!(location, path = %path.display(), "resolved schema import");
        std::fs::read_to_string(&path).map_err(|e| ResolveError::Io { path, source: e })
    }
}

impl HostCallbacks for SchemaResolver {
    fn resolve(&self, location: &str, from: Option<&str>) -> Result<String, ResolveError> {
        let result = SchemaResolver::resolve(self, location);
        if let Err(e) = &result {
            tracing::debug!(location, from = from.unwrap_or_default(), error = %e, "schema import failed");
        }
        result
    }
}

/// Whether the file name ends in `.widl`. A bare `.widl` name counts.
fn has_schema_extension(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_suffix(SCHEMA_EXTENSION))
        .is_some_and(|stem| stem.ends_with('.'))
}

fn append_extension(path: &Path) -> PathBuf {
    let mut raw = path.as_os_str().to_os_string();
    raw.push(".");
    raw.push(SCHEMA_EXTENSION);
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_explicit_extension_used_as_is() {
        let dir = TempDir::new().unwrap();
        let resolver = SchemaResolver::new(dir.path());

        let path = resolver.resolve_path("wapc/core.widl").unwrap();
        assert_eq!(path, dir.path().join("wapc").join("core.widl"));
    }

    #[test]
    fn test_dot_widl_name_used_as_is() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a/.widl.widl", "appended");
        let resolver = SchemaResolver::new(dir.path());

        let path = resolver.resolve_path("a/.widl").unwrap();
        assert_eq!(path, dir.path().join("a").join(".widl"));
        assert!(!has_schema_extension(Path::new("a/widl")));
        assert!(!has_schema_extension(Path::new("a/core.widlx")));
    }

    #[test]
    fn test_file_with_extension_preferred() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a/b.widl", "file");
        write(dir.path(), "a/b/index.widl", "index");
        let resolver = SchemaResolver::new(dir.path());

        assert_eq!(resolver.resolve("a/b").unwrap(), "file");
    }

    #[test]
    fn test_directory_index() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a/b/index.widl", "index");
        let resolver = SchemaResolver::new(dir.path());

        assert_eq!(
            resolver.resolve_path("a/b").unwrap(),
            dir.path().join("a").join("b").join("index.widl")
        );
        assert_eq!(resolver.resolve("a/b").unwrap(), "index");
    }

    #[test]
    fn test_bare_file_falls_back_to_extension_without_checking() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a/b", "bare file");
        let resolver = SchemaResolver::new(dir.path());

        let path = resolver.resolve_path("a/b").unwrap();
        assert_eq!(path, dir.path().join("a").join("b.widl"));

        let err = resolver.resolve("a/b").unwrap_err();
        match err {
            ResolveError::Io { path: p, source } => {
                assert_eq!(p, path);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_location_fails_on_stat() {
        let dir = TempDir::new().unwrap();
        let resolver = SchemaResolver::new(dir.path());

        let err = resolver.resolve_path("nope/missing").unwrap_err();
        match err {
            ResolveError::Io { path, source } => {
                assert_eq!(path, dir.path().join("nope").join("missing"));
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_directory_named_like_schema_is_not_selected() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b.widl")).unwrap();
        write(dir.path(), "a/b/index.widl", "index");
        let resolver = SchemaResolver::new(dir.path());

        assert_eq!(resolver.resolve("a/b").unwrap(), "index");
    }

    #[test]
    fn test_host_callback_delegates() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "wapc/core.widl", "namespace \"wapc\"");
        let resolver = SchemaResolver::new(dir.path());

        let text = HostCallbacks::resolve(&resolver, "wapc/core", Some("schema.widl")).unwrap();
        assert_eq!(text, "namespace \"wapc\"");
    }
}
