//! Tool home directory layout.
//!
//! Generator modules, schema definitions and templates live under a single
//! home directory (by default `~/.wapc`). Populating it is the job of the
//! package installer; this module only locates it and makes sure the
//! expected skeleton exists.

use crate::error::HomeError;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the home location.
pub const HOME_ENV: &str = "WAPC_HOME";

/// Directory name used under the user's home.
const HOME_DIR_NAME: &str = ".wapc";

/// Packages every generation run depends on, with the paths that must exist
/// for each to count as installed.
const BASE_DEPENDENCIES: &[(&str, &[&str])] = &[
    ("@wapc/widl", &["src/@wapc/widl"]),
    (
        "@wapc/widl-codegen",
        &["src/@wapc/widl-codegen", "templates/@wapc/widl-codegen"],
    ),
];

/// Resolved tool home directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WapcHome {
    root: PathBuf,
}

impl WapcHome {
    /// Use an explicit root directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Locate the home directory.
    ///
    /// An explicit override wins; otherwise `.wapc` under the user's home.
    pub fn locate(explicit: Option<&Path>) -> Result<Self, HomeError> {
        if let Some(path) = explicit {
            return Ok(Self::new(path));
        }

        let user_home = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .filter(|v| !v.is_empty())
            .ok_or(HomeError::NoHomeDirectory)?;

        Ok(Self::new(PathBuf::from(user_home).join(HOME_DIR_NAME)))
    }

    /// Create the `src` and `templates` directories if they are missing and
    /// warn about base packages that have not been installed.
    pub fn ensure(&self) -> Result<(), HomeError> {
        for dir in [self.src_dir(), self.templates_dir()] {
            if !dir.exists() {
                create_private_dir(&dir)?;
                tracing::debug!(path = %dir.display(), "created home directory");
            }
        }

        for package in self.missing_base_dependencies() {
            tracing::warn!(
                package,
                home = %self.root.display(),
                "base dependency is not installed; generation will fail to bundle"
            );
        }

        Ok(())
    }

    /// Base packages with at least one expected path missing.
    pub fn missing_base_dependencies(&self) -> Vec<&'static str> {
        BASE_DEPENDENCIES
            .iter()
            .filter(|(_, checks)| checks.iter().any(|c| !self.root.join(c).exists()))
            .map(|(name, _)| *name)
            .collect()
    }

    /// Root of the home directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Module sources; the bundler resolves generator imports here.
    pub fn src_dir(&self) -> PathBuf {
        self.root.join("src")
    }

    /// Schema definitions searched by the import resolver.
    pub fn definitions_dir(&self) -> PathBuf {
        self.root.join("definitions")
    }

    /// Project templates.
    pub fn templates_dir(&self) -> PathBuf {
        self.root.join("templates")
    }

    /// Script providing the in-process TypeScript formatter.
    pub fn typescript_formatter(&self) -> PathBuf {
        self.root.join("formatters").join("typescript.js")
    }
}

#[cfg(unix)]
fn create_private_dir(path: &Path) -> Result<(), HomeError> {
    use std::os::unix::fs::DirBuilderExt;

    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(path)
        .map_err(|e| HomeError::CreateDir {
            path: path.to_path_buf(),
            source: e,
        })
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path) -> Result<(), HomeError> {
    std::fs::create_dir_all(path).map_err(|e| HomeError::CreateDir {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_locate_explicit() {
        let home = WapcHome::locate(Some(Path::new("/opt/wapc"))).unwrap();
        assert_eq!(home.root(), Path::new("/opt/wapc"));
        assert_eq!(home.src_dir(), PathBuf::from("/opt/wapc/src"));
        assert_eq!(home.definitions_dir(), PathBuf::from("/opt/wapc/definitions"));
        assert_eq!(
            home.typescript_formatter(),
            PathBuf::from("/opt/wapc/formatters/typescript.js")
        );
    }

    #[test]
    fn test_ensure_creates_skeleton() {
        let dir = TempDir::new().unwrap();
        let home = WapcHome::new(dir.path().join("home"));
        home.ensure().unwrap();

        assert!(home.src_dir().is_dir());
        assert!(home.templates_dir().is_dir());
    }

    #[test]
    fn test_missing_base_dependencies() {
        let dir = TempDir::new().unwrap();
        let home = WapcHome::new(dir.path());
        assert_eq!(
            home.missing_base_dependencies(),
            vec!["@wapc/widl", "@wapc/widl-codegen"]
        );

        std::fs::create_dir_all(dir.path().join("src/@wapc/widl")).unwrap();
        std::fs::create_dir_all(dir.path().join("src/@wapc/widl-codegen")).unwrap();
        assert_eq!(home.missing_base_dependencies(), vec!["@wapc/widl-codegen"]);

        std::fs::create_dir_all(dir.path().join("templates/@wapc/widl-codegen")).unwrap();
        assert!(home.missing_base_dependencies().is_empty());
    }
}
