//! Project detection and paths

use crate::core::config::Config;
use crate::core::error::{Error, Result};
use std::path::{Path, PathBuf};

/// A Go project rooted at a directory on disk
#[derive(Debug, Clone)]
pub struct Project {
    /// Absolute path to the project root
    pub root: PathBuf,
    /// Name of the project (directory name)
    pub name: String,
}

impl Project {
    /// Create a project from an explicit path (must exist and be a directory).
    pub fn from_path(path: &Path) -> Result<Self> {
        let root = path.canonicalize().map_err(|_| Error::Loader {
            message: format!("Project not found: {}", path.display()),
        })?;

        if !root.is_dir() {
            return Err(Error::Loader {
                message: format!("Not a directory: {}", root.display()),
            });
        }

        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        Ok(Self { root, name })
    }

    /// Path to this project's index database.
    pub fn db_path(&self) -> PathBuf {
        Config::db_path(&self.root)
    }

    /// Path to this project's index summary document.
    pub fn summary_path(&self) -> PathBuf {
        Config::summary_path(&self.root)
    }

    /// Check that an index exists, for commands that only read it.
    pub fn require_index(&self) -> Result<()> {
        let db = self.db_path();
        if !db.exists() {
            return Err(Error::IndexMissing { path: db });
        }
        Ok(())
    }

    /// Module path from `go.mod`, when present. Falls back to the
    /// directory name so relative package paths stay stable.
    pub fn module_path(&self) -> String {
        let go_mod = self.root.join("go.mod");
        if let Ok(content) = std::fs::read_to_string(&go_mod) {
            for line in content.lines() {
                let line = line.trim();
                if let Some(rest) = line.strip_prefix("module") {
                    let module = rest.trim().trim_matches('"');
                    if !module.is_empty() {
                        return module.to_string();
                    }
                }
            }
        }
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_from_path_rejects_missing() {
        let result = Project::from_path(Path::new("/definitely/not/here"));
        assert!(result.is_err());
    }

    #[test]
    fn test_module_path_from_go_mod() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("go.mod"),
            "module example.com/acme/widgets\n\ngo 1.22\n",
        )
        .unwrap();

        let project = Project::from_path(temp.path()).unwrap();
        assert_eq!(project.module_path(), "example.com/acme/widgets");
    }

    #[test]
    fn test_module_path_fallback_is_dir_name() {
        let temp = TempDir::new().unwrap();
        let project = Project::from_path(temp.path()).unwrap();
        assert_eq!(project.module_path(), project.name);
    }

    #[test]
    fn test_require_index() {
        let temp = TempDir::new().unwrap();
        let project = Project::from_path(temp.path()).unwrap();
        assert!(matches!(
            project.require_index(),
            Err(Error::IndexMissing { .. })
        ));

        std::fs::create_dir_all(Config::flowlens_dir(temp.path())).unwrap();
        std::fs::write(project.db_path(), b"").unwrap();
        assert!(project.require_index().is_ok());
    }
}
