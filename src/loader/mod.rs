//! Source loader
//!
//! Loads every Go source unit reachable from the project root: walks the
//! tree, parses files in parallel, and groups them into packages with a
//! stable `pkg_path` of the form `<module>[/<dir>]`. Loader errors are
//! tolerated at the package level; a package with no successfully parsed
//! files is skipped and indexing continues.

pub mod fileset;
pub mod gosrc;
pub mod walker;

pub use fileset::FileSet;
pub use gosrc::Import;

use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::core::project::Project;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};
use tree_sitter::Tree;
use walker::SourceWalker;

/// One parsed source file
pub struct LoadedFile {
    pub file_id: u32,
    /// Root-relative path with `/` separators.
    pub rel_path: String,
    pub source: String,
    pub tree: Tree,
    /// Package name from the `package` clause.
    pub package_name: String,
    /// Import table: reference alias -> import path.
    pub imports: Vec<Import>,
}

/// One loaded package (all parsed files sharing a directory)
pub struct LoadedPackage {
    /// `<module>` for the root directory, else `<module>/<dir>`.
    pub pkg_path: String,
    /// Root-relative directory, `.` for the project root.
    pub dir: String,
    /// Go package name (first non-test clause wins).
    pub name: String,
    pub files: Vec<LoadedFile>,
}

impl LoadedPackage {
    /// Whether any file of this package imports the given path.
    pub fn imports_path(&self, import_path: &str) -> bool {
        self.files
            .iter()
            .any(|f| f.imports.iter().any(|i| i.path == import_path))
    }

    /// Union of all files' import paths, deduplicated and sorted.
    pub fn import_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .files
            .iter()
            .flat_map(|f| f.imports.iter().map(|i| i.path.clone()))
            .collect();
        paths.sort_unstable();
        paths.dedup();
        paths
    }
}

/// All loaded packages of one project, plus the position index
pub struct Loader {
    pub module: String,
    pub root: PathBuf,
    packages: Vec<LoadedPackage>,
    file_set: FileSet,
    /// Human-readable loader errors, in walk order.
    pub errors: Vec<String>,
}

impl Loader {
    /// Load every source unit under the project root.
    pub fn load(project: &Project, config: &Config) -> Result<Self> {
        Self::load_filtered(project, config, None)
    }

    /// Load only the package rooted at one root-relative directory. Used
    /// by per-function CFG queries to rebuild a single package cheaply.
    pub fn load_package_dir(project: &Project, config: &Config, dir: &str) -> Result<Self> {
        Self::load_filtered(project, config, Some(dir))
    }

    fn load_filtered(project: &Project, config: &Config, only_dir: Option<&str>) -> Result<Self> {
        let module = project.module_path();
        let walker = SourceWalker::new(&project.root, config);
        let mut rel_paths = walker.walk()?;

        if let Some(dir) = only_dir {
            rel_paths.retain(|p| parent_dir(p) == dir);
        }

        // Parse in parallel; collect per-file outcomes in walk order.
        let parsed: Vec<(String, std::result::Result<ParsedFile, String>)> = rel_paths
            .par_iter()
            .map(|rel| {
                let abs = project.root.join(rel);
                (rel.clone(), parse_one(&abs, rel))
            })
            .collect();

        let mut file_set = FileSet::new();
        let mut errors = Vec::new();
        let mut by_dir: BTreeMap<String, Vec<LoadedFile>> = BTreeMap::new();

        for (rel, outcome) in parsed {
            match outcome {
                Ok(parsed) => {
                    let file_id = file_set.add(&rel);
                    let dir = parent_dir(&rel).to_string();
                    by_dir.entry(dir).or_default().push(LoadedFile {
                        file_id,
                        rel_path: rel,
                        source: parsed.source,
                        tree: parsed.tree,
                        package_name: parsed.package_name,
                        imports: parsed.imports,
                    });
                }
                Err(message) => {
                    debug!(file = %rel, error = %message, "skipping file");
                    errors.push(message);
                }
            }
        }

        let mut packages = Vec::new();
        for (dir, files) in by_dir {
            let name = files
                .iter()
                .map(|f| f.package_name.as_str())
                .find(|n| !n.ends_with("_test"))
                .unwrap_or(&files[0].package_name)
                .to_string();
            let pkg_path = if dir == "." {
                module.clone()
            } else {
                format!("{}/{}", module, dir)
            };
            packages.push(LoadedPackage {
                pkg_path,
                dir,
                name,
                files,
            });
        }

        if packages.is_empty() && only_dir.is_none() {
            return Err(Error::Loader {
                message: format!("no loadable Go packages under {}", project.root.display()),
            });
        }

        info!(
            packages = packages.len(),
            files = file_set.len(),
            errors = errors.len(),
            "loaded project"
        );

        Ok(Self {
            module,
            root: project.root.clone(),
            packages,
            file_set,
            errors,
        })
    }

    /// Loaded packages, ordered by directory.
    pub fn packages(&self) -> &[LoadedPackage] {
        &self.packages
    }

    /// The position index for loaded files.
    pub fn file_set(&self) -> &FileSet {
        &self.file_set
    }

    /// Find a loaded package by its `pkg_path`.
    pub fn package(&self, pkg_path: &str) -> Option<&LoadedPackage> {
        self.packages.iter().find(|p| p.pkg_path == pkg_path)
    }

    /// Whether a package path belongs to this project's module.
    pub fn is_project_package(&self, pkg_path: &str) -> bool {
        pkg_path == self.module || pkg_path.starts_with(&format!("{}/", self.module))
    }
}

struct ParsedFile {
    source: String,
    tree: Tree,
    package_name: String,
    imports: Vec<Import>,
}

fn parse_one(abs: &std::path::Path, rel: &str) -> std::result::Result<ParsedFile, String> {
    let source =
        std::fs::read_to_string(abs).map_err(|e| format!("{}: read failed: {}", rel, e))?;
    let tree = gosrc::parse(&source).ok_or_else(|| format!("{}: parse failed", rel))?;
    if tree.root_node().has_error() {
        // Still usable: tree-sitter recovers around syntax errors. Record
        // the condition but keep the file.
        debug!(file = %rel, "parsed with syntax errors");
    }
    let package_name = gosrc::package_name(&tree, &source)
        .ok_or_else(|| format!("{}: missing package clause", rel))?;
    let imports = gosrc::imports(&tree, &source);
    Ok(ParsedFile {
        source,
        tree,
        package_name,
        imports,
    })
}

/// Parent directory of a root-relative path, `.` at the root.
fn parent_dir(rel: &str) -> &str {
    match rel.rfind('/') {
        Some(idx) => &rel[..idx],
        None => ".",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &std::path::Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn fixture() -> (TempDir, Project) {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "go.mod", "module example.com/app\n");
        write(
            temp.path(),
            "main.go",
            "package main\n\nfunc main() {}\n",
        );
        write(
            temp.path(),
            "api/users.go",
            "package api\n\nimport \"fmt\"\n\nfunc Handle() { fmt.Println(\"x\") }\n",
        );
        let project = Project::from_path(temp.path()).unwrap();
        (temp, project)
    }

    #[test]
    fn test_load_groups_by_directory() {
        let (_temp, project) = fixture();
        let loader = Loader::load(&project, &Config::default()).unwrap();

        let paths: Vec<&str> = loader.packages().iter().map(|p| p.pkg_path.as_str()).collect();
        assert_eq!(paths, vec!["example.com/app", "example.com/app/api"]);

        let root_pkg = loader.package("example.com/app").unwrap();
        assert_eq!(root_pkg.name, "main");
        assert_eq!(root_pkg.dir, ".");

        let api = loader.package("example.com/app/api").unwrap();
        assert!(api.imports_path("fmt"));
    }

    #[test]
    fn test_load_tolerates_bad_files() {
        let (temp, project) = fixture();
        write(temp.path(), "api/broken.go", "not go at all {{{{");

        let loader = Loader::load(&project, &Config::default()).unwrap();
        // The broken file has no package clause; the rest still loads.
        assert_eq!(loader.errors.len(), 1);
        assert!(loader.package("example.com/app/api").is_some());
    }

    #[test]
    fn test_is_project_package() {
        let (_temp, project) = fixture();
        let loader = Loader::load(&project, &Config::default()).unwrap();
        assert!(loader.is_project_package("example.com/app"));
        assert!(loader.is_project_package("example.com/app/api"));
        assert!(!loader.is_project_package("example.com/apple"));
        assert!(!loader.is_project_package("fmt"));
    }

    #[test]
    fn test_load_single_package_dir() {
        let (_temp, project) = fixture();
        let loader = Loader::load_package_dir(&project, &Config::default(), "api").unwrap();
        assert_eq!(loader.packages().len(), 1);
        assert_eq!(loader.packages()[0].pkg_path, "example.com/app/api");
    }
}
