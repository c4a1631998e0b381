//! Walks project files respecting .gitignore and configured exclusions

use crate::core::config::{dir_excluded, file_glob_matches, Config};
use crate::core::error::Result;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Maximum source file size considered for parsing.
const MAX_FILE_SIZE: u64 = 2_097_152; // 2MB

/// Walks `.go` files under a project root
pub struct SourceWalker<'a> {
    root: PathBuf,
    config: &'a Config,
}

impl<'a> SourceWalker<'a> {
    pub fn new(root: &Path, config: &'a Config) -> Self {
        Self {
            root: root.to_path_buf(),
            config,
        }
    }

    /// Walk all loadable Go files, returning root-relative paths with `/`
    /// separators, sorted for deterministic package grouping.
    pub fn walk(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();

        let walker = WalkBuilder::new(&self.root)
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .require_git(false)
            .build();

        for entry in walker.flatten() {
            let path = entry.path();

            if path.is_dir() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some("go") {
                continue;
            }
            if let Ok(meta) = path.metadata() {
                if meta.len() > MAX_FILE_SIZE {
                    continue;
                }
            }

            let rel = match path.strip_prefix(&self.root) {
                Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
                Err(_) => continue,
            };

            if dir_excluded(&self.config.exclude.dirs, &rel) {
                continue;
            }
            if self
                .config
                .exclude
                .files_glob
                .iter()
                .any(|p| file_glob_matches(p, &rel))
            {
                continue;
            }

            files.push(rel);
        }

        files.sort_unstable();
        Ok(files)
    }
}
