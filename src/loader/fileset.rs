//! File identity and position mapping
//!
//! Every loaded file gets a stable id in load order. Positions are derived
//! from tree-sitter nodes; lines are 1-based like every Go toolchain.

use std::collections::HashMap;
use tree_sitter::Node;

/// Monotonic index of loaded files
#[derive(Debug, Default)]
pub struct FileSet {
    files: Vec<String>,
    by_path: HashMap<String, u32>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a root-relative path, returning its id. Registering the
    /// same path twice returns the original id.
    pub fn add(&mut self, rel_path: &str) -> u32 {
        if let Some(&id) = self.by_path.get(rel_path) {
            return id;
        }
        let id = self.files.len() as u32;
        self.files.push(rel_path.to_string());
        self.by_path.insert(rel_path.to_string(), id);
        id
    }

    /// Path for a file id.
    pub fn path(&self, id: u32) -> Option<&str> {
        self.files.get(id as usize).map(|s| s.as_str())
    }

    /// Id for a path.
    pub fn id(&self, rel_path: &str) -> Option<u32> {
        self.by_path.get(rel_path).copied()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// 1-based line of a node.
    pub fn line(node: &Node) -> u32 {
        node.start_position().row as u32 + 1
    }

    /// `(file, line)` for a node in a known file.
    pub fn position(&self, file_id: u32, node: &Node) -> Option<(String, u32)> {
        self.path(file_id)
            .map(|p| (p.to_string(), Self::line(node)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_stable_and_deduplicated() {
        let mut fs = FileSet::new();
        let a = fs.add("main.go");
        let b = fs.add("api/users.go");
        let a2 = fs.add("main.go");
        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(fs.path(b), Some("api/users.go"));
        assert_eq!(fs.id("main.go"), Some(a));
        assert_eq!(fs.len(), 2);
    }
}
