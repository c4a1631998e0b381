//! Index summary sidecar
//!
//! After indexing, a compact `index.json` is written next to the database.
//! It is the canonical boot document for the UI: version, project path,
//! timestamp, counts, and the sorted package list.

use crate::core::error::Result;
use crate::store::{Stats, Store};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Contents of `<project>/.flowlens/index.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSummary {
    pub version: String,
    pub project_path: String,
    /// RFC3339 indexing timestamp
    pub indexed_at: String,
    pub package_count: usize,
    pub symbol_count: usize,
    pub entrypoint_count: usize,
    pub packages: Vec<String>,
}

impl IndexSummary {
    /// Build a summary from the store's current contents.
    pub fn from_store(store: &Store, project_path: &Path, indexed_at: DateTime<Utc>) -> Result<Self> {
        let stats: Stats = store.get_stats()?;
        let packages = store.package_paths()?;
        Ok(Self {
            version: "1".to_string(),
            project_path: project_path.display().to_string(),
            indexed_at: indexed_at.to_rfc3339(),
            package_count: stats.package_count,
            symbol_count: stats.symbol_count,
            entrypoint_count: stats.entrypoint_count,
            packages,
        })
    }

    /// Write the summary document to disk.
    pub fn write(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load a previously written summary.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
