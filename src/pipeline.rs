//! Indexing pipeline
//!
//! Runs the stages in order: load, symbols (commit), entry points
//! (commit), SSA, call edges (commit), signature discovery, tagging (two
//! commits). The store is cleared first, so one run is one generation;
//! readers are not started until the final commit and the summary
//! sidecar is written.

use crate::callgraph;
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::project::Project;
use crate::entrypoints;
use crate::loader::Loader;
use crate::ssa::SsaProgram;
use crate::store::{IndexSummary, Stats, Store};
use crate::symbols;
use crate::tagger;
use chrono::Utc;
use std::time::{Duration, Instant};
use tracing::info;

/// How many loader errors are printed verbatim.
const MAX_PRINTED_LOADER_ERRORS: usize = 5;

/// Result of one indexing run
#[derive(Debug)]
pub struct IndexOutcome {
    pub stats: Stats,
    pub loader_error_count: usize,
    pub elapsed: Duration,
}

/// Run the full pipeline for a project, printing progress to stdout.
pub fn run_index(project: &Project, config: &Config) -> Result<IndexOutcome> {
    let started = Instant::now();

    let store = Store::open(&project.root)?;
    store.clear()?;

    println!("Loading {} ...", project.root.display());
    let loader = Loader::load(project, config)?;
    report_loader_errors(&loader);

    println!("Extracting symbols from {} packages ...", loader.packages().len());
    let symbol_count = symbols::extract_and_store(&loader, config, &store)?;
    println!("  {} symbols", symbol_count);

    println!("Detecting entry points ...");
    let entrypoint_count = entrypoints::detect_and_store(&loader, &store)?;
    println!("  {} entry points", entrypoint_count);

    println!("Building SSA form ...");
    let program = SsaProgram::build(&loader);

    println!("Extracting call graph ...");
    let edge_count = callgraph::extract_and_store(&loader, &program, &store, |n| {
        println!("  ... {} functions", n);
    })?;
    println!("  {} call edges", edge_count);

    let discovered = entrypoints::signature::discover_and_store(&loader, &program, &store)?;
    if discovered > 0 {
        println!("  {} handlers discovered by signature", discovered);
    }

    println!("Tagging symbols ...");
    let (io_layer, purity) = tagger::run(&loader, config, &store)?;
    println!("  {} io/layer tags, {} purity tags", io_layer, purity);

    let indexed_at = Utc::now();
    store.set_metadata("project_path", &project.root.display().to_string())?;
    store.set_metadata("indexed_at", &indexed_at.to_rfc3339())?;

    let summary = IndexSummary::from_store(&store, &project.root, indexed_at)?;
    summary.write(&project.summary_path())?;

    let stats = store.get_stats()?;
    let elapsed = started.elapsed();
    info!(?elapsed, "indexing complete");

    Ok(IndexOutcome {
        stats,
        loader_error_count: loader.errors.len(),
        elapsed,
    })
}

fn report_loader_errors(loader: &Loader) {
    if loader.errors.is_empty() {
        return;
    }
    for err in loader.errors.iter().take(MAX_PRINTED_LOADER_ERRORS) {
        eprintln!("  warning: {}", err);
    }
    eprintln!("  {} loader error(s) total", loader.errors.len());
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

    fn fixture() -> TempDir {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "go.mod", "module example.com/app\n");
        write(
            temp.path(),
            "main.go",
            r#"package main

import "example.com/app/api"

func main() {
    api.Serve()
}
"#,
        );
        write(
            temp.path(),
            "api/api.go",
            r#"package api

func Serve() {
    prepare()
}

func prepare() {}
"#,
        );
        temp
    }

    #[test]
    fn test_run_index_populates_store_and_summary() {
        let temp = fixture();
        let project = Project::from_path(temp.path()).unwrap();
        let config = Config::default();

        let outcome = run_index(&project, &config).unwrap();
        assert_eq!(outcome.stats.package_count, 2);
        assert!(outcome.stats.symbol_count >= 3);
        assert_eq!(outcome.stats.entrypoint_count, 1); // main
        assert!(outcome.stats.edge_count >= 2);

        assert!(project.db_path().exists());
        let summary = IndexSummary::load(&project.summary_path()).unwrap();
        assert_eq!(summary.version, "1");
        assert_eq!(summary.package_count, 2);
        assert_eq!(
            summary.packages,
            vec![
                "example.com/app".to_string(),
                "example.com/app/api".to_string()
            ]
        );
    }

    #[test]
    fn test_reindex_is_idempotent() {
        let temp = fixture();
        let project = Project::from_path(temp.path()).unwrap();
        let config = Config::default();

        let first = run_index(&project, &config).unwrap();
        let second = run_index(&project, &config).unwrap();

        assert_eq!(first.stats.package_count, second.stats.package_count);
        assert_eq!(first.stats.symbol_count, second.stats.symbol_count);
        assert_eq!(first.stats.edge_count, second.stats.edge_count);
        assert_eq!(first.stats.entrypoint_count, second.stats.entrypoint_count);
        assert_eq!(first.stats.tag_count, second.stats.tag_count);
    }
}
