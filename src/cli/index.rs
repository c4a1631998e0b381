//! `flowlens index` command

use crate::cli::IndexArgs;
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::project::Project;
use crate::pipeline;
use std::path::PathBuf;

pub fn run(args: IndexArgs) -> Result<()> {
    let path = args.path.unwrap_or_else(|| PathBuf::from("."));
    let project = Project::from_path(&path)?;
    let config = Config::load(&project.root)?;

    let outcome = pipeline::run_index(&project, &config)?;

    eprintln!();
    eprintln!(
        "\x1b[36m>\x1b[0m indexed \x1b[36m{}\x1b[0m in {:.1?}",
        project.name, outcome.elapsed
    );
    eprintln!(
        "  {} packages, {} symbols, {} edges, {} entry points, {} tags",
        outcome.stats.package_count,
        outcome.stats.symbol_count,
        outcome.stats.edge_count,
        outcome.stats.entrypoint_count,
        outcome.stats.tag_count
    );
    if outcome.loader_error_count > 0 {
        eprintln!("  {} package(s) had loader errors", outcome.loader_error_count);
    }
    Ok(())
}
