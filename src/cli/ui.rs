//! `flowlens ui` command

use crate::cli::UiArgs;
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::project::Project;
use crate::query::QueryEngine;
use crate::server;
use crate::store::Store;
use std::path::PathBuf;

pub async fn run(args: UiArgs) -> Result<()> {
    let path = args.path.unwrap_or_else(|| PathBuf::from("."));
    let project = Project::from_path(&path)?;

    // Refuse to serve without a prior index.
    project.require_index()?;

    let config = Config::load(&project.root)?;
    let store = Store::open(&project.root)?;
    let engine = QueryEngine::new(store, project, config);

    server::run(engine, args.port, !args.no_browser).await
}
