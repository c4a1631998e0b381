//! FlowLens CLI entry point

use clap::Parser;
use flowlens::cli::{Cli, Commands};
use flowlens::core::error::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_env("FLOWLENS_LOG"))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Index(args) => flowlens::cli::index::run(args),
        Commands::Ui(args) => flowlens::cli::ui::run(args).await,
    }
}
