//! CLI command definitions and handlers

pub mod index;
pub mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default())
}

/// Forward call-graph explorer for Go projects
#[derive(Parser, Debug)]
#[command(name = "flowlens")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(styles = styles())]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index a project: symbols, call graph, entry points, tags
    Index(IndexArgs),

    /// Serve the interactive UI over a local HTTP API
    Ui(UiArgs),
}

/// Arguments for the index command
#[derive(Parser, Debug)]
pub struct IndexArgs {
    /// Project path (defaults to current directory)
    pub path: Option<PathBuf>,
}

/// Arguments for the ui command
#[derive(Parser, Debug)]
pub struct UiArgs {
    /// Project path (defaults to current directory)
    pub path: Option<PathBuf>,

    /// Port to listen on
    #[arg(long, default_value = "4650")]
    pub port: u16,

    /// Do not open the browser
    #[arg(long)]
    pub no_browser: bool,
}
