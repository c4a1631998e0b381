//! FlowLens - what happens next when this entry point is invoked?
//!
//! Indexes a Go source tree into a forward call graph rooted at program
//! entry points (HTTP routes, RPC methods, CLI commands, `main`) and
//! serves subgraphs, call spines, and per-function control-flow graphs
//! over a local HTTP API.

pub mod callgraph;
pub mod cli;
pub mod core;
pub mod entrypoints;
pub mod loader;
pub mod pipeline;
pub mod query;
pub mod server;
pub mod ssa;
pub mod store;
pub mod symbols;
pub mod tagger;

pub use core::config::Config;
pub use core::error::{Error, Result};
pub use core::project::Project;
