//! Graph query engine
//!
//! Read-only surfaces over the index store: spanning subgraphs, the call
//! spine, per-function CFGs, symbol details, and search. Each request is
//! independent; nothing here writes.

pub mod cfg;
pub mod filter;
pub mod spine;
pub mod subgraph;

pub use cfg::{BasicBlockInfo, CfgResponse, InstructionInfo};
pub use filter::{is_cmd_package, is_stdlib, is_vendor, match_package_pattern, GraphFilter};
pub use spine::{BranchBadge, SpineNode, SpineResponse, DEFAULT_SPINE_DEPTH};
pub use subgraph::{GraphEdge, GraphNode, GraphResponse};

use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::core::project::Project;
use crate::store::types::{CallKind, PackageRow, SymbolRow, TagRow};
use crate::store::Store;
use serde::Serialize;

/// A neighbor of a symbol in the detail view
#[derive(Debug, Clone, Serialize)]
pub struct NeighborInfo {
    pub symbol: SymbolRow,
    pub call_kind: CallKind,
    pub caller_file: String,
    pub caller_line: u32,
    pub count: u32,
}

/// Full detail for one symbol
#[derive(Debug, Serialize)]
pub struct SymbolDetail {
    pub symbol: SymbolRow,
    pub tags: Vec<TagRow>,
    pub package: Option<PackageRow>,
    pub callees: Vec<NeighborInfo>,
    pub callers: Vec<NeighborInfo>,
}

/// Query engine bound to one project's store
#[derive(Clone)]
pub struct QueryEngine {
    store: Store,
    project: Project,
    config: Config,
}

impl QueryEngine {
    pub fn new(store: Store, project: Project, config: Config) -> Self {
        Self {
            store,
            project,
            config,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Bounded BFS from a root symbol.
    pub fn graph_root(&self, id: i64, depth: u32, filter: &GraphFilter) -> Result<GraphResponse> {
        subgraph::query_root(&self.store, id, depth, filter)
    }

    /// Expand one node; `depth` defaults to 1 at the transport layer.
    pub fn graph_expand(&self, id: i64, depth: u32, filter: &GraphFilter) -> Result<GraphResponse> {
        subgraph::query_expand(&self.store, id, depth, filter)
    }

    /// Heuristic main path with collapsed side branches.
    pub fn spine(&self, id: i64, max_depth: u32, filter: &GraphFilter) -> Result<SpineResponse> {
        spine::query_spine(&self.store, id, max_depth, filter)
    }

    /// Per-function control-flow graph, rebuilt on demand.
    pub fn cfg(&self, id: i64) -> Result<CfgResponse> {
        cfg::query_cfg(&self.project, &self.config, &self.store, id)
    }

    /// Symbol plus tags, package, and direct neighbors.
    pub fn symbol_detail(&self, id: i64) -> Result<SymbolDetail> {
        let symbol = self
            .store
            .get_symbol_by_id(id)?
            .ok_or_else(|| Error::not_found(format!("symbol {}", id)))?;
        let tags = self.store.get_symbol_tags(id)?;
        let package = self.store.get_package_by_path(&symbol.pkg_path)?;
        let callees = self
            .store
            .get_callees(id)?
            .into_iter()
            .map(|c| NeighborInfo {
                symbol: c.callee,
                call_kind: c.edge.call_kind,
                caller_file: c.edge.caller_file,
                caller_line: c.edge.caller_line,
                count: c.edge.count,
            })
            .collect();
        let callers = self
            .store
            .get_callers(id)?
            .into_iter()
            .map(|c| NeighborInfo {
                symbol: c.caller,
                call_kind: c.edge.call_kind,
                caller_file: c.edge.caller_file,
                caller_line: c.edge.caller_line,
                count: c.edge.count,
            })
            .collect();

        Ok(SymbolDetail {
            symbol,
            tags,
            package,
            callees,
            callers,
        })
    }
}
