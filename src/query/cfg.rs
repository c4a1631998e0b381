//! Per-function control-flow graph
//!
//! On demand: re-load the symbol's package, rebuild its SSA form, and emit
//! one block record per basic block with instructions, successor and
//! predecessor indices, and the branch condition when the block ends in a
//! conditional.

use crate::callgraph::{CallCommon, CalleeResolver, HeuristicResolver};
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::core::project::Project;
use crate::loader::Loader;
use crate::ssa::{self, Op, SsaFunction};
use crate::store::Store;
use serde::Serialize;
use std::collections::HashMap;

/// One instruction of a CFG block
#[derive(Debug, Clone, Serialize)]
pub struct InstructionInfo {
    pub index: usize,
    /// Normalized kind name (`call`, `defer`, `go`, `return`, `if`, ...).
    pub op: String,
    pub text: String,
    /// Store id of the static callee, where resolvable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callee_id: Option<i64>,
}

/// One basic block of the response
#[derive(Debug, Clone, Serialize)]
pub struct BasicBlockInfo {
    pub index: usize,
    pub instructions: Vec<InstructionInfo>,
    pub successors: Vec<usize>,
    pub predecessors: Vec<usize>,
    pub is_entry: bool,
    pub is_exit: bool,
    /// Pretty-printed condition of the block's final branch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_cond: Option<String>,
}

/// Response for `cfg/:id`
#[derive(Debug, Serialize)]
pub struct CfgResponse {
    pub symbol_id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub blocks: Vec<BasicBlockInfo>,
    pub entry_block: usize,
    pub exit_blocks: Vec<usize>,
}

/// Build the CFG for one function symbol.
pub fn query_cfg(
    project: &Project,
    config: &Config,
    store: &Store,
    symbol_id: i64,
) -> Result<CfgResponse> {
    let symbol = store
        .get_symbol_by_id(symbol_id)?
        .ok_or_else(|| Error::not_found(format!("symbol {}", symbol_id)))?;

    let package = store
        .get_package_by_path(&symbol.pkg_path)?
        .ok_or_else(|| Error::analysis(format!("package {} not indexed", symbol.pkg_path)))?;

    let loader = Loader::load_package_dir(project, config, &package.dir).map_err(|e| {
        Error::analysis(format!("reloading {} failed: {}", symbol.pkg_path, e))
    })?;
    let pkg = loader.package(&symbol.pkg_path).ok_or_else(|| {
        Error::analysis(format!("package {} no longer loads", symbol.pkg_path))
    })?;

    let functions = ssa::build_package(pkg);
    let function = functions
        .iter()
        .find(|f| f.name == symbol.name && f.recv_type == symbol.recv_type)
        .ok_or_else(|| {
            Error::analysis(format!(
                "function {} {}.{} not found in SSA form",
                symbol.recv_type, symbol.pkg_path, symbol.name
            ))
        })?;

    // alias -> import path for the function's file, for static-callee ids.
    let imports: HashMap<String, String> = pkg
        .files
        .iter()
        .find(|f| f.rel_path == function.file)
        .map(|f| {
            f.imports
                .iter()
                .map(|i| (i.alias.clone(), i.path.clone()))
                .collect()
        })
        .unwrap_or_default();

    let mut resolver = HeuristicResolver::new(store);
    let blocks = build_blocks(function, &imports, &mut resolver);
    let exit_blocks: Vec<usize> = blocks
        .iter()
        .filter(|b| b.is_exit)
        .map(|b| b.index)
        .collect();

    Ok(CfgResponse {
        symbol_id,
        name: symbol.name,
        signature: symbol.sig,
        blocks,
        entry_block: 0,
        exit_blocks,
    })
}

fn build_blocks(
    function: &SsaFunction,
    imports: &HashMap<String, String>,
    resolver: &mut HeuristicResolver,
) -> Vec<BasicBlockInfo> {
    let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); function.blocks.len()];
    for block in &function.blocks {
        for &succ in &block.successors {
            if !predecessors[succ].contains(&block.index) {
                predecessors[succ].push(block.index);
            }
        }
    }

    function
        .blocks
        .iter()
        .map(|block| {
            let instructions = block
                .instructions
                .iter()
                .enumerate()
                .map(|(index, instr)| {
                    let callee_id = match (&instr.op, &instr.callee) {
                        (Op::Call | Op::Defer | Op::Go, Some(callee)) => resolver
                            .resolve(&CallCommon {
                                caller: function,
                                callee,
                                imports,
                            })
                            .map(|r| r.symbol_id),
                        _ => None,
                    };
                    InstructionInfo {
                        index,
                        op: instr.op.as_str().to_string(),
                        text: instr.text.clone(),
                        callee_id,
                    }
                })
                .collect();

            let branch_cond = block
                .instructions
                .last()
                .and_then(|i| i.branch_cond.clone());

            BasicBlockInfo {
                index: block.index,
                instructions,
                successors: block.successors.clone(),
                predecessors: predecessors[block.index].clone(),
                is_entry: block.index == 0,
                is_exit: block.successors.is_empty(),
                branch_cond,
            }
        })
        .collect()
}
