//! Call-graph extraction
//!
//! Iterates the SSA instructions of every project function and emits one
//! call edge per call/defer/go site whose caller and callee both resolve
//! to stored project symbols. Edges land in one batched transaction.

pub mod resolve;

pub use resolve::{CallCommon, CalleeResolver, Classification, HeuristicResolver, Resolution};

use crate::core::error::Result;
use crate::loader::Loader;
use crate::ssa::{Op, SsaProgram};
use crate::store::types::{CallKind, NewCallEdge};
use crate::store::Store;
use std::collections::HashMap;
use tracing::{debug, info};

/// Progress callback granularity.
const PROGRESS_EVERY: usize = 100;

/// Extract call edges from a lowered program and persist them.
///
/// `progress` fires every 100 processed functions with the running count.
pub fn extract_and_store(
    loader: &Loader,
    program: &SsaProgram,
    store: &Store,
    mut progress: impl FnMut(usize),
) -> Result<usize> {
    // alias -> import path, per file.
    let mut file_imports: HashMap<&str, HashMap<String, String>> = HashMap::new();
    for pkg in loader.packages() {
        for file in &pkg.files {
            let table = file
                .imports
                .iter()
                .map(|i| (i.alias.clone(), i.path.clone()))
                .collect();
            file_imports.insert(file.rel_path.as_str(), table);
        }
    }
    let empty_imports = HashMap::new();

    let mut resolver = HeuristicResolver::new(store);
    let mut edges: Vec<NewCallEdge> = Vec::new();
    let mut processed = 0usize;

    for function in &program.functions {
        processed += 1;
        if processed % PROGRESS_EVERY == 0 {
            progress(processed);
        }

        let caller_id =
            match resolver.lookup(&function.pkg_path, &function.name, &function.recv_type) {
                Some(id) => id,
                None => {
                    debug!(
                        pkg = %function.pkg_path,
                        name = %function.name,
                        "caller not in store, skipping"
                    );
                    continue;
                }
            };

        let imports = file_imports
            .get(function.file.as_str())
            .unwrap_or(&empty_imports);

        for instr in function.instructions() {
            let base_kind = match instr.op {
                Op::Call => CallKind::Static,
                Op::Defer => CallKind::Defer,
                Op::Go => CallKind::Go,
                _ => continue,
            };
            let callee = match &instr.callee {
                Some(c) => c,
                None => continue,
            };
            // Instructions without a usable position are skipped.
            if instr.line == 0 {
                continue;
            }

            let common = CallCommon {
                caller: function,
                callee,
                imports,
            };
            let resolution = match resolver.resolve(&common) {
                Some(r) => r,
                None => continue,
            };
            // Self-edges from misresolution are real cycles in Go
            // (recursion); keep them.
            let call_kind = match resolution.classification {
                Classification::Static => base_kind,
                Classification::Interface => CallKind::Interface,
                Classification::Funcval => CallKind::Funcval,
            };

            edges.push(NewCallEdge {
                caller_id,
                callee_id: resolution.symbol_id,
                caller_file: function.file.clone(),
                caller_line: instr.line,
                call_kind,
            });
        }
    }

    let tx = store.batch()?;
    for edge in &edges {
        tx.insert_call_edge(edge)?;
    }
    tx.commit()?;

    info!(functions = processed, edges = edges.len(), "extracted call graph");
    Ok(edges.len())
}
