//! Symbol tagging
//!
//! Two passes under separate transactions, so the purity pass reads the
//! committed I/O tags of the first.
//!
//! Pass 1: `io:*` by package imports and by receiver naming, plus one
//! `layer:*` tag from the configured layer globs.
//! Pass 2: `pure-ish` for symbols whose depth-1 callees carry no `io:*`
//! tag. The `impure` tag exists in the grammar but is not written here.

use crate::core::config::Config;
use crate::core::error::Result;
use crate::loader::Loader;
use crate::store::types::SymbolKind;
use crate::store::Store;
use std::collections::{HashMap, HashSet};
use tracing::info;

/// Receiver-name suffixes implying storage access.
const DB_RECEIVER_SUFFIXES: &[&str] = &["store", "repo", "repository"];

/// Run both tagging passes. Returns `(io_layer_tags, purity_tags)`.
pub fn run(loader: &Loader, config: &Config, store: &Store) -> Result<(usize, usize)> {
    let first = run_io_and_layer_pass(loader, config, store)?;
    let second = run_purity_pass(store)?;
    info!(io_layer = first, purity = second, "tagged symbols");
    Ok((first, second))
}

// =============================================================================
// PASS 1: I/O AND LAYER
// =============================================================================

fn run_io_and_layer_pass(loader: &Loader, config: &Config, store: &Store) -> Result<usize> {
    let symbols = store.get_all_symbols_for_tagging()?;

    // Per-package I/O categories with the import that justified each.
    let mut pkg_io: HashMap<String, Vec<(&'static str, String)>> = HashMap::new();
    for pkg in loader.packages() {
        let mut cats: Vec<(&'static str, String)> = Vec::new();
        for import in pkg.import_paths() {
            for cat in config.io_categories_for_import(&import) {
                if !cats.iter().any(|(c, _)| *c == cat) {
                    cats.push((cat, import.clone()));
                }
            }
        }
        if !cats.is_empty() {
            pkg_io.insert(pkg.pkg_path.clone(), cats);
        }
    }

    // Internal edges into io-glob-matched project packages count too.
    for (caller_pkg, callee_pkg) in store.get_package_imports()? {
        for cat in config.io_categories_for_import(&callee_pkg) {
            let cats = pkg_io.entry(caller_pkg.clone()).or_default();
            if !cats.iter().any(|(c, _)| *c == cat) {
                cats.push((cat, callee_pkg.clone()));
            }
        }
    }

    let tx = store.batch()?;
    let mut written: HashSet<(i64, String)> = HashSet::new();
    let mut count = 0usize;

    for sym in &symbols {
        // (1) I/O by package membership.
        if let Some(cats) = pkg_io.get(&sym.pkg_path) {
            for (cat, import) in cats {
                let tag = format!("io:{}", cat);
                if written.insert((sym.id, tag.clone())) {
                    tx.insert_tag(sym.id, &tag, &format!("Package imports {}", import))?;
                    count += 1;
                }
            }
        }

        // (2) I/O by receiver naming, de-duplicated against (1).
        if sym.kind == SymbolKind::Method {
            if let Some(tag) = receiver_io_tag(&sym.recv_type) {
                if written.insert((sym.id, tag.to_string())) {
                    tx.insert_tag(
                        sym.id,
                        tag,
                        &format!("Method on {} type", sym.recv_type),
                    )?;
                    count += 1;
                }
            }
        }

        // (3) Layer from package path globs, first match wins.
        if let Some(layer) = config.layer_for_package(&sym.pkg_path) {
            let tag = format!("layer:{}", layer);
            if written.insert((sym.id, tag.clone())) {
                tx.insert_tag(sym.id, &tag, &format!("Package path matches {} layer", layer))?;
                count += 1;
            }
        }
    }

    tx.commit()?;
    Ok(count)
}

/// I/O tag implied by a receiver type name: pointer and package stripped,
/// suffix-matched case-insensitively.
pub fn receiver_io_tag(recv_type: &str) -> Option<&'static str> {
    let bare = recv_type
        .trim_start_matches('*')
        .rsplit('.')
        .next()
        .unwrap_or(recv_type)
        .to_lowercase();
    if DB_RECEIVER_SUFFIXES.iter().any(|s| bare.ends_with(s)) {
        return Some("io:db");
    }
    if bare.ends_with("client") {
        return Some("io:net");
    }
    None
}

// =============================================================================
// PASS 2: PURITY
// =============================================================================

fn run_purity_pass(store: &Store) -> Result<usize> {
    let symbols = store.get_all_symbols_for_tagging()?;
    let rows = store.get_symbol_callees_with_tags()?;

    let mut callees_of: HashMap<i64, HashSet<i64>> = HashMap::new();
    let mut io_callees: HashSet<i64> = HashSet::new();
    for row in &rows {
        callees_of
            .entry(row.caller_id)
            .or_default()
            .insert(row.callee_id);
        if let Some(tag) = &row.callee_tag {
            if tag.starts_with("io:") {
                io_callees.insert(row.callee_id);
            }
        }
    }

    let tx = store.batch()?;
    let mut count = 0usize;

    for sym in &symbols {
        match callees_of.get(&sym.id) {
            None => {
                tx.insert_tag(sym.id, "pure-ish", "No outgoing function calls")?;
                count += 1;
            }
            Some(callees) => {
                if callees.iter().all(|c| !io_callees.contains(c)) {
                    tx.insert_tag(sym.id, "pure-ish", "No calls to I/O functions")?;
                    count += 1;
                }
            }
        }
    }

    tx.commit()?;
    Ok(count)
}

// =============================================================================
// TESTS
// =============================================================================
