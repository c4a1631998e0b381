//! Call spine
//!
//! A single linear walk of the call graph: at each step the
//! highest-scoring unvisited callee becomes the next main-path node and
//! the remaining callees collapse into a branch badge.

use crate::core::error::{Error, Result};
use crate::query::filter::GraphFilter;
use crate::query::subgraph::tag_strings;
use crate::store::types::{CallKind, CalleeEdge, SymbolRow};
use crate::store::Store;
use serde::Serialize;
use std::collections::HashSet;

/// Default main-path length bound.
pub const DEFAULT_SPINE_DEPTH: u32 = 10;

/// Packages treated as logging/telemetry noise by the scorer.
const TELEMETRY_MARKERS: &[&str] = &[
    "log",
    "slog",
    "zap",
    "logrus",
    "zerolog",
    "telemetry",
    "metrics",
    "tracing",
    "opentelemetry",
    "prometheus",
];

/// Side branches of one main-path node, rolled up
#[derive(Debug, Clone, Serialize)]
pub struct BranchBadge {
    pub call_count: usize,
    pub collapsed_ids: Vec<i64>,
    pub labels: Vec<String>,
}

/// One node on the main path
#[derive(Debug, Clone, Serialize)]
pub struct SpineNode {
    pub id: i64,
    pub name: String,
    pub pkg_path: String,
    pub recv_type: String,
    pub depth: u32,
    pub is_main_path: bool,
    /// Layer extracted from the node's `layer:*` tag, when present.
    pub layer: Option<String>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<BranchBadge>,
}

/// Response for `spine/:id`
#[derive(Debug, Serialize)]
pub struct SpineResponse {
    pub nodes: Vec<SpineNode>,
    pub main_path: Vec<i64>,
    pub total_nodes: usize,
    pub collapsed_count: usize,
}

/// Compute the call spine from a root symbol.
pub fn query_spine(
    store: &Store,
    root_symbol_id: i64,
    max_depth: u32,
    filter: &GraphFilter,
) -> Result<SpineResponse> {
    let root = store
        .get_symbol_by_id(root_symbol_id)?
        .ok_or_else(|| Error::not_found(format!("symbol {}", root_symbol_id)))?;

    let mut nodes: Vec<SpineNode> = Vec::new();
    let mut main_path: Vec<i64> = Vec::new();
    let mut visited: HashSet<i64> = HashSet::new();
    let mut collapsed_count = 0usize;

    let mut current = root.clone();
    visited.insert(current.id);

    for depth in 0.. {
        let tags = tag_strings(store, current.id)?;
        let mut node = SpineNode {
            id: current.id,
            name: current.name.clone(),
            pkg_path: current.pkg_path.clone(),
            recv_type: current.recv_type.clone(),
            depth,
            is_main_path: true,
            layer: layer_of(&tags),
            tags,
            badge: None,
        };
        main_path.push(current.id);

        if depth >= max_depth {
            nodes.push(node);
            break;
        }

        // Surviving callees, deduplicated by target.
        let mut seen_targets = HashSet::new();
        let callees: Vec<CalleeEdge> = store
            .get_callees(current.id)?
            .into_iter()
            .filter(|c| !filter.rejects_package(&c.callee.pkg_path))
            .filter(|c| seen_targets.insert(c.callee.id))
            .collect();

        let mut best: Option<(i32, usize)> = None;
        for (idx, candidate) in callees.iter().enumerate() {
            if visited.contains(&candidate.callee.id) {
                continue;
            }
            let candidate_tags = tag_strings(store, candidate.callee.id)?;
            let score = score_candidate(&root, candidate, &candidate_tags, filter);
            // Strict comparison keeps the first (lowest-id) candidate on
            // ties.
            if best.map(|(s, _)| score > s).unwrap_or(true) {
                best = Some((score, idx));
            }
        }

        let next = best.map(|(_, idx)| callees[idx].callee.clone());

        // All other surviving callees roll up into the badge.
        let branches: Vec<&CalleeEdge> = callees
            .iter()
            .filter(|c| Some(c.callee.id) != next.as_ref().map(|n| n.id))
            .collect();
        if !branches.is_empty() {
            collapsed_count += branches.len();
            node.badge = Some(BranchBadge {
                call_count: branches.len(),
                collapsed_ids: branches.iter().map(|b| b.callee.id).collect(),
                labels: branches.iter().map(|b| branch_label(&b.callee)).collect(),
            });
        }
        nodes.push(node);

        match next {
            Some(next) => {
                visited.insert(next.id);
                current = next;
            }
            None => break,
        }
    }

    Ok(SpineResponse {
        total_nodes: nodes.len(),
        main_path,
        collapsed_count,
        nodes,
    })
}

/// Heuristic score of one candidate callee.
fn score_candidate(
    root: &SymbolRow,
    candidate: &CalleeEdge,
    tags: &[String],
    filter: &GraphFilter,
) -> i32 {
    let sym = &candidate.callee;
    let mut score = 0i32;

    if sym.pkg_path == root.pkg_path {
        score += 10;
    } else if top_segment(&sym.pkg_path) == top_segment(&root.pkg_path) {
        score += 5;
    }

    match layer_of(tags).as_deref() {
        Some("service") => score += 8,
        Some("domain") => score += 7,
        Some("store") => score += 6,
        Some("handler") => score += 5,
        _ => {}
    }

    if is_telemetry_package(&sym.pkg_path) {
        score -= 15;
    }
    if filter.collapse_wiring && is_wiring_name(&sym.name) {
        score -= 10;
    }
    if is_error_constructor(&sym.pkg_path, &sym.name) {
        score -= 20;
    }
    if !sym.recv_type.is_empty() {
        score += 3;
    }
    if candidate.edge.call_kind == CallKind::Interface {
        score += 2;
    }

    score
}

fn top_segment(pkg_path: &str) -> &str {
    pkg_path.split('/').next().unwrap_or(pkg_path)
}

fn layer_of(tags: &[String]) -> Option<String> {
    tags.iter()
        .find_map(|t| t.strip_prefix("layer:").map(str::to_string))
}

/// Whether a package path names a logging/telemetry concern.
pub fn is_telemetry_package(pkg_path: &str) -> bool {
    let lowered = pkg_path.to_lowercase();
    TELEMETRY_MARKERS.iter().any(|m| lowered.contains(m))
}

/// Constructor/provider wiring names downweighted by `collapse_wiring`.
pub fn is_wiring_name(name: &str) -> bool {
    name.starts_with("New") || name.starts_with("Provide") || name.starts_with("Init")
}

/// Error-constructor shapes: `errors.New`/`Wrap`/`Wrapf`, `fmt.Errorf`/
/// `Sprintf`, or any name with an `error` prefix/suffix.
pub fn is_error_constructor(pkg_path: &str, name: &str) -> bool {
    if pkg_path == "errors" && matches!(name, "New" | "Wrap" | "Wrapf") {
        return true;
    }
    if pkg_path == "fmt" && matches!(name, "Errorf" | "Sprintf") {
        return true;
    }
    let lowered = name.to_lowercase();
    lowered.starts_with("error") || lowered.ends_with("error")
}

/// `(recv).name` for methods, bare name otherwise.
fn branch_label(sym: &SymbolRow) -> String {
    if sym.recv_type.is_empty() {
        sym.name.clone()
    } else {
        format!("({}).{}", sym.recv_type, sym.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::{NewCallEdge, NewSymbol, SymbolKind};

    fn insert_symbol(store: &Store, pkg: &str, name: &str, recv: &str) -> i64 {
        store
            .upsert_symbol(&NewSymbol {
                pkg_path: pkg.to_string(),
                name: name.to_string(),
                kind: if recv.is_empty() {
                    SymbolKind::Func
                } else {
                    SymbolKind::Method
                },
                recv_type: recv.to_string(),
                file: "a.go".to_string(),
                line: 1,
                sig: None,
            })
            .unwrap()
    }

    fn insert_edge(store: &Store, caller: i64, callee: i64, line: u32, kind: CallKind) {
        store
            .insert_call_edge(&NewCallEdge {
                caller_id: caller,
                callee_id: callee,
                caller_file: "a.go".to_string(),
                caller_line: line,
                call_kind: kind,
            })
            .unwrap();
    }

    #[test]
    fn test_scoring_helpers() {
        assert!(is_telemetry_package("go.uber.org/zap"));
        assert!(is_telemetry_package("log/slog"));
        assert!(!is_telemetry_package("example.com/app/api"));

        assert!(is_wiring_name("NewServer"));
        assert!(is_wiring_name("ProvideConfig"));
        assert!(!is_wiring_name("HandleUsers"));

        assert!(is_error_constructor("errors", "New"));
        assert!(is_error_constructor("fmt", "Errorf"));
        assert!(is_error_constructor("m/app", "errorBadInput"));
        assert!(is_error_constructor("m/app", "wrapError"));
        assert!(!is_error_constructor("m/app", "Handle"));
    }

    #[test]
    fn test_spine_prefers_service_layer() {
        let store = Store::open_in_memory().unwrap();
        let root = insert_symbol(&store, "m/api", "HandleUsers", "");
        let log = insert_symbol(&store, "m/logwrap", "Info", "");
        let errf = insert_symbol(&store, "m/api", "errorResponse", "");
        let svc = insert_symbol(&store, "m/service", "GetUsers", "*UserService");
        store.upsert_tag(svc, "layer:service", "glob").unwrap();

        insert_edge(&store, root, log, 10, CallKind::Static);
        insert_edge(&store, root, errf, 11, CallKind::Static);
        insert_edge(&store, root, svc, 12, CallKind::Static);

        let resp =
            query_spine(&store, root, DEFAULT_SPINE_DEPTH, &GraphFilter::default()).unwrap();

        assert_eq!(resp.main_path[0], root);
        assert_eq!(resp.main_path[1], svc);

        let badge = resp.nodes[0].badge.as_ref().unwrap();
        assert_eq!(badge.call_count, 2);
        assert!(badge.collapsed_ids.contains(&log));
        assert!(badge.collapsed_ids.contains(&errf));
        assert_eq!(resp.collapsed_count, 2);
    }

    #[test]
    fn test_spine_depth_invariant() {
        let store = Store::open_in_memory().unwrap();
        let a = insert_symbol(&store, "m/app", "A", "");
        let b = insert_symbol(&store, "m/app", "B", "");
        let c = insert_symbol(&store, "m/app", "C", "");
        insert_edge(&store, a, b, 1, CallKind::Static);
        insert_edge(&store, b, c, 2, CallKind::Static);

        let resp = query_spine(&store, a, 10, &GraphFilter::default()).unwrap();
        assert_eq!(resp.main_path, vec![a, b, c]);
        for (i, node) in resp.nodes.iter().enumerate() {
            assert_eq!(resp.main_path[i], node.id);
            assert_eq!(node.depth as usize, i);
            assert!(node.is_main_path);
        }
        assert_eq!(resp.total_nodes, 3);
    }

    #[test]
    fn test_spine_stops_at_cycle() {
        let store = Store::open_in_memory().unwrap();
        let a = insert_symbol(&store, "m/app", "A", "");
        let b = insert_symbol(&store, "m/app", "B", "");
        insert_edge(&store, a, b, 1, CallKind::Static);
        insert_edge(&store, b, a, 2, CallKind::Static);

        let resp = query_spine(&store, a, 10, &GraphFilter::default()).unwrap();
        assert_eq!(resp.main_path, vec![a, b]);
    }

    #[test]
    fn test_spine_respects_max_depth() {
        let store = Store::open_in_memory().unwrap();
        let ids: Vec<i64> = (0..6)
            .map(|i| insert_symbol(&store, "m/app", &format!("F{}", i), ""))
            .collect();
        for pair in ids.windows(2) {
            insert_edge(&store, pair[0], pair[1], 1, CallKind::Static);
        }

        let resp = query_spine(&store, ids[0], 2, &GraphFilter::default()).unwrap();
        assert_eq!(resp.main_path.len(), 3); // depths 0, 1, 2
    }

    #[test]
    fn test_branch_labels_use_receiver() {
        let store = Store::open_in_memory().unwrap();
        let root = insert_symbol(&store, "m/api", "Handle", "");
        let m = insert_symbol(&store, "m/store", "Find", "*UserStore");
        let f = insert_symbol(&store, "m/api", "validate", "");
        // Two callees; same-package validate wins the path, Find collapses.
        insert_edge(&store, root, m, 1, CallKind::Static);
        insert_edge(&store, root, f, 2, CallKind::Static);

        let resp = query_spine(&store, root, 10, &GraphFilter::default()).unwrap();
        assert_eq!(resp.main_path[1], f);
        let badge = resp.nodes[0].badge.as_ref().unwrap();
        assert_eq!(badge.labels, vec!["(*UserStore).Find".to_string()]);
    }
}
