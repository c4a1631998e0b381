//! Spanning subgraph queries
//!
//! Bounded BFS from a root symbol. The result contains exactly the nodes
//! reachable through the filtered traversal plus the root, and exactly
//! the edges whose endpoints both survive filtering.

use crate::core::error::{Error, Result};
use crate::query::filter::GraphFilter;
use crate::store::types::{CallKind, SymbolRow};
use crate::store::Store;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};

/// One node of a graph response
#[derive(Debug, Clone, Serialize)]
pub struct GraphNode {
    pub id: i64,
    pub name: String,
    pub pkg_path: String,
    pub kind: String,
    pub recv_type: String,
    pub file: String,
    pub line: u32,
    pub tags: Vec<String>,
    pub depth: u32,
    /// Whether this node's callees are part of the response.
    pub expanded: bool,
}

/// One aggregated edge of a graph response
#[derive(Debug, Clone, Serialize)]
pub struct GraphEdge {
    pub source: i64,
    pub target: i64,
    pub call_kind: CallKind,
    pub caller_file: String,
    pub caller_line: u32,
    /// Summed count over duplicate `(source, target)` pairs.
    pub callsite_count: u32,
}

/// Response for `graph/root` and `graph/expand`
#[derive(Debug, Serialize)]
pub struct GraphResponse {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub root_id: i64,
    pub max_depth: u32,
    /// Callees rejected by filters, for UI feedback.
    pub filtered_count: usize,
}

/// BFS from `root_symbol_id` to `depth`, clamped by the filter's
/// `max_depth`.
pub fn query_root(
    store: &Store,
    root_symbol_id: i64,
    depth: u32,
    filter: &GraphFilter,
) -> Result<GraphResponse> {
    let root = store
        .get_symbol_by_id(root_symbol_id)?
        .ok_or_else(|| Error::not_found(format!("symbol {}", root_symbol_id)))?;

    let effective_depth = depth.min(filter.max_depth);

    let mut nodes: Vec<GraphNode> = Vec::new();
    let mut node_index: HashMap<i64, usize> = HashMap::new();
    let mut edges: HashMap<(i64, i64), GraphEdge> = HashMap::new();
    let mut edge_order: Vec<(i64, i64)> = Vec::new();
    let mut visited: HashSet<i64> = HashSet::new();
    let mut filtered_count = 0usize;

    let root_tags = tag_strings(store, root.id)?;
    push_node(&mut nodes, &mut node_index, &root, root_tags, 0, true);
    visited.insert(root.id);

    let mut queue: VecDeque<(i64, u32)> = VecDeque::new();
    queue.push_back((root.id, 0));

    while let Some((current_id, current_depth)) = queue.pop_front() {
        if current_depth >= effective_depth {
            continue;
        }

        // Expansion stops past a node when its own symbol/tags match a
        // stop condition; the node itself stays in the result.
        {
            let node = &nodes[node_index[&current_id]];
            if current_depth > 0 && filter.stops_at(&node.pkg_path, &node.tags) {
                continue;
            }
        }

        let mut aggregated: HashMap<(i64, i64), GraphEdge> = HashMap::new();
        let mut new_targets: Vec<i64> = Vec::new();

        for callee in store.get_callees(current_id)? {
            if filter.rejects_package(&callee.callee.pkg_path) {
                filtered_count += 1;
                continue;
            }

            let key = (current_id, callee.callee.id);
            match aggregated.entry(key) {
                std::collections::hash_map::Entry::Occupied(mut entry) => {
                    entry.get_mut().callsite_count += callee.edge.count;
                }
                std::collections::hash_map::Entry::Vacant(slot) => {
                    // First encountered call site wins the display fields.
                    slot.insert(GraphEdge {
                        source: current_id,
                        target: callee.callee.id,
                        call_kind: callee.edge.call_kind,
                        caller_file: callee.edge.caller_file.clone(),
                        caller_line: callee.edge.caller_line,
                        callsite_count: callee.edge.count,
                    });
                    if !node_index.contains_key(&callee.callee.id) {
                        let tags = tag_strings(store, callee.callee.id)?;
                        push_node(
                            &mut nodes,
                            &mut node_index,
                            &callee.callee,
                            tags,
                            current_depth + 1,
                            false,
                        );
                    }
                    if !visited.contains(&callee.callee.id) {
                        new_targets.push(callee.callee.id);
                    }
                }
            }
        }

        let mut keys: Vec<(i64, i64)> = aggregated.keys().copied().collect();
        keys.sort_unstable();
        for key in keys {
            if let Some(edge) = aggregated.remove(&key) {
                if !edges.contains_key(&key) {
                    edge_order.push(key);
                }
                edges.insert(key, edge);
            }
        }

        nodes[node_index[&current_id]].expanded = true;

        for target in new_targets {
            visited.insert(target);
            queue.push_back((target, current_depth + 1));
        }
    }

    let edges: Vec<GraphEdge> = edge_order
        .iter()
        .filter_map(|k| edges.get(k).cloned())
        .collect();

    Ok(GraphResponse {
        nodes,
        edges,
        root_id: root_symbol_id,
        max_depth: effective_depth,
        filtered_count,
    })
}

/// Expand one node. Same traversal seeded at `symbol_id`; `depth`
/// defaults to 1 at the API layer.
pub fn query_expand(
    store: &Store,
    symbol_id: i64,
    depth: u32,
    filter: &GraphFilter,
) -> Result<GraphResponse> {
    query_root(store, symbol_id, depth, filter)
}

pub(crate) fn tag_strings(store: &Store, symbol_id: i64) -> Result<Vec<String>> {
    Ok(store
        .get_symbol_tags(symbol_id)?
        .into_iter()
        .map(|t| t.tag)
        .collect())
}

fn push_node(
    nodes: &mut Vec<GraphNode>,
    node_index: &mut HashMap<i64, usize>,
    symbol: &SymbolRow,
    tags: Vec<String>,
    depth: u32,
    expanded: bool,
) {
    node_index.insert(symbol.id, nodes.len());
    nodes.push(GraphNode {
        id: symbol.id,
        name: symbol.name.clone(),
        pkg_path: symbol.pkg_path.clone(),
        kind: symbol.kind.as_str().to_string(),
        recv_type: symbol.recv_type.clone(),
        file: symbol.file.clone(),
        line: symbol.line,
        tags,
        depth,
        expanded,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::{NewCallEdge, NewSymbol, SymbolKind};

    fn insert_symbol(store: &Store, pkg: &str, name: &str) -> i64 {
        store
            .upsert_symbol(&NewSymbol {
                pkg_path: pkg.to_string(),
                name: name.to_string(),
                kind: SymbolKind::Func,
                recv_type: String::new(),
                file: "a.go".to_string(),
                line: 1,
                sig: None,
            })
            .unwrap()
    }

    fn insert_edge(store: &Store, caller: i64, callee: i64, line: u32) {
        store
            .insert_call_edge(&NewCallEdge {
                caller_id: caller,
                callee_id: callee,
                caller_file: "a.go".to_string(),
                caller_line: line,
                call_kind: CallKind::Static,
            })
            .unwrap();
    }

    /// a -> b -> c, a -> c
    fn diamond_store() -> (Store, i64, i64, i64) {
        let store = Store::open_in_memory().unwrap();
        let a = insert_symbol(&store, "m/app", "A");
        let b = insert_symbol(&store, "m/app", "B");
        let c = insert_symbol(&store, "m/svc", "C");
        insert_edge(&store, a, b, 10);
        insert_edge(&store, b, c, 20);
        insert_edge(&store, a, c, 11);
        (store, a, b, c)
    }

    #[test]
    fn test_depth_zero_returns_only_root() {
        let (store, a, _, _) = diamond_store();
        let resp = query_root(&store, a, 0, &GraphFilter::default()).unwrap();
        assert_eq!(resp.nodes.len(), 1);
        assert_eq!(resp.nodes[0].id, a);
        assert!(resp.edges.is_empty());
    }

    #[test]
    fn test_full_traversal() {
        let (store, a, b, c) = diamond_store();
        let resp = query_root(&store, a, 3, &GraphFilter::default()).unwrap();

        let ids: HashSet<i64> = resp.nodes.iter().map(|n| n.id).collect();
        assert_eq!(ids, HashSet::from([a, b, c]));
        assert_eq!(resp.edges.len(), 3);

        // Every edge endpoint appears in the node set.
        for edge in &resp.edges {
            assert!(ids.contains(&edge.source));
            assert!(ids.contains(&edge.target));
        }
    }

    #[test]
    fn test_max_depth_clamps_requested_depth() {
        let (store, a, b, _c) = diamond_store();
        let filter = GraphFilter {
            max_depth: 1,
            ..Default::default()
        };
        let resp = query_root(&store, a, 5, &filter).unwrap();
        assert_eq!(resp.max_depth, 1);
        // Depth 1 reaches b and c (direct callees) but does not expand b.
        let b_node = resp.nodes.iter().find(|n| n.id == b).unwrap();
        assert!(!b_node.expanded);
    }

    #[test]
    fn test_max_depth_zero_only_root() {
        let (store, a, _, _) = diamond_store();
        let filter = GraphFilter {
            max_depth: 0,
            ..Default::default()
        };
        let resp = query_root(&store, a, 4, &filter).unwrap();
        assert_eq!(resp.nodes.len(), 1);
    }

    #[test]
    fn test_cycle_terminates() {
        let store = Store::open_in_memory().unwrap();
        let a = insert_symbol(&store, "m/app", "A");
        let b = insert_symbol(&store, "m/app", "B");
        insert_edge(&store, a, b, 1);
        insert_edge(&store, b, a, 2);

        let resp = query_root(&store, a, 10, &GraphFilter::default()).unwrap();
        assert_eq!(resp.nodes.len(), 2);
        assert_eq!(resp.edges.len(), 2);
    }

    #[test]
    fn test_noise_filter_counts_rejections() {
        let (store, a, _b, _c) = diamond_store();
        let filter = GraphFilter {
            noise_packages: vec!["m/svc".to_string()],
            ..Default::default()
        };
        let resp = query_root(&store, a, 3, &filter).unwrap();
        let ids: Vec<i64> = resp.nodes.iter().map(|n| n.id).collect();
        assert_eq!(ids.len(), 2);
        // a -> c rejected once, b -> c rejected once.
        assert_eq!(resp.filtered_count, 2);
    }

    #[test]
    fn test_duplicate_callsites_aggregate() {
        let store = Store::open_in_memory().unwrap();
        let a = insert_symbol(&store, "m/app", "A");
        let b = insert_symbol(&store, "m/app", "B");
        insert_edge(&store, a, b, 5);
        insert_edge(&store, a, b, 9);

        let resp = query_root(&store, a, 1, &GraphFilter::default()).unwrap();
        assert_eq!(resp.edges.len(), 1);
        assert_eq!(resp.edges[0].callsite_count, 2);
        // First encountered site wins the display position.
        assert_eq!(resp.edges[0].caller_line, 5);
    }

    #[test]
    fn test_stop_at_package_prefix_keeps_node_unexpanded() {
        let (store, a, b, c) = diamond_store();
        let _ = c;
        let filter = GraphFilter {
            stop_at_package_prefix: vec!["m/app".to_string()],
            ..Default::default()
        };
        // Root is at depth 0 and always expands; b matches the stop
        // prefix and is not expanded.
        let resp = query_root(&store, a, 5, &filter).unwrap();
        let b_node = resp.nodes.iter().find(|n| n.id == b).unwrap();
        assert!(!b_node.expanded);
    }

    #[test]
    fn test_missing_root_is_not_found() {
        let store = Store::open_in_memory().unwrap();
        let err = query_root(&store, 999, 1, &GraphFilter::default()).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
