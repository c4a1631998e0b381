//! Row types for the index store
//!
//! Every entity lives in the embedded SQLite database and is referenced by
//! the integer id assigned on insertion; packages are keyed by path.

use serde::{Deserialize, Serialize};

// =============================================================================
// ENUMS
// =============================================================================

/// Classification of symbol declarations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Func,
    Method,
    Type,
    Var,
    Const,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Func => "func",
            SymbolKind::Method => "method",
            SymbolKind::Type => "type",
            SymbolKind::Var => "var",
            SymbolKind::Const => "const",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "method" => SymbolKind::Method,
            "type" => SymbolKind::Type,
            "var" => SymbolKind::Var,
            "const" => SymbolKind::Const,
            _ => SymbolKind::Func,
        }
    }
}

/// How a call site reaches its callee
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    Static,
    Interface,
    Funcval,
    Defer,
    Go,
    /// Defined in the schema for forward compatibility; never emitted by
    /// the extractor.
    Unknown,
}

impl CallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallKind::Static => "static",
            CallKind::Interface => "interface",
            CallKind::Funcval => "funcval",
            CallKind::Defer => "defer",
            CallKind::Go => "go",
            CallKind::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "static" => CallKind::Static,
            "interface" => CallKind::Interface,
            "funcval" => CallKind::Funcval,
            "defer" => CallKind::Defer,
            "go" => CallKind::Go,
            _ => CallKind::Unknown,
        }
    }
}

/// Category of an entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntrypointType {
    Http,
    Grpc,
    Cli,
    Main,
}

impl EntrypointType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntrypointType::Http => "http",
            EntrypointType::Grpc => "grpc",
            EntrypointType::Cli => "cli",
            EntrypointType::Main => "main",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "http" => Some(EntrypointType::Http),
            "grpc" => Some(EntrypointType::Grpc),
            "cli" => Some(EntrypointType::Cli),
            "main" => Some(EntrypointType::Main),
            _ => None,
        }
    }
}

/// How an entry point was discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryMethod {
    /// Matched a routing or command registration call.
    Router,
    /// Matched a known handler signature shape after SSA.
    Signature,
}

impl DiscoveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryMethod::Router => "router",
            DiscoveryMethod::Signature => "signature",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "signature" => DiscoveryMethod::Signature,
            _ => DiscoveryMethod::Router,
        }
    }
}

// =============================================================================
// ROWS
// =============================================================================

/// One source grouping (a Go package)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageRow {
    pub pkg_path: String,
    pub module: String,
    pub dir: String,
    pub layer: Option<String>,
}

/// One top-level declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolRow {
    pub id: i64,
    pub pkg_path: String,
    pub name: String,
    pub kind: SymbolKind,
    /// Receiver type name, `*`-prefixed for pointer receivers; empty for
    /// non-methods.
    pub recv_type: String,
    pub file: String,
    pub line: u32,
    pub sig: Option<String>,
}

/// Insert shape for a symbol (id assigned by the store)
#[derive(Debug, Clone)]
pub struct NewSymbol {
    pub pkg_path: String,
    pub name: String,
    pub kind: SymbolKind,
    pub recv_type: String,
    pub file: String,
    pub line: u32,
    pub sig: Option<String>,
}

/// One call edge, keyed by `(caller, callee, file, line)`
#[derive(Debug, Clone, Serialize)]
pub struct CallEdgeRow {
    pub caller_id: i64,
    pub callee_id: i64,
    pub caller_file: String,
    pub caller_line: u32,
    pub call_kind: CallKind,
    pub count: u32,
}

/// Insert shape for a call edge (count starts at 1)
#[derive(Debug, Clone)]
pub struct NewCallEdge {
    pub caller_id: i64,
    pub callee_id: i64,
    pub caller_file: String,
    pub caller_line: u32,
    pub call_kind: CallKind,
}

/// One program-externally-reachable starting function
#[derive(Debug, Clone, Serialize)]
pub struct EntrypointRow {
    pub id: i64,
    #[serde(rename = "type")]
    pub ep_type: EntrypointType,
    pub label: String,
    pub symbol_id: i64,
    pub meta_json: Option<String>,
    pub discovery_method: DiscoveryMethod,
}

/// Insert shape for an entry point
#[derive(Debug, Clone)]
pub struct NewEntrypoint {
    pub ep_type: EntrypointType,
    pub label: String,
    pub symbol_id: i64,
    pub meta_json: Option<String>,
    pub discovery_method: DiscoveryMethod,
}

/// One tag on a symbol
#[derive(Debug, Clone, Serialize)]
pub struct TagRow {
    pub symbol_id: i64,
    pub tag: String,
    pub reason: String,
}

/// Entry point joined with its handler symbol
#[derive(Debug, Clone, Serialize)]
pub struct EntrypointWithSymbol {
    #[serde(flatten)]
    pub entrypoint: EntrypointRow,
    pub symbol: SymbolRow,
}

/// A callee edge joined with the callee symbol
#[derive(Debug, Clone)]
pub struct CalleeEdge {
    pub edge: CallEdgeRow,
    pub callee: SymbolRow,
}

/// A caller edge joined with the caller symbol
#[derive(Debug, Clone)]
pub struct CallerEdge {
    pub edge: CallEdgeRow,
    pub caller: SymbolRow,
}

/// One caller/callee pair with one of the callee's tags, for purity tagging
#[derive(Debug, Clone)]
pub struct CalleeTagRow {
    pub caller_id: i64,
    pub callee_id: i64,
    pub callee_tag: Option<String>,
}

/// Index-wide counts
#[derive(Debug, Clone, Default, Serialize)]
pub struct Stats {
    pub package_count: usize,
    pub symbol_count: usize,
    pub edge_count: usize,
    pub entrypoint_count: usize,
    pub tag_count: usize,
}

/// Filter for entry point listing
#[derive(Debug, Clone, Default)]
pub struct EntrypointFilter {
    pub ep_type: Option<EntrypointType>,
    pub query: Option<String>,
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_kind_roundtrip() {
        for kind in [
            CallKind::Static,
            CallKind::Interface,
            CallKind::Funcval,
            CallKind::Defer,
            CallKind::Go,
            CallKind::Unknown,
        ] {
            assert_eq!(CallKind::from_str(kind.as_str()), kind);
        }
    }

    #[test]
    fn test_symbol_kind_roundtrip() {
        for kind in [
            SymbolKind::Func,
            SymbolKind::Method,
            SymbolKind::Type,
            SymbolKind::Var,
            SymbolKind::Const,
        ] {
            assert_eq!(SymbolKind::from_str(kind.as_str()), kind);
        }
    }

    #[test]
    fn test_entrypoint_type_parse() {
        assert_eq!(EntrypointType::from_str("http"), Some(EntrypointType::Http));
        assert_eq!(EntrypointType::from_str("grpc"), Some(EntrypointType::Grpc));
        assert_eq!(EntrypointType::from_str("bogus"), None);
    }
}
