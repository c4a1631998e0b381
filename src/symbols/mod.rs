//! Symbol extraction
//!
//! Walks the top-level declarations of every loaded package and emits one
//! symbol record per function, method, type, var, and const. All symbols
//! of a run are inserted under one batched transaction, together with
//! their package records.

use crate::core::config::Config;
use crate::core::error::Result;
use crate::loader::{gosrc, LoadedFile, Loader};
use crate::store::types::{NewSymbol, PackageRow, SymbolKind};
use crate::store::Store;
use tracing::info;
use tree_sitter::Node;

/// One extracted declaration, before it is assigned a store id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedSymbol {
    pub name: String,
    pub kind: SymbolKind,
    /// `*`-prefixed for pointer receivers, `Name[...]` for generic
    /// receivers, empty for non-methods.
    pub recv_type: String,
    pub line: u32,
    pub sig: Option<String>,
}

/// Extract every top-level declaration of a file.
pub fn extract_file(file: &LoadedFile) -> Vec<ExtractedSymbol> {
    let mut symbols = Vec::new();
    let root = file.tree.root_node();
    let source = &file.source;

    let mut cursor = root.walk();
    for decl in root.children(&mut cursor) {
        match decl.kind() {
            "function_declaration" => {
                if let Some(name) = decl.child_by_field_name("name") {
                    symbols.push(ExtractedSymbol {
                        name: gosrc::text(name, source).to_string(),
                        kind: SymbolKind::Func,
                        recv_type: String::new(),
                        line: gosrc::line(decl),
                        sig: Some(declaration_head(decl, source)),
                    });
                }
            }
            "method_declaration" => {
                let name = match decl.child_by_field_name("name") {
                    Some(n) => gosrc::text(n, source).to_string(),
                    None => continue,
                };
                let recv_type = decl
                    .child_by_field_name("receiver")
                    .and_then(|r| receiver_type(r, source))
                    .unwrap_or_default();
                symbols.push(ExtractedSymbol {
                    name,
                    kind: SymbolKind::Method,
                    recv_type,
                    line: gosrc::line(decl),
                    sig: Some(declaration_head(decl, source)),
                });
            }
            "type_declaration" => {
                // `type X Y` and `type X = Y` both declare a type symbol.
                for spec_kind in ["type_spec", "type_alias"] {
                    collect_specs(decl, spec_kind, |spec| {
                        if let Some(name) = spec.child_by_field_name("name") {
                            symbols.push(ExtractedSymbol {
                                name: gosrc::text(name, source).to_string(),
                                kind: SymbolKind::Type,
                                recv_type: String::new(),
                                line: gosrc::line(spec),
                                sig: None,
                            });
                        }
                    });
                }
            }
            "var_declaration" => {
                collect_specs(decl, "var_spec", |spec| {
                    for name in spec_names(spec) {
                        symbols.push(ExtractedSymbol {
                            name: gosrc::text(name, source).to_string(),
                            kind: SymbolKind::Var,
                            recv_type: String::new(),
                            line: gosrc::line(spec),
                            sig: None,
                        });
                    }
                });
            }
            "const_declaration" => {
                collect_specs(decl, "const_spec", |spec| {
                    for name in spec_names(spec) {
                        symbols.push(ExtractedSymbol {
                            name: gosrc::text(name, source).to_string(),
                            kind: SymbolKind::Const,
                            recv_type: String::new(),
                            line: gosrc::line(spec),
                            sig: None,
                        });
                    }
                });
            }
            _ => {}
        }
    }

    symbols
}

/// Run extraction over every loaded package and persist the results under
/// one batched transaction. Returns the number of stored symbols.
pub fn extract_and_store(loader: &Loader, config: &Config, store: &Store) -> Result<usize> {
    let tx = store.batch()?;
    let mut count = 0usize;

    for pkg in loader.packages() {
        tx.insert_package(&PackageRow {
            pkg_path: pkg.pkg_path.clone(),
            module: loader.module.clone(),
            dir: pkg.dir.clone(),
            layer: config.layer_for_package(&pkg.pkg_path).map(str::to_string),
        })?;

        for file in &pkg.files {
            for sym in extract_file(file) {
                tx.insert_symbol(&NewSymbol {
                    pkg_path: pkg.pkg_path.clone(),
                    name: sym.name,
                    kind: sym.kind,
                    recv_type: sym.recv_type,
                    file: file.rel_path.clone(),
                    line: sym.line,
                    sig: sym.sig,
                })?;
                count += 1;
            }
        }
    }

    tx.commit()?;
    info!(symbols = count, "extracted symbols");
    Ok(count)
}

/// Normalize a receiver parameter list to the receiver type name:
/// `*`-prefixed iff the receiver is a pointer, `Name[...]` for generic
/// receivers.
pub fn receiver_type(receiver: Node, source: &str) -> Option<String> {
    let mut cursor = receiver.walk();
    for child in receiver.children(&mut cursor) {
        if child.kind() == "parameter_declaration" {
            let ty = child.child_by_field_name("type")?;
            return Some(normalize_type(ty, source));
        }
    }
    None
}

fn normalize_type(ty: Node, source: &str) -> String {
    match ty.kind() {
        "pointer_type" => {
            let inner = ty
                .named_child(0)
                .map(|n| normalize_type(n, source))
                .unwrap_or_default();
            format!("*{}", inner)
        }
        "generic_type" => {
            let name = ty
                .child_by_field_name("type")
                .map(|n| gosrc::text(n, source))
                .unwrap_or("");
            format!("{}[...]", name)
        }
        _ => gosrc::text(ty, source).to_string(),
    }
}

/// Declaration text up to (not including) the body block.
fn declaration_head(decl: Node, source: &str) -> String {
    let end = decl
        .child_by_field_name("body")
        .map(|b| b.start_byte())
        .unwrap_or_else(|| decl.end_byte());
    source[decl.start_byte()..end].trim().to_string()
}

fn collect_specs<'t>(decl: Node<'t>, spec_kind: &str, mut f: impl FnMut(Node<'t>)) {
    let mut cursor = decl.walk();
    for child in decl.children(&mut cursor) {
        if child.kind() == spec_kind {
            f(child);
        }
    }
}

fn spec_names<'t>(spec: Node<'t>) -> Vec<Node<'t>> {
    let mut names = Vec::new();
    let mut cursor = spec.walk();
    for child in spec.children(&mut cursor) {
        match child.kind() {
            "identifier" => names.push(child),
            "," => {}
            // names come first; stop at the type or `=`
            _ => break,
        }
    }
    names
}
