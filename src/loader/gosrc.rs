//! Go source parsing helpers
//!
//! Thin layer over tree-sitter-go: parser construction, package clause and
//! import extraction, and the small node utilities every later stage leans
//! on.

use tree_sitter::{Node, Parser, Tree};

/// One import in a file's import table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Name the import is referenced by in this file. For unnamed imports
    /// this is the last path segment; blank and dot imports carry no
    /// usable alias and are skipped.
    pub alias: String,
    /// Full import path.
    pub path: String,
}

/// Build a parser configured for Go.
pub fn parser() -> Option<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_go::LANGUAGE.into())
        .ok()?;
    Some(parser)
}

/// Parse a Go source file.
pub fn parse(source: &str) -> Option<Tree> {
    parser()?.parse(source, None)
}

/// Source text of a node.
pub fn text<'s>(node: Node, source: &'s str) -> &'s str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// 1-based line of a node.
pub fn line(node: Node) -> u32 {
    node.start_position().row as u32 + 1
}

/// Preorder walk over every node in a tree.
pub fn visit<'t>(node: Node<'t>, f: &mut impl FnMut(Node<'t>)) {
    f(node);
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit(child, f);
    }
}

/// Package name from the file's `package` clause.
pub fn package_name(tree: &Tree, source: &str) -> Option<String> {
    let root = tree.root_node();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if child.kind() == "package_clause" {
            let mut inner = child.walk();
            for part in child.children(&mut inner) {
                if part.kind() == "package_identifier" {
                    return Some(text(part, source).to_string());
                }
            }
        }
    }
    None
}

/// Import table of a file. Blank (`_`) and dot (`.`) imports are omitted.
pub fn imports(tree: &Tree, source: &str) -> Vec<Import> {
    let mut result = Vec::new();
    let root = tree.root_node();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if child.kind() != "import_declaration" {
            continue;
        }
        let mut specs = Vec::new();
        collect_import_specs(child, &mut specs);
        for spec in specs {
            if let Some(import) = import_from_spec(spec, source) {
                result.push(import);
            }
        }
    }
    result
}

fn collect_import_specs<'t>(node: Node<'t>, out: &mut Vec<Node<'t>>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "import_spec" => out.push(child),
            "import_spec_list" => collect_import_specs(child, out),
            _ => {}
        }
    }
}

fn import_from_spec(spec: Node, source: &str) -> Option<Import> {
    let path_node = spec.child_by_field_name("path")?;
    let path = strip_quotes(text(path_node, source)).to_string();
    if path.is_empty() {
        return None;
    }

    let alias = match spec.child_by_field_name("name") {
        Some(name) => match name.kind() {
            "package_identifier" => text(name, source).to_string(),
            // `_` and `.` imports contribute no reference name.
            _ => return None,
        },
        None => default_alias(&path).to_string(),
    };

    Some(Import { alias, path })
}

/// Reference name of an unnamed import: the last path segment, skipping a
/// major-version suffix (`github.com/labstack/echo/v4` -> `echo`).
pub fn default_alias(path: &str) -> &str {
    let mut segments = path.rsplit('/');
    let last = segments.next().unwrap_or(path);
    if last.len() > 1
        && last.starts_with('v')
        && last[1..].chars().all(|c| c.is_ascii_digit())
    {
        segments.next().unwrap_or(last)
    } else {
        last
    }
}

/// Strip the surrounding quotes of a Go string literal. Handles both
/// interpreted (`"x"`) and raw (`` `x` ``) literals; returns the input
/// unchanged when it is not a plain literal.
pub fn strip_quotes(literal: &str) -> &str {
    let trimmed = literal.trim();
    if trimmed.len() >= 2 {
        let bytes = trimmed.as_bytes();
        if (bytes[0] == b'"' && bytes[trimmed.len() - 1] == b'"')
            || (bytes[0] == b'`' && bytes[trimmed.len() - 1] == b'`')
        {
            return &trimmed[1..trimmed.len() - 1];
        }
    }
    trimmed
}

/// Extract the string value of an expression node when it is a plain
/// string literal; `None` for anything computed.
pub fn string_literal_value(node: Node, source: &str) -> Option<String> {
    match node.kind() {
        "interpreted_string_literal" | "raw_string_literal" => {
            Some(strip_quotes(text(node, source)).to_string())
        }
        _ => None,
    }
}
