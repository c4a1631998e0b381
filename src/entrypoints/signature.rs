//! Signature-based HTTP handler discovery
//!
//! Runs after SSA is built. Any function shaped like a known handler
//! signature that is not already registered as an entry point gets one
//! with `discovery_method = "signature"`:
//!
//! - stdlib: `(http.ResponseWriter, *http.Request)`, optionally preceded
//!   by `context.Context`
//! - gin: `(*gin.Context)`
//! - echo: `(echo.Context) -> error`
//!
//! Parameter types are identified two ways, and either suffices:
//! package+name (the type is written through an import of the expected
//! package path), or method-set shape (a project-declared type whose
//! method set carries `Header`/`Write`/`WriteHeader` counts as a
//! ResponseWriter, and project-declared aliases resolve through their
//! underlying type).

use crate::core::error::Result;
use crate::loader::{gosrc, Loader};
use crate::ssa::{Param, SsaProgram};
use crate::store::types::{DiscoveryMethod, EntrypointType, NewEntrypoint};
use crate::store::Store;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use tracing::info;
use tree_sitter::Node;

/// Method names a ResponseWriter-shaped type must carry.
const RESPONSE_WRITER_METHODS: &[&str] = &["Header", "Write", "WriteHeader"];

/// Alias chains longer than this are abandoned (also breaks cycles).
const MAX_ALIAS_DEPTH: usize = 8;

/// Register signature-shaped handlers not already present as entry points.
pub fn discover_and_store(
    loader: &Loader,
    program: &SsaProgram,
    store: &Store,
) -> Result<usize> {
    // alias -> import path, per file.
    let mut file_imports: HashMap<&str, HashMap<&str, &str>> = HashMap::new();
    for pkg in loader.packages() {
        for file in &pkg.files {
            let table = file
                .imports
                .iter()
                .map(|i| (i.alias.as_str(), i.path.as_str()))
                .collect();
            file_imports.insert(file.rel_path.as_str(), table);
        }
    }
    let empty = HashMap::new();

    let types = TypeIndex::build(loader);

    let mut count = 0usize;
    for function in &program.functions {
        let imports = file_imports
            .get(function.file.as_str())
            .unwrap_or(&empty);

        if !matches_handler_shape(
            &function.params,
            &function.results,
            &function.pkg_path,
            imports,
            &types,
        ) {
            continue;
        }

        let symbol_id = match store.symbol_id_by_key(
            &function.pkg_path,
            &function.name,
            &function.recv_type,
        )? {
            Some(id) => id,
            None => continue,
        };
        if store.entrypoint_exists_for_symbol(symbol_id, EntrypointType::Http)? {
            continue;
        }

        store.insert_entrypoint(&NewEntrypoint {
            ep_type: EntrypointType::Http,
            label: function.name.clone(),
            symbol_id,
            meta_json: Some(json!({"method": "ANY", "path": ""}).to_string()),
            discovery_method: DiscoveryMethod::Signature,
        })?;
        count += 1;
    }

    info!(handlers = count, "signature-discovered handlers");
    Ok(count)
}

/// Whether a parameter/result shape matches one of the known handler
/// signatures.
fn matches_handler_shape(
    params: &[Param],
    results: &[String],
    fn_pkg: &str,
    imports: &HashMap<&str, &str>,
    types: &TypeIndex,
) -> bool {
    let texts: Vec<&str> = params.iter().map(|p| p.type_text.as_str()).collect();

    let writer = |t: &str| is_response_writer(t, fn_pkg, imports, types);
    let request = |t: &str| is_known_type(t, "net/http", "Request", true, fn_pkg, imports, types);
    let context = |t: &str| is_known_type(t, "context", "Context", false, fn_pkg, imports, types);

    // stdlib, with or without a leading context.
    match texts.as_slice() {
        [w, r] if writer(w) && request(r) => return true,
        [c, w, r] if context(c) && writer(w) && request(r) => return true,
        _ => {}
    }

    // gin: one *gin.Context parameter.
    if texts.len() == 1
        && is_known_type(
            texts[0],
            "github.com/gin-gonic/gin",
            "Context",
            true,
            fn_pkg,
            imports,
            types,
        )
    {
        return true;
    }

    // echo: one echo.Context parameter returning error.
    if texts.len() == 1
        && results == ["error"]
        && is_known_type(
            texts[0],
            "github.com/labstack/echo/v4",
            "Context",
            false,
            fn_pkg,
            imports,
            types,
        )
    {
        return true;
    }

    false
}

/// A parameter type is the expected one when the package+name check says
/// so, or when a project-declared alias chain resolves to it.
fn is_known_type(
    type_text: &str,
    pkg_path: &str,
    name: &str,
    pointer: bool,
    fn_pkg: &str,
    imports: &HashMap<&str, &str>,
    types: &TypeIndex,
) -> bool {
    if is_qualified(type_text, pkg_path, name, pointer, imports) {
        return true;
    }
    let tref = types.parse_type_text(type_text, fn_pkg, imports);
    types.resolves_to(&tref, pkg_path, name, pointer)
}

/// ResponseWriter additionally accepts any project-declared type whose
/// method set covers `Header`/`Write`/`WriteHeader`.
fn is_response_writer(
    type_text: &str,
    fn_pkg: &str,
    imports: &HashMap<&str, &str>,
    types: &TypeIndex,
) -> bool {
    if is_qualified(type_text, "net/http", "ResponseWriter", false, imports) {
        return true;
    }
    let tref = types.parse_type_text(type_text, fn_pkg, imports);
    types.resolves_to(&tref, "net/http", "ResponseWriter", false)
        || types.has_response_writer_shape(&tref)
}

/// Check that a parameter type text is `alias.Name` (pointer-stripped per
/// `pointer`) where `alias` imports a path whose tail matches `pkg_path`.
fn is_qualified(
    type_text: &str,
    pkg_path: &str,
    name: &str,
    pointer: bool,
    imports: &HashMap<&str, &str>,
) -> bool {
    let text = type_text.trim();
    let text = if pointer {
        match text.strip_prefix('*') {
            Some(t) => t,
            None => return false,
        }
    } else {
        if text.starts_with('*') {
            return false;
        }
        text
    };

    let (alias, type_name) = match text.split_once('.') {
        Some(parts) => parts,
        None => return false,
    };
    if type_name != name {
        return false;
    }
    match imports.get(alias) {
        Some(path) => *path == pkg_path,
        // Tolerate files whose imports failed to load; require the
        // conventional alias then.
        None => alias == gosrc::default_alias(pkg_path),
    }
}

// =============================================================================
// TYPE INDEX
// =============================================================================

/// Where a type reference leads after resolving its qualifier
#[derive(Debug, Clone, PartialEq, Eq)]
enum TypeRef {
    /// Written through an import of a non-project package.
    External {
        path: String,
        name: String,
        pointer: bool,
    },
    /// A type declared somewhere in this project.
    Project {
        pkg_path: String,
        name: String,
        pointer: bool,
    },
    /// Inline structs, func types, unresolvable qualifiers.
    Opaque,
}

/// Declared-type information collected across the project: interface and
/// concrete method sets, and the underlying target of alias/defined
/// types, each resolved against its declaring file's imports.
struct TypeIndex {
    module: String,
    /// `(pkg_path, type_name)` -> method names declared on the type
    /// (interface elements plus concrete receiver declarations).
    methods: HashMap<(String, String), HashSet<String>>,
    /// `(pkg_path, type_name)` -> underlying type of `type X = Y` and
    /// `type X Y` declarations.
    underlying: HashMap<(String, String), TypeRef>,
}

impl TypeIndex {
    fn build(loader: &Loader) -> Self {
        let mut index = TypeIndex {
            module: loader.module.clone(),
            methods: HashMap::new(),
            underlying: HashMap::new(),
        };

        for pkg in loader.packages() {
            for file in &pkg.files {
                let imports: HashMap<&str, &str> = file
                    .imports
                    .iter()
                    .map(|i| (i.alias.as_str(), i.path.as_str()))
                    .collect();

                let root = file.tree.root_node();
                let mut cursor = root.walk();
                for decl in root.children(&mut cursor) {
                    match decl.kind() {
                        "type_declaration" => {
                            index.collect_type_decl(decl, &file.source, &pkg.pkg_path, &imports);
                        }
                        "method_declaration" => {
                            index.collect_method_decl(decl, &file.source, &pkg.pkg_path);
                        }
                        _ => {}
                    }
                }
            }
        }

        index
    }

    fn collect_type_decl(
        &mut self,
        decl: Node,
        source: &str,
        pkg_path: &str,
        imports: &HashMap<&str, &str>,
    ) {
        let mut cursor = decl.walk();
        for spec in decl.children(&mut cursor) {
            if !matches!(spec.kind(), "type_spec" | "type_alias") {
                continue;
            }
            let name = match spec.child_by_field_name("name") {
                Some(n) => gosrc::text(n, source).to_string(),
                None => continue,
            };
            let ty = match spec.child_by_field_name("type") {
                Some(t) => t,
                None => continue,
            };
            let key = (pkg_path.to_string(), name);

            match ty.kind() {
                "interface_type" => {
                    let entry = self.methods.entry(key).or_default();
                    collect_interface_methods(ty, source, entry);
                }
                "struct_type" => {}
                _ => {
                    let target = self.resolve_type_node(ty, source, pkg_path, imports, false);
                    if target != TypeRef::Opaque {
                        self.underlying.insert(key, target);
                    }
                }
            }
        }
    }

    fn collect_method_decl(&mut self, decl: Node, source: &str, pkg_path: &str) {
        let name = match decl.child_by_field_name("name") {
            Some(n) => gosrc::text(n, source).to_string(),
            None => return,
        };
        let recv = decl
            .child_by_field_name("receiver")
            .and_then(|r| crate::symbols::receiver_type(r, source))
            .unwrap_or_default();
        let bare = bare_type_name(&recv);
        if bare.is_empty() {
            return;
        }
        self.methods
            .entry((pkg_path.to_string(), bare.to_string()))
            .or_default()
            .insert(name);
    }

    fn resolve_type_node(
        &self,
        ty: Node,
        source: &str,
        pkg_path: &str,
        imports: &HashMap<&str, &str>,
        pointer: bool,
    ) -> TypeRef {
        match ty.kind() {
            "pointer_type" => match ty.named_child(0) {
                Some(inner) => self.resolve_type_node(inner, source, pkg_path, imports, true),
                None => TypeRef::Opaque,
            },
            "generic_type" => match ty.child_by_field_name("type") {
                Some(inner) => self.resolve_type_node(inner, source, pkg_path, imports, pointer),
                None => TypeRef::Opaque,
            },
            "type_identifier" => TypeRef::Project {
                pkg_path: pkg_path.to_string(),
                name: gosrc::text(ty, source).to_string(),
                pointer,
            },
            "qualified_type" => {
                let alias = ty
                    .child_by_field_name("package")
                    .map(|p| gosrc::text(p, source));
                let name = ty.child_by_field_name("name").map(|n| gosrc::text(n, source));
                match (alias.and_then(|a| imports.get(a)), name) {
                    (Some(path), Some(name)) => self.make_ref(path, name, pointer),
                    _ => TypeRef::Opaque,
                }
            }
            _ => TypeRef::Opaque,
        }
    }

    /// Parse a parameter type text (`MyWriter`, `*api.Request`,
    /// `http.ResponseWriter`) against the using file's imports.
    fn parse_type_text(
        &self,
        type_text: &str,
        fn_pkg: &str,
        imports: &HashMap<&str, &str>,
    ) -> TypeRef {
        let mut text = type_text.trim();
        let mut pointer = false;
        while let Some(rest) = text.strip_prefix('*') {
            pointer = true;
            text = rest.trim();
        }
        // Drop generic arguments: `Cache[K]` names the type `Cache`.
        if let Some(idx) = text.find('[') {
            text = text[..idx].trim_end();
        }

        match text.split_once('.') {
            Some((alias, name)) => match imports.get(alias) {
                Some(path) => self.make_ref(path, name, pointer),
                None => TypeRef::Opaque,
            },
            None => {
                if text.is_empty() || !text.chars().next().is_some_and(char::is_alphabetic) {
                    return TypeRef::Opaque;
                }
                TypeRef::Project {
                    pkg_path: fn_pkg.to_string(),
                    name: text.to_string(),
                    pointer,
                }
            }
        }
    }

    fn make_ref(&self, path: &str, name: &str, pointer: bool) -> TypeRef {
        if self.is_project(path) {
            TypeRef::Project {
                pkg_path: path.to_string(),
                name: name.to_string(),
                pointer,
            }
        } else {
            TypeRef::External {
                path: path.to_string(),
                name: name.to_string(),
                pointer,
            }
        }
    }

    fn is_project(&self, path: &str) -> bool {
        path == self.module || path.starts_with(&format!("{}/", self.module))
    }

    /// Whether a reference reaches `want_path.want_name` (with the given
    /// pointerness) by following project alias chains.
    fn resolves_to(&self, tref: &TypeRef, want_path: &str, want_name: &str, want_pointer: bool) -> bool {
        let mut current = tref.clone();
        let mut pointer_seen = false;

        for _ in 0..MAX_ALIAS_DEPTH {
            match current {
                TypeRef::External {
                    ref path,
                    ref name,
                    pointer,
                } => {
                    return path == want_path
                        && name == want_name
                        && (pointer_seen || pointer) == want_pointer;
                }
                TypeRef::Project {
                    ref pkg_path,
                    ref name,
                    pointer,
                } => {
                    pointer_seen |= pointer;
                    match self
                        .underlying
                        .get(&(pkg_path.clone(), name.clone()))
                    {
                        Some(next) => current = next.clone(),
                        None => return false,
                    }
                }
                TypeRef::Opaque => return false,
            }
        }
        false
    }

    /// Whether a project-declared type (or something its alias chain
    /// reaches) carries the ResponseWriter method set.
    fn has_response_writer_shape(&self, tref: &TypeRef) -> bool {
        let mut current = tref.clone();

        for _ in 0..MAX_ALIAS_DEPTH {
            match current {
                TypeRef::Project {
                    ref pkg_path,
                    ref name,
                    ..
                } => {
                    let key = (pkg_path.clone(), name.clone());
                    if let Some(methods) = self.methods.get(&key) {
                        if RESPONSE_WRITER_METHODS.iter().all(|m| methods.contains(*m)) {
                            return true;
                        }
                    }
                    match self.underlying.get(&key) {
                        Some(next) => current = next.clone(),
                        None => return false,
                    }
                }
                _ => return false,
            }
        }
        false
    }
}

/// Method names declared by an interface body (embedded interfaces are
/// not expanded).
fn collect_interface_methods(interface: Node, source: &str, out: &mut HashSet<String>) {
    let mut cursor = interface.walk();
    for member in interface.named_children(&mut cursor) {
        if matches!(member.kind(), "method_spec" | "method_elem") {
            if let Some(name) = member.child_by_field_name("name") {
                out.insert(gosrc::text(name, source).to_string());
            }
        }
    }
}

/// Receiver type name with pointer and generic suffix stripped.
fn bare_type_name(recv_type: &str) -> &str {
    let bare = recv_type.trim_start_matches('*');
    match bare.find('[') {
        Some(idx) => &bare[..idx],
        None => bare,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::project::Project;
    use crate::store::types::EntrypointFilter;
    use crate::symbols;
    use tempfile::TempDir;

    fn run_fixture(files: &[(&str, &str)]) -> Store {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("go.mod"), "module example.com/app\n").unwrap();
        for (rel, content) in files {
            let path = temp.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        let project = Project::from_path(temp.path()).unwrap();
        let config = Config::default();
        let loader = Loader::load(&project, &config).unwrap();
        let store = Store::open_in_memory().unwrap();
        symbols::extract_and_store(&loader, &config, &store).unwrap();
        crate::entrypoints::detect_and_store(&loader, &store).unwrap();
        let program = SsaProgram::build(&loader);
        discover_and_store(&loader, &program, &store).unwrap();
        store
    }

    fn http_entrypoints(store: &Store) -> Vec<crate::store::EntrypointWithSymbol> {
        store
            .get_entrypoints(&EntrypointFilter {
                ep_type: Some(crate::store::EntrypointType::Http),
                ..Default::default()
            })
            .unwrap()
    }

    fn http_labels(store: &Store) -> Vec<String> {
        http_entrypoints(store)
            .iter()
            .map(|e| e.entrypoint.label.clone())
            .collect()
    }

    #[test]
    fn test_discovers_unregistered_stdlib_handler() {
        let store = run_fixture(&[(
            "main.go",
            r#"package main

import "net/http"

func HandleOrphan(w http.ResponseWriter, r *http.Request) {}
"#,
        )]);
        let eps = http_entrypoints(&store);
        assert_eq!(eps.len(), 1);
        assert_eq!(eps[0].entrypoint.label, "HandleOrphan");
        assert_eq!(
            eps[0].entrypoint.discovery_method,
            DiscoveryMethod::Signature
        );
    }

    #[test]
    fn test_registered_handler_not_duplicated() {
        let store = run_fixture(&[(
            "main.go",
            r#"package main

import "net/http"

func HandleUsers(w http.ResponseWriter, r *http.Request) {}

func main() {
    http.HandleFunc("/users", HandleUsers)
}
"#,
        )]);
        let eps = http_entrypoints(&store);
        assert_eq!(eps.len(), 1);
        assert_eq!(eps[0].entrypoint.discovery_method, DiscoveryMethod::Router);
    }

    #[test]
    fn test_context_prefixed_stdlib_shape() {
        let store = run_fixture(&[(
            "main.go",
            r#"package main

import (
    "context"
    "net/http"
)

func HandleCtx(ctx context.Context, w http.ResponseWriter, r *http.Request) {}
"#,
        )]);
        assert_eq!(http_entrypoints(&store).len(), 1);
    }

    #[test]
    fn test_gin_and_echo_shapes() {
        let store = run_fixture(&[(
            "main.go",
            r#"package main

import (
    "github.com/gin-gonic/gin"
    "github.com/labstack/echo/v4"
)

func ListItems(c *gin.Context) {}

func ShowItem(c echo.Context) error { return nil }

func NotAHandler(c echo.Context) {}
"#,
        )]);
        let labels = http_labels(&store);
        assert_eq!(labels.len(), 2);
        assert!(labels.contains(&"ListItems".to_string()));
        assert!(labels.contains(&"ShowItem".to_string()));
    }

    #[test]
    fn test_local_interface_with_writer_method_set() {
        // The writer parameter is a locally-declared interface; only its
        // method-set shape identifies it.
        let store = run_fixture(&[(
            "main.go",
            r#"package main

import "net/http"

type LoggingWriter interface {
    Header() http.Header
    Write(b []byte) (int, error)
    WriteHeader(code int)
}

func HandleWrapped(w LoggingWriter, r *http.Request) {}

type HalfWriter interface {
    Write(b []byte) (int, error)
}

func NotWrapped(w HalfWriter, r *http.Request) {}
"#,
        )]);
        let labels = http_labels(&store);
        assert_eq!(labels, vec!["HandleWrapped".to_string()]);
    }

    #[test]
    fn test_concrete_type_with_writer_method_set() {
        // A concrete local type gains the shape through its receiver
        // declarations.
        let store = run_fixture(&[(
            "main.go",
            r#"package main

import "net/http"

type RecordingWriter struct{}

func (w *RecordingWriter) Header() http.Header { return nil }

func (w *RecordingWriter) Write(b []byte) (int, error) { return len(b), nil }

func (w *RecordingWriter) WriteHeader(code int) {}

func HandleRecorded(w *RecordingWriter, r *http.Request) {}
"#,
        )]);
        let labels = http_labels(&store);
        assert_eq!(labels, vec!["HandleRecorded".to_string()]);
    }

    #[test]
    fn test_aliases_resolve_across_packages() {
        // Writer and request are wrapped by aliases in a sibling package;
        // neither parameter mentions net/http at the use site.
        let store = run_fixture(&[
            (
                "httpx/types.go",
                r#"package httpx

import "net/http"

type Writer = http.ResponseWriter

type Request = http.Request
"#,
            ),
            (
                "main.go",
                r#"package main

import "example.com/app/httpx"

func HandleAliased(w httpx.Writer, r *httpx.Request) {}
"#,
            ),
        ]);
        let labels = http_labels(&store);
        assert_eq!(labels, vec!["HandleAliased".to_string()]);
    }

    #[test]
    fn test_local_defined_request_type() {
        // `type Req http.Request` is a defined type, not an alias; the
        // underlying chain still reaches net/http.Request.
        let store = run_fixture(&[(
            "main.go",
            r#"package main

import "net/http"

type Req http.Request

func HandleDefined(w http.ResponseWriter, r *Req) {}
"#,
        )]);
        let labels = http_labels(&store);
        assert_eq!(labels, vec!["HandleDefined".to_string()]);
    }

    #[test]
    fn test_unrelated_local_type_not_discovered() {
        let store = run_fixture(&[(
            "main.go",
            r#"package main

import "net/http"

type Config struct{}

func Configure(c *Config, r *http.Request) {}
"#,
        )]);
        assert!(http_entrypoints(&store).is_empty());
    }

    #[test]
    fn test_default_alias() {
        use crate::loader::gosrc::default_alias;
        assert_eq!(default_alias("net/http"), "http");
        assert_eq!(default_alias("github.com/labstack/echo/v4"), "echo");
        assert_eq!(default_alias("github.com/gin-gonic/gin"), "gin");
    }
}
