//! Entry-point detection
//!
//! One AST pass per source file finds four categories of entry points:
//! HTTP route registrations, gRPC service registrations, Cobra commands,
//! and `main` functions. Each match binds to an extracted symbol; handler
//! expressions that cannot be attributed (anonymous literals) are skipped.
//!
//! A second, signature-based discovery pass runs after SSA is built; see
//! [`signature`].

pub mod signature;

use crate::core::error::Result;
use crate::loader::{gosrc, LoadedFile, LoadedPackage, Loader};
use crate::ssa::lower::{parse_params, parse_results};
use crate::store::types::{DiscoveryMethod, EntrypointType, NewEntrypoint};
use crate::store::Store;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use tracing::{debug, info};
use tree_sitter::Node;

/// Router method names carrying `(path, handler)` in args 0/1, title-case
/// (chi convention) and all-caps (gin convention).
const HTTP_VERBS_TITLE: &[&str] = &[
    "Get", "Post", "Put", "Delete", "Patch", "Options", "Head", "Connect", "Trace",
];
const HTTP_VERBS_CAPS: &[&str] = &[
    "GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS", "HEAD", "CONNECT", "TRACE",
];

static REGISTER_SERVER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Register([A-Za-z0-9_]+)Server$").expect("static regex"));

/// Run router/command/main detection over every loaded package.
pub fn detect_and_store(loader: &Loader, store: &Store) -> Result<usize> {
    let methods = collect_methods(loader);
    let mut count = 0usize;

    for pkg in loader.packages() {
        let mut registrations = Vec::new();

        for file in &pkg.files {
            let mut detector = FileDetector {
                pkg,
                file,
                store,
                registrations: &mut registrations,
                inserted: 0,
            };
            detector.scan()?;
            count += detector.inserted;
        }

        // Second RPC pass: bind each registered service impl to its
        // request-handler-shaped methods.
        for reg in &registrations {
            count += emit_rpc_methods(store, reg, &methods)?;
        }

        // package main: a top-level zero-arg, zero-receiver `main`.
        if pkg.name == "main" {
            count += detect_main(store, pkg)?;
        }
    }

    info!(entrypoints = count, "detected entry points");
    Ok(count)
}

/// One `Register<Svc>Server(x, impl)` observation
struct Registration {
    service: String,
    impl_type: String,
}

/// One concrete method signature collected across the whole project
struct MethodSig {
    pkg_path: String,
    name: String,
    recv_type: String,
    param_count: usize,
    result_count: usize,
}

/// Collect every method declaration of every loaded package.
fn collect_methods(loader: &Loader) -> Vec<MethodSig> {
    let mut methods = Vec::new();
    for pkg in loader.packages() {
        for file in &pkg.files {
            let root = file.tree.root_node();
            let mut cursor = root.walk();
            for decl in root.children(&mut cursor) {
                if decl.kind() != "method_declaration" {
                    continue;
                }
                let name = match decl.child_by_field_name("name") {
                    Some(n) => gosrc::text(n, &file.source).to_string(),
                    None => continue,
                };
                let recv_type = decl
                    .child_by_field_name("receiver")
                    .and_then(|r| crate::symbols::receiver_type(r, &file.source))
                    .unwrap_or_default();
                let param_count = decl
                    .child_by_field_name("parameters")
                    .map(|p| parse_params(p, &file.source).len())
                    .unwrap_or(0);
                let result_count = decl
                    .child_by_field_name("result")
                    .map(|r| parse_results(r, &file.source).len())
                    .unwrap_or(0);
                methods.push(MethodSig {
                    pkg_path: pkg.pkg_path.clone(),
                    name,
                    recv_type,
                    param_count,
                    result_count,
                });
            }
        }
    }
    methods
}

fn emit_rpc_methods(
    store: &Store,
    reg: &Registration,
    methods: &[MethodSig],
) -> Result<usize> {
    let mut count = 0;
    for m in methods {
        if m.recv_type.trim_start_matches('*') != reg.impl_type {
            continue;
        }
        // Handler shape: (context, request) -> (response, error).
        if m.param_count < 2 || m.result_count < 2 {
            continue;
        }
        if !m.name.chars().next().map(char::is_uppercase).unwrap_or(false) {
            continue;
        }
        if m.name.starts_with("mustEmbedUnimplemented") {
            continue;
        }
        let symbol_id = match store.symbol_id_by_key(&m.pkg_path, &m.name, &m.recv_type)? {
            Some(id) => id,
            None => continue,
        };
        store.insert_entrypoint(&NewEntrypoint {
            ep_type: EntrypointType::Grpc,
            label: format!("{}.{}", reg.service, m.name),
            symbol_id,
            meta_json: Some(
                json!({"service": reg.service, "method": m.name}).to_string(),
            ),
            discovery_method: DiscoveryMethod::Router,
        })?;
        count += 1;
    }
    Ok(count)
}

fn detect_main(store: &Store, pkg: &LoadedPackage) -> Result<usize> {
    let mut count = 0;
    for file in &pkg.files {
        let root = file.tree.root_node();
        let mut cursor = root.walk();
        for decl in root.children(&mut cursor) {
            if decl.kind() != "function_declaration" {
                continue;
            }
            let name = decl
                .child_by_field_name("name")
                .map(|n| gosrc::text(n, &file.source))
                .unwrap_or("");
            if name != "main" {
                continue;
            }
            let params = decl
                .child_by_field_name("parameters")
                .map(|p| parse_params(p, &file.source).len())
                .unwrap_or(0);
            if params != 0 {
                continue;
            }
            if let Some(symbol_id) = store.symbol_id_by_key(&pkg.pkg_path, "main", "")? {
                store.insert_entrypoint(&NewEntrypoint {
                    ep_type: EntrypointType::Main,
                    label: "main".to_string(),
                    symbol_id,
                    meta_json: None,
                    discovery_method: DiscoveryMethod::Router,
                })?;
                count += 1;
            }
        }
    }
    Ok(count)
}

// =============================================================================
// PER-FILE DETECTOR
// =============================================================================

struct FileDetector<'a> {
    pkg: &'a LoadedPackage,
    file: &'a LoadedFile,
    store: &'a Store,
    registrations: &'a mut Vec<Registration>,
    inserted: usize,
}

impl FileDetector<'_> {
    fn scan(&mut self) -> Result<()> {
        let root = self.file.tree.root_node();
        let mut calls = Vec::new();
        let mut commands = Vec::new();
        gosrc::visit(root, &mut |node| match node.kind() {
            "call_expression" => calls.push(node),
            "composite_literal" => commands.push(node),
            _ => {}
        });

        for call in calls {
            self.scan_call(call)?;
        }
        for lit in commands {
            self.scan_cobra_literal(lit)?;
        }
        Ok(())
    }

    fn scan_call(&mut self, call: Node) -> Result<()> {
        let source = &self.file.source;
        let func = match call.child_by_field_name("function") {
            Some(f) => f,
            None => return Ok(()),
        };

        // RPC registrations match on the function name in either form
        // (`RegisterUserServer(...)` or `pb.RegisterUserServer(...)`).
        let fn_name = match func.kind() {
            "identifier" => Some(gosrc::text(func, source).to_string()),
            "selector_expression" => func
                .child_by_field_name("field")
                .map(|f| gosrc::text(f, source).to_string()),
            _ => None,
        };
        if let Some(name) = &fn_name {
            if let Some(caps) = REGISTER_SERVER_RE.captures(name) {
                if let Some(impl_type) = self.rpc_impl_type(call) {
                    self.registrations.push(Registration {
                        service: caps[1].to_string(),
                        impl_type,
                    });
                }
                return Ok(());
            }
        }

        // HTTP registrations match only on selector method names.
        if func.kind() != "selector_expression" {
            return Ok(());
        }
        let method_name = match func.child_by_field_name("field") {
            Some(f) => gosrc::text(f, source).to_string(),
            None => return Ok(()),
        };

        let args = argument_nodes(call);
        let route = match method_name.as_str() {
            "HandleFunc" | "Handle" => http_route("ANY", args.first(), args.get(1), source),
            "Any" => http_route("ANY", args.first(), args.get(1), source),
            "Method" => {
                let method = args
                    .first()
                    .and_then(|a| gosrc::string_literal_value(*a, source))
                    .map(|m| m.to_uppercase());
                match method {
                    Some(m) => http_route(&m, args.get(1), args.get(2), source),
                    None => None,
                }
            }
            name if HTTP_VERBS_TITLE.contains(&name) => {
                http_route(&name.to_uppercase(), args.first(), args.get(1), source)
            }
            name if HTTP_VERBS_CAPS.contains(&name) => {
                http_route(name, args.first(), args.get(1), source)
            }
            _ => None,
        };

        if let Some((method, path, handler)) = route {
            if let Some(symbol_id) = self.resolve_handler(handler)? {
                self.store.insert_entrypoint(&NewEntrypoint {
                    ep_type: EntrypointType::Http,
                    label: format!("{} {}", method, path),
                    symbol_id,
                    meta_json: Some(json!({"method": method, "path": path}).to_string()),
                    discovery_method: DiscoveryMethod::Router,
                })?;
                self.inserted += 1;
            } else {
                debug!(
                    file = %self.file.rel_path,
                    method = %method,
                    path = %path,
                    "unresolvable handler, skipping route"
                );
            }
        }
        Ok(())
    }

    /// Impl type name for the second argument of a register call:
    /// `&Impl{}` directly, or a local variable assigned one nearby.
    fn rpc_impl_type(&self, call: Node) -> Option<String> {
        let args = argument_nodes(call);
        let impl_arg = args.get(1)?;
        composite_type_name(*impl_arg, &self.file.source).or_else(|| {
            // Trace a bare identifier to a composite assignment in the
            // enclosing function.
            if impl_arg.kind() != "identifier" {
                return None;
            }
            let var = gosrc::text(*impl_arg, &self.file.source);
            let mut node = call;
            while let Some(parent) = node.parent() {
                if matches!(
                    parent.kind(),
                    "function_declaration" | "method_declaration"
                ) {
                    return find_local_composite(parent, var, &self.file.source);
                }
                node = parent;
            }
            None
        })
    }

    fn scan_cobra_literal(&mut self, lit: Node) -> Result<()> {
        let source = &self.file.source;
        let ty = match lit.child_by_field_name("type") {
            Some(t) => t,
            None => return Ok(()),
        };
        if gosrc::text(ty, source) != "cobra.Command" {
            return Ok(());
        }

        let mut use_value: Option<String> = None;
        let mut run_handler: Option<Node> = None;
        let mut run_e_handler: Option<Node> = None;

        if let Some(body) = lit.child_by_field_name("body") {
            let mut cursor = body.walk();
            for element in body.named_children(&mut cursor) {
                if element.kind() != "keyed_element" {
                    continue;
                }
                let key = match element.named_child(0) {
                    Some(k) => gosrc::text(k, source).to_string(),
                    None => continue,
                };
                let value =
                    match element.named_child(element.named_child_count().saturating_sub(1)) {
                        Some(v) => v,
                        None => continue,
                    };
                match key.as_str() {
                    "Use" => use_value = gosrc::string_literal_value(value, source),
                    "Run" => run_handler = Some(value),
                    "RunE" => run_e_handler = Some(value),
                    _ => {}
                }
            }
        }

        let use_value = match use_value {
            Some(u) => u,
            None => return Ok(()),
        };
        let uses_run_e = run_e_handler.is_some();
        let handler = match run_e_handler.or(run_handler) {
            Some(h) => h,
            None => return Ok(()),
        };

        let command = use_value
            .split_whitespace()
            .next()
            .unwrap_or(&use_value)
            .to_string();

        if let Some(symbol_id) = self.resolve_handler(handler)? {
            self.store.insert_entrypoint(&NewEntrypoint {
                ep_type: EntrypointType::Cli,
                label: command.clone(),
                symbol_id,
                meta_json: Some(
                    json!({"command": command, "uses_run_e": uses_run_e}).to_string(),
                ),
                discovery_method: DiscoveryMethod::Router,
            })?;
            self.inserted += 1;
        }
        Ok(())
    }

    /// Resolve a handler expression to a stored symbol id.
    ///
    /// Bare identifier -> `(current_pkg, name, "")`; selector
    /// `recv.Method` -> value receiver, then pointer receiver, then an
    /// imported package's function; anonymous literals cannot be
    /// attributed.
    fn resolve_handler(&self, handler: Node) -> Result<Option<i64>> {
        let source = &self.file.source;
        let pkg_path = &self.pkg.pkg_path;

        match handler.kind() {
            "identifier" => {
                let name = gosrc::text(handler, source);
                self.store.symbol_id_by_key(pkg_path, name, "")
            }
            "selector_expression" => {
                let recv = match handler.child_by_field_name("operand") {
                    Some(o) => gosrc::text(o, source).to_string(),
                    None => return Ok(None),
                };
                let method = match handler.child_by_field_name("field") {
                    Some(f) => gosrc::text(f, source).to_string(),
                    None => return Ok(None),
                };

                if let Some(id) = self.store.symbol_id_by_key(pkg_path, &method, &recv)? {
                    return Ok(Some(id));
                }
                let starred = format!("*{}", recv);
                if let Some(id) = self.store.symbol_id_by_key(pkg_path, &method, &starred)? {
                    return Ok(Some(id));
                }
                if let Some(import) = self.file.imports.iter().find(|i| i.alias == recv) {
                    return self.store.symbol_id_by_key(&import.path, &method, "");
                }
                Ok(None)
            }
            "func_literal" => Ok(None),
            "unary_expression" | "parenthesized_expression" => match handler.named_child(0) {
                Some(inner) => self.resolve_handler(inner),
                None => Ok(None),
            },
            _ => Ok(None),
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn argument_nodes(call: Node) -> Vec<Node> {
    match call.child_by_field_name("arguments") {
        Some(args) => {
            let mut cursor = args.walk();
            args.named_children(&mut cursor).collect()
        }
        None => Vec::new(),
    }
}

fn http_route<'t>(
    method: &str,
    path_arg: Option<&Node<'t>>,
    handler_arg: Option<&Node<'t>>,
    source: &str,
) -> Option<(String, String, Node<'t>)> {
    let path = gosrc::string_literal_value(*path_arg?, source)?;
    let handler = *handler_arg?;
    Some((method.to_string(), path, handler))
}

/// Type name of `Impl{...}` or `&Impl{...}`, package qualifier stripped.
fn composite_type_name(node: Node, source: &str) -> Option<String> {
    match node.kind() {
        "composite_literal" => {
            let ty = node.child_by_field_name("type")?;
            let text = gosrc::text(ty, source);
            Some(text.rsplit('.').next().unwrap_or(text).to_string())
        }
        "unary_expression" => {
            let operand = node.child_by_field_name("operand")?;
            composite_type_name(operand, source)
        }
        _ => None,
    }
}

/// Scan a function declaration for `var := &Impl{}` style assignments.
fn find_local_composite(function: Node, var: &str, source: &str) -> Option<String> {
    let mut found = None;
    gosrc::visit(function, &mut |node| {
        if found.is_some() || node.kind() != "short_var_declaration" {
            return;
        }
        let left = match node.child_by_field_name("left") {
            Some(l) => l,
            None => return,
        };
        let right = match node.child_by_field_name("right") {
            Some(r) => r,
            None => return,
        };
        let mut lc = left.walk();
        let names: Vec<Node> = left.named_children(&mut lc).collect();
        let mut rc = right.walk();
        let values: Vec<Node> = right.named_children(&mut rc).collect();
        for (name, value) in names.iter().zip(values.iter()) {
            if gosrc::text(*name, source) == var {
                found = composite_type_name(*value, source);
            }
        }
    });
    found
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::project::Project;
    use crate::store::types::EntrypointFilter;
    use crate::symbols;
    use tempfile::TempDir;

    fn fixture(files: &[(&str, &str)]) -> (TempDir, Store, Loader) {
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
        (temp, store, loader)
    }

    fn entrypoints_of(store: &Store, ep_type: EntrypointType) -> Vec<crate::store::EntrypointWithSymbol> {
        store
            .get_entrypoints(&EntrypointFilter {
                ep_type: Some(ep_type),
                ..Default::default()
            })
            .unwrap()
    }

    #[test]
    fn test_stdlib_handlefunc() {
        let (_t, store, loader) = fixture(&[(
            "main.go",
            r#"package main

import "net/http"

func HandleUsers(w http.ResponseWriter, r *http.Request) {}

func main() {
    http.HandleFunc("/users", HandleUsers)
    http.ListenAndServe(":8080", nil)
}
"#,
        )]);
        detect_and_store(&loader, &store).unwrap();

        let https = entrypoints_of(&store, EntrypointType::Http);
        assert_eq!(https.len(), 1);
        assert_eq!(https[0].entrypoint.label, "ANY /users");
        assert_eq!(https[0].symbol.name, "HandleUsers");

        let mains = entrypoints_of(&store, EntrypointType::Main);
        assert_eq!(mains.len(), 1);
    }

    #[test]
    fn test_chi_router_verbs() {
        let (_t, store, loader) = fixture(&[(
            "routes.go",
            r#"package main

import "github.com/go-chi/chi/v5"

func GetU(w http.ResponseWriter, r *http.Request) {}
func CreateU(w http.ResponseWriter, r *http.Request) {}
func DeleteU(w http.ResponseWriter, r *http.Request) {}

func routes() {
    r := chi.NewRouter()
    r.Get("/u", GetU)
    r.Post("/u", CreateU)
    r.Delete("/u/{id}", DeleteU)
}
"#,
        )]);
        detect_and_store(&loader, &store).unwrap();

        let https = entrypoints_of(&store, EntrypointType::Http);
        let labels: Vec<&str> = https.iter().map(|e| e.entrypoint.label.as_str()).collect();
        assert_eq!(labels, vec!["DELETE /u/{id}", "GET /u", "POST /u"]);
    }

    #[test]
    fn test_gin_caps_verbs_and_method() {
        let (_t, store, loader) = fixture(&[(
            "routes.go",
            r#"package main

func list(c *gin.Context) {}
func create(c *gin.Context) {}
func patch(c *gin.Context) {}

func routes(r *gin.Engine) {
    r.GET("/items", list)
    r.POST("/items", create)
    r.Method("patch", "/items/:id", patch)
}
"#,
        )]);
        detect_and_store(&loader, &store).unwrap();

        let https = entrypoints_of(&store, EntrypointType::Http);
        let labels: Vec<&str> = https.iter().map(|e| e.entrypoint.label.as_str()).collect();
        assert_eq!(labels, vec!["GET /items", "PATCH /items/:id", "POST /items"]);
    }

    #[test]
    fn test_cobra_commands() {
        let (_t, store, loader) = fixture(&[(
            "cmd.go",
            r#"package main

import "github.com/spf13/cobra"

func runServe(cmd *cobra.Command, args []string) {}
func runMigrate(cmd *cobra.Command, args []string) error { return nil }

var serveCmd = &cobra.Command{
    Use: "serve [flags]",
    Run: runServe,
}

var migrateCmd = &cobra.Command{
    Use:  "migrate",
    RunE: runMigrate,
}
"#,
        )]);
        detect_and_store(&loader, &store).unwrap();

        let clis = entrypoints_of(&store, EntrypointType::Cli);
        assert_eq!(clis.len(), 2);

        let serve = clis
            .iter()
            .find(|e| e.entrypoint.label == "serve")
            .unwrap();
        let meta: serde_json::Value =
            serde_json::from_str(serve.entrypoint.meta_json.as_ref().unwrap()).unwrap();
        assert_eq!(meta["uses_run_e"], false);
        assert_eq!(serve.symbol.name, "runServe");

        let migrate = clis
            .iter()
            .find(|e| e.entrypoint.label == "migrate")
            .unwrap();
        let meta: serde_json::Value =
            serde_json::from_str(migrate.entrypoint.meta_json.as_ref().unwrap()).unwrap();
        assert_eq!(meta["uses_run_e"], true);
    }

    #[test]
    fn test_grpc_registration() {
        let (_t, store, loader) = fixture(&[(
            "server.go",
            r#"package main

type UserServiceImpl struct{}

func (s *UserServiceImpl) GetUser(ctx context.Context, req *GetUserRequest) (*GetUserResponse, error) {
    return nil, nil
}

func (s *UserServiceImpl) internalHelper(ctx context.Context, req *GetUserRequest) (*GetUserResponse, error) {
    return nil, nil
}

func register(srv *grpc.Server) {
    pb.RegisterUserServiceServer(srv, &UserServiceImpl{})
}
"#,
        )]);
        detect_and_store(&loader, &store).unwrap();

        let grpcs = entrypoints_of(&store, EntrypointType::Grpc);
        assert_eq!(grpcs.len(), 1);
        assert_eq!(grpcs[0].entrypoint.label, "UserService.GetUser");
        assert_eq!(grpcs[0].symbol.name, "GetUser");
    }

    #[test]
    fn test_method_expression_handler_resolution() {
        let (_t, store, loader) = fixture(&[(
            "routes.go",
            r#"package main

type API struct{}

func (a *API) List(w http.ResponseWriter, r *http.Request) {}

func routes(mux *http.ServeMux) {
    mux.HandleFunc("/list", API.List)
}
"#,
        )]);
        detect_and_store(&loader, &store).unwrap();

        let https = entrypoints_of(&store, EntrypointType::Http);
        assert_eq!(https.len(), 1);
        assert_eq!(https[0].symbol.recv_type, "*API");
    }

    #[test]
    fn test_variable_receiver_handler_is_skipped() {
        // `a` is a local variable, not a type or package alias; the
        // route cannot be attributed to a symbol.
        let (_t, store, loader) = fixture(&[(
            "routes.go",
            r#"package main

type API struct{}

func (a *API) List(w http.ResponseWriter, r *http.Request) {}

func routes(a *API, mux *http.ServeMux) {
    mux.HandleFunc("/list", a.List)
}
"#,
        )]);
        detect_and_store(&loader, &store).unwrap();
        assert!(entrypoints_of(&store, EntrypointType::Http).is_empty());
    }

    #[test]
    fn test_anonymous_handler_skipped() {
        let (_t, store, loader) = fixture(&[(
            "routes.go",
            r#"package main

func routes(mux *http.ServeMux) {
    mux.HandleFunc("/anon", func(w http.ResponseWriter, r *http.Request) {})
}
"#,
        )]);
        detect_and_store(&loader, &store).unwrap();
        assert!(entrypoints_of(&store, EntrypointType::Http).is_empty());
    }
}
