//! Callee resolution
//!
//! Resolution is pluggable behind [`CalleeResolver`] so the current
//! single-candidate, prefer-non-mock strategy can be replaced (e.g. by
//! Rapid Type Analysis) without touching the extractor.

use crate::ssa::{Binding, CalleeExpr, SsaFunction};
use crate::store::Store;
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;

/// How a resolved callee was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Static callee; the edge keeps its base kind (static/defer/go).
    Static,
    /// Resolved through the interface-call heuristic.
    Interface,
    /// Traced through a function-value binding.
    Funcval,
}

/// A resolved call target
#[derive(Debug, Clone, Copy)]
pub struct Resolution {
    pub symbol_id: i64,
    pub classification: Classification,
}

/// Context for one call site
pub struct CallCommon<'a> {
    pub caller: &'a SsaFunction,
    pub callee: &'a CalleeExpr,
    /// Import table of the caller's file: alias -> import path.
    pub imports: &'a HashMap<String, String>,
}

/// Resolves call sites to stored symbol ids
pub trait CalleeResolver {
    fn resolve(&mut self, common: &CallCommon) -> Option<Resolution>;
}

/// Default resolver: static lookup through local bindings and imports,
/// then the single-candidate interface heuristic with mock packages
/// deprioritized.
pub struct HeuristicResolver<'a> {
    store: &'a Store,
    /// Lookup cache keyed on the symbol triple.
    cache: LruCache<(String, String, String), Option<i64>>,
}

const CACHE_SIZE: usize = 4096;

impl<'a> HeuristicResolver<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self {
            store,
            cache: LruCache::new(NonZeroUsize::new(CACHE_SIZE).expect("nonzero cache size")),
        }
    }

    /// Cached `(pkg_path, name, recv_type)` lookup.
    pub fn lookup(&mut self, pkg_path: &str, name: &str, recv_type: &str) -> Option<i64> {
        let key = (
            pkg_path.to_string(),
            name.to_string(),
            recv_type.to_string(),
        );
        if let Some(cached) = self.cache.get(&key) {
            return *cached;
        }
        let result = self
            .store
            .symbol_id_by_key(pkg_path, name, recv_type)
            .ok()
            .flatten();
        self.cache.put(key, result);
        result
    }

    /// Method lookup trying the given pointerness first, then the other.
    fn lookup_method(&mut self, pkg_path: &str, name: &str, recv: &str, pointer: bool) -> Option<i64> {
        let (first, second) = if pointer {
            (format!("*{}", recv), recv.to_string())
        } else {
            (recv.to_string(), format!("*{}", recv))
        };
        self.lookup(pkg_path, name, &first)
            .or_else(|| self.lookup(pkg_path, name, &second))
    }

    fn resolve_ident(&mut self, common: &CallCommon, name: &str) -> Option<Resolution> {
        // A local binding to a function reference makes this a
        // function-value call.
        if let Some(Binding::FuncRef(target)) = common.caller.bindings.get(name) {
            let target = target.clone();
            if let Some(id) = self.resolve_func_ref(common, &target) {
                return Some(Resolution {
                    symbol_id: id,
                    classification: Classification::Funcval,
                });
            }
            return None;
        }

        self.lookup(&common.caller.pkg_path, name, "")
            .map(|symbol_id| Resolution {
                symbol_id,
                classification: Classification::Static,
            })
    }

    /// Resolve a direct function reference (`F` or `pkg.F`) to a symbol.
    fn resolve_func_ref(&mut self, common: &CallCommon, target: &CalleeExpr) -> Option<i64> {
        match target {
            CalleeExpr::Ident(name) => self.lookup(&common.caller.pkg_path, name, ""),
            CalleeExpr::Selector { recv, method } => {
                let import_path = common.imports.get(recv)?.clone();
                self.lookup(&import_path, method, "")
            }
            CalleeExpr::Other(_) => None,
        }
    }

    fn resolve_selector(&mut self, common: &CallCommon, recv: &str, method: &str) -> Option<Resolution> {
        let caller = common.caller;

        // Package-qualified call through an import alias.
        if let Some(import_path) = common.imports.get(recv) {
            let import_path = import_path.clone();
            return self
                .lookup(&import_path, method, "")
                .map(|symbol_id| Resolution {
                    symbol_id,
                    classification: Classification::Static,
                });
        }

        // Method on the enclosing receiver: `s.helper()`.
        if caller.recv_name.as_deref() == Some(recv) && !caller.recv_type.is_empty() {
            let (bare, pointer) = match caller.recv_type.strip_prefix('*') {
                Some(bare) => (bare.to_string(), true),
                None => (caller.recv_type.clone(), false),
            };
            let pkg = caller.pkg_path.clone();
            if let Some(symbol_id) = self.lookup_method(&pkg, method, &bare, pointer) {
                return Some(Resolution {
                    symbol_id,
                    classification: Classification::Static,
                });
            }
        }

        // Local variable with a known concrete type.
        if let Some(Binding::TypeRef {
            pkg_alias,
            type_name,
            pointer,
        }) = caller.bindings.get(recv)
        {
            let pkg = match pkg_alias {
                Some(alias) => common.imports.get(alias).cloned(),
                None => Some(caller.pkg_path.clone()),
            };
            if let Some(pkg) = pkg {
                let (type_name, pointer) = (type_name.clone(), *pointer);
                if let Some(symbol_id) = self.lookup_method(&pkg, method, &type_name, pointer) {
                    return Some(Resolution {
                        symbol_id,
                        classification: Classification::Static,
                    });
                }
            }
        }

        // Anything else looks like an interface invocation.
        self.resolve_interface(method)
    }

    /// Interface-call heuristic: gather concrete method implementations
    /// by name, prefer candidates outside mock packages, resolve when one
    /// remains; with several, take the first in id order.
    fn resolve_interface(&mut self, method: &str) -> Option<Resolution> {
        let candidates = self.store.get_methods_by_name(method).ok()?;
        if candidates.is_empty() {
            return None;
        }

        let non_mock: Vec<_> = candidates
            .iter()
            .filter(|c| !is_mock_package(&c.pkg_path))
            .collect();
        let pool: Vec<i64> = if non_mock.is_empty() {
            candidates.iter().map(|c| c.id).collect()
        } else {
            non_mock.iter().map(|c| c.id).collect()
        };

        // Ordered by id from the store, so "first" is deterministic.
        pool.first().map(|&symbol_id| Resolution {
            symbol_id,
            classification: Classification::Interface,
        })
    }
}

impl CalleeResolver for HeuristicResolver<'_> {
    fn resolve(&mut self, common: &CallCommon) -> Option<Resolution> {
        match common.callee {
            CalleeExpr::Ident(name) => self.resolve_ident(common, name),
            CalleeExpr::Selector { recv, method } => {
                self.resolve_selector(common, recv, method)
            }
            CalleeExpr::Other(_) => None,
        }
    }
}

/// Whether a package path looks like a mock or fake package.
pub fn is_mock_package(pkg_path: &str) -> bool {
    pkg_path.contains("/mock")
        || pkg_path.contains("_mock")
        || pkg_path.contains("/fake")
        || pkg_path.ends_with("mocks")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::{NewSymbol, SymbolKind};

    fn insert_method(store: &Store, pkg: &str, name: &str, recv: &str) -> i64 {
        store
            .upsert_symbol(&NewSymbol {
                pkg_path: pkg.to_string(),
                name: name.to_string(),
                kind: SymbolKind::Method,
                recv_type: recv.to_string(),
                file: "a.go".to_string(),
                line: 1,
                sig: None,
            })
            .unwrap()
    }

    #[test]
    fn test_is_mock_package() {
        assert!(is_mock_package("example.com/app/mock"));
        assert!(is_mock_package("example.com/app/mocks"));
        assert!(is_mock_package("example.com/app/store_mock"));
        assert!(is_mock_package("example.com/app/fake/users"));
        assert!(!is_mock_package("example.com/app/store"));
    }

    #[test]
    fn test_interface_resolution_prefers_non_mock() {
        let store = Store::open_in_memory().unwrap();
        let mock_id = insert_method(&store, "example.com/app/mocks", "Find", "*MockStore");
        let real_id = insert_method(&store, "example.com/app/store", "Find", "*UserStore");
        assert!(mock_id < real_id);

        let mut resolver = HeuristicResolver::new(&store);
        let res = resolver.resolve_interface("Find").unwrap();
        assert_eq!(res.symbol_id, real_id);
        assert_eq!(res.classification, Classification::Interface);
    }

    #[test]
    fn test_interface_resolution_multiple_takes_first() {
        let store = Store::open_in_memory().unwrap();
        let first = insert_method(&store, "example.com/app/a", "Run", "*A");
        let _second = insert_method(&store, "example.com/app/b", "Run", "*B");

        let mut resolver = HeuristicResolver::new(&store);
        let res = resolver.resolve_interface("Run").unwrap();
        assert_eq!(res.symbol_id, first);
    }

    #[test]
    fn test_interface_resolution_none_when_no_candidates() {
        let store = Store::open_in_memory().unwrap();
        let mut resolver = HeuristicResolver::new(&store);
        assert!(resolver.resolve_interface("Nothing").is_none());
    }

    #[test]
    fn test_lookup_is_cached() {
        let store = Store::open_in_memory().unwrap();
        let id = insert_method(&store, "p", "M", "*T");
        let mut resolver = HeuristicResolver::new(&store);
        assert_eq!(resolver.lookup("p", "M", "*T"), Some(id));
        // Second hit comes from the cache.
        assert_eq!(resolver.lookup("p", "M", "*T"), Some(id));
        assert_eq!(resolver.cache.len(), 1);
    }
}
