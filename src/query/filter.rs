//! Graph filters
//!
//! `GraphFilter` is a plain record consumed by stateless predicates; the
//! query engine composes them linearly. Filters arrive URL-encoded as a
//! JSON blob and deserialize directly into this struct.

use serde::{Deserialize, Serialize};

fn default_max_depth() -> u32 {
    6
}

/// Filter set applied to graph traversals
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphFilter {
    pub hide_stdlib: bool,
    pub hide_vendors: bool,
    /// Stop expanding past nodes that carry any `io:*` tag.
    pub stop_at_io: bool,
    pub stop_at_package_prefix: Vec<String>,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    pub noise_packages: Vec<String>,
    /// Downweight constructor/provider wiring in the spine scoring.
    pub collapse_wiring: bool,
    pub hide_cmd_main: bool,
}

impl Default for GraphFilter {
    fn default() -> Self {
        Self {
            hide_stdlib: false,
            hide_vendors: false,
            stop_at_io: false,
            stop_at_package_prefix: Vec::new(),
            max_depth: default_max_depth(),
            noise_packages: Vec::new(),
            collapse_wiring: false,
            hide_cmd_main: false,
        }
    }
}

impl GraphFilter {
    /// Callee-side rejection: whether a symbol in `pkg_path` is hidden by
    /// this filter.
    pub fn rejects_package(&self, pkg_path: &str) -> bool {
        if self.hide_stdlib && is_stdlib(pkg_path) {
            return true;
        }
        if self.hide_vendors && is_vendor(pkg_path) {
            return true;
        }
        if self.hide_cmd_main && is_cmd_package(pkg_path) {
            return true;
        }
        self.noise_packages
            .iter()
            .any(|p| match_package_pattern(p, pkg_path))
    }

    /// Node-side stop: whether expansion must not continue past a node
    /// with this package and tag set.
    pub fn stops_at(&self, pkg_path: &str, tags: &[String]) -> bool {
        if self.stop_at_io && tags.iter().any(|t| t.starts_with("io:")) {
            return true;
        }
        self.stop_at_package_prefix
            .iter()
            .any(|p| pkg_path.starts_with(p.as_str()))
    }
}

/// True when the first path segment contains no dot (no domain), the Go
/// convention for standard library packages.
pub fn is_stdlib(pkg_path: &str) -> bool {
    let first = pkg_path.split('/').next().unwrap_or(pkg_path);
    !first.is_empty() && !first.contains('.')
}

/// True for vendored package paths.
pub fn is_vendor(pkg_path: &str) -> bool {
    pkg_path.contains("/vendor/") || pkg_path.starts_with("vendor/")
}

/// True for `cmd` packages.
pub fn is_cmd_package(pkg_path: &str) -> bool {
    pkg_path.contains("/cmd/") || pkg_path.starts_with("cmd/")
}

/// Package pattern matching: exact, `p*` prefix, or `p/*` matching the
/// subtree rooted at `p` (including `p` itself).
pub fn match_package_pattern(pattern: &str, pkg_path: &str) -> bool {
    if let Some(base) = pattern.strip_suffix("/*") {
        return pkg_path == base || pkg_path.starts_with(&format!("{}/", base));
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return pkg_path.starts_with(prefix);
    }
    pattern == pkg_path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_stdlib_truth_table() {
        assert!(is_stdlib("fmt"));
        assert!(is_stdlib("net/http"));
        assert!(is_stdlib("encoding/json"));
        assert!(!is_stdlib("github.com/acme/widgets"));
        assert!(!is_stdlib("example.com/app"));
        assert!(!is_stdlib("gopkg.in/yaml.v3"));
    }

    #[test]
    fn test_is_vendor_truth_table() {
        assert!(is_vendor("vendor/github.com/x"));
        assert!(is_vendor("example.com/app/vendor/github.com/x"));
        assert!(!is_vendor("example.com/app/vendors"));
        assert!(!is_vendor("example.com/app"));
    }

    #[test]
    fn test_is_cmd_package() {
        assert!(is_cmd_package("cmd/server"));
        assert!(is_cmd_package("example.com/app/cmd/server"));
        assert!(!is_cmd_package("example.com/app/command"));
    }

    #[test]
    fn test_match_package_pattern() {
        assert!(match_package_pattern("fmt", "fmt"));
        assert!(!match_package_pattern("fmt", "fmtx"));
        assert!(match_package_pattern("go.uber.org/zap*", "go.uber.org/zap/zapcore"));
        assert!(match_package_pattern("example.com/app/*", "example.com/app/api"));
        assert!(match_package_pattern("example.com/app/*", "example.com/app"));
        assert!(!match_package_pattern("example.com/app/*", "example.com/apple"));
    }

    #[test]
    fn test_default_filter() {
        let filter = GraphFilter::default();
        assert_eq!(filter.max_depth, 6);
        assert!(!filter.hide_stdlib);
        assert!(!filter.stop_at_io);
    }

    #[test]
    fn test_filter_deserializes_from_partial_json() {
        let filter: GraphFilter =
            serde_json::from_str(r#"{"hide_stdlib": true, "max_depth": 3}"#).unwrap();
        assert!(filter.hide_stdlib);
        assert_eq!(filter.max_depth, 3);
        assert!(filter.noise_packages.is_empty());
    }

    #[test]
    fn test_stops_at_io_tag() {
        let filter = GraphFilter {
            stop_at_io: true,
            ..Default::default()
        };
        let tags = vec!["io:db".to_string(), "layer:store".to_string()];
        assert!(filter.stops_at("example.com/app/store", &tags));
        assert!(!filter.stops_at("example.com/app/store", &["layer:store".to_string()]));
    }

    #[test]
    fn test_stop_at_package_prefix() {
        let filter = GraphFilter {
            stop_at_package_prefix: vec!["example.com/app/store".to_string()],
            ..Default::default()
        };
        assert!(filter.stops_at("example.com/app/store", &[]));
        assert!(filter.stops_at("example.com/app/storefront", &[]));
        assert!(!filter.stops_at("example.com/app/api", &[]));
    }
}
