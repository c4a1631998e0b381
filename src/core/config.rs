//! Configuration management
//!
//! FlowLens reads an optional `flowlens.yaml` at the project root. Every
//! section falls back to a built-in table of standard Go ecosystem
//! conventions, so a project with no config file still indexes usefully.

use crate::core::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Name of the optional per-project configuration file.
pub const CONFIG_FILE: &str = "flowlens.yaml";

/// Directory under the project root holding the index database and summary.
pub const FLOWLENS_DIR: &str = ".flowlens";

/// Index database file name inside [`FLOWLENS_DIR`].
pub const INDEX_DB: &str = "index.db";

/// Summary sidecar file name inside [`FLOWLENS_DIR`].
pub const INDEX_SUMMARY: &str = "index.json";

/// Per-project configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub exclude: ExcludeConfig,
    /// Layer name -> package path globs. First matching layer wins,
    /// evaluated in [`Config::layer_order`] priority.
    pub layers: HashMap<String, Vec<String>>,
    pub io_packages: IoPackagesConfig,
    /// Packages to downweight or hide in graph filters.
    pub noise_packages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExcludeConfig {
    /// Directory names excluded by exact path-component match.
    pub dirs: Vec<String>,
    /// File glob patterns to skip while loading.
    pub files_glob: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IoPackagesConfig {
    pub db: Vec<String>,
    pub net: Vec<String>,
    pub fs: Vec<String>,
    pub bus: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        let mut layers = HashMap::new();
        layers.insert(
            "handler".to_string(),
            vec![
                "**/handler/**".to_string(),
                "**/handlers/**".to_string(),
                "**/api/**".to_string(),
                "**/controller/**".to_string(),
                "**/controllers/**".to_string(),
                "**/transport/**".to_string(),
            ],
        );
        layers.insert(
            "service".to_string(),
            vec![
                "**/service/**".to_string(),
                "**/services/**".to_string(),
                "**/usecase/**".to_string(),
                "**/usecases/**".to_string(),
                "**/app/**".to_string(),
            ],
        );
        layers.insert(
            "store".to_string(),
            vec![
                "**/store/**".to_string(),
                "**/storage/**".to_string(),
                "**/repo/**".to_string(),
                "**/repository/**".to_string(),
                "**/dao/**".to_string(),
                "**/db/**".to_string(),
            ],
        );
        layers.insert(
            "domain".to_string(),
            vec![
                "**/domain/**".to_string(),
                "**/model/**".to_string(),
                "**/models/**".to_string(),
                "**/entity/**".to_string(),
                "**/entities/**".to_string(),
            ],
        );

        Self {
            exclude: ExcludeConfig::default(),
            layers,
            io_packages: IoPackagesConfig::default(),
            noise_packages: vec![
                "log".to_string(),
                "log/slog".to_string(),
                "fmt".to_string(),
                "errors".to_string(),
                "go.uber.org/zap*".to_string(),
                "github.com/sirupsen/logrus*".to_string(),
                "github.com/rs/zerolog*".to_string(),
            ],
        }
    }
}

impl Default for ExcludeConfig {
    fn default() -> Self {
        Self {
            dirs: vec![
                "vendor".to_string(),
                "testdata".to_string(),
                "node_modules".to_string(),
                ".git".to_string(),
            ],
            files_glob: vec![
                "**/*.pb.go".to_string(),
                "**/*_generated.go".to_string(),
                "**/zz_generated*.go".to_string(),
            ],
        }
    }
}

impl Default for IoPackagesConfig {
    fn default() -> Self {
        Self {
            db: vec![
                "database/sql".to_string(),
                "github.com/jmoiron/sqlx*".to_string(),
                "gorm.io/*".to_string(),
                "github.com/jackc/pgx*".to_string(),
                "go.mongodb.org/*".to_string(),
                "github.com/redis/*".to_string(),
                "github.com/go-redis/*".to_string(),
                "go.etcd.io/bbolt*".to_string(),
            ],
            net: vec![
                "net/http".to_string(),
                "net".to_string(),
                "google.golang.org/grpc*".to_string(),
                "github.com/go-resty/*".to_string(),
                "golang.org/x/net*".to_string(),
            ],
            fs: vec![
                "os".to_string(),
                "io/ioutil".to_string(),
                "path/filepath".to_string(),
            ],
            bus: vec![
                "github.com/segmentio/kafka-go*".to_string(),
                "github.com/IBM/sarama*".to_string(),
                "github.com/Shopify/sarama*".to_string(),
                "github.com/nats-io/*".to_string(),
                "github.com/rabbitmq/*".to_string(),
                "cloud.google.com/go/pubsub*".to_string(),
            ],
        }
    }
}

impl Config {
    /// Load configuration from `<project>/flowlens.yaml`, falling back to
    /// the built-in defaults when the file is absent.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_yaml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Layer evaluation order: the four conventional layers by specificity,
    /// then any custom layer names alphabetically.
    pub fn layer_order(&self) -> Vec<&str> {
        const CONVENTIONAL: [&str; 4] = ["handler", "service", "store", "domain"];
        let mut order: Vec<&str> = CONVENTIONAL
            .iter()
            .copied()
            .filter(|l| self.layers.contains_key(*l))
            .collect();
        let mut custom: Vec<&str> = self
            .layers
            .keys()
            .map(|k| k.as_str())
            .filter(|k| !CONVENTIONAL.contains(k))
            .collect();
        custom.sort_unstable();
        order.extend(custom);
        order
    }

    /// Resolve a package path to its configured layer, if any.
    pub fn layer_for_package(&self, pkg_path: &str) -> Option<&str> {
        for layer in self.layer_order() {
            let patterns = &self.layers[layer];
            if patterns.iter().any(|p| layer_pattern_matches(p, pkg_path)) {
                return Some(layer);
            }
        }
        None
    }

    /// Resolve an imported package path to its I/O categories.
    pub fn io_categories_for_import(&self, import_path: &str) -> Vec<&'static str> {
        let mut cats = Vec::new();
        let table: [(&'static str, &Vec<String>); 4] = [
            ("db", &self.io_packages.db),
            ("net", &self.io_packages.net),
            ("fs", &self.io_packages.fs),
            ("bus", &self.io_packages.bus),
        ];
        for (cat, patterns) in table {
            if patterns.iter().any(|p| package_glob_matches(p, import_path)) {
                cats.push(cat);
            }
        }
        cats
    }

    /// Get the `.flowlens` directory for a project.
    pub fn flowlens_dir(project_dir: &Path) -> PathBuf {
        project_dir.join(FLOWLENS_DIR)
    }

    /// Get the index database path for a project.
    pub fn db_path(project_dir: &Path) -> PathBuf {
        Self::flowlens_dir(project_dir).join(INDEX_DB)
    }

    /// Get the index summary path for a project.
    pub fn summary_path(project_dir: &Path) -> PathBuf {
        Self::flowlens_dir(project_dir).join(INDEX_SUMMARY)
    }
}

/// Match a package glob against a package path: exact match, or a pattern
/// ending in `*` matches by prefix.
pub fn package_glob_matches(pattern: &str, pkg_path: &str) -> bool {
    if let Some(prefix) = pattern.strip_suffix('*') {
        pkg_path.starts_with(prefix)
    } else {
        pattern == pkg_path
    }
}

/// Match a layer pattern of the form `**/X/**` against a package path:
/// true when the path contains `/X/` or starts with `X/`. Patterns without
/// the wrapping globs fall back to [`package_glob_matches`].
pub fn layer_pattern_matches(pattern: &str, pkg_path: &str) -> bool {
    let inner = pattern
        .strip_prefix("**/")
        .and_then(|p| p.strip_suffix("/**"));
    match inner {
        Some(name) => {
            let infix = format!("/{}/", name);
            let prefix = format!("{}/", name);
            pkg_path.contains(&infix)
                || pkg_path.starts_with(&prefix)
                || pkg_path == name
                || pkg_path.ends_with(&format!("/{}", name))
        }
        None => package_glob_matches(pattern, pkg_path),
    }
}

/// Match a file glob against a root-relative path. `**/` prefixes mean
/// "anywhere in the path"; a leading `*` matches by suffix (`*.pb.go`).
pub fn file_glob_matches(pattern: &str, rel_path: &str) -> bool {
    let pattern = pattern.strip_prefix("**/").unwrap_or(pattern);

    // Suffix patterns: *.pb.go, *_generated.go
    if let Some(suffix) = pattern.strip_prefix('*') {
        let file_name = rel_path.rsplit('/').next().unwrap_or(rel_path);
        return file_name.ends_with(suffix) || rel_path.ends_with(suffix);
    }

    // Patterns with an inner `*` match the file name segment-wise.
    let file_name = rel_path.rsplit('/').next().unwrap_or(rel_path);
    if let Some(star) = pattern.find('*') {
        let (prefix, rest) = pattern.split_at(star);
        let suffix = &rest[1..];
        return file_name.starts_with(prefix) && file_name.ends_with(suffix);
    }

    rel_path == pattern || file_name == pattern
}

/// Check whether any leading path component of a root-relative path is in
/// the excluded directory list.
pub fn dir_excluded(excluded: &[String], rel_path: &str) -> bool {
    rel_path
        .split('/')
        .any(|component| excluded.iter().any(|d| d == component))
}
