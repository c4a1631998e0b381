//! SQLite schema for the index store

/// Full schema, executed as one batch on open. `IF NOT EXISTS` keeps the
/// statements idempotent across re-opens of the same database.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS packages (
    pkg_path TEXT PRIMARY KEY,
    module   TEXT NOT NULL,
    dir      TEXT NOT NULL,
    layer    TEXT
);

CREATE TABLE IF NOT EXISTS symbols (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    pkg_path  TEXT NOT NULL,
    name      TEXT NOT NULL,
    kind      TEXT NOT NULL CHECK (kind IN ('func', 'method', 'type', 'var', 'const')),
    recv_type TEXT NOT NULL DEFAULT '',
    file      TEXT NOT NULL,
    line      INTEGER NOT NULL,
    sig       TEXT,
    UNIQUE (pkg_path, name, recv_type)
);

CREATE TABLE IF NOT EXISTS call_edges (
    caller_id   INTEGER NOT NULL REFERENCES symbols(id),
    callee_id   INTEGER NOT NULL REFERENCES symbols(id),
    caller_file TEXT NOT NULL,
    caller_line INTEGER NOT NULL,
    call_kind   TEXT NOT NULL CHECK (call_kind IN ('static', 'interface', 'funcval', 'defer', 'go', 'unknown')),
    count       INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (caller_id, callee_id, caller_file, caller_line)
);

CREATE TABLE IF NOT EXISTS entrypoints (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    type             TEXT NOT NULL CHECK (type IN ('http', 'grpc', 'cli', 'main')),
    label            TEXT NOT NULL,
    symbol_id        INTEGER NOT NULL REFERENCES symbols(id),
    meta_json        TEXT,
    discovery_method TEXT NOT NULL DEFAULT 'router' CHECK (discovery_method IN ('router', 'signature'))
);

CREATE TABLE IF NOT EXISTS tags (
    symbol_id INTEGER NOT NULL REFERENCES symbols(id),
    tag       TEXT NOT NULL,
    reason    TEXT NOT NULL,
    PRIMARY KEY (symbol_id, tag)
);

CREATE TABLE IF NOT EXISTS metadata (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_symbols_pkg_path ON symbols(pkg_path);
CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols(name);
CREATE INDEX IF NOT EXISTS idx_call_edges_caller ON call_edges(caller_id);
CREATE INDEX IF NOT EXISTS idx_call_edges_callee ON call_edges(callee_id);
CREATE INDEX IF NOT EXISTS idx_entrypoints_type ON entrypoints(type);
CREATE INDEX IF NOT EXISTS idx_tags_tag ON tags(tag);
";

/// Tables truncated by `Store::clear`, children before parents so the
/// foreign keys stay satisfied mid-delete.
pub const CLEAR_ORDER: &[&str] = &["tags", "entrypoints", "call_edges", "symbols", "packages", "metadata"];
