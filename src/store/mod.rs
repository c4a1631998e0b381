//! Embedded relational store for the index
//!
//! SQLite database at `<project>/.flowlens/index.db`, WAL journal, foreign
//! keys enforced. Indexing stages write through [`BatchTx`]; detectors use
//! the single-row upserts; the query engine reads back. Readers never
//! observe partial indexing: `clear` plus the full pipeline runs before any
//! reader is started.

pub mod batch;
pub mod schema;
pub mod summary;
pub mod types;

pub use batch::BatchTx;
pub use summary::IndexSummary;
pub use types::*;

use crate::core::config::Config;
use crate::core::error::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Handle on the index database. Cheap to clone; all clones share one
/// serialized connection.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (creating if needed) the store for a project directory.
    pub fn open(project_dir: &Path) -> Result<Self> {
        let dir = Config::flowlens_dir(project_dir);
        std::fs::create_dir_all(&dir)?;
        let conn = Connection::open(Config::db_path(project_dir))?;
        Self::init(conn)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(schema::SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Close the store. Remaining clones keep the connection alive; the
    /// database closes when the last one drops.
    pub fn close(self) {
        drop(self);
    }

    /// Truncate every table, children before parents.
    pub fn clear(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("BEGIN IMMEDIATE")?;
        for table in schema::CLEAR_ORDER {
            if let Err(e) = conn.execute(&format!("DELETE FROM {}", table), []) {
                let _ = conn.execute_batch("ROLLBACK");
                return Err(e.into());
            }
        }
        conn.execute_batch("COMMIT")?;
        Ok(())
    }

    /// Begin a batched write transaction.
    pub fn batch(&self) -> Result<BatchTx<'_>> {
        BatchTx::begin(self.conn.lock().unwrap())
    }

    // =========================================================================
    // SINGLE-ROW WRITES
    // =========================================================================

    /// Upsert a package record.
    pub fn upsert_package(&self, pkg: &PackageRow) -> Result<()> {
        self.conn.lock().unwrap().execute(
            "INSERT INTO packages (pkg_path, module, dir, layer)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(pkg_path) DO UPDATE SET
                 module = excluded.module,
                 dir = excluded.dir,
                 layer = excluded.layer",
            params![pkg.pkg_path, pkg.module, pkg.dir, pkg.layer],
        )?;
        Ok(())
    }

    /// Upsert a symbol, returning its id (stable across re-upserts).
    pub fn upsert_symbol(&self, sym: &NewSymbol) -> Result<i64> {
        let id = self.conn.lock().unwrap().query_row(
            "INSERT INTO symbols (pkg_path, name, kind, recv_type, file, line, sig)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(pkg_path, name, recv_type) DO UPDATE SET
                 kind = excluded.kind,
                 file = excluded.file,
                 line = excluded.line,
                 sig = excluded.sig
             RETURNING id",
            params![
                sym.pkg_path,
                sym.name,
                sym.kind.as_str(),
                sym.recv_type,
                sym.file,
                sym.line,
                sym.sig
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Insert a call edge; duplicates accumulate `count`.
    pub fn insert_call_edge(&self, edge: &NewCallEdge) -> Result<()> {
        self.conn.lock().unwrap().execute(
            "INSERT INTO call_edges (caller_id, callee_id, caller_file, caller_line, call_kind, count)
             VALUES (?1, ?2, ?3, ?4, ?5, 1)
             ON CONFLICT(caller_id, callee_id, caller_file, caller_line) DO UPDATE SET
                 count = count + 1",
            params![
                edge.caller_id,
                edge.callee_id,
                edge.caller_file,
                edge.caller_line,
                edge.call_kind.as_str()
            ],
        )?;
        Ok(())
    }

    /// Insert an entry point, returning its id.
    pub fn insert_entrypoint(&self, ep: &NewEntrypoint) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO entrypoints (type, label, symbol_id, meta_json, discovery_method)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                ep.ep_type.as_str(),
                ep.label,
                ep.symbol_id,
                ep.meta_json,
                ep.discovery_method.as_str()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Upsert a tag; layer tags stay exclusive within their family.
    pub fn upsert_tag(&self, symbol_id: i64, tag: &str, reason: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        if tag.starts_with("layer:") {
            conn.execute(
                "DELETE FROM tags WHERE symbol_id = ?1 AND tag LIKE 'layer:%' AND tag != ?2",
                params![symbol_id, tag],
            )?;
        }
        conn.execute(
            "INSERT INTO tags (symbol_id, tag, reason)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(symbol_id, tag) DO UPDATE SET reason = excluded.reason",
            params![symbol_id, tag, reason],
        )?;
        Ok(())
    }

    /// Set a metadata key.
    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn.lock().unwrap().execute(
            "INSERT INTO metadata (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Read a metadata key.
    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .lock()
            .unwrap()
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Fetch a symbol by id.
    pub fn get_symbol_by_id(&self, id: i64) -> Result<Option<SymbolRow>> {
        let sym = self
            .conn
            .lock()
            .unwrap()
            .query_row(
                &format!("SELECT {} FROM symbols WHERE id = ?1", SYMBOL_COLS),
                params![id],
                symbol_from_row,
            )
            .optional()?;
        Ok(sym)
    }

    /// Look up a symbol id by its unique `(pkg_path, name, recv_type)` key.
    pub fn symbol_id_by_key(
        &self,
        pkg_path: &str,
        name: &str,
        recv_type: &str,
    ) -> Result<Option<i64>> {
        let id = self
            .conn
            .lock()
            .unwrap()
            .query_row(
                "SELECT id FROM symbols WHERE pkg_path = ?1 AND name = ?2 AND recv_type = ?3",
                params![pkg_path, name, recv_type],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// All tags on a symbol, alphabetically.
    pub fn get_symbol_tags(&self, symbol_id: i64) -> Result<Vec<TagRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT symbol_id, tag, reason FROM tags WHERE symbol_id = ?1 ORDER BY tag",
        )?;
        let tags = stmt
            .query_map(params![symbol_id], |row| {
                Ok(TagRow {
                    symbol_id: row.get(0)?,
                    tag: row.get(1)?,
                    reason: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }

    /// List entry points with optional type and label/symbol-name filters.
    pub fn get_entrypoints(&self, filter: &EntrypointFilter) -> Result<Vec<EntrypointWithSymbol>> {
        let conn = self.conn.lock().unwrap();
        let type_str = filter.ep_type.map(|t| t.as_str().to_string());
        let query_like = filter.query.as_ref().map(|q| format!("%{}%", q));
        let limit = filter.limit.unwrap_or(500) as i64;

        let mut stmt = conn.prepare(&format!(
            "SELECT e.id, e.type, e.label, e.symbol_id, e.meta_json, e.discovery_method, {}
             FROM entrypoints e
             JOIN symbols s ON s.id = e.symbol_id
             WHERE (?1 IS NULL OR e.type = ?1)
               AND (?2 IS NULL OR e.label LIKE ?2 OR s.name LIKE ?2)
             ORDER BY e.type, e.label, e.id
             LIMIT ?3",
            prefixed_symbol_cols("s")
        ))?;
        let rows = stmt
            .query_map(params![type_str, query_like, limit], |row| {
                Ok(EntrypointWithSymbol {
                    entrypoint: entrypoint_from_row(row)?,
                    symbol: symbol_from_row_at(row, 6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// One entry point by id, joined with its handler symbol.
    pub fn get_entrypoint_by_id(&self, id: i64) -> Result<Option<EntrypointWithSymbol>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                &format!(
                    "SELECT e.id, e.type, e.label, e.symbol_id, e.meta_json, e.discovery_method, {}
                     FROM entrypoints e
                     JOIN symbols s ON s.id = e.symbol_id
                     WHERE e.id = ?1",
                    prefixed_symbol_cols("s")
                ),
                params![id],
                |row| {
                    Ok(EntrypointWithSymbol {
                        entrypoint: entrypoint_from_row(row)?,
                        symbol: symbol_from_row_at(row, 6)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// True when the symbol already has an entry point of the given type.
    pub fn entrypoint_exists_for_symbol(
        &self,
        symbol_id: i64,
        ep_type: EntrypointType,
    ) -> Result<bool> {
        let count: i64 = self.conn.lock().unwrap().query_row(
            "SELECT COUNT(*) FROM entrypoints WHERE symbol_id = ?1 AND type = ?2",
            params![symbol_id, ep_type.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Substring search over symbol names and package paths. Exact name
    /// matches order first, then name-prefix matches, then alphabetical.
    pub fn search_symbols(&self, query: &str, limit: usize) -> Result<Vec<SymbolRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM symbols
             WHERE name LIKE '%' || ?1 || '%' OR pkg_path LIKE '%' || ?1 || '%'
             ORDER BY (name = ?1) DESC, (name LIKE ?1 || '%') DESC, name ASC, pkg_path ASC
             LIMIT ?2",
            SYMBOL_COLS
        ))?;
        let rows = stmt
            .query_map(params![query, limit as i64], symbol_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Direct callees of a symbol, with edge data, ordered by callee id.
    pub fn get_callees(&self, caller_id: i64) -> Result<Vec<CalleeEdge>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT e.caller_id, e.callee_id, e.caller_file, e.caller_line, e.call_kind, e.count, {}
             FROM call_edges e
             JOIN symbols s ON s.id = e.callee_id
             WHERE e.caller_id = ?1
             ORDER BY e.callee_id, e.caller_file, e.caller_line",
            prefixed_symbol_cols("s")
        ))?;
        let rows = stmt
            .query_map(params![caller_id], |row| {
                Ok(CalleeEdge {
                    edge: edge_from_row(row)?,
                    callee: symbol_from_row_at(row, 6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Direct callers of a symbol, with edge data, ordered by caller id.
    pub fn get_callers(&self, callee_id: i64) -> Result<Vec<CallerEdge>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT e.caller_id, e.callee_id, e.caller_file, e.caller_line, e.call_kind, e.count, {}
             FROM call_edges e
             JOIN symbols s ON s.id = e.caller_id
             WHERE e.callee_id = ?1
             ORDER BY e.caller_id, e.caller_file, e.caller_line",
            prefixed_symbol_cols("s")
        ))?;
        let rows = stmt
            .query_map(params![callee_id], |row| {
                Ok(CallerEdge {
                    edge: edge_from_row(row)?,
                    caller: symbol_from_row_at(row, 6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Fetch a package by path.
    pub fn get_package_by_path(&self, pkg_path: &str) -> Result<Option<PackageRow>> {
        let row = self
            .conn
            .lock()
            .unwrap()
            .query_row(
                "SELECT pkg_path, module, dir, layer FROM packages WHERE pkg_path = ?1",
                params![pkg_path],
                |row| {
                    Ok(PackageRow {
                        pkg_path: row.get(0)?,
                        module: row.get(1)?,
                        dir: row.get(2)?,
                        layer: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// All loaded package paths, sorted.
    pub fn package_paths(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT pkg_path FROM packages ORDER BY pkg_path")?;
        let paths = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(paths)
    }

    /// Every function and method symbol, for the tagger.
    pub fn get_all_symbols_for_tagging(&self) -> Result<Vec<SymbolRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM symbols WHERE kind IN ('func', 'method') ORDER BY id",
            SYMBOL_COLS
        ))?;
        let rows = stmt
            .query_map([], symbol_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Distinct caller-package -> callee-package pairs from the edge graph.
    pub fn get_package_imports(&self) -> Result<Vec<(String, String)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT cs.pkg_path, ts.pkg_path
             FROM call_edges e
             JOIN symbols cs ON cs.id = e.caller_id
             JOIN symbols ts ON ts.id = e.callee_id
             WHERE cs.pkg_path != ts.pkg_path
             ORDER BY cs.pkg_path, ts.pkg_path",
        )?;
        let pairs = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(pairs)
    }

    /// Every caller -> callee pair joined with the callee's tags (one row
    /// per tag, `None` when the callee is untagged). Input to purity
    /// tagging.
    pub fn get_symbol_callees_with_tags(&self) -> Result<Vec<CalleeTagRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT e.caller_id, e.callee_id, t.tag
             FROM call_edges e
             LEFT JOIN tags t ON t.symbol_id = e.callee_id
             ORDER BY e.caller_id, e.callee_id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(CalleeTagRow {
                    caller_id: row.get(0)?,
                    callee_id: row.get(1)?,
                    callee_tag: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// All method symbols with the given name, ordered by id. Used by
    /// interface-call resolution.
    pub fn get_methods_by_name(&self, name: &str) -> Result<Vec<SymbolRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM symbols WHERE name = ?1 AND kind = 'method' ORDER BY id",
            SYMBOL_COLS
        ))?;
        let rows = stmt
            .query_map(params![name], symbol_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Index-wide counts.
    pub fn get_stats(&self) -> Result<Stats> {
        let conn = self.conn.lock().unwrap();
        let count = |sql: &str| -> rusqlite::Result<i64> { conn.query_row(sql, [], |r| r.get(0)) };
        Ok(Stats {
            package_count: count("SELECT COUNT(*) FROM packages")? as usize,
            symbol_count: count("SELECT COUNT(*) FROM symbols")? as usize,
            edge_count: count("SELECT COUNT(*) FROM call_edges")? as usize,
            entrypoint_count: count("SELECT COUNT(*) FROM entrypoints")? as usize,
            tag_count: count("SELECT COUNT(*) FROM tags")? as usize,
        })
    }
}

// =============================================================================
// ROW MAPPERS
// =============================================================================

const SYMBOL_COLS: &str = "id, pkg_path, name, kind, recv_type, file, line, sig";

fn prefixed_symbol_cols(prefix: &str) -> String {
    SYMBOL_COLS
        .split(", ")
        .map(|c| format!("{}.{}", prefix, c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn symbol_from_row(row: &Row<'_>) -> rusqlite::Result<SymbolRow> {
    symbol_from_row_at(row, 0)
}

fn symbol_from_row_at(row: &Row<'_>, base: usize) -> rusqlite::Result<SymbolRow> {
    let kind: String = row.get(base + 3)?;
    Ok(SymbolRow {
        id: row.get(base)?,
        pkg_path: row.get(base + 1)?,
        name: row.get(base + 2)?,
        kind: SymbolKind::from_str(&kind),
        recv_type: row.get(base + 4)?,
        file: row.get(base + 5)?,
        line: row.get::<_, i64>(base + 6)? as u32,
        sig: row.get(base + 7)?,
    })
}

fn entrypoint_from_row(row: &Row<'_>) -> rusqlite::Result<EntrypointRow> {
    let ep_type: String = row.get(1)?;
    let discovery: String = row.get(5)?;
    Ok(EntrypointRow {
        id: row.get(0)?,
        ep_type: EntrypointType::from_str(&ep_type).unwrap_or(EntrypointType::Main),
        label: row.get(2)?,
        symbol_id: row.get(3)?,
        meta_json: row.get(4)?,
        discovery_method: DiscoveryMethod::from_str(&discovery),
    })
}

fn edge_from_row(row: &Row<'_>) -> rusqlite::Result<CallEdgeRow> {
    let kind: String = row.get(4)?;
    Ok(CallEdgeRow {
        caller_id: row.get(0)?,
        callee_id: row.get(1)?,
        caller_file: row.get(2)?,
        caller_line: row.get::<_, i64>(3)? as u32,
        call_kind: CallKind::from_str(&kind),
        count: row.get::<_, i64>(5)? as u32,
    })
}

// =============================================================================
// TESTS
// =============================================================================
