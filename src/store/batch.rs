//! Batched write transactions
//!
//! High-throughput stages (symbol extraction, call-edge extraction) write
//! through a `BatchTx` so a whole stage commits or rolls back as one unit.
//! Single-row upserts on [`crate::store::Store`] remain for the detectors.

use crate::core::error::Result;
use crate::store::types::{NewCallEdge, NewEntrypoint, NewSymbol, PackageRow};
use rusqlite::{params, Connection};
use std::sync::MutexGuard;

/// An open write transaction over the store connection.
///
/// Created by `Store::batch`. Holds the connection lock for its lifetime;
/// dropping without `commit` rolls the transaction back.
pub struct BatchTx<'a> {
    guard: MutexGuard<'a, Connection>,
    finished: bool,
}

impl<'a> BatchTx<'a> {
    pub(crate) fn begin(guard: MutexGuard<'a, Connection>) -> Result<Self> {
        guard.execute_batch("BEGIN IMMEDIATE")?;
        Ok(Self {
            guard,
            finished: false,
        })
    }

    /// Upsert a package record.
    pub fn insert_package(&self, pkg: &PackageRow) -> Result<()> {
        self.guard.execute(
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

    /// Upsert a symbol, returning its id. A conflicting insert updates
    /// kind/file/line/sig and preserves the existing id.
    pub fn insert_symbol(&self, sym: &NewSymbol) -> Result<i64> {
        let id = self.guard.query_row(
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

    /// Insert a call edge; a duplicate `(caller, callee, file, line)` key
    /// accumulates `count`.
    pub fn insert_call_edge(&self, edge: &NewCallEdge) -> Result<()> {
        self.guard.execute(
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
        self.guard.execute(
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
        Ok(self.guard.last_insert_rowid())
    }

    /// Upsert a tag. A symbol carries at most one tag per `layer:*` family;
    /// a later layer write replaces the earlier one.
    pub fn insert_tag(&self, symbol_id: i64, tag: &str, reason: &str) -> Result<()> {
        if tag.starts_with("layer:") {
            self.guard.execute(
                "DELETE FROM tags WHERE symbol_id = ?1 AND tag LIKE 'layer:%' AND tag != ?2",
                params![symbol_id, tag],
            )?;
        }
        self.guard.execute(
            "INSERT INTO tags (symbol_id, tag, reason)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(symbol_id, tag) DO UPDATE SET reason = excluded.reason",
            params![symbol_id, tag, reason],
        )?;
        Ok(())
    }

    /// Look up a symbol id by its unique `(pkg_path, name, recv_type)` key
    /// within the open transaction.
    pub fn symbol_id_by_key(
        &self,
        pkg_path: &str,
        name: &str,
        recv_type: &str,
    ) -> Result<Option<i64>> {
        use rusqlite::OptionalExtension;
        let id = self
            .guard
            .query_row(
                "SELECT id FROM symbols WHERE pkg_path = ?1 AND name = ?2 AND recv_type = ?3",
                params![pkg_path, name, recv_type],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Commit the transaction.
    pub fn commit(mut self) -> Result<()> {
        self.guard.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }

    /// Roll the transaction back explicitly.
    pub fn rollback(mut self) -> Result<()> {
        self.guard.execute_batch("ROLLBACK")?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for BatchTx<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.guard.execute_batch("ROLLBACK");
        }
    }
}
