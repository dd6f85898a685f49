//! Persistent symbol store backed by a single embedded SQLite database
//! per project.
//!
//! - `journal_mode = WAL` for concurrent readers and a single writer.
//! - `synchronous = NORMAL` as a balance between safety and speed.
//! - `busy_timeout` (>= 10s) to tolerate brief lock contention rather
//!   than failing immediately.
//!
//! Schema and migrations follow an additive "add column if missing,
//! swallow duplicate-column errors" idiom for `base_classes`/`calls_super`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use sha2::{Digest, Sha256};

use crate::models::{FileCacheRow, ParsedSymbol, Span, SymbolKind};

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Error message prefix the HTTP layer matches to map a store-busy
/// condition to `503 Service Unavailable` (see `crate::server`).
pub const STORE_BUSY_PREFIX: &str = "store busy: ";

/// Tags genuine lock contention (`SQLITE_BUSY`, surfaced once
/// `busy_timeout` has already been exhausted) with `STORE_BUSY_PREFIX`;
/// every other rusqlite error passes through unchanged.
fn map_busy(err: rusqlite::Error) -> anyhow::Error {
    let busy = matches!(
        &err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::DatabaseBusy
    );
    if busy {
        anyhow::anyhow!("{STORE_BUSY_PREFIX}{err}")
    } else {
        anyhow::Error::new(err)
    }
}

pub struct SymbolStore {
    conn: Connection,
    path: PathBuf,
}

impl SymbolStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
        let conn = Connection::open_with_flags(path, flags)
            .with_context(|| format!("failed to open symbol store at {}", path.display()))?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        Self::initialize_schema(&conn)?;
        Self::run_migrations(&conn)?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS file_cache (
                file_path    TEXT PRIMARY KEY,
                mtime        REAL NOT NULL,
                content_hash TEXT NOT NULL,
                source       TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS symbol_index (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL,
                node_type   TEXT NOT NULL,
                start_line  INTEGER NOT NULL,
                end_line    INTEGER NOT NULL,
                start_col   INTEGER NOT NULL,
                end_col     INTEGER NOT NULL,
                content     TEXT NOT NULL,
                file_path   TEXT NOT NULL,
                host_class  TEXT,
                callees     TEXT NOT NULL,
                imports     TEXT NOT NULL,
                UNIQUE(name, file_path, start_line, node_type)
            );

            CREATE TABLE IF NOT EXISTS metadata (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_symbol_name ON symbol_index(name);
            CREATE INDEX IF NOT EXISTS idx_symbol_file ON symbol_index(file_path);
            CREATE INDEX IF NOT EXISTS idx_symbol_type ON symbol_index(node_type);
        "#,
        )?;
        Ok(())
    }

    /// Additive migrations for stores created before `base_classes`/
    /// `calls_super` existed. A duplicate-column failure means the
    /// migration already ran; any other failure is real and is
    /// surfaced.
    fn run_migrations(conn: &Connection) -> Result<()> {
        add_column_if_missing(conn, "symbol_index", "base_classes", "TEXT")?;
        add_column_if_missing(conn, "symbol_index", "calls_super", "INTEGER DEFAULT 0")?;
        Ok(())
    }

    /// Idempotent upsert of a file-cache row.
    pub fn put_file(&self, file_path: &Path, mtime: f64, source: &str) -> Result<()> {
        let content_hash = content_hash(source);
        self.conn
            .execute(
                "INSERT OR REPLACE INTO file_cache (file_path, mtime, content_hash, source) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![path_key(file_path), mtime, content_hash, source],
            )
            .map_err(map_busy)?;
        Ok(())
    }

    pub fn get_file_cache(&self, file_path: &Path) -> Result<Option<FileCacheRow>> {
        self.conn
            .query_row(
                "SELECT file_path, mtime, content_hash, source FROM file_cache WHERE file_path = ?1",
                params![path_key(file_path)],
                |row| {
                    Ok(FileCacheRow {
                        file_path: PathBuf::from(row.get::<_, String>(0)?),
                        mtime: row.get(1)?,
                        content_hash: row.get(2)?,
                        source: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(map_busy)
    }

    pub fn is_file_fresh(&self, file_path: &Path, mtime: f64) -> Result<bool> {
        let stored: Option<f64> = self
            .conn
            .query_row(
                "SELECT mtime FROM file_cache WHERE file_path = ?1",
                params![path_key(file_path)],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_busy)?;
        Ok(stored == Some(mtime))
    }

    /// Deletes the file-cache row and every symbol row for `file_path`
    /// in one transaction.
    pub fn drop_file(&mut self, file_path: &Path) -> Result<()> {
        let tx = self.conn.transaction().map_err(map_busy)?;
        tx.execute(
            "DELETE FROM file_cache WHERE file_path = ?1",
            params![path_key(file_path)],
        )
        .map_err(map_busy)?;
        tx.execute(
            "DELETE FROM symbol_index WHERE file_path = ?1",
            params![path_key(file_path)],
        )
        .map_err(map_busy)?;
        tx.commit().map_err(map_busy)?;
        Ok(())
    }

    /// Inserts a batch of symbols in a single transaction.
    pub fn put_symbols(&mut self, symbols: &[ParsedSymbol]) -> Result<()> {
        if symbols.is_empty() {
            return Ok(());
        }
        let tx = self.conn.transaction().map_err(map_busy)?;
        for symbol in symbols {
            let callees = serde_json::to_string(&symbol.callees)?;
            let imports = serde_json::to_string(&symbol.imports)?;
            let base_classes = serde_json::to_string(&symbol.base_classes)?;
            tx.execute(
                "INSERT OR REPLACE INTO symbol_index \
                 (name, node_type, start_line, end_line, start_col, end_col, \
                  content, file_path, host_class, callees, imports, base_classes, calls_super) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    symbol.name,
                    symbol.kind.as_str(),
                    symbol.span.start_line as i64,
                    symbol.span.end_line as i64,
                    symbol.span.start_col as i64,
                    symbol.span.end_col as i64,
                    symbol.content,
                    path_key(&symbol.file_path),
                    symbol.host_class,
                    callees,
                    imports,
                    base_classes,
                    symbol.calls_super as i64,
                ],
            )
            .map_err(map_busy)?;
        }
        tx.commit().map_err(map_busy)?;
        Ok(())
    }

    pub fn find_by_name(
        &self,
        name: &str,
        kind: Option<SymbolKind>,
        file_hint: Option<&str>,
    ) -> Result<Vec<ParsedSymbol>> {
        let (clause, kind_str) = kind_filter_clause(kind);
        let sql = format!("SELECT * FROM symbol_index WHERE name = ?{clause}");
        let mut rows = self.query_symbols(&sql, name, kind_str.as_deref())?;
        if let Some(hint) = file_hint {
            rows.sort_by_key(|s| {
                if s.file_path.to_string_lossy().contains(hint) {
                    0
                } else {
                    1
                }
            });
        }
        Ok(rows)
    }

    pub fn find_by_file(&self, file_path: &Path) -> Result<Vec<ParsedSymbol>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM symbol_index WHERE file_path = ?1")
            .map_err(map_busy)?;
        let rows = stmt
            .query_map(params![path_key(file_path)], row_to_symbol)
            .map_err(map_busy)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row??);
        }
        Ok(out)
    }

    pub fn all(&self, kind: Option<SymbolKind>) -> Result<Vec<ParsedSymbol>> {
        let (clause, kind_str) = kind_filter_clause(kind);
        let sql = if clause.is_empty() {
            "SELECT * FROM symbol_index".to_string()
        } else {
            format!("SELECT * FROM symbol_index WHERE 1=1{clause}")
        };
        let mut stmt = self.conn.prepare(&sql).map_err(map_busy)?;
        let rows = if let Some(k) = kind_str {
            stmt.query_map(params![k], row_to_symbol)
                .map_err(map_busy)?
                .collect::<Vec<_>>()
        } else {
            stmt.query_map([], row_to_symbol)
                .map_err(map_busy)?
                .collect::<Vec<_>>()
        };
        let mut out = Vec::new();
        for row in rows {
            out.push(row??);
        }
        Ok(out)
    }

    fn query_symbols(
        &self,
        sql: &str,
        name: &str,
        kind: Option<&str>,
    ) -> Result<Vec<ParsedSymbol>> {
        let mut stmt = self.conn.prepare(sql).map_err(map_busy)?;
        let rows = if let Some(k) = kind {
            stmt.query_map(params![name, k], row_to_symbol)
                .map_err(map_busy)?
                .collect::<Vec<_>>()
        } else {
            stmt.query_map(params![name], row_to_symbol)
                .map_err(map_busy)?
                .collect::<Vec<_>>()
        };
        let mut out = Vec::new();
        for row in rows {
            out.push(row??);
        }
        Ok(out)
    }

    pub fn set_indexed(&self, indexed: bool) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO metadata (key, value) VALUES ('indexed', ?1)",
                params![if indexed { "true" } else { "false" }],
            )
            .map_err(map_busy)?;
        Ok(())
    }

    pub fn is_indexed(&self) -> Result<bool> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM metadata WHERE key = 'indexed'",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_busy)?;
        Ok(value.as_deref() == Some("true"))
    }

    pub fn clear_all(&mut self) -> Result<()> {
        let tx = self.conn.transaction().map_err(map_busy)?;
        tx.execute("DELETE FROM file_cache", []).map_err(map_busy)?;
        tx.execute("DELETE FROM symbol_index", []).map_err(map_busy)?;
        tx.execute("DELETE FROM metadata", []).map_err(map_busy)?;
        tx.commit().map_err(map_busy)?;
        Ok(())
    }

    pub fn clear_symbols(&mut self) -> Result<()> {
        let tx = self.conn.transaction().map_err(map_busy)?;
        tx.execute("DELETE FROM symbol_index", []).map_err(map_busy)?;
        tx.execute("DELETE FROM metadata WHERE key = 'indexed'", [])
            .map_err(map_busy)?;
        tx.commit().map_err(map_busy)?;
        Ok(())
    }

    pub fn compact(&self) -> Result<()> {
        self.conn.execute_batch("VACUUM").map_err(map_busy)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn kind_filter_clause(kind: Option<SymbolKind>) -> (String, Option<String>) {
    match kind {
        None => (String::new(), None),
        Some(SymbolKind::Function) => (
            " AND node_type IN ('function', 'method')".to_string(),
            None,
        ),
        Some(other) => (" AND node_type = ?".to_string(), Some(other.as_str().to_string())),
    }
}

fn add_column_if_missing(conn: &Connection, table: &str, column: &str, decl: &str) -> Result<()> {
    match conn.execute(
        &format!("ALTER TABLE {table} ADD COLUMN {column} {decl}"),
        [],
    ) {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(_, Some(msg))) if msg.contains("duplicate column") => {
            tracing::debug!(table, column, "migration column already present");
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("failed to add column {column} to {table}")),
    }
}

fn row_to_symbol(row: &rusqlite::Row) -> rusqlite::Result<Result<ParsedSymbol>> {
    let name: String = row.get("name")?;
    let node_type: String = row.get("node_type")?;
    let start_line: i64 = row.get("start_line")?;
    let end_line: i64 = row.get("end_line")?;
    let start_col: i64 = row.get("start_col")?;
    let end_col: i64 = row.get("end_col")?;
    let content: String = row.get("content")?;
    let file_path: String = row.get("file_path")?;
    let host_class: Option<String> = row.get("host_class")?;
    let callees_raw: String = row.get("callees")?;
    let imports_raw: String = row.get("imports")?;
    let base_classes_raw: Option<String> = row.get("base_classes")?;
    let calls_super_raw: Option<i64> = row.get("calls_super")?;

    let parsed = (|| -> Result<ParsedSymbol> {
        let kind = SymbolKind::from_str(&node_type)
            .with_context(|| format!("unknown symbol kind in store: {node_type}"))?;
        let callees: Vec<String> = serde_json::from_str(&callees_raw).unwrap_or_default();
        let imports: HashMap<String, String> =
            serde_json::from_str(&imports_raw).unwrap_or_default();
        let base_classes: Vec<String> = base_classes_raw
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default();
        let calls_super = calls_super_raw.unwrap_or(0) != 0;

        Ok(ParsedSymbol {
            name,
            kind,
            span: Span {
                start_line: start_line as usize,
                end_line: end_line as usize,
                start_col: start_col as usize,
                end_col: end_col as usize,
            },
            content,
            file_path: PathBuf::from(file_path),
            host_class,
            callees,
            imports,
            base_classes,
            calls_super,
        })
    })();

    Ok(parsed)
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

pub fn content_hash(source: &str) -> String {
    let digest = Sha256::digest(source.as_bytes());
    hex_prefix(&digest, 16)
}

/// Digest used to derive the per-project cache filename
/// (`<basename>_<hash12>.db`).
pub fn project_digest_hex12(absolute_project_path: &Path) -> String {
    let digest = Sha256::digest(path_key(absolute_project_path).as_bytes());
    hex_prefix(&digest, 6)
}

fn hex_prefix(bytes: &[u8], n: usize) -> String {
    bytes
        .iter()
        .take(n)
        .map(|b| format!("{b:02x}"))
        .collect::<String>()
}
