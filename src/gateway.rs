use std::path::Path;

use rusqlite::types::ToSqlOutput;
use rusqlite::{Connection, OpenFlags, ToSql};
use serde::Serialize;

use crate::error::Result;
use crate::output::Reporter;

/// Statement parameter that can be recorded for dry-run reporting and bound
/// to a prepared statement.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SqlParam {
    Null,
    Int(i64),
    Text(String),
}

impl ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Self::Null => Ok(ToSqlOutput::from(rusqlite::types::Null)),
            Self::Int(v) => Ok(ToSqlOutput::from(*v)),
            Self::Text(s) => Ok(ToSqlOutput::from(s.as_str())),
        }
    }
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Option<String>> for SqlParam {
    fn from(v: Option<String>) -> Self {
        v.map(Self::Text).unwrap_or(Self::Null)
    }
}

/// Outcome of a mutating statement. In a dry run this is synthesized as a
/// no-op: zero rows affected, no generated id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: usize,
    pub last_insert_id: Option<i64>,
}

impl ExecResult {
    pub const NOOP: ExecResult = ExecResult {
        rows_affected: 0,
        last_insert_id: None,
    };
}

/// A mutating statement recorded instead of executed during a dry run.
#[derive(Debug, Clone, Serialize)]
pub struct ActionRecord {
    pub description: String,
    pub sql: String,
    pub params: Vec<SqlParam>,
}

/// The sole path through which data-mutating statements reach the database.
///
/// Live runs execute and return the real result; dry runs record the
/// statement and return [`ExecResult::NOOP`] so downstream logic keeps the
/// same shape without touching the database. Reads always pass through.
/// Database errors abort the run; this is a one-shot administrative tool
/// with no retry policy.
pub struct Gateway {
    conn: Connection,
    dry_run: bool,
    reporter: Reporter,
    recorded: Vec<ActionRecord>,
    executed: usize,
}

impl Gateway {
    pub fn open(path: &Path, dry_run: bool, reporter: Reporter) -> Result<Self> {
        // Dry runs open read-only: no file creation on a mistyped path, no
        // persistent journal-mode change on the real database.
        let conn = if dry_run {
            Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX
                    | OpenFlags::SQLITE_OPEN_URI,
            )?
        } else {
            let conn = Connection::open(path)?;
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;\
                 PRAGMA foreign_keys=ON;\
                 PRAGMA busy_timeout=5000;",
            )?;
            conn
        };
        Ok(Self::new(conn, dry_run, reporter))
    }

    /// In-memory database (for tests).
    pub fn open_memory(dry_run: bool, reporter: Reporter) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self::new(conn, dry_run, reporter))
    }

    pub fn new(conn: Connection, dry_run: bool, reporter: Reporter) -> Self {
        Self {
            conn,
            dry_run,
            reporter,
            recorded: Vec::new(),
            executed: 0,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Read-only access to the shared connection. All mutation must go
    /// through [`Gateway::execute`] / [`Gateway::insert`] / [`Gateway::ddl`].
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute (or record) one mutating statement.
    pub fn execute(&mut self, description: &str, sql: &str, params: &[SqlParam]) -> Result<ExecResult> {
        if self.dry_run {
            self.record(description, sql, params);
            return Ok(ExecResult::NOOP);
        }
        let rows_affected = self
            .conn
            .execute(sql, rusqlite::params_from_iter(params.iter()))?;
        self.executed += 1;
        self.reporter.action(false, description, rows_affected);
        Ok(ExecResult {
            rows_affected,
            last_insert_id: None,
        })
    }

    /// Execute (or record) an INSERT and return the generated rowid.
    /// Dry runs return `None`; callers allocate placeholder ids when they
    /// need to thread the id through later statements.
    pub fn insert(&mut self, description: &str, sql: &str, params: &[SqlParam]) -> Result<Option<i64>> {
        if self.dry_run {
            self.record(description, sql, params);
            return Ok(None);
        }
        let rows_affected = self
            .conn
            .execute(sql, rusqlite::params_from_iter(params.iter()))?;
        self.executed += 1;
        self.reporter.action(false, description, rows_affected);
        if rows_affected == 0 {
            // INSERT OR IGNORE that hit an existing row.
            return Ok(None);
        }
        Ok(Some(self.conn.last_insert_rowid()))
    }

    /// Execute (or record) a DDL batch with no parameters.
    pub fn ddl(&mut self, description: &str, sql: &str) -> Result<()> {
        if self.dry_run {
            self.record(description, sql, &[]);
            return Ok(());
        }
        self.conn.execute_batch(sql)?;
        self.executed += 1;
        self.reporter.action(false, description, 0);
        Ok(())
    }

    fn record(&mut self, description: &str, sql: &str, params: &[SqlParam]) {
        self.reporter.action(true, description, 0);
        self.recorded.push(ActionRecord {
            description: description.to_string(),
            sql: sql.to_string(),
            params: params.to_vec(),
        });
    }

    /// Statements recorded during a dry run.
    pub fn recorded(&self) -> &[ActionRecord] {
        &self.recorded
    }

    pub fn recorded_count(&self) -> usize {
        self.recorded.len()
    }

    pub fn executed_count(&self) -> usize {
        self.executed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Format;

    fn live() -> Gateway {
        Gateway::open_memory(false, Reporter::new(Format::Json)).unwrap()
    }

    fn dry() -> Gateway {
        Gateway::open_memory(true, Reporter::new(Format::Json)).unwrap()
    }

    #[test]
    fn live_execute_affects_rows_and_counts() {
        let mut gw = live();
        gw.ddl("create t", "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        let result = gw
            .execute(
                "insert row",
                "INSERT INTO t (name) VALUES (?1)",
                &["hello".into()],
            )
            .unwrap();
        assert_eq!(result.rows_affected, 1);
        assert_eq!(gw.executed_count(), 2);
        assert_eq!(gw.recorded_count(), 0);
    }

    #[test]
    fn live_insert_returns_rowid() {
        let mut gw = live();
        gw.ddl("create t", "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        let id = gw
            .insert("insert row", "INSERT INTO t (name) VALUES (?1)", &["a".into()])
            .unwrap();
        assert_eq!(id, Some(1));
    }

    #[test]
    fn live_insert_or_ignore_conflict_returns_none() {
        let mut gw = live();
        gw.ddl("create t", "CREATE TABLE t (id INTEGER PRIMARY KEY, slug TEXT UNIQUE)")
            .unwrap();
        gw.insert("first", "INSERT INTO t (slug) VALUES (?1)", &["x".into()])
            .unwrap();
        let second = gw
            .insert(
                "second",
                "INSERT OR IGNORE INTO t (slug) VALUES (?1)",
                &["x".into()],
            )
            .unwrap();
        assert_eq!(second, None);
    }

    #[test]
    fn dry_run_touches_nothing_and_records_everything() {
        let mut gw = dry();
        // Table created out-of-band so the observable state can be checked.
        gw.conn()
            .execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();

        let result = gw
            .execute(
                "insert row",
                "INSERT INTO t (name) VALUES (?1)",
                &["hello".into()],
            )
            .unwrap();
        assert_eq!(result, ExecResult::NOOP);

        let id = gw
            .insert("insert row", "INSERT INTO t (name) VALUES (?1)", &["x".into()])
            .unwrap();
        assert_eq!(id, None);

        let count: i64 = gw
            .conn()
            .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
        assert_eq!(gw.recorded_count(), 2);
        assert_eq!(gw.executed_count(), 0);
        assert_eq!(gw.recorded()[0].sql, "INSERT INTO t (name) VALUES (?1)");
    }

    #[test]
    fn dry_open_does_not_create_a_missing_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such.db");
        let result = Gateway::open(&path, true, Reporter::new(Format::Json));
        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn dry_open_leaves_the_journal_mode_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY)")
            .unwrap();

        let gw = Gateway::open(&path, true, Reporter::new(Format::Json)).unwrap();
        let mode: String = gw
            .conn()
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_ascii_lowercase(), "delete");
    }

    #[test]
    fn live_open_switches_to_wal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.db");
        let gw = Gateway::open(&path, false, Reporter::new(Format::Json)).unwrap();
        let mode: String = gw
            .conn()
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_ascii_lowercase(), "wal");
    }

    #[test]
    fn db_error_surfaces_without_retry() {
        let mut gw = live();
        let err = gw
            .execute("broken", "INSERT INTO missing_table VALUES (1)", &[])
            .unwrap_err();
        assert_eq!(err.code(), "db_error");
    }
}
