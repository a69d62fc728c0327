use std::path::Path;

use devicehub_common::{Error, Result};
use rusqlite::{Connection, OpenFlags, params};
use tracing::{debug, info};

use crate::migrations::Dialect;

/// An open database the migration runner can drive.
///
/// Acquiring the handle (paths, credentials, pooling) is the caller's job.
pub trait SchemaHandle {
    fn dialect(&self) -> Dialect;

    /// Execute one DDL statement. Rejections surface as [`Error::Statement`]
    /// carrying the driver's message.
    fn execute(&self, sql: &str) -> Result<()>;

    fn column_exists(&self, table: &str, column: &str) -> Result<bool>;
}

/// SQLite-backed [`SchemaHandle`].
pub struct SqliteHandle {
    conn: Connection,
}

impl SqliteHandle {
    /// Open an existing database for schema changes. A missing file is an
    /// error rather than a new empty database.
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening device database at {}", db_path.display());
        Self::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    }

    /// Open an existing database without write access.
    pub fn open_read_only(db_path: &Path) -> Result<Self> {
        debug!("opening device database read-only at {}", db_path.display());
        Self::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    }

    fn open_with_flags(db_path: &Path, flags: OpenFlags) -> Result<Self> {
        let conn = Connection::open_with_flags(db_path, flags).map_err(|e| {
            Error::Database(format!(
                "failed to open database at {}: {e}",
                db_path.display()
            ))
        })?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Column names of `table` in declaration order. Empty when the table is missing.
    pub fn columns(&self, table: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        let names = stmt
            .query_map(params![table], |row| row.get::<_, String>(0))
            .map_err(|e| Error::Database(format!("failed to read table info: {e}")))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Database(format!("failed to read table info: {e}")))?;
        Ok(names)
    }
}

impl SchemaHandle for SqliteHandle {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn execute(&self, sql: &str) -> Result<()> {
        debug!(sql, "executing statement");
        self.conn
            .execute_batch(sql)
            .map_err(|e| Error::Statement(e.to_string()))
    }

    fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare("SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2")
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;
        stmt.exists(params![table, column])
            .map_err(|e| Error::Database(format!("failed to read table info: {e}")))
    }
}
