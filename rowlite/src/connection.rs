//! Safe wrapper around a `SQLite` database connection.
//!
//! This file contains **no `unsafe` code**. All FFI interaction is delegated
//! to [`ffi::RawDb`] which encapsulates the raw pointers and C type
//! conversions.

use tracing::debug;

use super::backup::{self, Direction};
use super::error::DbResult;
use super::ffi::RawDb;
use super::statement::Statement;

/// A `SQLite` database connection.
///
/// Opened by URI, closed exactly once when dropped. Not `Send` or `Sync`;
/// all access must happen from one logical owner at a time -- the driver
/// provides no internal locking.
pub struct Connection {
    db: RawDb,
}

impl Connection {
    /// Opens (or creates) a database at `uri`.
    ///
    /// Accepts anything the engine's file/URI syntax accepts, including the
    /// `:memory:` marker, bounded by [`URI_MAX_SIZE`](crate::URI_MAX_SIZE) bytes.
    /// An over-long URI (or one with an interior NUL) fails with an
    /// invalid-argument error before the engine is invoked; an engine-level
    /// failure closes the partially-opened handle before returning.
    ///
    /// # Errors
    ///
    /// [`DbError::InvalidUri`](super::DbError::InvalidUri) or
    /// [`DbError::Open`](super::DbError::Open).
    pub fn open(uri: &str) -> DbResult<Self> {
        let db = RawDb::open(uri)?;
        debug!(uri, "opened database");
        Ok(Self { db })
    }

    /// Prepares a single SQL statement.
    ///
    /// The SQL crosses the FFI boundary by reference and length; no copy is
    /// made.
    ///
    /// # Errors
    ///
    /// [`DbError::Prepare`](super::DbError::Prepare) on syntax or schema
    /// errors reported by the engine. The connection remains usable.
    pub fn prepare(&self, sql: &str) -> DbResult<Statement<'_>> {
        let raw = self.db.prepare(sql)?;
        Ok(Statement::new(raw))
    }

    /// Executes one or more SQL statements separated by semicolons,
    /// discarding any result rows. Suitable for DDL, PRAGMAs, and
    /// multi-statement scripts.
    ///
    /// # Errors
    ///
    /// Returns the engine's error for the first failing statement.
    pub fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.db.exec(sql)
    }

    /// Copies every page of this database into the database at `uri`,
    /// creating or overwriting it.
    ///
    /// One synchronous full transfer: blocks until complete and cannot be
    /// cancelled. Backing up to this connection's own URI, or onto a file
    /// another process has open, is unspecified and a caller
    /// responsibility to avoid.
    ///
    /// # Errors
    ///
    /// [`DbError::Backup`](super::DbError::Backup) when the target cannot
    /// be opened or the destination reports a failure after the copy. The
    /// secondary connection is closed regardless of outcome.
    pub fn backup(&self, uri: &str) -> DbResult<()> {
        backup::run(&self.db, uri, Direction::Save)
    }

    /// Replaces this database's contents with every page of the database at
    /// `uri`.
    ///
    /// Same transfer semantics and caveats as [`backup`](Self::backup).
    ///
    /// # Errors
    ///
    /// [`DbError::Restore`](super::DbError::Restore).
    pub fn restore(&self, uri: &str) -> DbResult<()> {
        backup::run(&self.db, uri, Direction::Restore)
    }

    /// Returns the number of rows changed by the most recent statement.
    #[must_use]
    pub fn changes(&self) -> i64 {
        self.db.changes()
    }

    /// Returns the rowid of the most recent successful INSERT.
    #[must_use]
    pub fn last_insert_rowid(&self) -> i64 {
        self.db.last_insert_rowid()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

#[cfg(test)]
impl Connection {
    /// Opens an in-memory database.
    pub fn open_in_memory() -> DbResult<Self> {
        Self::open(":memory:")
    }
}
