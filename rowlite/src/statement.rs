//! Prepared statements: reset/bind/execute and row materialization.

use super::error::{DbError, DbResult, ErrorCode};
use super::ffi::{self, RawStmt};
use super::rowbuf::{self, RowEncoder, DEFAULT_BUF_CAPACITY, POOL};
use super::value::Param;

// The tag bytes written by the encoder are the engine's fundamental type
// codes; the encode dispatch below relies on that equivalence.
const _: () = {
    assert!(ffi::TYPE_INTEGER == rowbuf::TAG_INTEGER as i32);
    assert!(ffi::TYPE_TEXT == rowbuf::TAG_TEXT as i32);
    assert!(ffi::TYPE_NULL == rowbuf::TAG_NULL as i32);
};

/// A prepared statement.
///
/// Created via [`Connection::prepare`](super::Connection::prepare) and tied
/// to the lifetime of the connection that created it. Owns at most one row
/// buffer, leased from the process-wide pool on the first fetched row and
/// returned when the statement is dropped (which also finalizes the engine
/// handle).
///
/// The execute/read cycle is:
///
/// ```no_run
/// # fn demo(conn: &rowlite::Connection) -> rowlite::DbResult<()> {
/// let mut stmt = conn.prepare("SELECT `key`, `val` FROM `keyVal`")?;
/// stmt.exec(&[])?;
/// while stmt.next()? {
///     for value in rowlite::decode_row(stmt.row_bytes()) {
///         let value = value?;
///         // ...
///     }
/// }
/// # Ok(()) }
/// ```
pub struct Statement<'conn> {
    raw: RawStmt<'conn>,
    buf: Option<Vec<u8>>,
    pending_row: bool,
}

impl<'conn> Statement<'conn> {
    pub(super) fn new(raw: RawStmt<'conn>) -> Self {
        Self {
            raw,
            buf: None,
            pending_row: false,
        }
    }

    /// Resets the statement, binds `params` positionally (parameter 1 gets
    /// `params[0]`), and steps once.
    ///
    /// The reset always runs first and clears all engine-side bind state, so
    /// a binding from a previous call is never observed by this one. For a
    /// statement that produces rows, the rows are consumed afterwards with
    /// [`next`](Self::next); for DML/DDL the single step completes the
    /// work.
    ///
    /// Any failure (reset, bind, step) aborts this call only; the statement
    /// is reusable afterwards because the next `exec` resets again.
    pub fn exec(&mut self, params: &[Param<'_>]) -> DbResult<()> {
        self.pending_row = false;
        if let Some(buf) = self.buf.as_mut() {
            buf.clear();
        }
        self.raw.reset()?;
        for (i, param) in params.iter().enumerate() {
            let index = i32::try_from(i + 1).map_err(|_| DbError::Bind {
                index: i32::MAX,
                code: ErrorCode(0),
                message: String::from("parameter index overflow"),
            })?;
            match param {
                Param::Integer(v) => self.raw.bind_i64(index, *v)?,
                Param::Text(v) => self.raw.bind_text(index, v)?,
                // Sound: 'static storage outlives every bind/reset.
                Param::StaticText(v) => unsafe { self.raw.bind_text_static(index, v)? },
            }
        }
        self.pending_row = self.step_checked()?;
        Ok(())
    }

    /// Steps once. On failure the engine's sticky error state is cleared so
    /// the next `exec`'s reset starts clean (a reset that follows a failed
    /// step would otherwise echo the old error code), and the result set is
    /// marked exhausted so a later `next` returns `Ok(false)` instead of
    /// re-reading the reset statement.
    fn step_checked(&mut self) -> DbResult<bool> {
        match self.raw.step() {
            Ok(pending) => Ok(pending),
            Err(e) => {
                self.pending_row = false;
                let _ = self.raw.reset();
                Err(e)
            }
        }
    }

    /// Materializes the next result row into the statement's buffer.
    ///
    /// Returns `true` when a row was encoded and is readable via
    /// [`row_bytes`](Self::row_bytes), `false` once the result set is
    /// exhausted.
    pub fn next(&mut self) -> DbResult<bool> {
        if !self.pending_row {
            if let Some(buf) = self.buf.as_mut() {
                buf.clear();
            }
            return Ok(false);
        }
        let buf = self.buf.get_or_insert_with(|| POOL.lease());
        encode_current_row(&self.raw, buf)?;
        self.pending_row = self.step_checked()?;
        Ok(true)
    }

    /// The tagged encoding of the most recent [`next`](Self::next) row.
    ///
    /// Empty before the first fetched row and after the result set is
    /// exhausted. The buffer is overwritten by the following `next` or
    /// `exec`, so a consumer that needs the row beyond that must copy it.
    #[must_use]
    pub fn row_bytes(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or(&[])
    }
}

/// Encodes the engine's current row into `buf`, growing it on demand.
///
/// The encoder itself never grows the buffer; when it reports a short
/// write, the capacity is doubled (starting from the pool default) and the
/// row is re-encoded from scratch. Column values are read from the engine's
/// per-column accessors, so the payload is the value actually materialized
/// for this row.
fn encode_current_row(raw: &RawStmt<'_>, buf: &mut Vec<u8>) -> DbResult<()> {
    let columns = raw.column_count();
    loop {
        if try_encode_row(raw, buf, columns)? {
            return Ok(());
        }
        let grow = buf.capacity().max(DEFAULT_BUF_CAPACITY);
        buf.reserve(grow);
    }
}

/// One bounds-checked encode pass. `Ok(false)` means the buffer was too
/// small for some value and the pass must be retried with more capacity.
fn try_encode_row(raw: &RawStmt<'_>, buf: &mut Vec<u8>, columns: i32) -> DbResult<bool> {
    let mut enc = RowEncoder::begin(buf);
    for i in 0..columns {
        let written = match raw.column_type(i) {
            ffi::TYPE_INTEGER => enc.integer(raw.column_i64(i)),
            ffi::TYPE_TEXT => enc.text(raw.column_text(i)),
            ffi::TYPE_NULL => enc.null(),
            other => return Err(DbError::UnsupportedColumnType(other)),
        };
        if written.is_err() {
            return Ok(false);
        }
    }
    Ok(true)
}

impl Drop for Statement<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            POOL.give_back(buf);
        }
        // RawStmt's drop finalizes the engine handle.
    }
}

impl std::fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("pending_row", &self.pending_row)
            .finish_non_exhaustive()
    }
}
