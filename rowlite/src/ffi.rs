//! Raw `SQLite` FFI, wrapped in owned handle types.
//!
//! This is the **only** module that contains `unsafe` code or C types. The
//! raw `sqlite3*` / `sqlite3_stmt*` pointers live inside [`RawDb`] and
//! [`RawStmt`], which own them for exactly one open/close (resp.
//! prepare/finalize) cycle. The safe modules (`connection`, `statement`,
//! `backup`) never see a pointer.
//!
//! Values cross the boundary without intermediate copies: SQL text and text
//! parameters are handed over as (pointer, length) pairs referencing the
//! caller's storage. The single fixed-size staging buffer is used only for
//! the open URI, which must be NUL-terminated for `sqlite3_open_v2`; it is
//! bounded by [`URI_MAX_SIZE`] and never used for parameters or result rows.

use std::ffi::CStr;
use std::marker::PhantomData;
use std::os::raw::{c_char, c_int};
use std::ptr;

use libsqlite3_sys as sys;

use super::error::{DbError, DbResult, ErrorCode};

/// Maximum accepted byte length of a connection URI.
///
/// URIs are staged into a fixed on-stack buffer before the open call; a
/// longer URI is rejected with [`DbError::InvalidUri`] without touching the
/// engine.
pub const URI_MAX_SIZE: usize = 512;

/// Fundamental type code for INTEGER columns (also the row-buffer tag).
pub(crate) const TYPE_INTEGER: i32 = sys::SQLITE_INTEGER;
/// Fundamental type code for TEXT columns (also the row-buffer tag).
pub(crate) const TYPE_TEXT: i32 = sys::SQLITE_TEXT;
/// Fundamental type code for NULL columns (also the row-buffer tag).
pub(crate) const TYPE_NULL: i32 = sys::SQLITE_NULL;

/// Generic engine error code, attached to failures detected before the
/// engine is ever invoked (e.g. a target URI that fails staging).
pub(crate) const CODE_ERROR: i32 = sys::SQLITE_ERROR;

/// Reads the current error message for a database handle.
unsafe fn errmsg(db: *mut sys::sqlite3) -> String {
    let msg = sys::sqlite3_errmsg(db);
    if msg.is_null() {
        return String::from("unknown error");
    }
    CStr::from_ptr(msg).to_string_lossy().into_owned()
}

/// Message text for a bare result code, used when no handle is available.
fn errstr(rc: c_int) -> String {
    let msg = unsafe { sys::sqlite3_errstr(rc) };
    if msg.is_null() {
        return String::from("unknown error");
    }
    unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned()
}

/// An owned, open `sqlite3` database handle.
///
/// Closed exactly once, on drop, via `sqlite3_close_v2` (force-close
/// semantics: statements not yet finalized defer cleanup and never block
/// the close). Contains raw pointers, so it is neither `Send` nor `Sync`;
/// concurrent use requires external synchronization.
pub(crate) struct RawDb {
    db: *mut sys::sqlite3,
}

impl RawDb {
    /// Opens (or creates) a database at `uri`.
    ///
    /// The URI is validated and staged into a bounded on-stack buffer, then
    /// passed to `sqlite3_open_v2` with read-write/create flags and URI
    /// filename interpretation enabled. On an engine-level failure the
    /// partially-opened handle is closed before the error is returned.
    pub fn open(uri: &str) -> DbResult<Self> {
        let bytes = uri.as_bytes();
        if bytes.len() > URI_MAX_SIZE {
            return Err(DbError::InvalidUri(format!(
                "uri is {} bytes, limit is {URI_MAX_SIZE}",
                bytes.len()
            )));
        }
        if bytes.contains(&0) {
            return Err(DbError::InvalidUri(String::from(
                "uri contains an interior NUL byte",
            )));
        }
        let mut staged = [0u8; URI_MAX_SIZE + 1];
        staged[..bytes.len()].copy_from_slice(bytes);

        let flags = sys::SQLITE_OPEN_READWRITE
            | sys::SQLITE_OPEN_CREATE
            | sys::SQLITE_OPEN_URI
            | sys::SQLITE_OPEN_FULLMUTEX;
        let mut db: *mut sys::sqlite3 = ptr::null_mut();
        let rc = unsafe {
            sys::sqlite3_open_v2(staged.as_ptr().cast::<c_char>(), &mut db, flags, ptr::null())
        };
        if rc != sys::SQLITE_OK {
            // Per the open contract, a handle is usually allocated even on
            // failure and must be closed by the caller.
            let message = if db.is_null() {
                errstr(rc)
            } else {
                let m = unsafe { errmsg(db) };
                unsafe {
                    sys::sqlite3_close_v2(db);
                }
                m
            };
            return Err(DbError::Open {
                code: ErrorCode(rc),
                message,
            });
        }
        Ok(Self { db })
    }

    /// Compiles one SQL statement.
    ///
    /// The SQL is passed by (pointer, length); no NUL-terminated copy is
    /// made.
    pub fn prepare(&self, sql: &str) -> DbResult<RawStmt<'_>> {
        let len = c_int::try_from(sql.len()).map_err(|_| DbError::Prepare {
            code: ErrorCode(sys::SQLITE_TOOBIG),
            message: String::from("sql text too long"),
        })?;
        let mut stmt: *mut sys::sqlite3_stmt = ptr::null_mut();
        let rc = unsafe {
            sys::sqlite3_prepare_v2(
                self.db,
                sql.as_ptr().cast::<c_char>(),
                len,
                &mut stmt,
                ptr::null_mut(),
            )
        };
        if rc != sys::SQLITE_OK {
            return Err(DbError::Prepare {
                code: ErrorCode(rc),
                message: unsafe { errmsg(self.db) },
            });
        }
        if stmt.is_null() {
            // SQLITE_OK with a NULL statement means the input was empty or
            // all comments; there is nothing to execute.
            return Err(DbError::Prepare {
                code: ErrorCode(sys::SQLITE_MISUSE),
                message: String::from("sql text contains no statement"),
            });
        }
        Ok(RawStmt {
            stmt,
            db: self.db,
            _conn: PhantomData,
        })
    }

    /// Executes one or more semicolon-separated statements, discarding any
    /// result rows. Requires an internal NUL-terminated copy of the SQL, so
    /// it is kept off the hot path (DDL, pragmas, scripts).
    pub fn exec(&self, sql: &str) -> DbResult<()> {
        let c_sql = std::ffi::CString::new(sql).map_err(|_| DbError::Prepare {
            code: ErrorCode(sys::SQLITE_MISUSE),
            message: String::from("sql text contains an interior NUL byte"),
        })?;
        let rc = unsafe {
            sys::sqlite3_exec(self.db, c_sql.as_ptr(), None, ptr::null_mut(), ptr::null_mut())
        };
        if rc != sys::SQLITE_OK {
            return Err(DbError::Step {
                code: ErrorCode(rc),
                message: unsafe { errmsg(self.db) },
            });
        }
        Ok(())
    }

    /// Last error code reported on this handle.
    pub fn errcode(&self) -> i32 {
        unsafe { sys::sqlite3_errcode(self.db) }
    }

    /// Current error message for this handle.
    pub fn errmsg(&self) -> String {
        unsafe { errmsg(self.db) }
    }

    /// Number of rows changed by the most recent statement.
    pub fn changes(&self) -> i64 {
        i64::from(unsafe { sys::sqlite3_changes(self.db) })
    }

    /// Rowid of the most recent successful INSERT.
    pub fn last_insert_rowid(&self) -> i64 {
        unsafe { sys::sqlite3_last_insert_rowid(self.db) }
    }
}

impl Drop for RawDb {
    fn drop(&mut self) {
        unsafe {
            sys::sqlite3_close_v2(self.db);
        }
    }
}

/// Copies every page of `src` into `dst` in one synchronous pass.
///
/// Runs `sqlite3_backup_init` / `step(-1)` / `finish` on the pair, then
/// inspects the destination's last error code, which is the authoritative
/// outcome of the copy. Returns `Ok(())` on success, or the destination's
/// code and message on failure (including a failed `backup_init`, which
/// also records its error on the destination handle).
pub(crate) fn copy_database(src: &RawDb, dst: &RawDb) -> Result<(), (ErrorCode, String)> {
    unsafe {
        let backup = sys::sqlite3_backup_init(dst.db, c"main".as_ptr(), src.db, c"main".as_ptr());
        if !backup.is_null() {
            // -1 requests all remaining pages: a single blocking,
            // non-cancellable transfer.
            sys::sqlite3_backup_step(backup, -1);
            sys::sqlite3_backup_finish(backup);
        }
    }
    let rc = dst.errcode();
    if rc != sys::SQLITE_OK {
        return Err((ErrorCode(rc), dst.errmsg()));
    }
    Ok(())
}

/// An owned, compiled `sqlite3_stmt` handle.
///
/// Borrows its [`RawDb`] so the statement can never outlive the connection
/// that prepared it. Finalized exactly once, on drop.
pub(crate) struct RawStmt<'conn> {
    stmt: *mut sys::sqlite3_stmt,
    db: *mut sys::sqlite3,
    _conn: PhantomData<&'conn RawDb>,
}

impl RawStmt<'_> {
    fn check(&self, rc: c_int, err: impl FnOnce(ErrorCode, String) -> DbError) -> DbResult<()> {
        if rc != sys::SQLITE_OK {
            return Err(err(ErrorCode(rc), unsafe { errmsg(self.db) }));
        }
        Ok(())
    }

    /// Resets the statement and clears all existing parameter bindings.
    pub fn reset(&mut self) -> DbResult<()> {
        let rc = unsafe { sys::sqlite3_reset(self.stmt) };
        self.check(rc, |code, message| DbError::Reset { code, message })?;
        let rc = unsafe { sys::sqlite3_clear_bindings(self.stmt) };
        self.check(rc, |code, message| DbError::Reset { code, message })
    }

    /// Binds a 64-bit integer at the 1-based `index`.
    pub fn bind_i64(&mut self, index: i32, value: i64) -> DbResult<()> {
        let rc = unsafe { sys::sqlite3_bind_int64(self.stmt, index, value) };
        self.check(rc, |code, message| DbError::Bind {
            index,
            code,
            message,
        })
    }

    /// Binds text at the 1-based `index`, letting the engine copy the bytes
    /// into its own register before the call returns (`SQLITE_TRANSIENT`).
    ///
    /// The driver itself makes no intermediate copy: the (pointer, length)
    /// pair references `text`'s backing storage directly.
    pub fn bind_text(&mut self, index: i32, text: &str) -> DbResult<()> {
        let len = c_int::try_from(text.len()).map_err(|_| DbError::Bind {
            index,
            code: ErrorCode(sys::SQLITE_TOOBIG),
            message: String::from("text parameter too long"),
        })?;
        let rc = unsafe {
            sys::sqlite3_bind_text(
                self.stmt,
                index,
                text.as_ptr().cast::<c_char>(),
                len,
                sys::SQLITE_TRANSIENT(),
            )
        };
        self.check(rc, |code, message| DbError::Bind {
            index,
            code,
            message,
        })
    }

    /// Binds text at the 1-based `index` with `SQLITE_STATIC`: zero-copy,
    /// the engine keeps the pointer.
    ///
    /// # Safety
    ///
    /// The engine may dereference `text`'s backing memory at any point until
    /// this binding is replaced or the statement is reset. The caller must
    /// keep that memory alive and unmoved for at least that long. The safe
    /// wrapper restricts this to `&'static str`.
    pub unsafe fn bind_text_static(&mut self, index: i32, text: &str) -> DbResult<()> {
        let len = c_int::try_from(text.len()).map_err(|_| DbError::Bind {
            index,
            code: ErrorCode(sys::SQLITE_TOOBIG),
            message: String::from("text parameter too long"),
        })?;
        let rc = sys::sqlite3_bind_text(
            self.stmt,
            index,
            text.as_ptr().cast::<c_char>(),
            len,
            sys::SQLITE_STATIC(),
        );
        self.check(rc, |code, message| DbError::Bind {
            index,
            code,
            message,
        })
    }

    /// Executes a single step. Returns `true` if a result row is available,
    /// `false` once the statement has finished.
    pub fn step(&mut self) -> DbResult<bool> {
        let rc = unsafe { sys::sqlite3_step(self.stmt) };
        match rc {
            sys::SQLITE_ROW => Ok(true),
            sys::SQLITE_DONE => Ok(false),
            _ => Err(DbError::Step {
                code: ErrorCode(rc),
                message: unsafe { errmsg(self.db) },
            }),
        }
    }

    /// Number of columns in the result set.
    pub fn column_count(&self) -> i32 {
        unsafe { sys::sqlite3_column_count(self.stmt) }
    }

    /// Fundamental type code of column `index` in the current row.
    pub fn column_type(&self, index: i32) -> i32 {
        unsafe { sys::sqlite3_column_type(self.stmt, index) }
    }

    /// Integer value of column `index` in the current row.
    pub fn column_i64(&self, index: i32) -> i64 {
        unsafe { sys::sqlite3_column_int64(self.stmt, index) }
    }

    /// Text bytes of column `index` in the current row.
    ///
    /// The slice borrows engine-owned memory; it is valid until the next
    /// step, reset or finalize, which the `&self` borrow cannot outlive
    /// because all of those take `&mut self`.
    pub fn column_text(&self, index: i32) -> &[u8] {
        unsafe {
            let ptr = sys::sqlite3_column_text(self.stmt, index);
            if ptr.is_null() {
                return &[];
            }
            let len = sys::sqlite3_column_bytes(self.stmt, index);
            let Ok(len) = usize::try_from(len) else {
                return &[];
            };
            std::slice::from_raw_parts(ptr, len)
        }
    }
}

impl Drop for RawStmt<'_> {
    fn drop(&mut self) {
        unsafe {
            sys::sqlite3_finalize(self.stmt);
        }
    }
}
