//! Tagged row buffers: encoder, decoder and the process-wide buffer pool.
//!
//! A fetched row is materialized into one flat byte buffer as a sequence of
//! self-describing tagged values, in column order:
//!
//! ```text
//! Row    := Column*
//! Column := [tag: u8] [payload]
//!
//!   tag 1 (INTEGER): 8-byte native-endian i64
//!   tag 3 (TEXT):    4-byte native-endian i32 length prefix, then exactly
//!                    that many bytes of text (no terminator)
//!   tag 5 (NULL):    no payload
//! ```
//!
//! The tag values are `SQLite`'s fundamental type codes, so no translation
//! table sits between the engine and the buffer. A consumer reading the
//! buffer directly must match this layout byte for byte.
//!
//! Buffers are leased from a process-wide [`BufferPool`] on a statement's
//! first row and returned when the statement is dropped, so repeated
//! execute/read cycles on warm statements do not allocate.

use std::sync::{LazyLock, Mutex, PoisonError};

use tracing::trace;

use super::error::{DbError, DbResult};

/// Row-buffer tag for an INTEGER value (`SQLITE_INTEGER`).
pub const TAG_INTEGER: u8 = 1;
/// Row-buffer tag for a TEXT value (`SQLITE_TEXT`).
pub const TAG_TEXT: u8 = 3;
/// Row-buffer tag for a NULL value (`SQLITE_NULL`).
pub const TAG_NULL: u8 = 5;

/// Default capacity of a pooled row buffer.
pub const DEFAULT_BUF_CAPACITY: usize = 8 * 1024;

/// Idle buffers kept by the pool; returns beyond this are dropped.
const POOL_MAX_IDLE: usize = 32;

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// The destination buffer's remaining capacity was insufficient for a value.
///
/// Nothing of the failed value has been written; the buffer still ends at
/// the previous column boundary. The caller owns the growth policy: grow or
/// replace the buffer and re-encode the row from scratch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BufferFull;

/// Appends tagged values to a row buffer without ever growing it.
///
/// Every append is a single up-front bounds check against the buffer's
/// fixed capacity followed by the writes for that value, so a failed append
/// leaves no partial header behind.
pub(crate) struct RowEncoder<'b> {
    buf: &'b mut Vec<u8>,
}

impl<'b> RowEncoder<'b> {
    /// Starts an encode pass, resetting the buffer to empty (its capacity
    /// is left untouched).
    pub fn begin(buf: &'b mut Vec<u8>) -> Self {
        buf.clear();
        Self { buf }
    }

    fn fits(&self, needed: usize) -> bool {
        self.buf.capacity() - self.buf.len() >= needed
    }

    /// Appends an INTEGER value: tag plus a full-width 8-byte payload,
    /// regardless of magnitude.
    pub fn integer(&mut self, value: i64) -> Result<(), BufferFull> {
        if !self.fits(1 + 8) {
            return Err(BufferFull);
        }
        self.buf.push(TAG_INTEGER);
        self.buf.extend_from_slice(&value.to_ne_bytes());
        Ok(())
    }

    /// Appends a TEXT value: tag, 4-byte length prefix, then the bytes.
    pub fn text(&mut self, bytes: &[u8]) -> Result<(), BufferFull> {
        let Ok(len) = i32::try_from(bytes.len()) else {
            // Cannot be represented in the length prefix, so no capacity
            // can ever fit it.
            return Err(BufferFull);
        };
        if !self.fits(1 + 4 + bytes.len()) {
            return Err(BufferFull);
        }
        self.buf.push(TAG_TEXT);
        self.buf.extend_from_slice(&len.to_ne_bytes());
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Appends a NULL value: tag only.
    pub fn null(&mut self) -> Result<(), BufferFull> {
        if !self.fits(1) {
            return Err(BufferFull);
        }
        self.buf.push(TAG_NULL);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// One decoded column value, borrowing the row buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnValue<'a> {
    /// 64-bit signed integer.
    Integer(i64),
    /// UTF-8 text bytes (no terminator).
    Text(&'a [u8]),
    /// SQL NULL.
    Null,
}

/// Iterator over the tagged values of one encoded row.
///
/// Yields [`DbError::MalformedRow`] and then terminates if the buffer is
/// truncated or carries an unknown tag.
#[derive(Debug, Clone)]
pub struct RowValues<'a> {
    rest: &'a [u8],
}

impl<'a> RowValues<'a> {
    fn fail(&mut self, what: &'static str) -> Option<DbResult<ColumnValue<'a>>> {
        self.rest = &[];
        Some(Err(DbError::MalformedRow(what)))
    }
}

impl<'a> Iterator for RowValues<'a> {
    type Item = DbResult<ColumnValue<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let (&tag, rest) = self.rest.split_first()?;
        match tag {
            TAG_INTEGER => {
                if rest.len() < 8 {
                    return self.fail("truncated integer payload");
                }
                let (payload, rest) = rest.split_at(8);
                let mut raw = [0u8; 8];
                raw.copy_from_slice(payload);
                self.rest = rest;
                Some(Ok(ColumnValue::Integer(i64::from_ne_bytes(raw))))
            }
            TAG_TEXT => {
                if rest.len() < 4 {
                    return self.fail("truncated text length prefix");
                }
                let (prefix, rest) = rest.split_at(4);
                let mut raw = [0u8; 4];
                raw.copy_from_slice(prefix);
                let len = i32::from_ne_bytes(raw);
                let Ok(len) = usize::try_from(len) else {
                    return self.fail("negative text length");
                };
                if rest.len() < len {
                    return self.fail("truncated text payload");
                }
                let (payload, rest) = rest.split_at(len);
                self.rest = rest;
                Some(Ok(ColumnValue::Text(payload)))
            }
            TAG_NULL => {
                self.rest = rest;
                Some(Ok(ColumnValue::Null))
            }
            _ => self.fail("unknown type tag"),
        }
    }
}

/// Decodes an encoded row buffer into an iterator of tagged values.
#[must_use]
pub fn decode_row(bytes: &[u8]) -> RowValues<'_> {
    RowValues { rest: bytes }
}

// ---------------------------------------------------------------------------
// Buffer pool
// ---------------------------------------------------------------------------

/// A pool of reusable row buffers.
///
/// Lease/return transfers ownership of the `Vec`, so two live statements
/// can never hold the same allocation. The pool keeps at most
/// [`POOL_MAX_IDLE`] idle buffers; returns beyond the cap are dropped
/// rather than letting the pool grow without bound.
pub(crate) struct BufferPool {
    idle: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    pub const fn new() -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
        }
    }

    fn idle(&self) -> std::sync::MutexGuard<'_, Vec<Vec<u8>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes a buffer out of the pool, or allocates a fresh one with the
    /// default capacity.
    pub fn lease(&self) -> Vec<u8> {
        let reused = self.idle().pop();
        match reused {
            Some(buf) => {
                trace!(capacity = buf.capacity(), "reusing pooled row buffer");
                buf
            }
            None => {
                trace!(capacity = DEFAULT_BUF_CAPACITY, "allocating row buffer");
                Vec::with_capacity(DEFAULT_BUF_CAPACITY)
            }
        }
    }

    /// Returns a leased buffer for reuse. Must be called exactly once per
    /// lease; the statement's drop glue does this.
    pub fn give_back(&self, mut buf: Vec<u8>) {
        buf.clear();
        let mut idle = self.idle();
        if idle.len() < POOL_MAX_IDLE {
            idle.push(buf);
        }
        // Beyond the cap the buffer is simply dropped.
    }
}

/// The process-wide pool statements lease from.
pub(crate) static POOL: LazyLock<BufferPool> = LazyLock::new(BufferPool::new);
