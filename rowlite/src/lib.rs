//! Minimal safe `SQLite` driver with pooled tagged row buffers.
//!
//! This crate provides a small, safe Rust API over the `SQLite` C FFI,
//! linked through `libsqlite3-sys` (bundled amalgamation). It covers the
//! statement execution pipeline -- open, prepare, bind, step -- plus online
//! backup/restore, and materializes result rows into a compact
//! self-describing byte buffer instead of per-column accessor calls:
//!
//! * Parameters cross the FFI boundary as (pointer, length) pairs with no
//!   intermediate copies ([`value::Param`]).
//! * Each fetched row is encoded as a sequence of tagged values
//!   (type tag + payload) into a buffer leased from a process-wide pool,
//!   so repeated execute/read cycles amortize to zero allocation
//!   ([`rowbuf`]).
//! * [`Connection::backup`] and [`Connection::restore`] drive a full
//!   synchronous page copy against a secondary connection.
//!
//! The `ffi` module is the **only** file that contains `unsafe` code or C
//! types. Consumer code uses the safe types defined here and never touches
//! raw FFI directly.
//!
//! Connections and statements are single-owner objects: the driver has no
//! internal locking, and every call blocks until the engine returns. The
//! buffer pool is the one structure safe to touch from multiple statement
//! lifetimes.

mod backup;
mod connection;
pub mod error;
mod ffi;
pub mod rowbuf;
mod statement;
pub mod value;

pub use connection::Connection;
pub use error::{DbError, DbResult};
pub use ffi::URI_MAX_SIZE;
pub use rowbuf::{decode_row, ColumnValue, RowValues};
pub use statement::Statement;
pub use value::Param;

#[cfg(test)]
mod tests;
