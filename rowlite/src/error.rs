//! Error types for the driver.

use std::fmt;

use thiserror::Error;

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// `SQLite` result code attached to an engine-reported failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode(pub i32);

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned by database operations.
///
/// One variant per failure kind; every failure is reported synchronously to
/// the immediate caller and nothing is retried internally. Engine-reported
/// variants carry the `SQLite` result code and the `sqlite3_errmsg` text
/// captured at the point of failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DbError {
    /// The URI failed validation before the engine was ever invoked
    /// (too long for the staging buffer, or contains an interior NUL).
    #[error("invalid argument: {0}")]
    InvalidUri(String),

    /// The engine could not open the database.
    #[error("cannot open database ({code}): {message}")]
    Open {
        /// Engine result code.
        code: ErrorCode,
        /// Engine error message.
        message: String,
    },

    /// The engine could not compile the SQL text.
    #[error("cannot prepare statement ({code}): {message}")]
    Prepare {
        /// Engine result code.
        code: ErrorCode,
        /// Engine error message.
        message: String,
    },

    /// The engine rejected a parameter binding (e.g. index out of range).
    #[error("cannot bind parameter {index} ({code}): {message}")]
    Bind {
        /// 1-based parameter index that failed to bind.
        index: i32,
        /// Engine result code.
        code: ErrorCode,
        /// Engine error message.
        message: String,
    },

    /// The statement could not be reset before re-binding.
    #[error("cannot reset statement ({code}): {message}")]
    Reset {
        /// Engine result code.
        code: ErrorCode,
        /// Engine error message.
        message: String,
    },

    /// A step returned something other than a row or successful completion.
    #[error("cannot execute statement ({code}): {message}")]
    Step {
        /// Engine result code.
        code: ErrorCode,
        /// Engine error message.
        message: String,
    },

    /// The page copy into the backup target failed, or the target could not
    /// be opened.
    #[error("cannot backup database ({code}): {message}")]
    Backup {
        /// Result code reported by the destination connection.
        code: ErrorCode,
        /// Engine error message.
        message: String,
    },

    /// The page copy from the backup source failed, or the source could not
    /// be opened.
    #[error("cannot restore database ({code}): {message}")]
    Restore {
        /// Result code reported by the destination connection.
        code: ErrorCode,
        /// Engine error message.
        message: String,
    },

    /// A result column has a fundamental type the tagged row format does
    /// not represent (only INTEGER, TEXT and NULL are encoded).
    #[error("unsupported column type {0}")]
    UnsupportedColumnType(i32),

    /// A tagged row buffer could not be decoded (truncated payload,
    /// unknown tag, or negative length prefix).
    #[error("malformed row buffer: {0}")]
    MalformedRow(&'static str),
}
