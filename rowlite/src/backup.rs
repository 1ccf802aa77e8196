//! Online backup/restore driver.
//!
//! Opens a second, independent connection to the target URI and drives a
//! full synchronous page copy between it and the live connection, in either
//! direction. The copy requests "all remaining pages" in one step, so a
//! large database simply blocks for the whole duration.

use tracing::debug;

use super::error::{DbError, DbResult, ErrorCode};
use super::ffi::{self, RawDb};

/// Which way the pages flow relative to the live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    /// Live connection is the source; the target URI receives the copy.
    Save,
    /// The target URI is the source; the live connection is overwritten.
    Restore,
}

impl Direction {
    fn error(self, code: ErrorCode, message: String) -> DbError {
        match self {
            Self::Save => DbError::Backup { code, message },
            Self::Restore => DbError::Restore { code, message },
        }
    }
}

/// Runs one full copy between `live` and the database at `uri`.
///
/// The ephemeral secondary connection is closed unconditionally before this
/// returns (its handle is owned and dropped on every path). Failure to even
/// open it is surfaced immediately without attempting the copy.
pub(crate) fn run(live: &RawDb, uri: &str, direction: Direction) -> DbResult<()> {
    debug!(uri, ?direction, "starting full database copy");
    // Any failure to open the target, including a URI rejected before the
    // engine runs, surfaces as a backup/restore failure.
    let target = RawDb::open(uri).map_err(|e| match e {
        DbError::Open { code, message } => direction.error(code, message),
        DbError::InvalidUri(message) => direction.error(ErrorCode(ffi::CODE_ERROR), message),
        other => other,
    })?;
    let (src, dst) = match direction {
        Direction::Save => (live, &target),
        Direction::Restore => (&target, live),
    };
    ffi::copy_database(src, dst).map_err(|(code, message)| direction.error(code, message))?;
    debug!(uri, ?direction, "database copy complete");
    Ok(())
}
