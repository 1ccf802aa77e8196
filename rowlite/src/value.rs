//! Parameter values for prepared statements.

use std::borrow::Cow;

/// A positional value bound to a prepared statement parameter (1-indexed).
///
/// The parameter kinds are closed: integers and text. Every text parameter
/// carries an explicit ownership tag so the cost of crossing the FFI
/// boundary is visible at the call site:
///
/// * [`Param::Text`] is the safe default -- the engine copies the bytes into
///   its own register during the bind call, so the backing storage only has
///   to live for the duration of [`Statement::exec`](crate::Statement::exec).
///   The driver itself never makes an intermediate copy either way; it hands
///   the engine a (pointer, length) pair into the caller's storage.
/// * [`Param::StaticText`] is the zero-copy opt-in for hot paths -- the
///   engine keeps the pointer and reads it lazily while stepping, which is
///   only sound because `'static` data can never go away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param<'a> {
    /// 64-bit signed integer.
    Integer(i64),
    /// UTF-8 text, copied by the engine at bind time.
    Text(Cow<'a, str>),
    /// UTF-8 text with static storage, borrowed by the engine (zero-copy).
    StaticText(&'static str),
}

impl From<i64> for Param<'_> {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl<'a> From<&'a str> for Param<'a> {
    fn from(v: &'a str) -> Self {
        Self::Text(Cow::Borrowed(v))
    }
}

impl From<String> for Param<'_> {
    fn from(v: String) -> Self {
        Self::Text(Cow::Owned(v))
    }
}

/// Convenience macro for building parameter lists.
///
/// Usage: `params![1_i64, "text", name.clone()]`
#[macro_export]
macro_rules! params {
    ($($val:expr),* $(,)?) => {
        &[$($crate::Param::from($val)),*][..]
    };
}
