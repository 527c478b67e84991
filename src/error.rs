//! Error types for the branch cache.

use std::fmt;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the branch cache.
///
/// Generators return `Result<V>` as well, so a failing generator hands its
/// own `Error` back through `ensure`, `set` and `cache` unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A node's value was read while the node is not dirty.
    ///
    /// Raised by `CacheNode::raw()` and the clone helpers when:
    /// - the branch was created as a traversal side effect and never produced a value
    /// - the branch was deleted after the node handle was obtained
    ///
    /// This signals a programmer error: guard reads with `get` or `ensure`.
    UninitializedAccess(String),

    /// A generator could not produce a value.
    ///
    /// Not raised by the cache itself. Generator authors can use it to
    /// report failures; the cache propagates it as-is.
    GeneratorError(String),

    /// Serialization failed while structurally cloning a cached value.
    SerializationError(String),

    /// Deserialization failed while structurally cloning a cached value.
    DeserializationError(String),

    /// Unknown re-cache direction text.
    ///
    /// Only `"top-down"` and `"bottom-up"` are accepted.
    InvalidDirection(String),

    /// Generic error with custom message.
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UninitializedAccess(path) => write!(
                f,
                "Uninitialized access: '{}' has no cached value, use ensure or set first",
                path
            ),
            Error::GeneratorError(msg) => write!(f, "Generator error: {}", msg),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::InvalidDirection(text) => write!(
                f,
                "Invalid direction: '{}' (expected 'top-down' or 'bottom-up')",
                text
            ),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Other(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Other(e.to_string())
    }
}
