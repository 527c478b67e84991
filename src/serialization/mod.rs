//! Postcard-based structured cloning of cached payloads.
//!
//! `CacheNode::clone_raw()` copies a value through its `Clone` impl. When a
//! payload's `Clone` shares state (an `Arc` inside, say) and a fully detached
//! copy is wanted instead, the value can be rebuilt from its serialized form:
//!
//! ```text
//! value ──postcard::to_allocvec──▶ bytes ──postcard::from_bytes──▶ copy
//! ```
//!
//! Postcard is not self-describing, so payload types must serialize through
//! concrete serde types (derive-based structs and enums). Dynamic values such
//! as `serde_json::Value` should use `clone_raw()` instead.
//!
//! # Example
//!
//! ```rust
//! use branch_cache::serialization::structured_clone;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! # fn main() -> branch_cache::Result<()> {
//! let user = User { id: 1, name: "Alice".to_string() };
//! let copy = structured_clone(&user)?;
//! assert_eq!(user, copy);
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encode a value to postcard bytes.
///
/// # Errors
///
/// Returns `Error::SerializationError` if Postcard serialization fails.
pub fn to_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    postcard::to_allocvec(value).map_err(|e| {
        log::error!("Structured clone serialization failed: {}", e);
        Error::SerializationError(e.to_string())
    })
}

/// Decode a value from postcard bytes.
///
/// # Errors
///
/// Returns `Error::DeserializationError` if the bytes do not decode as `T`.
pub fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    postcard::from_bytes(bytes).map_err(|e| {
        log::error!("Structured clone deserialization failed: {}", e);
        Error::DeserializationError(e.to_string())
    })
}

/// Produce a detached copy of `value` by serializing and deserializing it.
///
/// # Errors
///
/// Returns `Error::SerializationError` or `Error::DeserializationError`
/// when the value cannot make the round trip.
pub fn structured_clone<T: Serialize + DeserializeOwned>(value: &T) -> Result<T> {
    let bytes = to_bytes(value)?;
    from_bytes(&bytes)
}
