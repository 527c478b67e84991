//! Ordering policy for recursive re-caching.
//!
//! `cache(key, None)` refreshes only the node at `key`. Passing a direction
//! walks the whole subtree under `key`:
//!
//! | Direction | Order | Use when |
//! |-----------|-------|----------|
//! | **TopDown** | node, then each child subtree | children are computed from their parent |
//! | **BottomUp** | each child subtree, then node | a parent is computed from its children |
//!
//! ```
//! use branch_cache::CacheDirection;
//!
//! let direction: CacheDirection = "bottom-up".parse().unwrap();
//! assert_eq!(direction, CacheDirection::BottomUp);
//! assert_eq!(direction.to_string(), "bottom-up");
//! ```

use crate::error::Error;
use std::fmt;
use std::str::FromStr;

/// Direction of a recursive `cache` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheDirection {
    /// Refresh the resolved node first, then recurse into each child.
    TopDown,

    /// Recurse into each child first, then refresh the resolved node last.
    BottomUp,
}

impl fmt::Display for CacheDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheDirection::TopDown => write!(f, "top-down"),
            CacheDirection::BottomUp => write!(f, "bottom-up"),
        }
    }
}

impl FromStr for CacheDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top-down" => Ok(CacheDirection::TopDown),
            "bottom-up" => Ok(CacheDirection::BottomUp),
            other => Err(Error::InvalidDirection(other.to_string())),
        }
    }
}
