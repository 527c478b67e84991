//! # branch-cache
//!
//! A hierarchical, lazily-populated memoization cache addressed by
//! slash-delimited paths such as `"user/name/middle"`.
//!
//! ## Features
//!
//! - **Path addressed:** every segment of a key is a branch, created on first traversal
//! - **Memoizing:** `ensure` runs a generator only when the node holds no value
//! - **Cross-references:** generators receive the tree root and can read other cached paths
//! - **Cascading delete:** deleting a path discards its whole subtree
//! - **Directional re-caching:** refresh a subtree `top-down` or `bottom-up`
//! - **Sync and async:** [`CacheBranchSync`] and [`CacheBranchAsync`] share one tree engine
//!
//! ## Quick Start
//!
//! ```
//! use branch_cache::{CacheBranchSync, CacheDirection};
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::sync::Arc;
//!
//! # fn main() -> branch_cache::Result<()> {
//! let tree = CacheBranchSync::<u32>::new();
//! let base = Arc::new(AtomicU32::new(1));
//!
//! let source = Arc::clone(&base);
//! tree.ensure("total/base", move |_| Ok(source.load(Ordering::SeqCst)))?;
//! tree.ensure("total", |root| {
//!     let base = root.get("total/base").ok_or("base missing")?;
//!     Ok(*base.raw()? * 10)
//! })?;
//! assert_eq!(*tree.get("total").unwrap().raw()?, 10);
//!
//! // Children feed the parent, so refresh leaves first.
//! base.store(2, Ordering::SeqCst);
//! tree.cache("total", Some(CacheDirection::BottomUp))?;
//! assert_eq!(*tree.get("total").unwrap().raw()?, 20);
//! # Ok(())
//! # }
//! ```
//!
//! ## Async
//!
//! ```
//! use branch_cache::CacheBranchAsync;
//!
//! # #[tokio::main]
//! # async fn main() -> branch_cache::Result<()> {
//! let tree = CacheBranchAsync::<String>::new();
//! let node = tree.ensure("user/name", |_| async { Ok("john".to_string()) }).await?;
//! assert_eq!(*node.raw()?, "john");
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;

pub mod direction;
pub mod error;
pub mod node;
pub mod nonblocking;
pub mod observability;
pub mod path;
pub mod serialization;
pub mod sync;
mod tree;

// Re-exports for convenience
pub use direction::CacheDirection;
pub use error::{Error, Result};
pub use node::CacheNode;
pub use nonblocking::{AsyncGenerator, CacheBranchAsync, CacheNodeAsync};
pub use observability::{CacheMetrics, NoOpMetrics};
pub use sync::{CacheBranchSync, CacheNodeSync, SyncGenerator};
pub use tree::TreeStats;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
