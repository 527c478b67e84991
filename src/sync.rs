//! Immediate-return branch cache.

use crate::direction::CacheDirection;
use crate::error::Result;
use crate::node::{self, CacheNode};
use crate::observability::CacheMetrics;
use crate::tree::{Branch, Traversal, TreeStats};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Generator stored by [`CacheBranchSync`]. Receives the tree's root branch.
pub type SyncGenerator<V> = Arc<dyn Fn(&CacheBranchSync<V>) -> Result<V> + Send + Sync>;

/// Node handle returned by [`CacheBranchSync`].
pub type CacheNodeSync<V> = CacheNode<V, SyncGenerator<V>>;

/// Hierarchical memoization cache whose generators return immediately.
///
/// Keys are `/`-delimited paths; each segment is a branch, created lazily on
/// first traversal. Cloning the handle is cheap (`Arc` increments) and every
/// clone addresses the same tree.
///
/// # Example
///
/// ```
/// use branch_cache::CacheBranchSync;
///
/// # fn main() -> branch_cache::Result<()> {
/// let branch = CacheBranchSync::<u32>::new();
///
/// assert_eq!(*branch.ensure("1", |_| Ok(1))?.raw()?, 1);
/// assert_eq!(*branch.ensure("1", |_| Ok(2))?.raw()?, 1);
///
/// let node = branch.set("1", |_| Ok(2))?.get("1").unwrap();
/// assert_eq!(*node.raw()?, 2);
///
/// branch.delete("1");
/// assert!(branch.get("1").is_none());
/// # Ok(())
/// # }
/// ```
pub struct CacheBranchSync<V> {
    tree: Branch<V, SyncGenerator<V>>,
}

impl<V> Clone for CacheBranchSync<V> {
    fn clone(&self) -> Self {
        CacheBranchSync {
            tree: self.tree.clone(),
        }
    }
}

impl<V> fmt::Debug for CacheBranchSync<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheBranchSync")
            .field("path", &self.tree.path())
            .finish()
    }
}

impl<V: 'static> Default for CacheBranchSync<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: 'static> CacheBranchSync<V> {
    /// Root a fresh, empty tree.
    pub fn new() -> Self {
        CacheBranchSync {
            tree: Branch::new_root(),
        }
    }

    /// Install a metrics sink shared by every handle into this tree.
    pub fn with_metrics(self, metrics: Arc<dyn CacheMetrics>) -> Self {
        CacheBranchSync {
            tree: self.tree.with_metrics(metrics),
        }
    }

    /// Full path of this handle's branch (`""` for the root).
    pub fn path(&self) -> &str {
        self.tree.path()
    }

    /// Handle to the root of the tree.
    pub fn root(&self) -> Self {
        CacheBranchSync {
            tree: self.tree.root(),
        }
    }

    /// Handle to the existing branch at `key`, relative to this one.
    ///
    /// Nothing is created; `None` if any segment is missing.
    pub fn branch(&self, key: &str) -> Option<Self> {
        self.tree
            .get_branch(key)
            .map(|tree| CacheBranchSync { tree })
    }

    /// Re-run the stored generator of the node at `key`.
    ///
    /// With a direction, the whole subtree under `key` is refreshed in that
    /// order. A `key` that does not resolve to an existing branch is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the first generator error. Nodes refreshed before the failure
    /// keep their new values; the failing node keeps its old one.
    pub fn cache(&self, key: &str, direction: Option<CacheDirection>) -> Result<&Self> {
        let Some(tree) = self.tree.get_branch(key) else {
            debug!("✗ Branch CACHE {} -> no such branch", key);
            return Ok(self);
        };
        CacheBranchSync { tree }.cache_subtree(direction)?;
        Ok(self)
    }

    fn cache_subtree(&self, direction: Option<CacheDirection>) -> Result<()> {
        for tree in Traversal::new(self.tree.clone(), direction) {
            CacheBranchSync { tree }.refresh()?;
        }
        Ok(())
    }

    fn refresh(&self) -> Result<()> {
        let timer = Instant::now();
        let value = match node::generator(self.tree.node()) {
            Some(generator) => Some(generator(&self.root()).map_err(|e| self.tree.fail(e))?),
            None => None,
        };
        node::refresh(self.tree.node(), value);
        self.tree
            .metrics()
            .record_refresh(self.tree.path(), timer.elapsed());
        debug!("✓ Branch CACHE {}", self.tree.path());
        Ok(())
    }

    /// Return the node at `key`, producing it with `generator` if it holds
    /// no value yet.
    ///
    /// An already dirty node is returned as-is and `generator` is dropped
    /// without being called.
    ///
    /// # Errors
    ///
    /// Returns the generator's error; the node is left untouched.
    pub fn ensure<F>(&self, key: &str, generator: F) -> Result<CacheNodeSync<V>>
    where
        F: Fn(&CacheBranchSync<V>) -> Result<V> + Send + Sync + 'static,
    {
        let branch = CacheBranchSync {
            tree: self.tree.ensure_branch(key),
        };
        if let Some(node) = branch.tree.dirty_node() {
            debug!("✓ Branch ENSURE {} -> HIT", branch.path());
            return Ok(node);
        }
        debug!("✓ Branch ENSURE {} -> MISS", branch.path());
        branch.update(Arc::new(generator))?;
        Ok(branch.tree.node().clone())
    }

    /// Return the node at `key` if it holds a produced value.
    ///
    /// Missing branches along `key` are created empty as a side effect, the
    /// same way `ensure` creates them. Use [`peek`](Self::peek) for a read
    /// that leaves the tree untouched.
    pub fn get(&self, key: &str) -> Option<CacheNodeSync<V>> {
        self.tree.ensure_branch(key).dirty_node()
    }

    /// Like [`get`](Self::get), but never creates branches.
    pub fn peek(&self, key: &str) -> Option<CacheNodeSync<V>> {
        self.tree.get_branch(key)?.dirty_node()
    }

    /// Produce the node at `key` with `generator`, replacing any cached value.
    ///
    /// # Errors
    ///
    /// Returns the generator's error; the previous value is kept.
    pub fn set<F>(&self, key: &str, generator: F) -> Result<&Self>
    where
        F: Fn(&CacheBranchSync<V>) -> Result<V> + Send + Sync + 'static,
    {
        let branch = CacheBranchSync {
            tree: self.tree.ensure_branch(key),
        };
        branch.update(Arc::new(generator))?;
        Ok(self)
    }

    fn update(&self, generator: SyncGenerator<V>) -> Result<()> {
        let timer = Instant::now();
        let value = generator(&self.root()).map_err(|e| self.tree.fail(e))?;
        node::update(self.tree.node(), value, generator);
        self.tree
            .metrics()
            .record_set(self.tree.path(), timer.elapsed());
        Ok(())
    }

    /// Delete the node at `key` together with its whole subtree.
    pub fn delete(&self, key: &str) -> &Self {
        self.tree.ensure_branch(key).clear();
        self
    }

    /// Shape of the subtree under this handle.
    pub fn stats(&self) -> TreeStats {
        self.tree.stats()
    }

    /// Print subtree statistics to debug log.
    pub fn log_stats(&self) {
        let stats = self.stats();
        debug!(
            "Branch Stats for '{}': {} branches ({} dirty), depth {}",
            self.path(),
            stats.branches,
            stats.dirty_nodes,
            stats.max_depth
        );
    }
}
