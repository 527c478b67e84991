//! Suspending branch cache: generators return futures.
//!
//! Same tree, same semantics as [`crate::sync`]. Suspension only happens while
//! a generator's future is awaited; tree and node writes never span an
//! `.await`. There is no locking across operations: two concurrent calls on
//! overlapping paths interleave at generator boundaries and the last store
//! wins.

use crate::direction::CacheDirection;
use crate::error::Result;
use crate::node::{self, CacheNode};
use crate::observability::CacheMetrics;
use crate::tree::{Branch, Traversal, TreeStats};
use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

/// Generator stored by [`CacheBranchAsync`]. Receives the tree's root branch.
pub type AsyncGenerator<V> =
    Arc<dyn Fn(CacheBranchAsync<V>) -> BoxFuture<'static, Result<V>> + Send + Sync>;

/// Node handle returned by [`CacheBranchAsync`].
pub type CacheNodeAsync<V> = CacheNode<V, AsyncGenerator<V>>;

/// Hierarchical memoization cache whose generators may suspend.
///
/// # Example
///
/// ```
/// use branch_cache::CacheBranchAsync;
///
/// # #[tokio::main]
/// # async fn main() -> branch_cache::Result<()> {
/// let branch = CacheBranchAsync::<String>::new();
///
/// let node = branch
///     .ensure("user/name", |_| async { Ok("john".to_string()) })
///     .await?;
/// assert_eq!(*node.raw()?, "john");
///
/// // Intermediate branches exist but hold no value.
/// assert!(branch.get("user").is_none());
/// # Ok(())
/// # }
/// ```
pub struct CacheBranchAsync<V> {
    tree: Branch<V, AsyncGenerator<V>>,
}

impl<V> Clone for CacheBranchAsync<V> {
    fn clone(&self) -> Self {
        CacheBranchAsync {
            tree: self.tree.clone(),
        }
    }
}

impl<V> fmt::Debug for CacheBranchAsync<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheBranchAsync")
            .field("path", &self.tree.path())
            .finish()
    }
}

impl<V: Send + Sync + 'static> Default for CacheBranchAsync<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Send + Sync + 'static> CacheBranchAsync<V> {
    /// Root a fresh, empty tree.
    pub fn new() -> Self {
        CacheBranchAsync {
            tree: Branch::new_root(),
        }
    }

    /// Install a metrics sink shared by every handle into this tree.
    pub fn with_metrics(self, metrics: Arc<dyn CacheMetrics>) -> Self {
        CacheBranchAsync {
            tree: self.tree.with_metrics(metrics),
        }
    }

    /// Full path of this handle's branch (`""` for the root).
    pub fn path(&self) -> &str {
        self.tree.path()
    }

    /// Handle to the root of the tree.
    pub fn root(&self) -> Self {
        CacheBranchAsync {
            tree: self.tree.root(),
        }
    }

    /// Handle to the existing branch at `key`, relative to this one.
    pub fn branch(&self, key: &str) -> Option<Self> {
        self.tree
            .get_branch(key)
            .map(|tree| CacheBranchAsync { tree })
    }

    /// Re-run the stored generator of the node at `key`, and of its subtree
    /// when a direction is given.
    ///
    /// A `key` that does not resolve to an existing branch is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the first generator error.
    pub async fn cache(&self, key: &str, direction: Option<CacheDirection>) -> Result<&Self> {
        let Some(tree) = self.tree.get_branch(key) else {
            debug!("✗ Branch CACHE {} -> no such branch", key);
            return Ok(self);
        };
        let branch = CacheBranchAsync { tree };
        branch.cache_subtree(direction).await?;
        Ok(self)
    }

    async fn cache_subtree(&self, direction: Option<CacheDirection>) -> Result<()> {
        let mut walk = Traversal::new(self.tree.clone(), direction);
        while let Some(tree) = walk.next() {
            CacheBranchAsync { tree }.refresh().await?;
        }
        Ok(())
    }

    async fn refresh(&self) -> Result<()> {
        let timer = Instant::now();
        let value = match node::generator(self.tree.node()) {
            Some(generator) => Some(generator(self.root()).await.map_err(|e| self.tree.fail(e))?),
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
    /// # Errors
    ///
    /// Returns the generator's error; the node is left untouched.
    pub async fn ensure<F, Fut>(&self, key: &str, generator: F) -> Result<CacheNodeAsync<V>>
    where
        F: Fn(CacheBranchAsync<V>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let branch = CacheBranchAsync {
            tree: self.tree.ensure_branch(key),
        };
        if let Some(node) = branch.tree.dirty_node() {
            debug!("✓ Branch ENSURE {} -> HIT", branch.path());
            return Ok(node);
        }
        debug!("✓ Branch ENSURE {} -> MISS", branch.path());
        branch.update(boxed(generator)).await?;
        Ok(branch.tree.node().clone())
    }

    /// Return the node at `key` if it holds a produced value.
    ///
    /// Never suspends. Missing branches along `key` are created empty as a
    /// side effect; use [`peek`](Self::peek) to avoid that.
    pub fn get(&self, key: &str) -> Option<CacheNodeAsync<V>> {
        self.tree.ensure_branch(key).dirty_node()
    }

    /// Like [`get`](Self::get), but never creates branches.
    pub fn peek(&self, key: &str) -> Option<CacheNodeAsync<V>> {
        self.tree.get_branch(key)?.dirty_node()
    }

    /// Produce the node at `key` with `generator`, replacing any cached value.
    ///
    /// # Errors
    ///
    /// Returns the generator's error; the previous value is kept.
    pub async fn set<F, Fut>(&self, key: &str, generator: F) -> Result<&Self>
    where
        F: Fn(CacheBranchAsync<V>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let branch = CacheBranchAsync {
            tree: self.tree.ensure_branch(key),
        };
        branch.update(boxed(generator)).await?;
        Ok(self)
    }

    async fn update(&self, generator: AsyncGenerator<V>) -> Result<()> {
        let timer = Instant::now();
        let value = generator(self.root())
            .await
            .map_err(|e| self.tree.fail(e))?;
        node::update(self.tree.node(), value, generator);
        self.tree
            .metrics()
            .record_set(self.tree.path(), timer.elapsed());
        Ok(())
    }

    /// Delete the node at `key` together with its whole subtree.
    pub async fn delete(&self, key: &str) -> &Self {
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

fn boxed<V, F, Fut>(generator: F) -> AsyncGenerator<V>
where
    V: 'static,
    F: Fn(CacheBranchAsync<V>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V>> + Send + 'static,
{
    Arc::new(move |root| generator(root).boxed())
}
