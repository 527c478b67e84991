//! Path-keyed branch tree shared by the sync and async caches.
//!
//! A [`Branch`] is a handle to one branch record plus the root of the tree it
//! belongs to. Records own their node and their children; the root is only
//! carried by handles so generators can be given it, and is never used for
//! ownership. Everything here is structural: no generator is ever invoked and
//! no map guard outlives the statement that took it.

use crate::direction::CacheDirection;
use crate::error::Error;
use crate::node::{self, CacheNode};
use crate::observability::{CacheMetrics, NoOpMetrics};
use crate::path;
use dashmap::DashMap;
use std::sync::Arc;

/// One branch of the tree.
pub(crate) struct BranchRecord<V, G> {
    path: Arc<str>,
    depth: usize,
    node: CacheNode<V, G>,
    children: DashMap<String, Arc<BranchRecord<V, G>>>,
}

impl<V, G> BranchRecord<V, G> {
    fn new(path: Arc<str>, depth: usize) -> Self {
        BranchRecord {
            node: CacheNode::empty(Arc::clone(&path)),
            path,
            depth,
            children: DashMap::new(),
        }
    }
}

impl<V, G> Drop for BranchRecord<V, G> {
    // Unlink descendants one level at a time so deep trees drop without
    // recursing once per segment.
    fn drop(&mut self) {
        let mut pending: Vec<Arc<BranchRecord<V, G>>> = std::mem::take(&mut self.children)
            .into_iter()
            .map(|(_, child)| child)
            .collect();
        while let Some(child) = pending.pop() {
            if let Ok(mut record) = Arc::try_unwrap(child) {
                pending.extend(
                    std::mem::take(&mut record.children)
                        .into_iter()
                        .map(|(_, child)| child),
                );
            }
        }
    }
}

/// Handle to a branch and the root of its tree.
pub(crate) struct Branch<V, G> {
    record: Arc<BranchRecord<V, G>>,
    root: Arc<BranchRecord<V, G>>,
    metrics: Arc<dyn CacheMetrics>,
}

impl<V, G> Clone for Branch<V, G> {
    fn clone(&self) -> Self {
        Branch {
            record: Arc::clone(&self.record),
            root: Arc::clone(&self.root),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<V, G> Branch<V, G> {
    /// Root a fresh, empty tree.
    pub(crate) fn new_root() -> Self {
        let record = Arc::new(BranchRecord::new(Arc::from(""), 0));
        Branch {
            root: Arc::clone(&record),
            record,
            metrics: Arc::new(NoOpMetrics),
        }
    }

    pub(crate) fn with_metrics(mut self, metrics: Arc<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Handle to the root of this branch's tree.
    pub(crate) fn root(&self) -> Self {
        self.descend(Arc::clone(&self.root))
    }

    #[cfg(test)]
    pub(crate) fn is_root(&self) -> bool {
        Arc::ptr_eq(&self.record, &self.root)
    }

    pub(crate) fn path(&self) -> &str {
        &self.record.path
    }

    pub(crate) fn node(&self) -> &CacheNode<V, G> {
        &self.record.node
    }

    pub(crate) fn metrics(&self) -> &dyn CacheMetrics {
        self.metrics.as_ref()
    }

    fn descend(&self, record: Arc<BranchRecord<V, G>>) -> Self {
        Branch {
            record,
            root: Arc::clone(&self.root),
            metrics: Arc::clone(&self.metrics),
        }
    }

    /// Traverse `key` token by token starting from this branch.
    ///
    /// `step` receives the current branch, the token, its index and whether
    /// it is the last token, and returns the branch to continue from. A
    /// `None` step stops the walk and makes the whole result `None`.
    pub(crate) fn walk<F>(&self, key: &str, mut step: F) -> Option<Self>
    where
        F: FnMut(&Self, &str, usize, bool) -> Option<Self>,
    {
        let tokens = path::tokens(key);
        let last = tokens.len().saturating_sub(1);
        let mut current = self.clone();
        for (index, token) in tokens.into_iter().enumerate() {
            current = step(&current, token, index, index == last)?;
        }
        Some(current)
    }

    /// Resolve `key`, creating every missing branch along the way.
    pub(crate) fn ensure_branch(&self, key: &str) -> Self {
        self.walk(key, |current, token, _, _| Some(current.child_or_insert(token)))
            .unwrap_or_else(|| self.clone())
    }

    /// Resolve `key` without creating anything.
    pub(crate) fn get_branch(&self, key: &str) -> Option<Self> {
        self.walk(key, |current, token, index, last| {
            let child = current.child(token);
            if child.is_none() {
                trace!(
                    "✗ Branch WALK {} stopped at token {} ('{}', last: {})",
                    key,
                    index,
                    token,
                    last
                );
            }
            child
        })
    }

    pub(crate) fn child(&self, token: &str) -> Option<Self> {
        let record = self
            .record
            .children
            .get(token)
            .map(|entry| Arc::clone(entry.value()))?;
        Some(self.descend(record))
    }

    fn child_or_insert(&self, token: &str) -> Self {
        let record = {
            let entry = self
                .record
                .children
                .entry(token.to_string())
                .or_insert_with(|| {
                    let path = path::join(&self.record.path, self.record.depth, token);
                    trace!("» Branch CREATE {}", path);
                    Arc::new(BranchRecord::new(Arc::from(path), self.record.depth + 1))
                });
            Arc::clone(entry.value())
        };
        self.descend(record)
    }

    /// Names of the direct children at this moment.
    pub(crate) fn child_keys(&self) -> Vec<String> {
        self.record
            .children
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// The node, if it holds a produced value.
    pub(crate) fn dirty_node(&self) -> Option<CacheNode<V, G>> {
        if node::is_dirty(self.node()) {
            self.metrics.record_hit(self.path());
            Some(self.node().clone())
        } else {
            self.metrics.record_miss(self.path());
            None
        }
    }

    /// Discard every child subtree and return the node to its empty state.
    pub(crate) fn clear(&self) {
        self.record.children.clear();
        node::reset(self.node());
        node::set_dirty(self.node(), false);
        self.metrics.record_delete(self.path());
        debug!("✓ Branch DELETE {}", self.path());
    }

    /// Report a generator failure and hand the error back unchanged.
    pub(crate) fn fail(&self, error: Error) -> Error {
        self.metrics.record_error(self.path(), &error.to_string());
        error
    }

    /// Count the subtree under this branch, this branch included.
    pub(crate) fn stats(&self) -> TreeStats {
        let base_depth = self.record.depth;
        let mut stats = TreeStats::default();
        let mut pending = vec![Arc::clone(&self.record)];
        while let Some(record) = pending.pop() {
            stats.branches += 1;
            if node::is_dirty(&record.node) {
                stats.dirty_nodes += 1;
            }
            stats.max_depth = stats.max_depth.max(record.depth - base_depth);
            pending.extend(record.children.iter().map(|entry| Arc::clone(entry.value())));
        }
        stats
    }
}

enum Step<V, G> {
    /// Resolve `token` under the branch; skipped if it is gone by then.
    Child(Branch<V, G>, String),
    /// Refresh the branch; its children were already visited.
    Leave(Branch<V, G>),
    /// Queue the children of a branch that was just refreshed.
    Expand(Branch<V, G>),
}

/// Order in which `cache` refreshes a subtree.
///
/// Yields every branch whose node must be re-produced, one at a time. Child
/// names are read only when their parent's turn comes, and each child is
/// resolved again right before it is visited, so generators that add or
/// delete branches mid-traversal are observed. Depth costs heap, not stack.
pub(crate) struct Traversal<V, G> {
    direction: Option<CacheDirection>,
    start: Option<Branch<V, G>>,
    stack: Vec<Step<V, G>>,
}

impl<V, G> Traversal<V, G> {
    pub(crate) fn new(start: Branch<V, G>, direction: Option<CacheDirection>) -> Self {
        Traversal {
            direction,
            start: Some(start),
            stack: Vec::new(),
        }
    }

    fn enter(&mut self, branch: Branch<V, G>) -> Option<Branch<V, G>> {
        match self.direction {
            None => Some(branch),
            Some(CacheDirection::TopDown) => {
                self.stack.push(Step::Expand(branch.clone()));
                Some(branch)
            }
            Some(CacheDirection::BottomUp) => {
                self.stack.push(Step::Leave(branch.clone()));
                self.queue_children(&branch);
                None
            }
        }
    }

    fn queue_children(&mut self, branch: &Branch<V, G>) {
        let keys = branch.child_keys();
        self.stack.extend(
            keys.into_iter()
                .rev()
                .map(|key| Step::Child(branch.clone(), key)),
        );
    }
}

impl<V, G> Iterator for Traversal<V, G> {
    type Item = Branch<V, G>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(start) = self.start.take() {
            if let Some(branch) = self.enter(start) {
                return Some(branch);
            }
        }
        while let Some(step) = self.stack.pop() {
            match step {
                Step::Child(parent, key) => {
                    let Some(child) = parent.child(&key) else {
                        continue;
                    };
                    if let Some(branch) = self.enter(child) {
                        return Some(branch);
                    }
                }
                Step::Leave(branch) => return Some(branch),
                Step::Expand(branch) => self.queue_children(&branch),
            }
        }
        None
    }
}

/// Shape of a (sub)tree.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Branches in the subtree, its own branch included.
    pub branches: usize,
    /// Branches whose node holds a produced value.
    pub dirty_nodes: usize,
    /// Longest chain of segments below the subtree's branch.
    pub max_depth: usize,
}
