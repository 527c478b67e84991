//! The cache slot owned by every branch.
//!
//! A [`CacheNode`] holds the produced value, the dirty flag and the generator
//! that produced the value. The handle is cheap to clone and live: every
//! clone observes later `set`, `cache` and `delete` calls on its branch.
//!
//! The state transitions are module-level functions taking the node as an
//! explicit argument. Each one takes the lock for a single assignment, so no
//! guard ever spans a generator call.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Mutable state of a node.
///
/// `dirty == false` implies `value.is_none()`. A `None` generator is the
/// default generator, which produces no value.
struct NodeState<V, G> {
    value: Option<Arc<V>>,
    dirty: bool,
    generator: Option<G>,
}

/// Handle to a branch's cached value.
///
/// Returned by `ensure`, `get` and `peek`. Read the value with
/// [`raw`](CacheNode::raw), or take an owned copy with one of the clone
/// helpers.
pub struct CacheNode<V, G> {
    path: Arc<str>,
    state: Arc<RwLock<NodeState<V, G>>>,
}

impl<V, G> Clone for CacheNode<V, G> {
    fn clone(&self) -> Self {
        CacheNode {
            path: Arc::clone(&self.path),
            state: Arc::clone(&self.state),
        }
    }
}

impl<V, G> fmt::Debug for CacheNode<V, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheNode")
            .field("path", &self.path)
            .field("dirty", &is_dirty(self))
            .finish()
    }
}

impl<V, G> CacheNode<V, G> {
    /// Create a node that has never produced a value.
    pub(crate) fn empty(path: Arc<str>) -> Self {
        CacheNode {
            path,
            state: Arc::new(RwLock::new(NodeState {
                value: None,
                dirty: false,
                generator: None,
            })),
        }
    }

    /// Full path of the branch owning this node.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the node currently holds a produced value.
    pub fn is_dirty(&self) -> bool {
        is_dirty(self)
    }

    /// The cached value.
    ///
    /// The returned `Arc` is shared with the cache. Use
    /// [`clone_raw`](CacheNode::clone_raw) for a copy that cannot alias.
    ///
    /// # Errors
    ///
    /// Returns `Error::UninitializedAccess` if the node is not dirty.
    pub fn raw(&self) -> Result<Arc<V>> {
        let state = read(&self.state);
        if !state.dirty {
            return Err(Error::UninitializedAccess(self.path.to_string()));
        }
        state
            .value
            .clone()
            .ok_or_else(|| Error::UninitializedAccess(self.path.to_string()))
    }

    /// Deep copy of the cached value through its `Clone` impl.
    ///
    /// # Errors
    ///
    /// Returns `Error::UninitializedAccess` if the node is not dirty.
    pub fn clone_raw(&self) -> Result<V>
    where
        V: Clone,
    {
        Ok(V::clone(&*self.raw()?))
    }

    /// Copy of the cached value made by a caller-supplied function.
    ///
    /// Use this for shallow copies, e.g. `|v: &Vec<Arc<T>>| v.clone()` copies
    /// the outer collection while sharing its elements.
    ///
    /// # Errors
    ///
    /// Returns `Error::UninitializedAccess` if the node is not dirty.
    pub fn clone_with<F>(&self, copy: F) -> Result<V>
    where
        F: FnOnce(&V) -> V,
    {
        Ok(copy(&*self.raw()?))
    }

    /// Detached copy of the cached value through a serde round trip.
    ///
    /// See [`crate::serialization::structured_clone`].
    ///
    /// # Errors
    ///
    /// Returns `Error::UninitializedAccess` if the node is not dirty, or a
    /// serialization error if the value cannot make the round trip.
    pub fn structured_clone(&self) -> Result<V>
    where
        V: Serialize + DeserializeOwned,
    {
        crate::serialization::structured_clone(&*self.raw()?)
    }

    /// Whether two handles refer to the same node.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

fn read<V, G>(state: &RwLock<NodeState<V, G>>) -> RwLockReadGuard<'_, NodeState<V, G>> {
    match state.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("⚠ Node lock was poisoned, recovering...");
            poisoned.into_inner()
        }
    }
}

fn write<V, G>(state: &RwLock<NodeState<V, G>>) -> RwLockWriteGuard<'_, NodeState<V, G>> {
    match state.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("⚠ Node lock was poisoned, recovering...");
            poisoned.into_inner()
        }
    }
}

/// Whether the node holds a produced value.
pub(crate) fn is_dirty<V, G>(node: &CacheNode<V, G>) -> bool {
    read(&node.state).dirty
}

/// Overwrite the dirty flag. Clearing it also drops the value.
pub(crate) fn set_dirty<V, G>(node: &CacheNode<V, G>, dirty: bool) {
    let mut state = write(&node.state);
    state.dirty = dirty;
    if !dirty {
        state.value = None;
    }
}

/// Store a value produced by `generator` and make it the stored generator.
pub(crate) fn update<V, G>(node: &CacheNode<V, G>, value: V, generator: G) {
    let mut state = write(&node.state);
    state.value = Some(Arc::new(value));
    state.generator = Some(generator);
    state.dirty = true;
}

/// Store a value re-produced by the stored generator. The dirty flag is left
/// alone; a node that is no longer dirty keeps no value.
pub(crate) fn refresh<V, G>(node: &CacheNode<V, G>, value: Option<V>) {
    let mut state = write(&node.state);
    if state.dirty {
        state.value = value.map(Arc::new);
    }
}

/// Reinstall the default generator and drop the value.
pub(crate) fn reset<V, G>(node: &CacheNode<V, G>) {
    let mut state = write(&node.state);
    state.generator = None;
    state.value = None;
}

/// The stored generator, if any.
pub(crate) fn generator<V, G: Clone>(node: &CacheNode<V, G>) -> Option<G> {
    read(&node.state).generator.clone()
}
