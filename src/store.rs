//! The set of completed root trees.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::diagnostics::TreeSnapshot;
use crate::instance::InstanceId;
use crate::tree::TreeHandle;

/// Completed build trees, one per top-level build.
///
/// A store is created once per container and handed to its
/// [`BuildTracker`](crate::BuildTracker). Every operation takes a single lock;
/// no user code ever runs while it is held. Roots whose object has been dropped
/// are pruned lazily, and every read view prunes first, so a collected root is
/// never reported as live.
///
/// # Examples
///
/// ```
/// use ferrous_lifetimes::{BuildTracker, NodeStore};
/// use std::sync::Arc;
///
/// let store = Arc::new(NodeStore::new());
/// let tracker = BuildTracker::new(store.clone());
/// assert!(store.is_empty());
/// assert!(tracker.live_trees().is_empty());
/// ```
#[derive(Default)]
pub struct NodeStore {
    roots: Mutex<Vec<TreeHandle>>,
}

/// Result of looking up the tree that holds an instance.
pub(crate) struct Lookup {
    pub(crate) tree: Option<TreeHandle>,
    pub(crate) pruned: usize,
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live roots.
    pub fn len(&self) -> usize {
        let mut roots = self.roots.lock();
        prune_dead(&mut roots);
        roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every root whose object has been collected. Returns how many went.
    pub fn prune(&self) -> usize {
        prune_dead(&mut self.roots.lock())
    }

    pub(crate) fn insert(&self, tree: TreeHandle, prune: bool) -> (usize, usize) {
        let mut roots = self.roots.lock();
        let pruned = if prune { prune_dead(&mut roots) } else { 0 };
        roots.push(tree);
        (roots.len(), pruned)
    }

    pub(crate) fn remove(&self, tree: &TreeHandle) -> bool {
        let mut roots = self.roots.lock();
        let before = roots.len();
        roots.retain(|candidate| !Arc::ptr_eq(candidate, tree));
        roots.len() != before
    }

    /// Removes and returns the tree containing `instance`, optionally pruning
    /// dead roots in the same pass.
    ///
    /// The search covers trees whose root was already collected: a child can
    /// outlive its root and still needs disposing.
    pub(crate) fn take_containing(&self, instance: InstanceId, prune: bool) -> Lookup {
        let mut roots = self.roots.lock();
        let tree = roots
            .iter()
            .position(|tree| tree.lock().contains_instance(instance))
            .map(|pos| roots.remove(pos));
        let pruned = if prune { prune_dead(&mut roots) } else { 0 };
        Lookup { tree, pruned }
    }

    /// Removes every live tree; dead roots are dropped on the way.
    pub(crate) fn drain(&self) -> Vec<TreeHandle> {
        let mut roots = self.roots.lock();
        prune_dead(&mut roots);
        std::mem::take(&mut *roots)
    }

    pub(crate) fn snapshot(&self) -> Vec<TreeSnapshot> {
        let mut roots = self.roots.lock();
        prune_dead(&mut roots);
        roots
            .iter()
            .filter_map(|tree| TreeSnapshot::capture(&tree.lock()))
            .collect()
    }
}

impl std::fmt::Debug for NodeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeStore")
            .field("roots", &self.roots.lock().len())
            .finish()
    }
}

fn prune_dead(roots: &mut Vec<TreeHandle>) -> usize {
    let before = roots.len();
    roots.retain(|tree| tree.lock().root_alive());
    before - roots.len()
}
