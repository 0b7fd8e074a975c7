//! The pipeline observer that assembles and tears down build trees.

use std::sync::Arc;

use crate::diagnostics::TreeSnapshot;
use crate::lifetime::{LifetimeRegistry, NoLifetimeRegistry};
use crate::node::NodeId;
use crate::observer::{Observers, TrackerObserver};
use crate::recovery::FailureRecovery;
use crate::traits::RecoveryStack;
use crate::{Instance, Key, NodeStore, TrackerConfig, TrackerError, TrackerResult};

mod session;
mod teardown;

pub use session::BuildSession;

/// Records which build created which instance and disposes exactly those
/// instances when their tree is released.
///
/// The construction pipeline drives the tracker through three notifications:
///
/// 1. [`on_pre_build`](Self::on_pre_build) before constructing a request,
/// 2. [`on_post_build`](Self::on_post_build) once the instance exists,
/// 3. [`on_tear_down`](Self::on_tear_down) when an instance is released.
///
/// Nested requests become children of the request that triggered them. Each
/// pre-build registers a [`FailureRecovery`] on the pipeline's
/// [`RecoveryStack`], so an aborted build leaves no partial tree behind.
///
/// # Examples
///
/// ```
/// use ferrous_lifetimes::*;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// struct Connection(AtomicUsize);
/// impl Dispose for Connection {
///     fn dispose(&self) -> Result<(), DisposeError> {
///         self.0.fetch_add(1, Ordering::SeqCst);
///         Ok(())
///     }
/// }
/// struct Repository;
///
/// let tracker = BuildTracker::new(Arc::new(NodeStore::new()));
/// let mut session = BuildSession::new();
/// let mut recoveries = RecoveryLog::new();
///
/// tracker.on_pre_build(&mut session, key_of_type::<Repository>(), &mut recoveries);
/// tracker.on_pre_build(&mut session, key_of_type::<Connection>(), &mut recoveries);
/// let conn = Arc::new(Connection(AtomicUsize::new(0)));
/// tracker
///     .on_post_build(&mut session, &key_of_type::<Connection>(), &Instance::disposable(conn.clone()), false)
///     .unwrap();
/// let repo = Instance::new(Arc::new(Repository));
/// tracker.on_post_build(&mut session, &key_of_type::<Repository>(), &repo, false).unwrap();
/// recoveries.discard();
///
/// tracker.on_tear_down(&repo).unwrap();
/// assert_eq!(conn.0.load(Ordering::SeqCst), 1);
/// assert!(tracker.live_trees().is_empty());
/// ```
pub struct BuildTracker {
    store: Arc<NodeStore>,
    registry: Arc<dyn LifetimeRegistry>,
    observers: Arc<Observers>,
    config: TrackerConfig,
}

impl BuildTracker {
    /// Tracker over `store` with no lifetime registry and default settings.
    pub fn new(store: Arc<NodeStore>) -> Self {
        Self {
            store,
            registry: Arc::new(NoLifetimeRegistry),
            observers: Arc::new(Observers::default()),
            config: TrackerConfig::default(),
        }
    }

    /// Consults `registry` at tear-down to skip promoted instances.
    pub fn with_registry(mut self, registry: Arc<dyn LifetimeRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn TrackerObserver>) -> Self {
        Arc::make_mut(&mut self.observers).add(observer);
        self
    }

    pub fn with_config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &Arc<NodeStore> {
        &self.store
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Opens a provisional node for `key` under the session's current node and
    /// registers its rollback on `recoveries`.
    pub fn on_pre_build<R>(&self, session: &mut BuildSession, key: Key, recoveries: &mut R) -> NodeId
    where
        R: RecoveryStack + ?Sized,
    {
        self.pre_build(session, key, recoveries, None)
    }

    /// Like [`on_pre_build`](Self::on_pre_build); `callback` runs once the
    /// node has been rolled back.
    pub fn on_pre_build_with_recovery<R, F>(
        &self,
        session: &mut BuildSession,
        key: Key,
        recoveries: &mut R,
        callback: F,
    ) -> NodeId
    where
        R: RecoveryStack + ?Sized,
        F: FnOnce(&Key) + Send + 'static,
    {
        self.pre_build(session, key, recoveries, Some(Box::new(callback)))
    }

    fn pre_build<R>(
        &self,
        session: &mut BuildSession,
        key: Key,
        recoveries: &mut R,
        callback: Option<crate::recovery::RecoveryCallback>,
    ) -> NodeId
    where
        R: RecoveryStack + ?Sized,
    {
        let tree = session.tree_for_pre_build();
        let (id, parent) = {
            let mut guard = tree.lock();
            let parent = guard.current();
            (guard.open(key.clone()), parent)
        };
        tracing::debug!(key = %key, node = %id, nested = parent.is_some(), "pre-build");

        recoveries.add_recovery(Box::new(FailureRecovery::new(
            Arc::clone(&self.store),
            Arc::clone(&self.observers),
            tree,
            id,
            key,
            callback,
        )));
        id
    }

    /// Attaches `instance` to the node opened by the matching pre-build.
    ///
    /// `key` must match the most recent unmatched pre-build of `session`. A
    /// completed root is handed to the store; a completed child stays in its
    /// parent until the root completes.
    pub fn on_post_build(
        &self,
        session: &mut BuildSession,
        key: &Key,
        instance: &Instance,
        was_already_existing: bool,
    ) -> TrackerResult<NodeId> {
        let violation = |expected: Option<Key>| {
            tracing::warn!(key = %key, "post-build without matching pre-build");
            TrackerError::BuildSequenceViolation { expected, actual: key.clone() }
        };

        let tree = session.building_tree().ok_or_else(|| violation(None))?;
        let created_by_container = !was_already_existing;
        let (id, is_root) = {
            let mut guard = tree.lock();
            let id = guard.current().ok_or_else(|| violation(None))?;
            let node = guard.get_mut(id).ok_or_else(|| violation(None))?;
            if node.key() != key {
                return Err(violation(Some(node.key().clone())));
            }
            node.assign_instance(instance)?;
            node.complete(created_by_container);
            let is_root = node.parent().is_none();
            guard.close_current();
            (id, is_root)
        };
        tracing::debug!(key = %key, node = %id, created_by_container, "post-build");
        if self.observers.has_observers() {
            self.observers.node_completed(key, created_by_container);
        }

        if is_root {
            session.finish();
            let (roots, pruned) = self.store.insert(tree, self.config.prune_on_insert);
            self.observers.trees_pruned(pruned);
            if let Some(limit) = self.config.live_tree_warning {
                if roots > limit {
                    tracing::warn!(roots, limit, "node store holds more live trees than expected");
                }
            }
        }
        Ok(id)
    }

    /// Releases the tree that contains `instance`.
    ///
    /// The tree leaves the store first, then every node the container created
    /// is disposed, except subtrees the lifetime registry owns. Instances that
    /// were never tracked, or whose tree is already gone, are ignored.
    pub fn on_tear_down(&self, instance: &Instance) -> TrackerResult<()> {
        let lookup = self
            .store
            .take_containing(instance.id(), self.config.prune_on_tear_down);
        self.observers.trees_pruned(lookup.pruned);

        let Some(tree) = lookup.tree else {
            tracing::trace!(instance = %instance.id(), "tear-down of untracked instance");
            return Ok(());
        };
        tracing::debug!(instance = %instance.id(), "tearing down build tree");
        TrackerError::from_failures(self.dispose_tree(&tree))
    }

    /// Releases every tracked tree, typically at container shutdown. Returns
    /// how many trees were released.
    pub fn dispose_all(&self) -> TrackerResult<usize> {
        let trees = self.store.drain();
        tracing::debug!(trees = trees.len(), "disposing all build trees");

        let failures: Vec<_> = trees.iter().flat_map(|tree| self.dispose_tree(tree)).collect();
        TrackerError::from_failures(failures).map(|()| trees.len())
    }

    /// Snapshot of the live root trees.
    pub fn live_trees(&self) -> Vec<TreeSnapshot> {
        self.store.snapshot()
    }
}

impl std::fmt::Debug for BuildTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildTracker")
            .field("store", &self.store)
            .field("config", &self.config)
            .finish()
    }
}
