//! Rollback of partially built trees.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::internal::dispose_guarded;
use crate::node::NodeId;
use crate::observer::Observers;
use crate::traits::{Recover, RecoveryStack};
use crate::tree::TreeHandle;
use crate::{DisposeError, Key, NodeStore};

/// Caller-supplied action run after a failed node has been detached.
pub type RecoveryCallback = Box<dyn FnOnce(&Key) + Send>;

/// Rollback action registered for every pre-build.
///
/// When the construction attempt aborts, `recover` disposes the node's instance
/// if the container created it and it is disposable, detaches the node with its
/// subtree from the parent (or drops the whole tree from the store when the
/// node is the root), and finally runs the caller's callback. Disposal failures
/// are logged and swallowed so the pipeline reports the original construction
/// error.
pub struct FailureRecovery {
    store: Arc<NodeStore>,
    observers: Arc<Observers>,
    tree: TreeHandle,
    node: NodeId,
    key: Key,
    callback: Mutex<Option<RecoveryCallback>>,
    recovered: AtomicBool,
}

impl FailureRecovery {
    pub(crate) fn new(
        store: Arc<NodeStore>,
        observers: Arc<Observers>,
        tree: TreeHandle,
        node: NodeId,
        key: Key,
        callback: Option<RecoveryCallback>,
    ) -> Self {
        Self {
            store,
            observers,
            tree,
            node,
            key,
            callback: Mutex::new(callback),
            recovered: AtomicBool::new(false),
        }
    }

    /// The node this action guards.
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn is_recovered(&self) -> bool {
        self.recovered.load(Ordering::SeqCst)
    }

    fn dispose_instance(&self) {
        let instance = {
            let tree = self.tree.lock();
            tree.get(self.node)
                .filter(|node| node.created_by_container())
                .and_then(|node| node.instance())
        };
        let Some(disposer) = instance.as_ref().and_then(|i| i.disposer()) else {
            return;
        };

        match dispose_guarded(disposer.as_ref()) {
            Ok(()) => self.observers.instance_disposed(&self.key),
            Err(DisposeError::AlreadyDisposed) => {
                tracing::trace!(key = %self.key, "rolled back instance was already disposed");
            }
            Err(error) => {
                tracing::warn!(key = %self.key, error = %error, "disposal failed during rollback");
                self.observers.disposal_failed(&self.key, &error);
            }
        }
    }
}

impl Recover for FailureRecovery {
    fn recover(&self) {
        if self.recovered.swap(true, Ordering::SeqCst) {
            return;
        }

        self.dispose_instance();

        let (detached, was_root) = {
            let mut tree = self.tree.lock();
            let was_root = tree.root() == Some(self.node);
            (tree.detach(self.node), was_root)
        };
        if detached {
            if was_root {
                self.store.remove(&self.tree);
            }
            tracing::debug!(key = %self.key, node = %self.node, root = was_root, "build rolled back");
            self.observers.node_rolled_back(&self.key);
        }

        if let Some(callback) = self.callback.lock().take() {
            callback(&self.key);
        }
    }
}

impl std::fmt::Debug for FailureRecovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureRecovery")
            .field("key", &self.key)
            .field("node", &self.node)
            .field("recovered", &self.is_recovered())
            .finish()
    }
}

/// Vec-backed [`RecoveryStack`] for pipelines without one of their own.
///
/// # Examples
///
/// ```
/// use ferrous_lifetimes::{key_of_type, BuildSession, BuildTracker, NodeStore, RecoveryLog};
/// use std::sync::Arc;
///
/// struct Service;
///
/// let store = Arc::new(NodeStore::new());
/// let tracker = BuildTracker::new(store.clone());
/// let mut session = BuildSession::new();
/// let mut recoveries = RecoveryLog::new();
///
/// tracker.on_pre_build(&mut session, key_of_type::<Service>(), &mut recoveries);
/// // The constructor failed: undo everything registered for this attempt.
/// assert_eq!(recoveries.run_all_reverse(), 1);
/// assert!(!session.is_building());
/// assert!(store.is_empty());
/// ```
#[derive(Default)]
pub struct RecoveryLog {
    actions: Vec<Box<dyn Recover>>,
}

impl RecoveryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Runs every action, most recent first. Returns how many ran.
    pub fn run_all_reverse(&mut self) -> usize {
        let mut ran = 0;
        while let Some(action) = self.actions.pop() {
            action.recover();
            ran += 1;
        }
        ran
    }

    /// Position to roll back to when a nested attempt fails.
    pub fn mark(&self) -> usize {
        self.actions.len()
    }

    /// Runs the actions registered after `mark`, most recent first, leaving
    /// earlier ones in place. Returns how many ran.
    pub fn rollback_to(&mut self, mark: usize) -> usize {
        let mut ran = 0;
        while self.actions.len() > mark {
            if let Some(action) = self.actions.pop() {
                action.recover();
                ran += 1;
            }
        }
        ran
    }

    /// Forgets every action; used when the attempt succeeded.
    pub fn discard(&mut self) {
        self.actions.clear();
    }
}

impl RecoveryStack for RecoveryLog {
    fn add_recovery(&mut self, recovery: Box<dyn Recover>) {
        self.actions.push(recovery);
    }
}

impl std::fmt::Debug for RecoveryLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryLog")
            .field("actions", &self.actions.len())
            .finish()
    }
}
