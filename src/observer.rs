//! Observers for tracker events.
//!
//! Hooks are called synchronously on the building or tearing-down thread, never
//! with a store lock held. Keep implementations cheap.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::{DisposeError, Key};

/// Observer of build-tree events.
///
/// Every hook has an empty default so implementations override only what they
/// need.
///
/// # Examples
///
/// ```
/// use ferrous_lifetimes::{BuildTracker, Key, NodeStore, TrackerObserver};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct DisposalCounter(AtomicUsize);
///
/// impl TrackerObserver for DisposalCounter {
///     fn instance_disposed(&self, _key: &Key) {
///         self.0.fetch_add(1, Ordering::Relaxed);
///     }
/// }
///
/// let counter = Arc::new(DisposalCounter::default());
/// let tracker = BuildTracker::new(Arc::new(NodeStore::new()))
///     .with_observer(counter.clone());
/// ```
pub trait TrackerObserver: Send + Sync {
    /// A post-build attached an instance to its node.
    fn node_completed(&self, _key: &Key, _created_by_container: bool) {}

    /// A failure recovery removed a node and its subtree.
    fn node_rolled_back(&self, _key: &Key) {}

    /// A tracked instance was disposed.
    fn instance_disposed(&self, _key: &Key) {}

    /// A node owned by the lifetime registry was skipped with its subtree.
    fn promoted_skipped(&self, _key: &Key) {}

    /// A tracked instance failed to dispose.
    fn disposal_failed(&self, _key: &Key, _error: &DisposeError) {}

    /// Dead roots were dropped from the store.
    fn trees_pruned(&self, _count: usize) {}
}

#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn TrackerObserver>>,
}

impl Observers {
    pub(crate) fn add(&mut self, observer: Arc<dyn TrackerObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    #[inline]
    pub(crate) fn node_completed(&self, key: &Key, created_by_container: bool) {
        for observer in &self.observers {
            observer.node_completed(key, created_by_container);
        }
    }

    #[inline]
    pub(crate) fn node_rolled_back(&self, key: &Key) {
        for observer in &self.observers {
            observer.node_rolled_back(key);
        }
    }

    #[inline]
    pub(crate) fn instance_disposed(&self, key: &Key) {
        for observer in &self.observers {
            observer.instance_disposed(key);
        }
    }

    #[inline]
    pub(crate) fn promoted_skipped(&self, key: &Key) {
        for observer in &self.observers {
            observer.promoted_skipped(key);
        }
    }

    #[inline]
    pub(crate) fn disposal_failed(&self, key: &Key, error: &DisposeError) {
        for observer in &self.observers {
            observer.disposal_failed(key, error);
        }
    }

    #[inline]
    pub(crate) fn trees_pruned(&self, count: usize) {
        if count == 0 {
            return;
        }
        for observer in &self.observers {
            observer.trees_pruned(count);
        }
    }
}

/// Built-in observer that forwards every event to `tracing`.
///
/// The library already logs at debug level; this observer logs at info level
/// with a caller-chosen prefix, which is handy while diagnosing one container.
pub struct LoggingObserver {
    prefix: String,
}

impl LoggingObserver {
    pub fn new() -> Self {
        Self { prefix: "[ferrous-lifetimes]".to_string() }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackerObserver for LoggingObserver {
    fn node_completed(&self, key: &Key, created_by_container: bool) {
        tracing::info!(prefix = %self.prefix, key = %key, created_by_container, "build completed");
    }

    fn node_rolled_back(&self, key: &Key) {
        tracing::info!(prefix = %self.prefix, key = %key, "build rolled back");
    }

    fn instance_disposed(&self, key: &Key) {
        tracing::info!(prefix = %self.prefix, key = %key, "instance disposed");
    }

    fn promoted_skipped(&self, key: &Key) {
        tracing::info!(prefix = %self.prefix, key = %key, "promoted instance left to its lifetime owner");
    }

    fn disposal_failed(&self, key: &Key, error: &DisposeError) {
        tracing::error!(prefix = %self.prefix, key = %key, error = %error, "disposal failed");
    }

    fn trees_pruned(&self, count: usize) {
        tracing::info!(prefix = %self.prefix, count, "collected trees pruned");
    }
}

/// Counting observer for tests and health endpoints.
#[derive(Default)]
pub struct MetricsObserver {
    completed: AtomicU64,
    rolled_back: AtomicU64,
    disposed: AtomicU64,
    skipped: AtomicU64,
    failures: AtomicU64,
    pruned: AtomicU64,
}

impl MetricsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completed_count(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn rolled_back_count(&self) -> u64 {
        self.rolled_back.load(Ordering::Relaxed)
    }

    pub fn disposed_count(&self) -> u64 {
        self.disposed.load(Ordering::Relaxed)
    }

    pub fn skipped_count(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn pruned_count(&self) -> u64 {
        self.pruned.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        for counter in [
            &self.completed,
            &self.rolled_back,
            &self.disposed,
            &self.skipped,
            &self.failures,
            &self.pruned,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl TrackerObserver for MetricsObserver {
    fn node_completed(&self, _key: &Key, _created_by_container: bool) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    fn node_rolled_back(&self, _key: &Key) {
        self.rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    fn instance_disposed(&self, _key: &Key) {
        self.disposed.fetch_add(1, Ordering::Relaxed);
    }

    fn promoted_skipped(&self, _key: &Key) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    fn disposal_failed(&self, _key: &Key, _error: &DisposeError) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    fn trees_pruned(&self, count: usize) {
        self.pruned.fetch_add(count as u64, Ordering::Relaxed);
    }
}
