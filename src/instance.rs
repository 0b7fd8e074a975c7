//! Type-erased instance handles.
//!
//! The pipeline hands built objects to the tracker as [`Instance`] values. The
//! tracker only ever keeps a [`WeakInstance`], so it can never be the reason an
//! object stays alive.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::traits::Dispose;

pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;
type AnyWeak = Weak<dyn Any + Send + Sync>;

/// Identity of an instance: the address of its shared allocation.
///
/// Two handles have the same id exactly when they point at the same object.
/// Ids of dropped objects may be reused, which is why lookups also require the
/// weak reference to still resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(usize);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A strong, type-erased handle to a built object.
///
/// `Instance::disposable` records the [`Dispose`] capability alongside the
/// value. Both views share one allocation, so cloning or dropping the handle
/// only touches reference counts.
///
/// # Examples
///
/// ```
/// use ferrous_lifetimes::Instance;
/// use std::sync::Arc;
///
/// struct Config { port: u16 }
///
/// let config = Arc::new(Config { port: 8080 });
/// let instance = Instance::new(config.clone());
///
/// assert!(instance.is::<Config>());
/// assert!(!instance.is_disposable());
/// assert!(instance.same_as(&Instance::new(config)));
/// assert_eq!(instance.downcast::<Config>().unwrap().port, 8080);
/// ```
#[derive(Clone)]
pub struct Instance {
    value: AnyArc,
    disposer: Option<Arc<dyn Dispose>>,
}

impl Instance {
    /// Wraps an object that has nothing to release.
    pub fn new<T: Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self { value, disposer: None }
    }

    /// Wraps an object carrying the [`Dispose`] capability.
    pub fn disposable<T: Dispose>(value: Arc<T>) -> Self {
        let disposer: Arc<dyn Dispose> = value.clone();
        Self { value, disposer: Some(disposer) }
    }

    /// Identity of the wrapped object.
    #[inline]
    pub fn id(&self) -> InstanceId {
        InstanceId(Arc::as_ptr(&self.value) as *const () as usize)
    }

    /// True when both handles wrap the same object.
    #[inline]
    pub fn same_as(&self, other: &Instance) -> bool {
        self.id() == other.id()
    }

    /// True when the wrapped object is a `T`.
    pub fn is<T: Send + Sync + 'static>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Recovers the concrete type.
    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.value.clone().downcast::<T>().ok()
    }

    /// True when the object opted into disposal.
    pub fn is_disposable(&self) -> bool {
        self.disposer.is_some()
    }

    pub(crate) fn disposer(&self) -> Option<&Arc<dyn Dispose>> {
        self.disposer.as_ref()
    }

    /// Creates a non-owning reference to the same object.
    pub fn downgrade(&self) -> WeakInstance {
        WeakInstance {
            id: self.id(),
            value: Arc::downgrade(&self.value),
            disposer: self.disposer.as_ref().map(Arc::downgrade),
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id())
            .field("disposable", &self.is_disposable())
            .finish()
    }
}

impl<T: Send + Sync + 'static> From<Arc<T>> for Instance {
    fn from(value: Arc<T>) -> Self {
        Instance::new(value)
    }
}

/// A non-owning reference to a built object.
#[derive(Clone)]
pub struct WeakInstance {
    id: InstanceId,
    value: AnyWeak,
    disposer: Option<Weak<dyn Dispose>>,
}

impl WeakInstance {
    /// Identity captured when the reference was created.
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// True while some strong handle still keeps the object alive.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.value.strong_count() > 0
    }

    /// True when this reference still resolves to `instance`.
    #[inline]
    pub fn refers_to(&self, instance: &Instance) -> bool {
        self.id == instance.id() && self.is_alive()
    }

    /// Like [`refers_to`](Self::refers_to), keyed by identity alone.
    #[inline]
    pub(crate) fn refers_to_id(&self, id: InstanceId) -> bool {
        self.id == id && self.is_alive()
    }

    /// Temporarily recovers a strong handle.
    pub fn upgrade(&self) -> Option<Instance> {
        let value = self.value.upgrade()?;
        let disposer = match &self.disposer {
            Some(weak) => Some(weak.upgrade()?),
            None => None,
        };
        Some(Instance { value, disposer })
    }
}

impl fmt::Debug for WeakInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakInstance")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DisposeError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Pool {
        released: AtomicUsize,
    }

    impl Dispose for Pool {
        fn dispose(&self) -> Result<(), DisposeError> {
            self.released.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn weak_reference_does_not_extend_lifetime() {
        let instance = Instance::new(Arc::new(String::from("payload")));
        let weak = instance.downgrade();
        assert!(weak.is_alive());
        assert!(weak.refers_to(&instance));

        drop(instance);
        assert!(!weak.is_alive());
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn disposable_capability_survives_downgrade() {
        let pool = Arc::new(Pool { released: AtomicUsize::new(0) });
        let instance = Instance::disposable(pool.clone());
        let weak = instance.downgrade();

        let upgraded = weak.upgrade().expect("still alive");
        upgraded.disposer().unwrap().dispose().unwrap();
        assert_eq!(pool.released.load(Ordering::SeqCst), 1);
        assert!(upgraded.same_as(&instance));
    }

    #[test]
    fn distinct_objects_have_distinct_ids() {
        let a = Instance::new(Arc::new(1u32));
        let b = Instance::new(Arc::new(1u32));
        assert!(!a.same_as(&b));
        assert!(a.same_as(&a.clone()));
    }

    #[test]
    fn downcast_to_wrong_type_fails() {
        let instance = Instance::new(Arc::new(7u64));
        assert!(instance.downcast::<u32>().is_none());
        assert_eq!(*instance.downcast::<u64>().unwrap(), 7);
    }
}
