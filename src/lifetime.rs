//! Longer-lived ownership of built instances.
//!
//! Part of a build tree may be promoted to a longer-lived lifetime manager,
//! typically a singleton cache. From then on that manager, not the tree,
//! decides when the instance is disposed. The tracker asks a
//! [`LifetimeRegistry`] at tear-down time and leaves promoted instances, and
//! everything built beneath them, alone.

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::instance::{Instance, InstanceId};

/// Answers whether a longer-lived lifetime manager currently owns an instance.
///
/// Called once per visited node during tear-down, never with a tracker lock
/// held.
pub trait LifetimeRegistry: Send + Sync {
    fn owns(&self, instance: &Instance) -> bool;
}

/// Registry for containers without promoted lifetimes: owns nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLifetimeRegistry;

impl LifetimeRegistry for NoLifetimeRegistry {
    fn owns(&self, _instance: &Instance) -> bool {
        false
    }
}

/// Explicit set of promoted instances.
///
/// Promoting an instance moves a strong handle into the registry, which keeps
/// the object alive until it is released.
///
/// # Examples
///
/// ```
/// use ferrous_lifetimes::{Instance, LifetimeRegistry, PromotedInstances};
/// use std::sync::Arc;
///
/// struct Cache;
///
/// let registry = PromotedInstances::new();
/// let cache = Instance::new(Arc::new(Cache));
///
/// registry.promote(cache.clone());
/// assert!(registry.owns(&cache));
///
/// let released = registry.release(&cache).unwrap();
/// assert!(released.same_as(&cache));
/// assert!(!registry.owns(&cache));
/// ```
#[derive(Default)]
pub struct PromotedInstances {
    owned: RwLock<AHashMap<InstanceId, Instance>>,
}

impl PromotedInstances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transfers disposal responsibility for `instance` to this registry.
    /// Returns false when it was already promoted.
    pub fn promote(&self, instance: Instance) -> bool {
        self.owned.write().insert(instance.id(), instance).is_none()
    }

    /// Hands responsibility back, returning the registry's handle.
    pub fn release(&self, instance: &Instance) -> Option<Instance> {
        self.owned.write().remove(&instance.id())
    }

    pub fn len(&self) -> usize {
        self.owned.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.owned.read().is_empty()
    }
}

impl LifetimeRegistry for PromotedInstances {
    fn owns(&self, instance: &Instance) -> bool {
        self.owned.read().contains_key(&instance.id())
    }
}

impl std::fmt::Debug for PromotedInstances {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromotedInstances")
            .field("owned", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn empty_registry_owns_nothing() {
        let instance = Instance::new(Arc::new(5u8));
        assert!(!NoLifetimeRegistry.owns(&instance));
    }

    #[test]
    fn promotion_keeps_the_object_alive() {
        let registry = PromotedInstances::new();
        let instance = Instance::new(Arc::new(String::from("shared")));
        let weak = instance.downgrade();

        assert!(registry.promote(instance.clone()));
        assert!(!registry.promote(instance.clone()));
        drop(instance);

        assert!(weak.is_alive());
        assert_eq!(registry.len(), 1);
    }
}
