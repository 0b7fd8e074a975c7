//! Arena-backed build trees.
//!
//! A tree holds every node produced by one top-level build. Nodes refer to each
//! other through generation-checked [`NodeId`]s, so parent links never own
//! anything and detaching a subtree invalidates every handle into it.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::instance::InstanceId;
use crate::node::{BuildNode, NodeId};
use crate::Key;

/// Shared handle to a tree. The store, the building session and pending
/// recoveries all point at the same tree.
pub(crate) type TreeHandle = Arc<Mutex<BuildTree>>;

struct Slot {
    generation: u32,
    node: Option<BuildNode>,
}

#[derive(Default)]
pub(crate) struct BuildTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: Option<NodeId>,
    /// Nodes between pre-build and post-build, outermost first.
    in_progress: Vec<NodeId>,
}

impl BuildTree {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn shared(self) -> TreeHandle {
        Arc::new(Mutex::new(self))
    }

    pub(crate) fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&BuildNode> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut BuildNode> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    pub(crate) fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Innermost node still waiting for its post-build.
    pub(crate) fn current(&self) -> Option<NodeId> {
        self.in_progress.last().copied()
    }

    pub(crate) fn is_building(&self) -> bool {
        !self.in_progress.is_empty()
    }

    /// Opens a provisional node under the current in-progress node, or as the
    /// root when nothing is in progress.
    pub(crate) fn open(&mut self, key: Key) -> NodeId {
        let parent = self.current();
        let id = self.insert(BuildNode::provisional(key, parent));
        match parent {
            Some(parent) => {
                if let Some(node) = self.get_mut(parent) {
                    node.children.push(id);
                }
            }
            None => self.root = Some(id),
        }
        self.in_progress.push(id);
        id
    }

    /// Closes the innermost in-progress node.
    pub(crate) fn close_current(&mut self) -> Option<NodeId> {
        self.in_progress.pop()
    }

    fn insert(&mut self, node: BuildNode) -> NodeId {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeId { index, generation: slot.generation }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot { generation: 0, node: Some(node) });
                NodeId { index, generation: 0 }
            }
        }
    }

    /// Removes `id` and its whole subtree, unlinking it from its parent.
    ///
    /// The node and anything opened after it leave the in-progress chain.
    /// Returns false when the handle is already stale.
    pub(crate) fn detach(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.get(id).map(|node| node.parent) else {
            return false;
        };

        if let Some(node) = parent.and_then(|p| self.get_mut(p)) {
            node.children.retain(|child| *child != id);
        }
        if self.root == Some(id) {
            self.root = None;
        }

        if let Some(pos) = self.in_progress.iter().position(|n| *n == id) {
            self.in_progress.truncate(pos);
        }

        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            let slot = &mut self.slots[next.index as usize];
            if let Some(node) = slot.node.take() {
                pending.extend(node.children.iter().copied());
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(next.index);
            }
        }
        true
    }

    /// True when some node's weak reference resolves to `instance`.
    pub(crate) fn contains_instance(&self, instance: InstanceId) -> bool {
        self.nodes().any(|node| {
            node.weak_instance()
                .is_some_and(|weak| weak.refers_to_id(instance))
        })
    }

    /// False once the root's object has been dropped, or when the tree lost
    /// its root.
    pub(crate) fn root_alive(&self) -> bool {
        self.root
            .and_then(|root| self.get(root))
            .is_some_and(BuildNode::is_alive)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes().count()
    }

    fn nodes(&self) -> impl Iterator<Item = &BuildNode> {
        self.slots.iter().filter_map(|slot| slot.node.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{key_of_type, Instance};

    struct A;
    struct B;
    struct C;

    #[test]
    fn open_links_children_in_order() {
        let mut tree = BuildTree::new();
        let a = tree.open(key_of_type::<A>());
        let b = tree.open(key_of_type::<B>());
        tree.close_current();
        let c = tree.open(key_of_type::<C>());
        tree.close_current();
        tree.close_current();

        assert_eq!(tree.root(), Some(a));
        assert_eq!(tree.get(a).unwrap().children(), &[b, c]);
        assert_eq!(tree.get(c).unwrap().parent(), Some(a));
        assert!(!tree.is_building());
    }

    #[test]
    fn detach_invalidates_the_subtree() {
        let mut tree = BuildTree::new();
        let a = tree.open(key_of_type::<A>());
        let b = tree.open(key_of_type::<B>());
        let c = tree.open(key_of_type::<C>());

        assert!(tree.detach(b));
        assert!(!tree.contains(b));
        assert!(!tree.contains(c));
        assert!(tree.get(a).unwrap().children().is_empty());
        assert_eq!(tree.current(), Some(a));
        assert_eq!(tree.len(), 1);

        // Stale handles stay stale after the slot is reused.
        let reused = tree.open(key_of_type::<B>());
        assert_eq!(reused.index, c.index);
        assert_ne!(reused, c);
        assert!(tree.contains(reused));
        assert!(!tree.detach(c));
    }

    #[test]
    fn detaching_the_root_empties_the_tree() {
        let mut tree = BuildTree::new();
        let a = tree.open(key_of_type::<A>());
        tree.open(key_of_type::<B>());

        assert!(tree.detach(a));
        assert!(tree.is_empty());
        assert!(!tree.is_building());
        assert_eq!(tree.len(), 0);
    }

    #[test]
    fn instance_lookup_requires_a_live_object() {
        let mut tree = BuildTree::new();
        let a = tree.open(key_of_type::<A>());
        let instance = Instance::new(std::sync::Arc::new(A));
        tree.get_mut(a).unwrap().assign_instance(&instance).unwrap();

        assert!(tree.contains_instance(instance.id()));
        assert!(tree.root_alive());

        let id = instance.id();
        drop(instance);
        assert!(!tree.contains_instance(id));
        assert!(!tree.root_alive());
    }
}
