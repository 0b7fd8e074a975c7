//! Read-only views of tracked build trees.
//!
//! Snapshots copy the structure of a tree at one point in time. They hold weak
//! references only, so keeping a snapshot around never keeps an object alive.

use std::fmt;

use crate::instance::{Instance, InstanceId, WeakInstance};
use crate::node::{BuildNode, NodeId, NodeState};
use crate::tree::BuildTree;
use crate::Key;

/// One node of a [`TreeSnapshot`].
#[derive(Debug, Clone)]
pub struct NodeSnapshot {
    pub key: Key,
    pub state: NodeState,
    pub created_by_container: bool,
    pub instance_id: Option<InstanceId>,
    /// Whether the object was alive when the snapshot was taken.
    pub alive: bool,
    pub children: Vec<NodeSnapshot>,
    instance: Option<WeakInstance>,
}

impl NodeSnapshot {
    fn capture(tree: &BuildTree, id: NodeId) -> Option<Self> {
        let node: &BuildNode = tree.get(id)?;
        Some(Self {
            key: node.key().clone(),
            state: node.state(),
            created_by_container: node.created_by_container(),
            instance_id: node.instance_id(),
            alive: node.is_alive(),
            children: node
                .children()
                .iter()
                .filter_map(|child| Self::capture(tree, *child))
                .collect(),
            instance: node.weak_instance().cloned(),
        })
    }

    /// Strong handle to the object, if it is still alive now.
    pub fn instance(&self) -> Option<Instance> {
        self.instance.as_ref().and_then(WeakInstance::upgrade)
    }

    /// Keys of the direct children, in construction order.
    pub fn child_keys(&self) -> Vec<&Key> {
        self.children.iter().map(|child| &child.key).collect()
    }

    fn count(&self) -> usize {
        1 + self.children.iter().map(NodeSnapshot::count).sum::<usize>()
    }

    fn find(&self, id: InstanceId) -> Option<&NodeSnapshot> {
        if self.instance_id == Some(id) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let ownership = if self.created_by_container { "created" } else { "external" };
        let liveness = if self.alive { "" } else { ", collected" };
        writeln!(
            f,
            "{:indent$}{} ({}{})",
            "",
            self.key,
            ownership,
            liveness,
            indent = depth * 2
        )?;
        for child in &self.children {
            child.render(f, depth + 1)?;
        }
        Ok(())
    }
}

/// Structure of one completed build tree.
///
/// # Examples
///
/// ```
/// use ferrous_lifetimes::{key_of_type, BuildSession, BuildTracker, Instance, NodeStore, RecoveryLog};
/// use std::sync::Arc;
///
/// struct Service;
///
/// let tracker = BuildTracker::new(Arc::new(NodeStore::new()));
/// let mut session = BuildSession::new();
/// let mut recoveries = RecoveryLog::new();
/// let service = Instance::new(Arc::new(Service));
///
/// tracker.on_pre_build(&mut session, key_of_type::<Service>(), &mut recoveries);
/// tracker.on_post_build(&mut session, &key_of_type::<Service>(), &service, false).unwrap();
/// recoveries.discard();
///
/// let trees = tracker.live_trees();
/// assert_eq!(trees.len(), 1);
/// assert_eq!(trees[0].node_count(), 1);
/// assert!(trees[0].find(service.id()).is_some());
/// ```
#[derive(Debug, Clone)]
pub struct TreeSnapshot {
    pub root: NodeSnapshot,
}

impl TreeSnapshot {
    pub(crate) fn capture(tree: &BuildTree) -> Option<Self> {
        let root = NodeSnapshot::capture(tree, tree.root()?)?;
        Some(Self { root })
    }

    pub fn node_count(&self) -> usize {
        self.root.count()
    }

    /// Locates the node whose object has identity `id`.
    pub fn find(&self, id: InstanceId) -> Option<&NodeSnapshot> {
        self.root.find(id)
    }
}

impl fmt::Display for TreeSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.root.render(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_of_type;
    use std::sync::Arc;

    struct Handler;
    struct Repository;

    #[test]
    fn renders_an_indented_tree() {
        let handler = Instance::new(Arc::new(Handler));
        let repository = Instance::new(Arc::new(Repository));

        let mut tree = BuildTree::new();
        let h = tree.open(key_of_type::<Handler>());
        let r = tree.open(key_of_type::<Repository>());
        tree.get_mut(r).unwrap().assign_instance(&repository).unwrap();
        tree.get_mut(r).unwrap().complete(false);
        tree.close_current();
        tree.get_mut(h).unwrap().assign_instance(&handler).unwrap();
        tree.get_mut(h).unwrap().complete(true);
        tree.close_current();

        let snapshot = TreeSnapshot::capture(&tree).unwrap();
        let rendered = snapshot.to_string();
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("Handler (created)"));
        assert!(lines[1].starts_with("  "));
        assert!(lines[1].ends_with("Repository (external)"));
        assert_eq!(snapshot.root.child_keys(), vec![&key_of_type::<Repository>()]);
    }

    #[test]
    fn snapshot_does_not_keep_objects_alive() {
        let handler = Instance::new(Arc::new(Handler));
        let mut tree = BuildTree::new();
        let h = tree.open(key_of_type::<Handler>());
        tree.get_mut(h).unwrap().assign_instance(&handler).unwrap();

        let snapshot = TreeSnapshot::capture(&tree).unwrap();
        assert!(snapshot.root.instance().is_some());
        drop(handler);
        assert!(snapshot.root.instance().is_none());
    }
}
