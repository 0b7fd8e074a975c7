//! Disposal walk over a detached build tree.

use crate::error::DisposalFailure;
use crate::internal::dispose_guarded;
use crate::node::NodeId;
use crate::tree::{BuildTree, TreeHandle};
use crate::{DisposeError, Instance, Key};

use super::BuildTracker;

/// Pre-order copy of a tree taken under its lock, so the walk itself runs
/// user code with no lock held.
struct PlanEntry {
    key: Key,
    instance: Option<Instance>,
    created_by_container: bool,
    children: Vec<usize>,
}

fn plan(tree: &BuildTree) -> Vec<PlanEntry> {
    let mut entries: Vec<PlanEntry> = Vec::with_capacity(tree.len());
    let Some(root) = tree.root() else {
        return entries;
    };

    // (node, index of the parent entry)
    let mut pending: Vec<(NodeId, Option<usize>)> = vec![(root, None)];
    while let Some((id, parent)) = pending.pop() {
        let Some(node) = tree.get(id) else { continue };
        let index = entries.len();
        entries.push(PlanEntry {
            key: node.key().clone(),
            instance: node.instance(),
            created_by_container: node.created_by_container(),
            children: Vec::with_capacity(node.children().len()),
        });
        if let Some(parent) = parent {
            let siblings: &mut Vec<usize> = &mut entries[parent].children;
            siblings.push(index);
        }
        pending.extend(node.children().iter().rev().map(|child| (*child, Some(index))));
    }
    entries
}

impl BuildTracker {
    /// Disposes what the container created in `tree`, skipping subtrees owned
    /// by the lifetime registry. Failures are collected, never short-circuit.
    ///
    /// The tree is emptied before the walk, so pending recoveries that still
    /// point into it find stale handles and dispose nothing.
    pub(crate) fn dispose_tree(&self, tree: &TreeHandle) -> Vec<DisposalFailure> {
        let plan = {
            let mut guard = tree.lock();
            let plan = plan(&guard);
            if let Some(root) = guard.root() {
                guard.detach(root);
            }
            plan
        };
        let mut failures = Vec::new();
        if plan.is_empty() {
            return failures;
        }

        let mut pending = vec![0usize];
        while let Some(index) = pending.pop() {
            let entry = &plan[index];
            if let Some(instance) = &entry.instance {
                if self.registry.owns(instance) {
                    tracing::trace!(key = %entry.key, "skipping subtree owned by lifetime registry");
                    self.observers.promoted_skipped(&entry.key);
                    continue;
                }
                if entry.created_by_container {
                    self.dispose_one(&entry.key, instance, &mut failures);
                }
            }
            pending.extend(entry.children.iter().rev().copied());
        }
        failures
    }

    fn dispose_one(&self, key: &Key, instance: &Instance, failures: &mut Vec<DisposalFailure>) {
        let Some(disposer) = instance.disposer() else {
            return;
        };
        match dispose_guarded(disposer.as_ref()) {
            Ok(()) => {
                tracing::trace!(key = %key, "disposed");
                self.observers.instance_disposed(key);
            }
            Err(DisposeError::AlreadyDisposed) => {
                tracing::trace!(key = %key, "already disposed");
            }
            Err(error) => {
                tracing::warn!(key = %key, error = %error, "disposal failed, continuing walk");
                self.observers.disposal_failed(key, &error);
                failures.push(DisposalFailure { key: key.clone(), error });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_of_type;

    struct A;
    struct B;
    struct C;
    struct D;

    #[test]
    fn plan_is_pre_order_in_construction_order() {
        let mut tree = BuildTree::new();
        tree.open(key_of_type::<A>());
        tree.open(key_of_type::<B>());
        tree.open(key_of_type::<C>());
        tree.close_current();
        tree.close_current();
        tree.open(key_of_type::<D>());

        let entries = plan(&tree);
        let keys: Vec<&Key> = entries.iter().map(|e| &e.key).collect();
        assert_eq!(
            keys,
            vec![&key_of_type::<A>(), &key_of_type::<B>(), &key_of_type::<C>(), &key_of_type::<D>()]
        );
        assert_eq!(entries[0].children, vec![1, 3]);
        assert_eq!(entries[1].children, vec![2]);
    }

    #[test]
    fn plan_of_empty_tree_is_empty() {
        assert!(plan(&BuildTree::new()).is_empty());
    }
}
