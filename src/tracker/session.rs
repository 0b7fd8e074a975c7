//! Per-call-chain build context.

use crate::node::NodeId;
use crate::tree::{BuildTree, TreeHandle};

/// The in-progress chain of one top-level build.
///
/// The construction pipeline creates one session per top-level build call and
/// threads it through its nested resolutions. The innermost unfinished node
/// of the session becomes the parent of the next pre-build. Sessions are never
/// shared between unrelated builds, so concurrent builds on different threads
/// do not interact until their roots reach the [`NodeStore`](crate::NodeStore).
#[derive(Default)]
pub struct BuildSession {
    tree: Option<TreeHandle>,
}

impl BuildSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Node that the next pre-build will be attached under.
    pub fn current_node(&self) -> Option<NodeId> {
        self.tree.as_ref().and_then(|tree| tree.lock().current())
    }

    /// True between the outermost pre-build and its post-build or rollback.
    pub fn is_building(&self) -> bool {
        self.tree.as_ref().is_some_and(|tree| tree.lock().is_building())
    }

    /// Tree that the next pre-build joins, starting a fresh one when nothing
    /// is in progress.
    pub(crate) fn tree_for_pre_build(&mut self) -> TreeHandle {
        if let Some(tree) = self.building_tree() {
            return tree;
        }
        let tree = BuildTree::new().shared();
        self.tree = Some(tree.clone());
        tree
    }

    /// Tree with an unmatched pre-build, if any.
    pub(crate) fn building_tree(&self) -> Option<TreeHandle> {
        self.tree
            .as_ref()
            .filter(|tree| tree.lock().is_building())
            .cloned()
    }

    /// Forgets the tree once its root has been handed to the store.
    pub(crate) fn finish(&mut self) {
        self.tree = None;
    }
}

impl std::fmt::Debug for BuildSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildSession")
            .field("current_node", &self.current_node())
            .finish()
    }
}
