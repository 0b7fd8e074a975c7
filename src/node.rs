//! Build tree nodes.

use std::fmt;

use smallvec::SmallVec;

use crate::instance::{Instance, InstanceId, WeakInstance};
use crate::{Key, TrackerError, TrackerResult};

/// Generation-checked handle to a node inside its build tree.
///
/// Handles go stale once their node is detached: the slot's generation moves
/// on and lookups through the old handle find nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Where a node is in its lifecycle.
///
/// Rolled back, disposed and collected nodes leave their tree, so only the
/// two live states are ever observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Created by pre-build, waiting for its instance.
    Provisional,
    /// Instance attached by post-build.
    Completed,
}

/// One request inside a build tree.
pub struct BuildNode {
    key: Key,
    created_by_container: bool,
    instance: Option<WeakInstance>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: SmallVec<[NodeId; 4]>,
    state: NodeState,
}

impl BuildNode {
    pub(crate) fn provisional(key: Key, parent: Option<NodeId>) -> Self {
        Self {
            key,
            created_by_container: false,
            instance: None,
            parent,
            children: SmallVec::new(),
            state: NodeState::Provisional,
        }
    }

    /// The contract this node was built for.
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// True when the container manufactured the instance during this build.
    pub fn created_by_container(&self) -> bool {
        self.created_by_container
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in construction order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Attaches the built object. The slot can be written once.
    pub(crate) fn assign_instance(&mut self, instance: &Instance) -> TrackerResult<()> {
        if self.instance.is_some() {
            return Err(TrackerError::AlreadyAssigned { key: self.key.clone() });
        }
        self.instance = Some(instance.downgrade());
        Ok(())
    }

    /// True while the attached object is still alive.
    pub fn is_alive(&self) -> bool {
        self.instance.as_ref().is_some_and(WeakInstance::is_alive)
    }

    /// Strong handle to the attached object, if it is still alive.
    pub fn instance(&self) -> Option<Instance> {
        self.instance.as_ref().and_then(WeakInstance::upgrade)
    }

    pub fn instance_id(&self) -> Option<InstanceId> {
        self.instance.as_ref().map(WeakInstance::id)
    }

    pub(crate) fn weak_instance(&self) -> Option<&WeakInstance> {
        self.instance.as_ref()
    }

    pub(crate) fn complete(&mut self, created_by_container: bool) {
        self.created_by_container = created_by_container;
        self.state = NodeState::Completed;
    }
}

impl fmt::Debug for BuildNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildNode")
            .field("key", &self.key)
            .field("state", &self.state)
            .field("created_by_container", &self.created_by_container)
            .field("instance", &self.instance)
            .field("children", &self.children.len())
            .finish()
    }
}
