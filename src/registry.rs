//! Node registration and enumeration for the device description.

use heapless::Vec;

use crate::error::{HomieError, ValidationError};
use crate::node::{NodeDescriptor, NodeKind, StateFn};

/// Name of the implicit node every device announces first.
pub const SYSTEM_NODE: &str = "system";

/// Handle to a registered node, returned by [`NodeRegistry::register`].
///
/// The handle is index-based. Registered nodes are never removed or
/// reordered, so a handle stays valid for the life of its registry and can
/// be used from other tasks to push values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeRef(pub(crate) usize);

/// Ordered registry of the nodes a device publishes.
///
/// The registry owns its descriptors and preserves registration order,
/// which defines announcement order, enumeration order and handle indices.
///
/// # Example
///
/// ```ignore
/// let mut registry = NodeRegistry::<8>::new();
/// let relay = registry.register("relay0", NodeKind::Switch, None)?;
/// let temp = registry.register("temp", NodeKind::Float, Some(read_temp))?;
/// ```
#[derive(Default)]
pub struct NodeRegistry<const MAX_NODES: usize> {
    nodes: Vec<NodeDescriptor, MAX_NODES>,
}

impl<const MAX_NODES: usize> NodeRegistry<MAX_NODES> {
    /// Creates an empty node registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a node and returns a handle for later value pushes.
    ///
    /// Names must be non-empty, free of `/` and unique within the registry.
    /// Fails with [`HomieError::RegistryFull`] once `MAX_NODES` nodes are
    /// registered.
    pub fn register(
        &mut self,
        name: &str,
        kind: NodeKind,
        provide_state: Option<StateFn>,
    ) -> Result<NodeRef, HomieError> {
        if self.nodes.iter().any(|n| n.name() == name) {
            return Err(ValidationError::DuplicateName.into());
        }
        let descriptor = NodeDescriptor::new(name, kind, provide_state)?;
        self.nodes
            .push(descriptor)
            .map_err(|_| HomieError::RegistryFull)?;
        Ok(NodeRef(self.nodes.len() - 1))
    }

    /// Number of registered nodes, not counting the implicit `system` node.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Checks if no nodes have been registered.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates descriptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &NodeDescriptor> {
        self.nodes.iter()
    }

    /// Iterates the announced node names: the implicit `system` node first,
    /// then registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        core::iter::once(SYSTEM_NODE).chain(self.nodes.iter().map(|n| n.name()))
    }

    /// Looks up a node by handle index.
    pub fn node_by_index(&self, index: usize) -> Result<&NodeDescriptor, HomieError> {
        self.nodes.get(index).ok_or(HomieError::NotFound)
    }

    /// Looks up a node by name.
    pub fn node_by_name(&self, name: &str) -> Result<&NodeDescriptor, HomieError> {
        self.nodes
            .iter()
            .find(|n| n.name() == name)
            .ok_or(HomieError::NotFound)
    }
}
