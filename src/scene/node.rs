use glam::Affine3A;

use crate::scene::NodeHandle;
use crate::scene::transform::Transform;

/// A minimal scene node containing only hierarchy and transform.
///
/// Names, meshes and skin bindings live in the [`Scene`](crate::scene::Scene)
/// component maps keyed by the node's handle, so a bone is simply a node that
/// some [`Skeleton`](crate::scene::Skeleton) lists.
#[derive(Debug, Clone)]
pub struct Node {
    /// Parent node handle (None for root nodes)
    pub(crate) parent: Option<NodeHandle>,
    /// Child node handles, in insertion order
    pub(crate) children: Vec<NodeHandle>,

    pub transform: Transform,

    pub visible: bool,
}

impl Node {
    #[must_use]
    pub fn new() -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            transform: Transform::new(),
            visible: true,
        }
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> &Affine3A {
        &self.transform.world_matrix
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}
