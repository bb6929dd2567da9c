//! World-matrix propagation.
//!
//! Decoupled from [`Scene`](crate::scene::Scene) so it only borrows the node
//! storage. Uses an explicit stack instead of recursion; rigs exported from
//! DCC tools can be deep.

use glam::Affine3A;
use slotmap::SlotMap;

use crate::scene::NodeHandle;
use crate::scene::node::Node;

/// Updates world matrices for every tree under `roots`.
pub fn update_hierarchy_iterative(nodes: &mut SlotMap<NodeHandle, Node>, roots: &[NodeHandle]) {
    let mut stack: Vec<(NodeHandle, Affine3A, bool)> = Vec::with_capacity(64);

    for &root_handle in roots.iter().rev() {
        stack.push((root_handle, Affine3A::IDENTITY, false));
    }

    propagate(nodes, &mut stack);
}

/// Updates the subtree under `root_handle`, using its parent's current world matrix.
pub fn update_subtree(nodes: &mut SlotMap<NodeHandle, Node>, root_handle: NodeHandle) {
    let Some(node) = nodes.get(root_handle) else {
        return;
    };
    let parent_world = node
        .parent
        .and_then(|p| nodes.get(p))
        .map_or(Affine3A::IDENTITY, |p| p.transform.world_matrix);

    let mut stack = vec![(root_handle, parent_world, true)];
    propagate(nodes, &mut stack);
}

fn propagate(
    nodes: &mut SlotMap<NodeHandle, Node>,
    stack: &mut Vec<(NodeHandle, Affine3A, bool)>,
) {
    while let Some((node_handle, parent_world_matrix, parent_changed)) = stack.pop() {
        let Some(node) = nodes.get_mut(node_handle) else {
            continue;
        };

        let local_changed = node.transform.update_local_matrix();
        let world_needs_update = local_changed || parent_changed;

        if world_needs_update {
            let new_world = parent_world_matrix * *node.transform.local_matrix();
            node.transform.set_world_matrix(new_world);
        }

        let current_world = node.transform.world_matrix;
        for &child_handle in node.children.iter().rev() {
            stack.push((child_handle, current_world, world_needs_update));
        }
    }
}
