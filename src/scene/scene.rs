use slotmap::{SecondaryMap, SlotMap};

use crate::errors::SceneError;
use crate::resources::{BoundingBox, Mesh};
use crate::scene::node::Node;
use crate::scene::skeleton::{BindMode, SkinBinding, Skeleton};
use crate::scene::transform_system;
use crate::scene::{NodeHandle, SkeletonKey};

/// Padding applied around bone positions when bounding a skinned mesh;
/// vertices sit some distance away from the joints that drive them.
const SKINNED_BOUNDS_PADDING: f32 = 0.15;

/// Scene graph.
///
/// Pure data: nodes in a slotmap, per-node components in secondary maps and
/// skeletons in a shared pool. A skeleton is stored once and referenced by
/// key from every [`SkinBinding`] that uses it; bones are plain node handles,
/// so a skeleton never owns the nodes it lists.
pub struct Scene {
    pub nodes: SlotMap<NodeHandle, Node>,
    pub root_nodes: Vec<NodeHandle>,

    names: SecondaryMap<NodeHandle, String>,
    meshes: SecondaryMap<NodeHandle, Mesh>,
    skins: SecondaryMap<NodeHandle, SkinBinding>,

    pub skeleton_pool: SlotMap<SkeletonKey, Skeleton>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            root_nodes: Vec::new(),
            names: SecondaryMap::new(),
            meshes: SecondaryMap::new(),
            skins: SecondaryMap::new(),
            skeleton_pool: SlotMap::with_key(),
        }
    }

    // ========================================================================
    // Node lifecycle
    // ========================================================================

    /// Creates a detached node (neither root nor child).
    pub fn create_node(&mut self) -> NodeHandle {
        self.nodes.insert(Node::new())
    }

    pub fn create_node_with_name(&mut self, name: &str) -> NodeHandle {
        let handle = self.create_node();
        self.names.insert(handle, name.to_string());
        handle
    }

    /// Adds a node as a scene root.
    pub fn add_node(&mut self, node: Node) -> NodeHandle {
        let handle = self.nodes.insert(node);
        self.root_nodes.push(handle);
        handle
    }

    /// Removes a node and its whole subtree, including their components.
    ///
    /// Skeletons are shared and therefore not touched here; see
    /// [`Scene::release_fragment`](crate::scene::Scene::release_fragment).
    pub fn remove_node(&mut self, handle: NodeHandle) {
        if !self.nodes.contains_key(handle) {
            return;
        }

        self.unlink(handle);

        for node in self.collect_subtree(handle) {
            self.names.remove(node);
            self.meshes.remove(node);
            self.skins.remove(node);
            self.nodes.remove(node);
        }
    }

    /// Makes `child` a child of `parent`, detaching it from any previous parent.
    pub fn attach(&mut self, child: NodeHandle, parent: NodeHandle) {
        if child == parent {
            log::warn!("Cannot attach node to itself!");
            return;
        }
        if !self.nodes.contains_key(parent) || !self.nodes.contains_key(child) {
            log::error!("Attach called with a stale node handle");
            return;
        }
        if self.is_ancestor(child, parent) {
            log::warn!("Cannot attach a node under its own descendant");
            return;
        }

        self.unlink(child);

        self.nodes[parent].children.push(child);
        let node = &mut self.nodes[child];
        node.parent = Some(parent);
        node.transform.mark_dirty();
    }

    /// Detaches `child` from its parent and makes it a scene root.
    pub fn detach(&mut self, child: NodeHandle) {
        if !self.nodes.contains_key(child) {
            return;
        }
        self.unlink(child);
        self.root_nodes.push(child);
        self.nodes[child].transform.mark_dirty();
    }

    /// Removes `handle` from its parent's child list (or from the root list).
    fn unlink(&mut self, handle: NodeHandle) {
        let parent = self.nodes.get(handle).and_then(|n| n.parent);

        if let Some(parent) = parent {
            if let Some(p) = self.nodes.get_mut(parent) {
                p.children.retain(|&c| c != handle);
            }
        } else {
            self.root_nodes.retain(|&r| r != handle);
        }

        if let Some(node) = self.nodes.get_mut(handle) {
            node.parent = None;
        }
    }

    fn is_ancestor(&self, ancestor: NodeHandle, mut node: NodeHandle) -> bool {
        while let Some(parent) = self.nodes.get(node).and_then(|n| n.parent) {
            if parent == ancestor {
                return true;
            }
            node = parent;
        }
        false
    }

    #[must_use]
    pub fn get_node(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle)
    }

    pub fn get_node_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        self.nodes.get_mut(handle)
    }

    #[must_use]
    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.nodes.contains_key(handle)
    }

    /// Pre-order list of `root` and all of its descendants.
    #[must_use]
    pub fn collect_subtree(&self, root: NodeHandle) -> Vec<NodeHandle> {
        let mut out = Vec::new();
        let mut stack = vec![root];

        while let Some(handle) = stack.pop() {
            let Some(node) = self.nodes.get(handle) else {
                continue;
            };
            out.push(handle);
            stack.extend(node.children.iter().rev());
        }

        out
    }

    /// Depth-first search for the first node called `name` under `root`.
    #[must_use]
    pub fn find_node_by_name(&self, root: NodeHandle, name: &str) -> Option<NodeHandle> {
        self.collect_subtree(root)
            .into_iter()
            .find(|&h| self.get_name(h) == Some(name))
    }

    // ========================================================================
    // Components
    // ========================================================================

    #[must_use]
    pub fn get_name(&self, handle: NodeHandle) -> Option<&str> {
        self.names.get(handle).map(String::as_str)
    }

    pub fn set_name(&mut self, handle: NodeHandle, name: &str) {
        if self.nodes.contains_key(handle) {
            self.names.insert(handle, name.to_string());
        }
    }

    pub fn set_mesh(&mut self, handle: NodeHandle, mesh: Mesh) {
        if self.nodes.contains_key(handle) {
            self.meshes.insert(handle, mesh);
        }
    }

    #[must_use]
    pub fn get_mesh(&self, handle: NodeHandle) -> Option<&Mesh> {
        self.meshes.get(handle)
    }

    pub fn get_mesh_mut(&mut self, handle: NodeHandle) -> Option<&mut Mesh> {
        self.meshes.get_mut(handle)
    }

    /// Binds a mesh node to a pooled skeleton.
    pub fn bind_skeleton(&mut self, handle: NodeHandle, binding: SkinBinding) -> Result<(), SceneError> {
        if !self.nodes.contains_key(handle) {
            return Err(SceneError::StaleNode);
        }
        if !self.skeleton_pool.contains_key(binding.skeleton) {
            return Err(SceneError::StaleSkeleton);
        }
        self.skins.insert(handle, binding);
        Ok(())
    }

    #[must_use]
    pub fn get_skin(&self, handle: NodeHandle) -> Option<&SkinBinding> {
        self.skins.get(handle)
    }

    /// The skeleton a skinned node is currently bound to.
    #[must_use]
    pub fn skeleton_of(&self, handle: NodeHandle) -> Option<&Skeleton> {
        let binding = self.skins.get(handle)?;
        self.skeleton_pool.get(binding.skeleton)
    }

    /// Whether any skin binding still points at `key`.
    #[must_use]
    pub fn is_skeleton_in_use(&self, key: SkeletonKey) -> bool {
        self.skins.values().any(|b| b.skeleton == key)
    }

    pub fn add_skeleton(&mut self, skeleton: Skeleton) -> SkeletonKey {
        self.skeleton_pool.insert(skeleton)
    }

    #[must_use]
    pub fn get_skeleton(&self, key: SkeletonKey) -> Option<&Skeleton> {
        self.skeleton_pool.get(key)
    }

    pub fn remove_skeleton(&mut self, key: SkeletonKey) -> Option<Skeleton> {
        self.skeleton_pool.remove(key)
    }

    /// Number of nodes carrying a mesh.
    #[must_use]
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    // ========================================================================
    // Per-frame update
    // ========================================================================

    /// Propagates world matrices through the whole graph.
    pub fn update_matrix_world(&mut self) {
        transform_system::update_hierarchy_iterative(&mut self.nodes, &self.root_nodes);
    }

    /// Refreshes world matrices for one subtree only.
    pub fn update_subtree(&mut self, root: NodeHandle) {
        transform_system::update_subtree(&mut self.nodes, root);
    }

    /// Recomputes joint matrices for every skeleton referenced by a skin binding.
    pub fn update_skeletons(&mut self) {
        let mut tasks = Vec::new();

        for (handle, binding) in &self.skins {
            let Some(node) = self.nodes.get(handle) else {
                continue;
            };
            let root_inv = match binding.bind_mode {
                BindMode::Attached => node.transform.world_matrix.inverse(),
                BindMode::Detached => binding.bind_matrix_inv,
            };
            tasks.push((binding.skeleton, root_inv));
        }

        let nodes = &self.nodes;
        for (key, root_inv) in tasks {
            if let Some(skeleton) = self.skeleton_pool.get_mut(key) {
                skeleton.compute_joint_matrices(nodes, root_inv);
            }
        }
    }

    /// World matrices first, then skins.
    pub fn update(&mut self) {
        self.update_matrix_world();
        self.update_skeletons();
    }

    // ========================================================================
    // Bounds
    // ========================================================================

    fn bounds_of_one_node(&self, handle: NodeHandle) -> Option<BoundingBox> {
        let node = self.nodes.get(handle)?;
        let mesh = self.meshes.get(handle)?;
        if !mesh.visible || !node.visible {
            return None;
        }

        if let Some(skeleton) = self.skeleton_of(handle) {
            return skeleton
                .compute_tight_world_bounds(&self.nodes)
                .map(|b| b.expand(SKINNED_BOUNDS_PADDING));
        }

        let local = mesh.geometry.compute_bounding_box()?;
        Some(local.transform(&node.transform.world_matrix))
    }

    /// World bounds of every mesh under `root`.
    ///
    /// Reads cached world matrices; call [`Scene::update_matrix_world`] first.
    #[must_use]
    pub fn compute_bounds(&self, root: NodeHandle) -> Option<BoundingBox> {
        self.collect_subtree(root)
            .into_iter()
            .filter_map(|h| self.bounds_of_one_node(h))
            .reduce(|a, b| a.union(&b))
    }
}
