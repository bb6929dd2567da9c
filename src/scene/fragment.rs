//! Model instances inside a scene.
//!
//! A [`Fragment`] is what [`Scene::instantiate`] produces from a
//! [`Prefab`]: a fresh node subtree with its own geometry, materials and
//! skeletons. Nothing in a fragment aliases the prefab or any other fragment,
//! so editing one instance never leaks into another.

use glam::Affine3A;
use rustc_hash::FxHashMap;

use crate::assets::prefab::Prefab;
use crate::errors::SceneError;
use crate::scene::skeleton::{BindMode, SkinBinding, Skeleton};
use crate::scene::{NodeHandle, Scene, SkeletonKey};

/// A live model instance.
#[derive(Debug, Clone)]
pub struct Fragment {
    /// Group node owning the whole instance.
    pub root: NodeHandle,
    /// Instantiated nodes, in prefab order.
    pub nodes: Vec<NodeHandle>,
    pub(crate) skinned_meshes: Vec<NodeHandle>,
    pub(crate) skeletons: Vec<SkeletonKey>,
}

impl Fragment {
    /// Mesh nodes carrying a skin binding, in discovery order.
    #[must_use]
    pub fn skinned_meshes(&self) -> &[NodeHandle] {
        &self.skinned_meshes
    }

    /// Skeletons created for this instance.
    ///
    /// After rebinding these are gone from the pool; the keys then simply
    /// fail to resolve.
    #[must_use]
    pub fn skeletons(&self) -> &[SkeletonKey] {
        &self.skeletons
    }
}

impl Scene {
    /// Builds a new instance of `prefab` as a scene root.
    ///
    /// The prefab is validated before any node is created, so an error leaves
    /// the scene untouched.
    pub fn instantiate(&mut self, prefab: &Prefab) -> Result<Fragment, SceneError> {
        prefab.validate()?;

        let root_name = if prefab.source.is_empty() {
            "Fragment"
        } else {
            prefab.source.as_str()
        };
        let root = self.create_node_with_name(root_name);
        self.root_nodes.push(root);

        // 1. Nodes with their transforms and deep-copied meshes
        let mut nodes = Vec::with_capacity(prefab.nodes.len());
        for prefab_node in &prefab.nodes {
            let handle = match &prefab_node.name {
                Some(name) => self.create_node_with_name(name),
                None => self.create_node(),
            };
            if let Some(node) = self.get_node_mut(handle) {
                node.transform = prefab_node.transform.clone();
                node.transform.mark_dirty();
            }
            if let Some(mesh) = &prefab_node.mesh {
                self.set_mesh(handle, mesh.duplicate());
            }
            nodes.push(handle);
        }

        // 2. Hierarchy
        for (index, prefab_node) in prefab.nodes.iter().enumerate() {
            for &child in &prefab_node.children_indices {
                self.attach(nodes[child], nodes[index]);
            }
        }
        for &index in &prefab.root_indices {
            self.attach(nodes[index], root);
        }

        // 3. Skeletons (nodes exist now, bones can be referenced)
        let mut skeletons = Vec::with_capacity(prefab.skeletons.len());
        for prefab_skeleton in &prefab.skeletons {
            let bones = prefab_skeleton
                .bone_indices
                .iter()
                .map(|&i| nodes[i])
                .collect();
            let skeleton = Skeleton::new(
                &prefab_skeleton.name,
                bones,
                prefab_skeleton.inverse_bind_matrices.clone(),
                prefab_skeleton.root_bone_index,
            )?;
            skeletons.push(self.add_skeleton(skeleton));
        }

        // 4. Skin bindings
        let mut skinned_meshes = Vec::new();
        for (index, prefab_node) in prefab.nodes.iter().enumerate() {
            if let (Some(_), Some(skin)) = (&prefab_node.mesh, prefab_node.skin_index) {
                let binding = SkinBinding::new(skeletons[skin], BindMode::Attached, Affine3A::IDENTITY);
                self.bind_skeleton(nodes[index], binding)?;
                skinned_meshes.push(nodes[index]);
            }
        }

        log::debug!(
            "Instantiated '{}': {} nodes, {} skinned meshes, {} skeletons",
            root_name,
            nodes.len(),
            skinned_meshes.len(),
            skeletons.len()
        );

        Ok(Fragment {
            root,
            nodes,
            skinned_meshes,
            skeletons,
        })
    }

    /// Copies a live fragment, including whatever state it has reached.
    ///
    /// Skeletons owned by the fragment are duplicated; skin bindings that point
    /// outside it (for example at a base skeleton after rebinding) keep sharing
    /// that skeleton. The copy becomes a scene root.
    pub fn clone_fragment(&mut self, fragment: &Fragment) -> Result<Fragment, SceneError> {
        if !self.contains(fragment.root) {
            return Err(SceneError::StaleNode);
        }

        let source_nodes = self.collect_subtree(fragment.root);
        let mut mapping: FxHashMap<NodeHandle, NodeHandle> = FxHashMap::default();

        for &old in &source_nodes {
            let new = self.create_node();
            if let Some(name) = self.get_name(old).map(str::to_owned) {
                self.set_name(new, &name);
            }
            if let Some(old_node) = self.get_node(old) {
                let mut transform = old_node.transform.clone();
                let visible = old_node.visible;
                transform.mark_dirty();
                if let Some(node) = self.get_node_mut(new) {
                    node.transform = transform;
                    node.visible = visible;
                }
            }
            if let Some(mesh) = self.get_mesh(old).map(crate::resources::Mesh::duplicate) {
                self.set_mesh(new, mesh);
            }
            mapping.insert(old, new);
        }

        for &old in &source_nodes {
            let children = self
                .get_node(old)
                .map(|n| n.children().to_vec())
                .unwrap_or_default();
            for child in children {
                if let (Some(&p), Some(&c)) = (mapping.get(&old), mapping.get(&child)) {
                    self.attach(c, p);
                }
            }
        }

        let remap = |h: &NodeHandle| mapping.get(h).copied().unwrap_or(*h);

        let mut skeleton_mapping: FxHashMap<SkeletonKey, SkeletonKey> = FxHashMap::default();
        let mut skeletons = Vec::with_capacity(fragment.skeletons.len());
        for &old_key in &fragment.skeletons {
            let Some(old) = self.get_skeleton(old_key) else {
                continue;
            };
            let skeleton = Skeleton::new(
                &old.name,
                old.bones().iter().map(remap).collect(),
                old.inverse_bind_matrices().to_vec(),
                old.root_bone_index,
            )?;
            let key = self.add_skeleton(skeleton);
            skeleton_mapping.insert(old_key, key);
            skeletons.push(key);
        }

        let mut skinned_meshes = Vec::new();
        for &old in &source_nodes {
            let Some(binding) = self.get_skin(old).cloned() else {
                continue;
            };
            let key = skeleton_mapping
                .get(&binding.skeleton)
                .copied()
                .unwrap_or(binding.skeleton);
            let new = mapping[&old];
            self.bind_skeleton(new, binding.rebound_to(key))?;
            skinned_meshes.push(new);
        }

        let root = mapping[&fragment.root];
        self.root_nodes.push(root);

        Ok(Fragment {
            root,
            // Nodes outside the root's subtree are not copied.
            nodes: fragment
                .nodes
                .iter()
                .filter_map(|h| mapping.get(h).copied())
                .collect(),
            skinned_meshes,
            skeletons,
        })
    }

    /// Removes a fragment's nodes and any skeleton they used that nothing
    /// else uses anymore.
    ///
    /// Covers the root's subtree plus every instantiated node, including
    /// prefab nodes no root reaches. Skeletons include both those built at
    /// instantiation and whatever the fragment's meshes were rebound to since.
    pub fn release_fragment(&mut self, fragment: &Fragment) {
        let mut keys = fragment.skeletons.clone();
        let owned = self
            .collect_subtree(fragment.root)
            .into_iter()
            .chain(fragment.nodes.iter().copied());
        for node in owned {
            if let Some(binding) = self.get_skin(node)
                && !keys.contains(&binding.skeleton)
            {
                keys.push(binding.skeleton);
            }
        }

        self.remove_node(fragment.root);
        for &node in &fragment.nodes {
            self.remove_node(node);
        }
        for key in keys {
            if !self.is_skeleton_in_use(key) {
                self.remove_skeleton(key);
            }
        }
    }
}
