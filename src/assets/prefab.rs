use std::sync::Arc;

use glam::Affine3A;

use crate::errors::SceneError;
use crate::resources::mesh::Mesh;
use crate::scene::transform::Transform;

/// Prefab node: data only, children referenced by index.
#[derive(Debug, Clone)]
pub struct PrefabNode {
    pub name: Option<String>,
    pub transform: Transform,
    /// Indices of child nodes in `Prefab::nodes`
    pub children_indices: Vec<usize>,
    pub mesh: Option<Mesh>,
    /// Skeleton index in `Prefab::skeletons`
    pub skin_index: Option<usize>,
}

impl PrefabNode {
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: None,
            transform: Transform::new(),
            children_indices: Vec::new(),
            mesh: None,
            skin_index: None,
        }
    }

    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new()
        }
    }

    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    #[must_use]
    pub fn with_mesh(mut self, mesh: Mesh) -> Self {
        self.mesh = Some(mesh);
        self
    }

    #[must_use]
    pub fn with_skin(mut self, skin_index: usize) -> Self {
        self.skin_index = Some(skin_index);
        self
    }
}

impl Default for PrefabNode {
    fn default() -> Self {
        Self::new()
    }
}

/// Skeleton data inside a prefab.
#[derive(Debug, Clone)]
pub struct PrefabSkeleton {
    pub name: String,
    /// Index of the root bone within `bone_indices`
    pub root_bone_index: usize,
    /// Bone node indices (into `Prefab::nodes`), in joint order
    pub bone_indices: Vec<usize>,
    pub inverse_bind_matrices: Vec<Affine3A>,
}

/// Prefab: the intermediate data parsed from a model file.
///
/// Thread-safe plain data with no `NodeHandle` or `Scene` references.
/// `Scene::instantiate()` turns it into live scene nodes; a prefab is never
/// mutated after loading, so any number of instances can share one.
#[derive(Debug, Clone, Default)]
pub struct Prefab {
    /// Where the prefab was loaded from (empty for in-memory prefabs)
    pub source: String,
    /// All nodes, stored flat
    pub nodes: Vec<PrefabNode>,
    /// Indices of the top-level nodes
    pub root_indices: Vec<usize>,
    pub skeletons: Vec<PrefabSkeleton>,
}

impl Prefab {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a node and returns its index.
    pub fn add_node(&mut self, node: PrefabNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Appends a node as a top-level node.
    pub fn add_root(&mut self, node: PrefabNode) -> usize {
        let index = self.add_node(node);
        self.root_indices.push(index);
        index
    }

    /// Appends a node under `parent`.
    pub fn add_child(&mut self, parent: usize, node: PrefabNode) -> Result<usize, SceneError> {
        if parent >= self.nodes.len() {
            return Err(SceneError::PrefabIndexOutOfBounds {
                context: "parent node",
                index: parent,
            });
        }
        let index = self.add_node(node);
        self.nodes[parent].children_indices.push(index);
        Ok(index)
    }

    pub fn add_skeleton(&mut self, skeleton: PrefabSkeleton) -> usize {
        self.skeletons.push(skeleton);
        self.skeletons.len() - 1
    }

    /// Number of nodes carrying a skinned mesh.
    #[must_use]
    pub fn skinned_mesh_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.mesh.is_some() && n.skin_index.is_some())
            .count()
    }

    /// Checks every internal index so instantiation can't fail halfway.
    pub fn validate(&self) -> Result<(), SceneError> {
        let node_count = self.nodes.len();
        let check_node = |context: &'static str, index: usize| {
            if index < node_count {
                Ok(())
            } else {
                Err(SceneError::PrefabIndexOutOfBounds { context, index })
            }
        };

        for &root in &self.root_indices {
            check_node("root node", root)?;
        }

        for node in &self.nodes {
            for &child in &node.children_indices {
                check_node("child node", child)?;
            }
            if let Some(skin) = node.skin_index
                && skin >= self.skeletons.len()
            {
                return Err(SceneError::PrefabIndexOutOfBounds {
                    context: "skin",
                    index: skin,
                });
            }
        }

        for skeleton in &self.skeletons {
            for &bone in &skeleton.bone_indices {
                check_node("bone node", bone)?;
            }
            if skeleton.bone_indices.len() != skeleton.inverse_bind_matrices.len() {
                return Err(SceneError::SkeletonMismatch {
                    name: skeleton.name.clone(),
                    bones: skeleton.bone_indices.len(),
                    matrices: skeleton.inverse_bind_matrices.len(),
                });
            }
        }

        Ok(())
    }
}

/// Thread-safe prefab reference.
pub type SharedPrefab = Arc<Prefab>;
