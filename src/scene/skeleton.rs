use glam::{Affine3A, Mat4, Vec3};
use slotmap::SlotMap;
use uuid::Uuid;

use crate::errors::SceneError;
use crate::resources::BoundingBox;
use crate::scene::{Node, NodeHandle, SkeletonKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindMode {
    /// Bones follow node movement (the usual case for character skinning).
    /// The mesh's own world matrix is cancelled out every frame.
    Attached,
    /// Bones are detached from the mesh node; the inverse bind matrix
    /// snapshot taken at bind time is used instead.
    Detached,
}

/// Links a skinned mesh node to the skeleton that deforms it.
#[derive(Debug, Clone)]
pub struct SkinBinding {
    pub skeleton: SkeletonKey,
    pub bind_mode: BindMode,
    /// Mesh-space to skeleton-space transform at bind time.
    pub bind_matrix: Affine3A,
    /// Cached inverse of `bind_matrix`.
    pub bind_matrix_inv: Affine3A,
}

impl SkinBinding {
    #[must_use]
    pub fn new(skeleton: SkeletonKey, bind_mode: BindMode, bind_matrix: Affine3A) -> Self {
        Self {
            skeleton,
            bind_mode,
            bind_matrix,
            bind_matrix_inv: bind_matrix.inverse(),
        }
    }

    /// Same bind matrix and mode, different skeleton.
    #[must_use]
    pub fn rebound_to(&self, skeleton: SkeletonKey) -> Self {
        Self {
            skeleton,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Skeleton {
    pub id: Uuid,
    pub name: String,

    // bones[i] is joint i as referenced by vertex joint indices.
    pub(crate) bones: Vec<NodeHandle>,

    // Static after load: transforms mesh space into each bone's local space at bind pose.
    pub(crate) inverse_bind_matrices: Vec<Affine3A>,

    pub(crate) root_bone_index: usize,

    // Final per-bone matrices, refreshed by `Scene::update`.
    pub(crate) joint_matrices: Vec<Mat4>,
}

impl Skeleton {
    /// Builds a skeleton; bone and matrix arrays must pair up one to one.
    pub fn new(
        name: &str,
        bones: Vec<NodeHandle>,
        inverse_bind_matrices: Vec<Affine3A>,
        root_bone_index: usize,
    ) -> Result<Self, SceneError> {
        if bones.len() != inverse_bind_matrices.len() {
            return Err(SceneError::SkeletonMismatch {
                name: name.to_string(),
                bones: bones.len(),
                matrices: inverse_bind_matrices.len(),
            });
        }

        let count = bones.len();
        Ok(Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            bones,
            inverse_bind_matrices,
            root_bone_index: root_bone_index.min(count.saturating_sub(1)),
            joint_matrices: vec![Mat4::IDENTITY; count],
        })
    }

    #[inline]
    #[must_use]
    pub fn bones(&self) -> &[NodeHandle] {
        &self.bones
    }

    #[inline]
    #[must_use]
    pub fn inverse_bind_matrices(&self) -> &[Affine3A] {
        &self.inverse_bind_matrices
    }

    #[inline]
    #[must_use]
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    #[must_use]
    pub fn root_bone(&self) -> Option<NodeHandle> {
        self.bones.get(self.root_bone_index).copied()
    }

    #[inline]
    #[must_use]
    pub fn joint_matrices(&self) -> &[Mat4] {
        &self.joint_matrices
    }

    /// Bounds of the current bone positions in world space (no padding).
    /// Used for framing a posed character.
    #[must_use]
    pub fn compute_tight_world_bounds(
        &self,
        nodes: &SlotMap<NodeHandle, Node>,
    ) -> Option<BoundingBox> {
        BoundingBox::from_points(
            self.bones
                .iter()
                .filter_map(|&bone| nodes.get(bone))
                .map(|node| Vec3::from(node.transform.world_matrix.translation)),
        )
    }

    /// Updates bone matrices.
    ///
    /// * `nodes`: node storage providing each bone's current world matrix
    /// * `root_matrix_inv`: inverse world matrix of the skinned mesh node,
    ///   bringing bone transforms back into mesh space
    pub fn compute_joint_matrices(
        &mut self,
        nodes: &SlotMap<NodeHandle, Node>,
        root_matrix_inv: Affine3A,
    ) {
        for (i, &bone_handle) in self.bones.iter().enumerate() {
            let Some(bone_node) = nodes.get(bone_handle) else {
                continue;
            };
            let ibm = self.inverse_bind_matrices[i];

            // IBM first (to bone local), then the bone's posed world transform,
            // then cancel the mesh's own placement.
            self.joint_matrices[i] =
                (root_matrix_inv * bone_node.transform.world_matrix * ibm).into();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_arrays() {
        let mut nodes: SlotMap<NodeHandle, Node> = SlotMap::with_key();
        let a = nodes.insert(Node::new());
        let b = nodes.insert(Node::new());

        let err = Skeleton::new("rig", vec![a, b], vec![Affine3A::IDENTITY], 0).unwrap_err();
        assert_eq!(
            err,
            SceneError::SkeletonMismatch {
                name: "rig".into(),
                bones: 2,
                matrices: 1
            }
        );
    }

    #[test]
    fn root_index_is_clamped() {
        let mut nodes: SlotMap<NodeHandle, Node> = SlotMap::with_key();
        let a = nodes.insert(Node::new());

        let skeleton = Skeleton::new("rig", vec![a], vec![Affine3A::IDENTITY], 5).unwrap();
        assert_eq!(skeleton.root_bone(), Some(a));
    }
}
