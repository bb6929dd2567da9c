//! Bone rebinding.
//!
//! Moves the skinned meshes of a cloned part onto the bones of a base
//! skeleton, matching bones by name. Vertex joint indices are positions in a
//! skeleton's bone list, so the new skeleton keeps the part's bone order and
//! inverse bind matrices; only the bone nodes are swapped for the base's.

use rustc_hash::FxHashMap;

use crate::character::skeleton_index::SkeletonIndex;
use crate::errors::{Result, SceneError};
use crate::scene::{Fragment, NodeHandle, Scene, Skeleton, SkeletonKey};

/// Reported in place of a name for bones that carry none.
pub const UNNAMED_BONE: &str = "<unnamed>";

/// A part bone with no same-named bone in the base skeleton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmatchedBoneWarning {
    /// Name of the first mesh found using the part skeleton.
    pub mesh: String,
    /// The bone name that did not resolve.
    pub bone: String,
    /// Position of the bone in the part skeleton.
    pub position: usize,
}

/// Outcome of rebinding one fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebindReport {
    /// Skinned meshes now bound to base bones.
    pub rebound_meshes: usize,
    /// Distinct part skeletons replaced.
    pub rebound_skeletons: usize,
    /// One entry per dropped bone position, per part skeleton.
    pub warnings: Vec<UnmatchedBoneWarning>,
    /// Vertices weighted to a dropped or shifted bone position.
    /// Those vertices will not follow the bone they were authored against.
    pub unresolved_influences: usize,
}

impl RebindReport {
    /// Every bone matched.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Distinct unmatched bone names, in report order.
    #[must_use]
    pub fn unmatched_bones(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for warning in &self.warnings {
            if !names.contains(&warning.bone.as_str()) {
                names.push(&warning.bone);
            }
        }
        names
    }
}

/// What a part skeleton turned into.
struct Replacement {
    key: SkeletonKey,
    /// First dropped position; every vertex weighted at or past it lost its bone.
    first_dropped: Option<usize>,
}

/// Rebinds every skinned mesh of `fragment` onto the skeleton `index` describes.
///
/// Part skeletons shared by several meshes are replaced once and stay shared.
/// Afterwards the old part skeletons are released, the fragment root is reset
/// to identity (the part now moves with the base bones) and frustum culling is
/// disabled on the rebound meshes.
pub fn rebind(scene: &mut Scene, fragment: &Fragment, index: &SkeletonIndex) -> Result<RebindReport> {
    let mut report = RebindReport::default();
    let mut replaced: FxHashMap<SkeletonKey, Replacement> = FxHashMap::default();

    for &mesh_node in fragment.skinned_meshes() {
        let Some(binding) = scene.get_skin(mesh_node).cloned() else {
            continue;
        };
        let mesh_name = mesh_display_name(scene, mesh_node);

        if !replaced.contains_key(&binding.skeleton) {
            let replacement = rebuild_skeleton(scene, binding.skeleton, index, &mesh_name, &mut report)?;
            replaced.insert(binding.skeleton, replacement);
            report.rebound_skeletons += 1;
        }
        let Some(replacement) = replaced.get(&binding.skeleton) else {
            continue;
        };

        scene.bind_skeleton(mesh_node, binding.rebound_to(replacement.key))?;

        if let Some(mesh) = scene.get_mesh_mut(mesh_node) {
            if let Some(first_dropped) = replacement.first_dropped {
                report.unresolved_influences += mesh.geometry.vertices_outside(first_dropped);
            }
            mesh.frustum_culled = false;
        }
        report.rebound_meshes += 1;
    }

    // Part skeletons are unreachable now unless another fragment shares them.
    for (&old_key, replacement) in &replaced {
        if old_key != replacement.key
            && Some(old_key) != index.skeleton()
            && !scene.is_skeleton_in_use(old_key)
        {
            scene.remove_skeleton(old_key);
        }
    }

    if let Some(root) = scene.get_node_mut(fragment.root) {
        root.transform.reset();
    }

    if !report.is_clean() {
        log::warn!(
            "Rebind: {} bone(s) not found in base skeleton: {:?} ({} vertices affected)",
            report.warnings.len(),
            report.unmatched_bones(),
            report.unresolved_influences
        );
    }

    Ok(report)
}

/// Builds the base-bone counterpart of one part skeleton.
fn rebuild_skeleton(
    scene: &mut Scene,
    part_key: SkeletonKey,
    index: &SkeletonIndex,
    mesh_name: &str,
    report: &mut RebindReport,
) -> Result<Replacement> {
    let part = scene.get_skeleton(part_key).ok_or(SceneError::StaleSkeleton)?;
    let part_root = part.root_bone();

    let mut bones = Vec::with_capacity(part.bone_count());
    let mut ibms = Vec::with_capacity(part.bone_count());
    let mut first_dropped = None;

    for (position, (&bone, ibm)) in part
        .bones()
        .iter()
        .zip(part.inverse_bind_matrices())
        .enumerate()
    {
        // Unnamed bones never match.
        let name = scene.get_name(bone);
        match name.and_then(|name| index.get(name)) {
            Some(target) => {
                bones.push(target);
                ibms.push(*ibm);
            }
            None => {
                first_dropped.get_or_insert(position);
                report.warnings.push(UnmatchedBoneWarning {
                    mesh: mesh_name.to_string(),
                    bone: name.unwrap_or(UNNAMED_BONE).to_string(),
                    position,
                });
            }
        }
    }

    // Keep the part's root if it survived, by name, else the first bone.
    let root_index = part_root
        .and_then(|root| scene.get_name(root))
        .and_then(|name| index.get(name))
        .and_then(|target| bones.iter().position(|&b| b == target))
        .unwrap_or(0);

    let skeleton = Skeleton::new(&part.name, bones, ibms, root_index)?;
    let key = scene.add_skeleton(skeleton);

    Ok(Replacement { key, first_dropped })
}

fn mesh_display_name(scene: &Scene, node: NodeHandle) -> String {
    scene
        .get_name(node)
        .or_else(|| scene.get_mesh(node).map(|m| m.name.as_str()))
        .unwrap_or("<unnamed>")
        .to_string()
}
