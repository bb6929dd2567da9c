//! Rebind Integration Tests
//!
//! Tests for:
//! - SkeletonIndex: name lookup, duplicate names, unnamed bones
//! - rebind: matched subsets, unmatched bones, shared part skeletons
//! - Post-rebind state: part skeleton released, root reset, culling off
//! - Joint matrices: part meshes follow base bones after update

mod common;

use common::{BASE_BONES, init_logger, rig_prefab, two_mesh_part};
use glam::Vec3;
use loadout::character::{SkeletonIndex, rebind};
use loadout::scene::{Fragment, NodeHandle, Scene, SkeletonKey};

struct Rig {
    scene: Scene,
    base: Fragment,
    index: SkeletonIndex,
}

fn base_rig() -> Rig {
    init_logger();
    let mut scene = Scene::new();
    let base = scene.instantiate(&rig_prefab("Body", &BASE_BONES)).unwrap();
    let key = base.skeletons()[0];
    let index = SkeletonIndex::build(&scene, key).unwrap();
    Rig { scene, base, index }
}

fn bone_names(scene: &Scene, mesh_node: NodeHandle) -> Vec<String> {
    scene
        .skeleton_of(mesh_node)
        .unwrap()
        .bones()
        .iter()
        .map(|&b| scene.get_name(b).unwrap_or_default().to_string())
        .collect()
}

fn base_key(rig: &Rig) -> SkeletonKey {
    rig.index.skeleton().unwrap()
}

// ============================================================================
// SkeletonIndex
// ============================================================================

#[test]
fn index_maps_names_to_base_bones() {
    let rig = base_rig();
    let skeleton = rig.scene.get_skeleton(base_key(&rig)).unwrap();

    assert_eq!(rig.index.len(), 3);
    for (&bone, name) in skeleton.bones().iter().zip(BASE_BONES) {
        assert_eq!(rig.index.get(name), Some(bone));
    }
    assert!(!rig.index.contains("helmet_tip"));
}

#[test]
fn index_duplicate_names_keep_last_bone() {
    let mut rig = base_rig();
    let key = base_key(&rig);
    let bones = rig.scene.get_skeleton(key).unwrap().bones().to_vec();
    rig.scene.set_name(bones[2], "spine");

    let index = SkeletonIndex::build(&rig.scene, key).unwrap();
    assert_eq!(index.len(), 2);
    assert_eq!(index.get("spine"), Some(bones[2]));
}

#[test]
fn index_rejects_stale_skeleton() {
    let mut rig = base_rig();
    let key = base_key(&rig);
    rig.scene.remove_skeleton(key);
    assert!(SkeletonIndex::build(&rig.scene, key).is_err());
}

// ============================================================================
// Matching
// ============================================================================

#[test]
fn subset_part_rebinds_cleanly() {
    let mut rig = base_rig();
    let part = rig.scene.instantiate(&rig_prefab("Shirt", &["pelvis", "spine"])).unwrap();
    let mesh = part.skinned_meshes()[0];

    let report = rebind(&mut rig.scene, &part, &rig.index).unwrap();

    assert!(report.is_clean());
    assert_eq!(report.rebound_meshes, 1);
    assert_eq!(report.rebound_skeletons, 1);
    assert_eq!(report.unresolved_influences, 0);
    assert_eq!(bone_names(&rig.scene, mesh), ["pelvis", "spine"]);

    let skeleton = rig.scene.skeleton_of(mesh).unwrap();
    assert_eq!(skeleton.bone_count(), skeleton.inverse_bind_matrices().len());
}

#[test]
fn unmatched_bone_is_dropped_with_one_warning() {
    let mut rig = base_rig();
    let part = rig
        .scene
        .instantiate(&rig_prefab("Helmet", &["pelvis", "spine", "helmet_tip"]))
        .unwrap();
    let mesh = part.skinned_meshes()[0];

    let report = rebind(&mut rig.scene, &part, &rig.index).unwrap();

    assert_eq!(bone_names(&rig.scene, mesh), ["pelvis", "spine"]);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].bone, "helmet_tip");
    assert_eq!(report.warnings[0].mesh, "Helmet");
    assert_eq!(report.warnings[0].position, 2);
    assert_eq!(report.unmatched_bones(), vec!["helmet_tip"]);
    // The one vertex sitting on helmet_tip lost its bone.
    assert_eq!(report.unresolved_influences, 1);

    // Every kept bone is owned by the base skeleton.
    let skeleton = rig.scene.skeleton_of(mesh).unwrap();
    for &bone in skeleton.bones() {
        assert!(rig.base.nodes.contains(&bone));
    }
    assert_eq!(skeleton.inverse_bind_matrices().len(), 2);
}

#[test]
fn every_missing_name_warns_once() {
    let mut rig = base_rig();
    let part = rig
        .scene
        .instantiate(&rig_prefab("Pack", &["strap_l", "pelvis", "strap_r", "spine"]))
        .unwrap();
    let mesh = part.skinned_meshes()[0];

    let report = rebind(&mut rig.scene, &part, &rig.index).unwrap();

    assert_eq!(report.unmatched_bones(), vec!["strap_l", "strap_r"]);
    assert_eq!(bone_names(&rig.scene, mesh), ["pelvis", "spine"]);
    // First dropped position is 0, so every vertex is affected.
    assert_eq!(report.unresolved_influences, 4);
}

#[test]
fn fully_unmatched_part_gets_empty_skeleton() {
    let mut rig = base_rig();
    let part = rig.scene.instantiate(&rig_prefab("Tail", &["tail_0", "tail_1"])).unwrap();
    let mesh = part.skinned_meshes()[0];

    let report = rebind(&mut rig.scene, &part, &rig.index).unwrap();

    assert_eq!(report.warnings.len(), 2);
    assert_eq!(rig.scene.skeleton_of(mesh).unwrap().bone_count(), 0);
}

// ============================================================================
// Post-rebind state
// ============================================================================

#[test]
fn shared_part_skeleton_is_replaced_once() {
    let mut rig = base_rig();
    let part = rig.scene.instantiate(&two_mesh_part(&["pelvis", "spine", "head"])).unwrap();
    assert_eq!(part.skinned_meshes().len(), 2);

    let report = rebind(&mut rig.scene, &part, &rig.index).unwrap();

    assert_eq!(report.rebound_meshes, 2);
    assert_eq!(report.rebound_skeletons, 1);
    let a = rig.scene.get_skin(part.skinned_meshes()[0]).unwrap().skeleton;
    let b = rig.scene.get_skin(part.skinned_meshes()[1]).unwrap().skeleton;
    assert_eq!(a, b);
}

#[test]
fn part_skeleton_is_released_and_root_reset() {
    let mut rig = base_rig();
    let part = rig.scene.instantiate(&rig_prefab("Mask", &["head"])).unwrap();
    let old_key = part.skeletons()[0];
    rig.scene.get_node_mut(part.root).unwrap().transform.position = Vec3::new(4.0, 0.0, 0.0);

    rebind(&mut rig.scene, &part, &rig.index).unwrap();

    assert!(rig.scene.get_skeleton(old_key).is_none());
    assert!(rig.scene.get_node(part.root).unwrap().transform.is_identity());
    let mesh = rig.scene.get_mesh(part.skinned_meshes()[0]).unwrap();
    assert!(!mesh.frustum_culled);
}

#[test]
fn base_skeleton_is_untouched() {
    let mut rig = base_rig();
    let key = base_key(&rig);
    let part = rig.scene.instantiate(&rig_prefab("Boots", &["pelvis"])).unwrap();

    rebind(&mut rig.scene, &part, &rig.index).unwrap();

    let base_mesh = rig.base.skinned_meshes()[0];
    assert_eq!(rig.scene.get_skin(base_mesh).unwrap().skeleton, key);
    assert_eq!(rig.scene.get_skeleton(key).unwrap().bone_count(), 3);
}

// ============================================================================
// Joint matrices
// ============================================================================

#[test]
fn part_follows_base_bones() {
    let mut rig = base_rig();
    let part = rig.scene.instantiate(&rig_prefab("Shirt", &["pelvis", "spine"])).unwrap();
    rebind(&mut rig.scene, &part, &rig.index).unwrap();

    let spine = rig.index.get("spine").unwrap();
    rig.scene.get_node_mut(spine).unwrap().transform.position = Vec3::new(0.25, 0.5, 0.0);
    rig.scene.update();

    let base = rig.scene.skeleton_of(rig.base.skinned_meshes()[0]).unwrap();
    let shirt = rig.scene.skeleton_of(part.skinned_meshes()[0]).unwrap();
    for i in 0..2 {
        assert!(
            base.joint_matrices()[i].abs_diff_eq(shirt.joint_matrices()[i], 1e-5),
            "joint {i} differs"
        );
    }
    // Moved spine shows up in the joint matrix.
    let offset = shirt.joint_matrices()[1].w_axis.truncate();
    assert!(offset.abs_diff_eq(Vec3::new(0.25, 0.0, 0.0), 1e-5));
}
