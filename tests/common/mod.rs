//! Shared fixtures: in-code rigs, parts and glTF documents.

#![allow(dead_code)]

use base64::Engine as _;
use glam::{Affine3A, Vec3, Vec4};
use loadout::assets::{Prefab, PrefabNode, PrefabSkeleton};
use loadout::resources::{Geometry, Material, Mesh};
use loadout::scene::Transform;

pub const BASE_BONES: [&str; 3] = ["pelvis", "spine", "head"];

/// Height of the first bone; each following bone sits `BONE_STEP` above its parent.
pub const PELVIS_HEIGHT: f32 = 1.0;
pub const BONE_STEP: f32 = 0.5;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn bone_world(index: usize) -> Vec3 {
    Vec3::new(0.0, PELVIS_HEIGHT + BONE_STEP * index as f32, 0.0)
}

/// One vertex per bone, sitting on that bone and fully weighted to it.
pub fn skinned_geometry(bone_count: usize) -> Geometry {
    let positions = (0..bone_count).map(bone_world).collect();
    let joints = (0..bone_count).map(|i| [i as u16, 0, 0, 0]).collect();
    let weights = (0..bone_count).map(|_| [1.0, 0.0, 0.0, 0.0]).collect();
    Geometry::with_positions(positions).with_skin(joints, weights)
}

/// A rigged model: `Armature` root holding a bone chain, plus one skinned
/// mesh named `mesh_name` bound to it.
///
/// Bones form a vertical chain; inverse bind matrices match the rest pose.
pub fn rig_prefab(mesh_name: &str, bones: &[&str]) -> Prefab {
    let mut prefab = Prefab::new();
    let armature = prefab.add_root(PrefabNode::named("Armature"));

    let mut bone_indices = Vec::with_capacity(bones.len());
    let mut parent = armature;
    for (i, name) in bones.iter().enumerate() {
        let mut transform = Transform::new();
        transform.position = if i == 0 {
            Vec3::new(0.0, PELVIS_HEIGHT, 0.0)
        } else {
            Vec3::new(0.0, BONE_STEP, 0.0)
        };
        let index = prefab
            .add_child(parent, PrefabNode::named(*name).with_transform(transform))
            .unwrap();
        bone_indices.push(index);
        parent = index;
    }

    let skin = prefab.add_skeleton(PrefabSkeleton {
        name: format!("{mesh_name}_rig"),
        root_bone_index: 0,
        bone_indices,
        inverse_bind_matrices: (0..bones.len())
            .map(|i| Affine3A::from_translation(-bone_world(i)))
            .collect(),
    });

    let mesh = Mesh::new(skinned_geometry(bones.len()), Material::new_standard(Vec4::ONE))
        .with_name(mesh_name);
    prefab
        .add_child(armature, PrefabNode::named(mesh_name).with_mesh(mesh).with_skin(skin))
        .unwrap();

    prefab
}

/// Two skinned meshes sharing one part skeleton.
pub fn two_mesh_part(bones: &[&str]) -> Prefab {
    let mut prefab = rig_prefab("Shell", bones);
    let armature = prefab.root_indices[0];
    let mesh = Mesh::new(skinned_geometry(bones.len()), Material::new_standard(Vec4::ONE)).with_name("Visor");
    prefab
        .add_child(armature, PrefabNode::named("Visor").with_mesh(mesh).with_skin(0))
        .unwrap();
    prefab
}

/// A model with a single unskinned mesh.
pub fn static_prefab(name: &str) -> Prefab {
    let mut prefab = Prefab::new();
    let geometry = Geometry::with_positions(vec![Vec3::ZERO, Vec3::X, Vec3::Y]);
    prefab.add_root(PrefabNode::named(name).with_mesh(Mesh::new(geometry, Material::new_standard(Vec4::ONE))));
    prefab
}

// ============================================================================
// glTF fixtures
// ============================================================================

fn push_f32s(buffer: &mut Vec<u8>, values: &[f32]) {
    for v in values {
        buffer.extend_from_slice(&v.to_le_bytes());
    }
}

/// A `.gltf` JSON document with an embedded base64 buffer.
///
/// Nodes: 0 = mesh node (skinned), 1.. = bone chain named `bones`.
/// `joint_override` replaces every vertex's first joint index (to build
/// invalid assets).
pub fn skinned_gltf(mesh_name: &str, bones: &[&str], joint_override: Option<u16>) -> String {
    skinned_gltf_with_buffer(mesh_name, bones, joint_override, None).0
}

/// Same document, optionally pointing at an external buffer `buffer_uri`.
/// Returns the JSON and the raw buffer bytes.
pub fn skinned_gltf_with_buffer(
    mesh_name: &str,
    bones: &[&str],
    joint_override: Option<u16>,
    buffer_uri: Option<&str>,
) -> (String, Vec<u8>) {
    let n = bones.len();
    let mut buffer = Vec::new();

    // positions: vec3 per vertex
    let positions_offset = buffer.len();
    for i in 0..n {
        let p = bone_world(i);
        push_f32s(&mut buffer, &[p.x, p.y, p.z]);
    }
    let positions_len = buffer.len() - positions_offset;

    // joints: 4 x u16 per vertex
    let joints_offset = buffer.len();
    for i in 0..n {
        let j = joint_override.unwrap_or(i as u16);
        for v in [j, 0, 0, 0] {
            buffer.extend_from_slice(&v.to_le_bytes());
        }
    }
    let joints_len = buffer.len() - joints_offset;

    // weights: 4 x f32 per vertex
    let weights_offset = buffer.len();
    for _ in 0..n {
        push_f32s(&mut buffer, &[1.0, 0.0, 0.0, 0.0]);
    }
    let weights_len = buffer.len() - weights_offset;

    // inverse bind matrices: column-major mat4 per joint
    let ibm_offset = buffer.len();
    for i in 0..n {
        let m = glam::Mat4::from_translation(-bone_world(i));
        push_f32s(&mut buffer, &m.to_cols_array());
    }
    let ibm_len = buffer.len() - ibm_offset;

    let uri = buffer_uri.map_or_else(
        || {
            format!(
                "data:application/octet-stream;base64,{}",
                base64::engine::general_purpose::STANDARD.encode(&buffer)
            )
        },
        str::to_string,
    );

    let bone_nodes: Vec<String> = bones
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let translation = if i == 0 { PELVIS_HEIGHT } else { BONE_STEP };
            let children = if i + 1 < n {
                format!(r#", "children": [{}]"#, i + 2)
            } else {
                String::new()
            };
            format!(r#"{{ "name": "{name}", "translation": [0, {translation}, 0]{children} }}"#)
        })
        .collect();

    let joints: Vec<String> = (1..=n).map(|i| i.to_string()).collect();

    let json = format!(
        r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [ {{ "nodes": [0, 1] }} ],
  "nodes": [
    {{ "name": "{mesh_name}", "mesh": 0, "skin": 0 }},
    {bone_nodes}
  ],
  "meshes": [ {{ "name": "{mesh_name}", "primitives": [ {{
      "attributes": {{ "POSITION": 0, "JOINTS_0": 1, "WEIGHTS_0": 2 }},
      "material": 0
  }} ] }} ],
  "materials": [ {{ "name": "{mesh_name}_mat", "pbrMetallicRoughness": {{ "baseColorFactor": [0.5, 0.5, 0.5, 1.0] }} }} ],
  "skins": [ {{ "joints": [{joints}], "inverseBindMatrices": 3, "skeleton": 1 }} ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": {n}, "type": "VEC3",
       "min": [0, {min_y}, 0], "max": [0, {max_y}, 0] }},
    {{ "bufferView": 1, "componentType": 5123, "count": {n}, "type": "VEC4" }},
    {{ "bufferView": 2, "componentType": 5126, "count": {n}, "type": "VEC4" }},
    {{ "bufferView": 3, "componentType": 5126, "count": {n}, "type": "MAT4" }}
  ],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": {positions_offset}, "byteLength": {positions_len} }},
    {{ "buffer": 0, "byteOffset": {joints_offset}, "byteLength": {joints_len} }},
    {{ "buffer": 0, "byteOffset": {weights_offset}, "byteLength": {weights_len} }},
    {{ "buffer": 0, "byteOffset": {ibm_offset}, "byteLength": {ibm_len} }}
  ],
  "buffers": [ {{ "byteLength": {total}, "uri": "{uri}" }} ]
}}"#,
        bone_nodes = bone_nodes.join(",\n    "),
        joints = joints.join(", "),
        min_y = PELVIS_HEIGHT,
        max_y = PELVIS_HEIGHT + BONE_STEP * (n.saturating_sub(1)) as f32,
        total = buffer.len(),
    );
    (json, buffer)
}

/// A valid glTF with one unskinned triangle and no skin at all.
pub fn static_gltf() -> String {
    let mut buffer = Vec::new();
    push_f32s(&mut buffer, &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    let uri = format!(
        "data:application/octet-stream;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(&buffer)
    );

    format!(
        r#"{{
  "asset": {{ "version": "2.0" }},
  "scenes": [ {{ "nodes": [0] }} ],
  "nodes": [ {{ "name": "Prop", "mesh": 0 }} ],
  "meshes": [ {{ "primitives": [ {{ "attributes": {{ "POSITION": 0 }} }} ] }} ],
  "accessors": [ {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                    "min": [0, 0, 0], "max": [1, 1, 0] }} ],
  "bufferViews": [ {{ "buffer": 0, "byteLength": 36 }} ],
  "buffers": [ {{ "byteLength": 36, "uri": "{uri}" }} ]
}}"#
    )
}
