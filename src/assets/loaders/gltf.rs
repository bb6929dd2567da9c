use std::collections::HashSet;

use base64::Engine as _;
use glam::{Affine3A, Mat4, Quat, Vec2, Vec3, Vec4};

use crate::assets::io::AssetReaderVariant;
use crate::assets::prefab::{Prefab, PrefabNode, PrefabSkeleton};
use crate::errors::AssetError;
use crate::resources::geometry::Geometry;
use crate::resources::material::{AlphaMode, Material};
use crate::resources::mesh::Mesh;
use crate::scene::transform::Transform;

/// Where a glTF buffer's bytes come from, detached from the document borrow.
enum BufferSource {
    Bin,
    Uri(String),
}

/// Builds a [`Prefab`] from a parsed glTF document.
///
/// Loading happens in two phases so the IO part can be async and the CPU part
/// can run on a blocking thread:
/// 1. [`GltfLoader::load_buffers`] resolves every buffer (GLB chunk, data URI
///    or relative URI through the reader).
/// 2. [`GltfLoader::build_prefab`] walks nodes, skins and meshes.
pub struct GltfLoader<'a> {
    gltf: &'a gltf::Gltf,
    buffers: &'a [Vec<u8>],
    materials: Vec<Material>,
    prefab: Prefab,
}

impl<'a> GltfLoader<'a> {
    /// Parses a `.gltf` (JSON) or `.glb` (binary) document.
    pub fn parse(bytes: &[u8]) -> Result<gltf::Gltf, AssetError> {
        Ok(gltf::Gltf::from_slice(bytes)?)
    }

    /// Resolves buffer data for every buffer in the document.
    ///
    /// Relative URIs need a `reader`; without one (raw-bytes loading) only
    /// embedded buffers work.
    pub async fn load_buffers(
        gltf: &gltf::Gltf,
        reader: Option<&AssetReaderVariant>,
    ) -> Result<Vec<Vec<u8>>, AssetError> {
        let sources: Vec<(BufferSource, usize)> = gltf
            .buffers()
            .map(|buffer| {
                let source = match buffer.source() {
                    gltf::buffer::Source::Bin => BufferSource::Bin,
                    gltf::buffer::Source::Uri(uri) => BufferSource::Uri(uri.to_string()),
                };
                (source, buffer.length())
            })
            .collect();

        // External buffers are fetched concurrently
        let blob = gltf.blob.as_deref();
        let fetches = sources
            .into_iter()
            .enumerate()
            .map(|(index, (source, length))| async move {
                let data = match source {
                    BufferSource::Bin => blob
                        .map(<[u8]>::to_vec)
                        .ok_or_else(|| AssetError::InvalidData("Missing GLB binary chunk".into()))?,
                    BufferSource::Uri(uri) if uri.starts_with("data:") => decode_data_uri(&uri)?,
                    BufferSource::Uri(uri) => match reader {
                        Some(reader) => reader.read_bytes(&uri).await?,
                        None => {
                            return Err(AssetError::NotFound(format!(
                                "external buffer '{uri}' (no base location to resolve it against)"
                            )));
                        }
                    },
                };

                if data.len() < length {
                    return Err(AssetError::InvalidData(format!(
                        "buffer {index} holds {} bytes, {length} declared",
                        data.len()
                    )));
                }
                Ok(data)
            });

        futures::future::try_join_all(fetches).await
    }

    /// Converts the document into a prefab. CPU only, no IO.
    pub fn build_prefab(
        gltf: &'a gltf::Gltf,
        buffers: &'a [Vec<u8>],
        source: &str,
    ) -> Result<Prefab, AssetError> {
        let required: Vec<_> = gltf.extensions_required().collect();
        if !required.is_empty() {
            log::warn!("glTF '{source}' requires unsupported extensions: {required:?}");
        }

        let mut loader = Self {
            gltf,
            buffers,
            materials: Vec::new(),
            prefab: Prefab {
                source: source.to_string(),
                ..Prefab::default()
            },
        };

        loader.load_materials();
        loader.load_nodes();
        loader.load_skins()?;
        loader.load_meshes()?;

        loader
            .prefab
            .validate()
            .map_err(|e| AssetError::InvalidData(e.to_string()))?;

        log::debug!(
            "Parsed glTF '{}': {} nodes, {} skins, {} skinned meshes",
            source,
            loader.prefab.nodes.len(),
            loader.prefab.skeletons.len(),
            loader.prefab.skinned_mesh_count()
        );

        Ok(loader.prefab)
    }

    // --- Loading Logic ---

    fn load_materials(&mut self) {
        for material in self.gltf.materials() {
            let pbr = material.pbr_metallic_roughness();

            let mut mat = Material::new_standard(Vec4::from_array(pbr.base_color_factor()));
            mat.name = material.name().map(str::to_string);
            mat.metalness = pbr.metallic_factor();
            mat.roughness = pbr.roughness_factor();
            mat.double_sided = material.double_sided();
            mat.alpha_mode = match material.alpha_mode() {
                gltf::material::AlphaMode::Opaque => AlphaMode::Opaque,
                gltf::material::AlphaMode::Mask => AlphaMode::Mask,
                gltf::material::AlphaMode::Blend => AlphaMode::Blend,
            };

            if let Some(info) = pbr.base_color_texture() {
                let image = info.texture().source();
                mat.map = Some(match image.source() {
                    gltf::image::Source::Uri { uri, .. } => uri.to_string(),
                    gltf::image::Source::View { .. } => format!("#image{}", image.index()),
                });
            }

            self.materials.push(mat);
        }
    }

    /// One prefab node per glTF node, same index.
    fn load_nodes(&mut self) {
        for node in self.gltf.nodes() {
            let (t, r, s) = node.transform().decomposed();
            let mut transform = Transform::new();
            transform.position = Vec3::from_array(t);
            transform.rotation = Quat::from_array(r);
            transform.scale = Vec3::from_array(s);

            // Unnamed nodes stay unnamed: bones only match by authored name.
            let mut prefab_node = PrefabNode::new().with_transform(transform);
            prefab_node.name = node.name().map(str::to_string);
            prefab_node.children_indices = node.children().map(|c| c.index()).collect();
            self.prefab.add_node(prefab_node);
        }

        let scene = self.gltf.default_scene().or_else(|| self.gltf.scenes().next());
        self.prefab.root_indices = match scene {
            Some(scene) => scene.nodes().map(|n| n.index()).collect(),
            None => {
                // No scene: every node that nobody lists as a child.
                let children: HashSet<usize> = self
                    .gltf
                    .nodes()
                    .flat_map(|n| n.children().map(|c| c.index()).collect::<Vec<_>>())
                    .collect();
                (0..self.prefab.nodes.len())
                    .filter(|i| !children.contains(i))
                    .collect()
            }
        };
    }

    fn load_skins(&mut self) -> Result<(), AssetError> {
        let buffers = self.buffers;

        for skin in self.gltf.skins() {
            let name = skin.name().unwrap_or("Skeleton").to_string();
            let joints: Vec<_> = skin.joints().collect();

            let reader = skin.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
            let ibms: Vec<Affine3A> = if let Some(iter) = reader.read_inverse_bind_matrices() {
                iter.map(|m| Affine3A::from_mat4(Mat4::from_cols_array_2d(&m)))
                    .collect()
            } else {
                vec![Affine3A::IDENTITY; joints.len()]
            };

            if ibms.len() != joints.len() {
                return Err(AssetError::InvalidData(format!(
                    "skin '{name}' has {} joints but {} inverse bind matrices",
                    joints.len(),
                    ibms.len()
                )));
            }

            // Root bone: explicit skin.skeleton if it is a joint, otherwise the
            // first joint whose parent is not a joint, otherwise 0.
            let joint_indices: HashSet<usize> = joints.iter().map(gltf::Node::index).collect();
            let child_joint_indices: HashSet<usize> = joints
                .iter()
                .flat_map(|n| n.children().map(|c| c.index()).collect::<Vec<_>>())
                .filter(|i| joint_indices.contains(i))
                .collect();

            let root_bone_index = skin
                .skeleton()
                .and_then(|root| joints.iter().position(|n| n.index() == root.index()))
                .or_else(|| {
                    joints
                        .iter()
                        .position(|n| !child_joint_indices.contains(&n.index()))
                })
                .unwrap_or(0);

            self.prefab.add_skeleton(PrefabSkeleton {
                name,
                root_bone_index,
                bone_indices: joints.iter().map(gltf::Node::index).collect(),
                inverse_bind_matrices: ibms,
            });
        }

        Ok(())
    }

    fn load_meshes(&mut self) -> Result<(), AssetError> {
        for node in self.gltf.nodes() {
            let Some(mesh) = node.mesh() else {
                continue;
            };
            let skin_index = node.skin().map(|s| s.index());
            let bone_count = skin_index.map(|s| self.prefab.skeletons[s].bone_indices.len());
            let mesh_name = mesh
                .name()
                .or_else(|| node.name())
                .map_or_else(|| format!("Mesh_{}", mesh.index()), str::to_string);

            let primitives: Vec<_> = mesh.primitives().collect();
            let node_index = node.index();

            match primitives.len() {
                0 => {}
                // Single primitive: mount on the node itself
                1 => {
                    let engine_mesh = self.build_mesh(&primitives[0], &mesh_name, bone_count)?;
                    let target = &mut self.prefab.nodes[node_index];
                    target.mesh = Some(engine_mesh);
                    target.skin_index = skin_index;
                }
                // Several primitives: one child node per primitive, all sharing the skin
                _ => {
                    for (i, primitive) in primitives.iter().enumerate() {
                        let sub_name = format!("{mesh_name}_{i}");
                        let engine_mesh = self.build_mesh(primitive, &sub_name, bone_count)?;
                        let mut sub_node = PrefabNode::named(sub_name).with_mesh(engine_mesh);
                        sub_node.skin_index = skin_index;
                        self.prefab
                            .add_child(node_index, sub_node)
                            .map_err(|e| AssetError::InvalidData(e.to_string()))?;
                    }
                }
            }
        }

        Ok(())
    }

    fn build_mesh(
        &self,
        primitive: &gltf::Primitive,
        name: &str,
        bone_count: Option<usize>,
    ) -> Result<Mesh, AssetError> {
        let geometry = self.load_primitive_geometry(primitive, name)?;

        if let Some(bone_count) = bone_count {
            if !geometry.is_skinned() {
                return Err(AssetError::InvalidData(format!(
                    "mesh '{name}' is bound to a skin but has no JOINTS_0/WEIGHTS_0"
                )));
            }
            if let Some(max) = geometry.max_joint_index()
                && usize::from(max) >= bone_count
            {
                return Err(AssetError::InvalidData(format!(
                    "mesh '{name}' references joint {max} but its skin has {bone_count} joints"
                )));
            }
        }

        let material = primitive
            .material()
            .index()
            .and_then(|i| self.materials.get(i))
            .cloned()
            .unwrap_or_default();

        Ok(Mesh::new(geometry, material).with_name(name))
    }

    fn load_primitive_geometry(
        &self,
        primitive: &gltf::Primitive,
        name: &str,
    ) -> Result<Geometry, AssetError> {
        let buffers = self.buffers;
        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));

        let positions: Vec<Vec3> = reader
            .read_positions()
            .map(|iter| iter.map(Vec3::from_array).collect())
            .unwrap_or_default();
        let vertex_count = positions.len();

        let mut geometry = Geometry::with_positions(positions);

        geometry.normals = reader
            .read_normals()
            .map(|iter| iter.map(Vec3::from_array).collect());
        geometry.uvs = reader
            .read_tex_coords(0)
            .map(|r| r.into_f32().map(Vec2::from_array).collect());
        geometry.joints = reader.read_joints(0).map(|r| r.into_u16().collect());
        geometry.weights = reader.read_weights(0).map(|r| r.into_f32().collect());
        geometry.indices = reader.read_indices().map(|r| r.into_u32().collect());

        let attribute_lengths = [
            ("NORMAL", geometry.normals.as_ref().map(Vec::len)),
            ("TEXCOORD_0", geometry.uvs.as_ref().map(Vec::len)),
            ("JOINTS_0", geometry.joints.as_ref().map(Vec::len)),
            ("WEIGHTS_0", geometry.weights.as_ref().map(Vec::len)),
        ];
        for (attribute, len) in attribute_lengths {
            if let Some(len) = len
                && len != vertex_count
            {
                return Err(AssetError::InvalidData(format!(
                    "mesh '{name}': {attribute} has {len} entries, POSITION has {vertex_count}"
                )));
            }
        }

        if let Some(indices) = &geometry.indices
            && let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertex_count)
        {
            return Err(AssetError::InvalidData(format!(
                "mesh '{name}': index {bad} out of range for {vertex_count} vertices"
            )));
        }

        Ok(geometry)
    }
}

/// Decodes a base64 `data:` URI.
fn decode_data_uri(uri: &str) -> Result<Vec<u8>, AssetError> {
    let (header, payload) = uri
        .split_once(',')
        .ok_or_else(|| AssetError::InvalidData("malformed data URI".into()))?;

    if !header.ends_with(";base64") {
        return Err(AssetError::InvalidData(
            "only base64 data URIs are supported".into(),
        ));
    }

    Ok(base64::engine::general_purpose::STANDARD.decode(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_base64_data_uri() {
        let bytes = decode_data_uri("data:application/octet-stream;base64,AAEC").unwrap();
        assert_eq!(bytes, vec![0, 1, 2]);
    }

    #[test]
    fn rejects_plain_data_uri() {
        assert!(matches!(
            decode_data_uri("data:text/plain,hello"),
            Err(AssetError::InvalidData(_))
        ));
    }
}
