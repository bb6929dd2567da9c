//! Model format loaders. Each one turns source bytes into a [`Prefab`](crate::assets::Prefab).

#[cfg(feature = "gltf")]
pub mod gltf;

#[cfg(feature = "gltf")]
pub use gltf::GltfLoader;
