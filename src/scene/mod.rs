//! Scene graph.
//!
//! - [`Node`]: hierarchy + transform, addressed by [`NodeHandle`]
//! - [`Transform`]: TRS with cached local/world matrices
//! - [`Skeleton`] / [`SkinBinding`]: bone lists shared by skinned meshes
//! - [`Scene`]: node storage plus per-node components (names, meshes, skins)
//! - [`Fragment`]: a cloned model subtree living inside a scene
//! - [`transform_system`]: world-matrix propagation, decoupled from `Scene`

pub mod fragment;
pub mod node;
pub mod scene;
pub mod skeleton;
pub mod transform;
pub mod transform_system;

pub use fragment::Fragment;
pub use node::Node;
pub use scene::Scene;
pub use skeleton::{BindMode, SkinBinding, Skeleton};
pub use transform::Transform;

use slotmap::new_key_type;

new_key_type! {
    pub struct NodeHandle;
    pub struct SkeletonKey;
}
