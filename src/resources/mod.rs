//! CPU-side resource definitions.
//!
//! Geometry, materials and meshes as loaded from model files. Nothing here
//! touches a GPU; a renderer consumes these through the scene graph.

pub mod geometry;
pub mod material;
pub mod mesh;

pub use geometry::{BoundingBox, Geometry};
pub use material::{AlphaMode, Material};
pub use mesh::Mesh;
