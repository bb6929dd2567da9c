use crate::resources::geometry::Geometry;
use crate::resources::material::Material;

/// A drawable attached to a scene node.
///
/// Unlike a shared-handle design, a mesh owns its geometry and material
/// outright: two characters built from the same template never alias buffers.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub name: String,

    pub geometry: Geometry,
    pub material: Material,

    pub visible: bool,
    /// Skinned meshes whose bones live elsewhere in the graph must not be
    /// culled by their own (stale) bounds.
    pub frustum_culled: bool,
    pub render_order: i32,
}

impl Mesh {
    #[must_use]
    pub fn new(geometry: Geometry, material: Material) -> Self {
        Self {
            name: "Mesh".to_string(),
            geometry,
            material,
            visible: true,
            frustum_culled: true,
            render_order: 0,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Deep copy whose geometry and material get fresh identities.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        Self {
            name: self.name.clone(),
            geometry: self.geometry.duplicate(),
            material: self.material.duplicate(),
            visible: self.visible,
            frustum_culled: self.frustum_culled,
            render_order: self.render_order,
        }
    }
}
