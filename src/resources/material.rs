use glam::Vec4;
use uuid::Uuid;

/// How the material treats alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlphaMode {
    #[default]
    Opaque,
    Mask,
    Blend,
}

/// Surface description carried by a mesh.
///
/// Only the factors a consumer needs to draw a part are kept; texture data is
/// referenced by URI and resolved by whatever renders the scene.
#[derive(Debug, Clone)]
pub struct Material {
    pub uuid: Uuid,
    pub name: Option<String>,

    pub color: Vec4,
    pub metalness: f32,
    pub roughness: f32,
    pub alpha_mode: AlphaMode,
    pub double_sided: bool,

    /// URI of the base color texture, if any.
    pub map: Option<String>,
}

impl Material {
    #[must_use]
    pub fn new_standard(color: Vec4) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: None,
            color,
            metalness: 0.0,
            roughness: 1.0,
            alpha_mode: AlphaMode::Opaque,
            double_sided: false,
            map: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Deep copy with a fresh identity.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            ..self.clone()
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new_standard(Vec4::ONE)
    }
}
