use crate::assets::LoaderSettings;
use crate::character::catalog::Catalog;

/// Slots a character gets when none are configured.
pub const DEFAULT_SLOTS: [&str; 6] = ["shirt", "pants", "shoes", "helmet", "mask", "backpack"];

/// Construction-time settings of a [`Character`](crate::Character).
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterConfig {
    /// Slot keys, in display order. Fixed for the character's lifetime.
    pub slots: Vec<String>,
    pub catalog: Catalog,
    /// Uniform scale applied to the base model root (FBX-style exports often need 0.01).
    pub base_scale: f32,
    pub loader: LoaderSettings,
}

impl Default for CharacterConfig {
    fn default() -> Self {
        Self {
            slots: DEFAULT_SLOTS.iter().map(ToString::to_string).collect(),
            catalog: Catalog::default(),
            base_scale: 1.0,
            loader: LoaderSettings::default(),
        }
    }
}

impl CharacterConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_slots<I, S>(mut self, slots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.slots = slots.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    #[must_use]
    pub fn with_base_scale(mut self, scale: f32) -> Self {
        self.base_scale = scale;
        self
    }

    #[must_use]
    pub fn with_loader(mut self, loader: LoaderSettings) -> Self {
        self.loader = loader;
        self
    }

    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.loader.max_bytes = max_bytes;
        self
    }
}
