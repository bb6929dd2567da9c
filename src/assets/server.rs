use std::sync::Arc;

use slotmap::new_key_type;
use uuid::Uuid;

use crate::assets::io::{AssetReaderVariant, BLOB_SCHEME, BlobTable};
use crate::assets::prefab::{Prefab, SharedPrefab};
use crate::assets::storage::AssetStorage;
use crate::errors::AssetError;

new_key_type! {
    pub struct PrefabHandle;
}

/// Default size cap for a single model source, buffers included.
pub const DEFAULT_MAX_BYTES: usize = 256 * 1024 * 1024;

/// Parse constraints applied to every load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderSettings {
    /// Upper bound on model plus buffer bytes.
    pub max_bytes: usize,
    /// Transport timeout for `http(s)://` locators.
    pub http_timeout_secs: u64,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            http_timeout_secs: 30,
        }
    }
}

/// Loads model templates and caches them per locator.
///
/// Cheap to clone; clones share the cache and the blob table. A cached
/// [`SharedPrefab`] is immutable, so one template can back any number of
/// characters.
#[derive(Clone, Default)]
pub struct AssetServer {
    pub prefabs: Arc<AssetStorage<PrefabHandle, Prefab>>,
    blobs: BlobTable,
    settings: LoaderSettings,
}

impl AssetServer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_settings(settings: LoaderSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn settings(&self) -> &LoaderSettings {
        &self.settings
    }

    /// Stable cache key of a locator.
    #[must_use]
    pub fn cache_key(locator: &str) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_URL, locator.trim().as_bytes())
    }

    // ========================================================================
    // Cache
    // ========================================================================

    #[must_use]
    pub fn get_cached(&self, locator: &str) -> Option<SharedPrefab> {
        self.prefabs.get_by_uuid(&Self::cache_key(locator))
    }

    #[must_use]
    pub fn is_cached(&self, locator: &str) -> bool {
        self.prefabs
            .get_handle_by_uuid(&Self::cache_key(locator))
            .is_some()
    }

    /// Registers an already-built prefab under `locator`.
    ///
    /// Later loads of that locator return it without touching any reader.
    /// An existing entry is kept.
    pub fn insert_prefab(&self, locator: &str, mut prefab: Prefab) -> SharedPrefab {
        if prefab.source.is_empty() {
            prefab.source = locator.trim().to_string();
        }
        let handle = self.prefabs.add_with_uuid(Self::cache_key(locator), prefab);
        // The handle was just returned by the storage itself
        self.prefabs
            .get(handle)
            .unwrap_or_else(|| Arc::new(Prefab::default()))
    }

    /// Drops the cached template for `locator`. Instances already built from
    /// it are unaffected.
    pub fn evict(&self, locator: &str) -> bool {
        self.prefabs
            .remove_by_uuid(&Self::cache_key(locator))
            .is_some()
    }

    pub fn clear_cache(&self) {
        self.prefabs.clear();
    }

    // ========================================================================
    // Blobs
    // ========================================================================

    /// Makes in-memory bytes loadable and returns their `blob:` locator.
    pub fn register_blob(&self, bytes: impl Into<Arc<[u8]>>) -> String {
        let locator = format!("{BLOB_SCHEME}{}", Uuid::new_v4());
        self.blobs.write().insert(locator.clone(), bytes.into());
        log::debug!("Registered {locator}");
        locator
    }

    /// Forgets a blob and any template parsed from it.
    pub fn revoke_blob(&self, locator: &str) -> bool {
        let removed = self.blobs.write().remove(locator).is_some();
        self.evict(locator);
        removed
    }

    // ========================================================================
    // Async Methods
    // ========================================================================

    /// Loads (or fetches from cache) the template behind `locator`.
    ///
    /// Failed loads are not cached; the next call tries again.
    pub async fn load_prefab_async(&self, locator: &str) -> Result<SharedPrefab, AssetError> {
        let locator = locator.trim();
        if locator.is_empty() {
            return Err(AssetError::UnsupportedLocator(String::new()));
        }

        let key = Self::cache_key(locator);
        if let Some(prefab) = self.prefabs.get_by_uuid(&key) {
            log::debug!("Template cache hit for '{locator}'");
            return Ok(prefab);
        }

        let (reader, name) = AssetReaderVariant::from_locator(
            locator,
            &self.blobs,
            self.settings.http_timeout_secs,
        )?;

        // 1. IO: read bytes
        let bytes = reader.read_bytes(&name).await?;
        self.check_size(bytes.len())?;

        // 2. Decode (buffers resolved relative to the model)
        let prefab = self
            .decode_prefab_async(bytes, Some(reader), locator.to_string())
            .await?;

        // 3. Cache; a concurrent load of the same locator may have won the race
        let handle = self.prefabs.add_with_uuid(key, prefab);
        log::info!("Loaded template '{locator}'");
        self.prefabs
            .get(handle)
            .ok_or_else(|| AssetError::NotFound(locator.to_string()))
    }

    /// Parses raw model bytes. Not cached; external buffer URIs can't resolve.
    pub async fn load_prefab_from_bytes_async(
        &self,
        bytes: Vec<u8>,
        label: &str,
    ) -> Result<SharedPrefab, AssetError> {
        self.check_size(bytes.len())?;
        let prefab = self
            .decode_prefab_async(bytes, None, label.to_string())
            .await?;
        Ok(Arc::new(prefab))
    }

    // ========================================================================
    // Internal Helpers
    // ========================================================================

    fn check_size(&self, size: usize) -> Result<(), AssetError> {
        if size > self.settings.max_bytes {
            return Err(AssetError::TooLarge {
                size,
                limit: self.settings.max_bytes,
            });
        }
        Ok(())
    }

    /// Parses and converts off the caller's task on native targets.
    #[cfg(feature = "gltf")]
    async fn decode_prefab_async(
        &self,
        bytes: Vec<u8>,
        reader: Option<AssetReaderVariant>,
        label: String,
    ) -> Result<Prefab, AssetError> {
        use crate::assets::loaders::GltfLoader;

        let model_size = bytes.len();

        #[cfg(not(target_arch = "wasm32"))]
        let gltf = tokio::task::spawn_blocking(move || GltfLoader::parse(&bytes)).await??;
        #[cfg(target_arch = "wasm32")]
        let gltf = GltfLoader::parse(&bytes)?;

        let buffers = GltfLoader::load_buffers(&gltf, reader.as_ref()).await?;
        self.check_size(model_size + buffers.iter().map(Vec::len).sum::<usize>())?;

        #[cfg(not(target_arch = "wasm32"))]
        {
            tokio::task::spawn_blocking(move || GltfLoader::build_prefab(&gltf, &buffers, &label))
                .await?
        }
        #[cfg(target_arch = "wasm32")]
        {
            GltfLoader::build_prefab(&gltf, &buffers, &label)
        }
    }

    #[cfg(not(feature = "gltf"))]
    async fn decode_prefab_async(
        &self,
        _bytes: Vec<u8>,
        _reader: Option<AssetReaderVariant>,
        label: String,
    ) -> Result<Prefab, AssetError> {
        Err(AssetError::FeatureNotEnabled(format!(
            "gltf (needed to decode '{label}')"
        )))
    }
}
