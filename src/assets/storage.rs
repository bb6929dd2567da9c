use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use slotmap::{Key, SlotMap};
use std::sync::Arc;
use uuid::Uuid;

// Internal data, guarded by the lock.
struct StorageInner<H: Key, T> {
    map: SlotMap<H, Arc<T>>,
    lookup: FxHashMap<Uuid, H>,
}

impl<H: Key, T> Default for StorageInner<H, T> {
    fn default() -> Self {
        Self {
            map: SlotMap::default(),
            lookup: FxHashMap::default(),
        }
    }
}

/// Thread-safe, UUID-deduplicated asset container.
///
/// Values are handed out as `Arc<T>`, so readers never hold the lock while
/// using an asset.
pub struct AssetStorage<H: Key, T> {
    inner: RwLock<StorageInner<H, T>>,
}

impl<H: Key, T> Default for AssetStorage<H, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Key, T> AssetStorage<H, T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::default(),
        }
    }

    /// [Write] Adds an anonymous asset.
    pub fn add(&self, asset: impl Into<T>) -> H {
        let mut guard = self.inner.write();
        guard.map.insert(Arc::new(asset.into()))
    }

    /// [Write] Adds an asset under `uuid`.
    /// If the uuid is already present the existing handle wins and `asset` is dropped.
    pub fn add_with_uuid(&self, uuid: Uuid, asset: impl Into<T>) -> H {
        let mut guard = self.inner.write();
        if let Some(&handle) = guard.lookup.get(&uuid) {
            return handle;
        }
        let handle = guard.map.insert(Arc::new(asset.into()));
        guard.lookup.insert(uuid, handle);
        handle
    }

    /// [Read]
    pub fn get(&self, handle: H) -> Option<Arc<T>> {
        let guard = self.inner.read();
        guard.map.get(handle).cloned()
    }

    pub fn get_by_uuid(&self, uuid: &Uuid) -> Option<Arc<T>> {
        let guard = self.inner.read();
        let handle = guard.lookup.get(uuid)?;
        guard.map.get(*handle).cloned()
    }

    pub fn get_handle_by_uuid(&self, uuid: &Uuid) -> Option<H> {
        let guard = self.inner.read();
        guard.lookup.get(uuid).copied()
    }

    /// [Write] Drops the storage's reference. Outstanding `Arc`s stay valid.
    pub fn remove_by_uuid(&self, uuid: &Uuid) -> Option<Arc<T>> {
        let mut guard = self.inner.write();
        let handle = guard.lookup.remove(uuid)?;
        guard.map.remove(handle)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut guard = self.inner.write();
        guard.map.clear();
        guard.lookup.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::new_key_type;

    new_key_type! { struct TestHandle; }

    #[test]
    fn uuid_dedup_keeps_first() {
        let storage: AssetStorage<TestHandle, String> = AssetStorage::new();
        let id = Uuid::new_v4();

        let a = storage.add_with_uuid(id, "first");
        let b = storage.add_with_uuid(id, "second");

        assert_eq!(a, b);
        assert_eq!(storage.len(), 1);
        assert_eq!(storage.get_by_uuid(&id).as_deref().map(String::as_str), Some("first"));
    }

    #[test]
    fn removal_keeps_outstanding_arcs() {
        let storage: AssetStorage<TestHandle, String> = AssetStorage::new();
        let id = Uuid::new_v4();
        storage.add_with_uuid(id, "kept");

        let held = storage.get_by_uuid(&id).unwrap();
        assert!(storage.remove_by_uuid(&id).is_some());
        assert!(storage.get_by_uuid(&id).is_none());
        assert!(storage.is_empty());
        assert_eq!(held.as_str(), "kept");
    }
}
