//! Asset Tests
//!
//! Tests for:
//! - AssetStorage: add, get, add_with_uuid deduplication, removal
//! - UUID lookup: get_by_uuid, get_handle_by_uuid
//! - AssetServer: template cache, insert/evict, blob registration
//! - Locator dispatch: files, blobs, URLs, unsupported schemes
//! - Load failures: missing sources, size limit, empty locator

mod common;

use std::sync::Arc;

use common::{BASE_BONES, init_logger, rig_prefab};
use loadout::assets::io::AssetReaderVariant;
use loadout::assets::storage::AssetStorage;
use loadout::assets::{AssetServer, LoaderSettings, Prefab};
use loadout::errors::AssetError;
use slotmap::new_key_type;
use uuid::Uuid;

new_key_type! { struct TestHandle; }

// ============================================================================
// AssetStorage Basic CRUD
// ============================================================================

#[test]
fn storage_add_and_get() {
    let storage = AssetStorage::<TestHandle, String>::new();
    let handle = storage.add("hello".to_string());
    assert_eq!(&*storage.get(handle).unwrap(), "hello");
    assert_eq!(storage.len(), 1);
}

#[test]
fn storage_foreign_handle_returns_none() {
    let storage = AssetStorage::<TestHandle, String>::new();
    let handle = storage.add("test".to_string());
    let other = AssetStorage::<TestHandle, String>::new();
    assert!(other.get(handle).is_none());
}

// ============================================================================
// UUID-Based Storage
// ============================================================================

#[test]
fn storage_add_with_uuid_keeps_first() {
    let storage = AssetStorage::<TestHandle, i32>::new();
    let uuid = Uuid::new_v4();

    let first = storage.add_with_uuid(uuid, 1);
    let second = storage.add_with_uuid(uuid, 2);

    assert_eq!(first, second);
    assert_eq!(*storage.get_by_uuid(&uuid).unwrap(), 1);
    assert_eq!(storage.len(), 1);
}

#[test]
fn storage_remove_by_uuid() {
    let storage = AssetStorage::<TestHandle, i32>::new();
    let uuid = Uuid::new_v4();
    let handle = storage.add_with_uuid(uuid, 7);

    assert_eq!(storage.remove_by_uuid(&uuid).as_deref(), Some(&7));
    assert!(storage.get(handle).is_none());
    assert!(storage.get_handle_by_uuid(&uuid).is_none());
    assert!(storage.is_empty());
}

#[test]
fn storage_concurrent_reads() {
    let storage = Arc::new(AssetStorage::<TestHandle, i32>::new());
    let handle = storage.add(42);

    let threads: Vec<_> = (0..4)
        .map(|_| {
            let storage = Arc::clone(&storage);
            std::thread::spawn(move || *storage.get(handle).unwrap())
        })
        .collect();

    for t in threads {
        assert_eq!(t.join().unwrap(), 42);
    }
}

// ============================================================================
// AssetServer cache
// ============================================================================

#[tokio::test]
async fn server_cache_hit_shares_template() {
    init_logger();
    let server = AssetServer::new();
    server.insert_prefab("models/base.glb", rig_prefab("Body", &BASE_BONES));

    let a = server.load_prefab_async("models/base.glb").await.unwrap();
    let b = server.load_prefab_async(" models/base.glb ").await.unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.source, "models/base.glb");
}

#[tokio::test]
async fn server_clones_share_cache() {
    let server = AssetServer::new();
    let clone = server.clone();
    clone.insert_prefab("a.glb", Prefab::new());

    assert!(server.is_cached("a.glb"));
    server.clear_cache();
    assert!(!clone.is_cached("a.glb"));
}

#[tokio::test]
async fn server_empty_locator_is_unsupported() {
    let server = AssetServer::new();
    assert!(matches!(
        server.load_prefab_async("   ").await,
        Err(AssetError::UnsupportedLocator(_))
    ));
}

#[tokio::test]
async fn server_missing_file_is_not_found() {
    init_logger();
    let server = AssetServer::new();
    let path = std::env::temp_dir().join(format!("loadout-missing-{}.glb", Uuid::new_v4()));

    let result = server.load_prefab_async(&path.to_string_lossy()).await;

    assert!(matches!(result, Err(AssetError::NotFound(_))));
    assert!(!server.is_cached(&path.to_string_lossy()));
}

#[tokio::test]
async fn server_enforces_size_limit() {
    let server = AssetServer::with_settings(LoaderSettings {
        max_bytes: 16,
        ..LoaderSettings::default()
    });
    let locator = server.register_blob(vec![0u8; 64]);

    match server.load_prefab_async(&locator).await {
        Err(AssetError::TooLarge { size, limit }) => {
            assert_eq!(size, 64);
            assert_eq!(limit, 16);
        }
        other => panic!("expected TooLarge, got {:?}", other.map(|p| p.source.clone())),
    }
}

// ============================================================================
// Blobs
// ============================================================================

#[tokio::test]
async fn blob_locators_are_unique_and_revocable() {
    let server = AssetServer::new();
    let a = server.register_blob(vec![1u8, 2, 3]);
    let b = server.register_blob(vec![1u8, 2, 3]);

    assert!(a.starts_with("blob:"));
    assert_ne!(a, b);

    assert!(server.revoke_blob(&a));
    assert!(!server.revoke_blob(&a));
    assert!(matches!(
        server.load_prefab_async(&a).await,
        Err(AssetError::NotFound(_))
    ));
}

// ============================================================================
// Locator dispatch
// ============================================================================

#[test]
fn locator_dispatch() {
    let blobs = Default::default();

    let (reader, name) = AssetReaderVariant::from_locator("assets/parts/helmet.glb", &blobs, 30).unwrap();
    assert!(matches!(reader, AssetReaderVariant::File(_)));
    assert_eq!(name, "helmet.glb");

    let (reader, name) = AssetReaderVariant::from_locator("blob:1234", &blobs, 30).unwrap();
    assert!(matches!(reader, AssetReaderVariant::Memory(_)));
    assert_eq!(name, "blob:1234");

    for locator in ["", "ftp://host/a.glb", "data:model/gltf+json;base64,AAAA"] {
        assert!(matches!(
            AssetReaderVariant::from_locator(locator, &blobs, 30),
            Err(AssetError::UnsupportedLocator(_))
        ));
    }
}

#[cfg(not(feature = "http"))]
#[test]
fn http_locator_needs_feature() {
    let blobs = Default::default();
    assert!(matches!(
        AssetReaderVariant::from_locator("https://cdn.example.com/base.glb", &blobs, 30),
        Err(AssetError::FeatureNotEnabled(_))
    ));
}

#[cfg(feature = "http")]
#[test]
fn http_locator_requests_file_name() {
    let blobs = Default::default();
    let (reader, name) =
        AssetReaderVariant::from_locator("https://cdn.example.com/rigs/base.glb", &blobs, 30).unwrap();
    assert!(matches!(reader, AssetReaderVariant::Http(_)));
    assert_eq!(name, "base.glb");
}
