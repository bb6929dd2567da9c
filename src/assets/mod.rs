//! Model loading.
//!
//! - [`AssetServer`]: locator → template cache, async loading, blob registry
//! - [`Prefab`]: immutable, thread-safe template parsed from a model file
//! - [`io`]: file / HTTP / in-memory readers behind one enum
//! - [`loaders`]: format decoders (glTF 2.0)

pub mod io;
pub mod loaders;
pub mod prefab;
pub mod server;
pub mod storage;

pub use io::{AssetReader, AssetReaderVariant, BLOB_SCHEME};
#[cfg(feature = "gltf")]
pub use loaders::GltfLoader;
pub use prefab::{Prefab, PrefabNode, PrefabSkeleton, SharedPrefab};
pub use server::{AssetServer, LoaderSettings, PrefabHandle};
pub use storage::AssetStorage;
