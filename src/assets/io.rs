use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::errors::AssetError;

/// Prefix of locators that refer to bytes registered in memory.
pub const BLOB_SCHEME: &str = "blob:";

/// Asset reader trait.
/// Reads raw bytes from local files, the network or memory.
pub trait AssetReader: Send + Sync {
    /// Reads `uri`, resolved against the reader's root.
    fn read_bytes(&self, uri: &str) -> impl Future<Output = Result<Vec<u8>, AssetError>> + Send;
}

/// Local file reader.
pub struct FileAssetReader {
    root_path: PathBuf,
}

impl FileAssetReader {
    /// `path` may be the model file itself; its directory becomes the root.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let root_path = if path.is_file() || path.extension().is_some() {
            path.parent().unwrap_or(Path::new(".")).to_path_buf()
        } else {
            path.to_path_buf()
        };
        Self { root_path }
    }

    #[inline]
    #[must_use]
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }
}

impl AssetReader for FileAssetReader {
    async fn read_bytes(&self, uri: &str) -> Result<Vec<u8>, AssetError> {
        let path = self.root_path.join(uri);

        #[cfg(not(target_arch = "wasm32"))]
        let result = tokio::fs::read(&path).await;
        #[cfg(target_arch = "wasm32")]
        let result = std::fs::read(&path);

        result.map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => AssetError::NotFound(path.display().to_string()),
            _ => AssetError::Io(err),
        })
    }
}

/// HTTP reader (feature `http`).
#[cfg(feature = "http")]
pub struct HttpAssetReader {
    root_url: url::Url,
    timeout: std::time::Duration,
}

#[cfg(feature = "http")]
impl HttpAssetReader {
    pub fn new(url_str: &str, timeout_secs: u64) -> Result<Self, AssetError> {
        let url = url::Url::parse(url_str)
            .map_err(|e| AssetError::UnsupportedLocator(format!("{url_str}: {e}")))?;

        // Strip the file name so sibling resources (external buffers) resolve
        let root_url = if url.path().ends_with('/') {
            url
        } else {
            let mut u = url.clone();
            if let Ok(mut segments) = u.path_segments_mut() {
                segments.pop();
                segments.push("");
            }
            u
        };

        Ok(Self {
            root_url,
            timeout: std::time::Duration::from_secs(timeout_secs),
        })
    }

    #[inline]
    #[must_use]
    pub fn root_url(&self) -> &url::Url {
        &self.root_url
    }

    async fn fetch(&self, url: url::Url) -> Result<Vec<u8>, AssetError> {
        let request = ehttp::Request::get(url.as_str());
        let response = ehttp::fetch_async(request)
            .await
            .map_err(AssetError::Http)?;

        match response.status {
            200..=299 => Ok(response.bytes),
            404 => Err(AssetError::NotFound(url.to_string())),
            status => Err(AssetError::Http(format!(
                "{url}: {status} {}",
                response.status_text
            ))),
        }
    }
}

#[cfg(feature = "http")]
impl AssetReader for HttpAssetReader {
    async fn read_bytes(&self, uri: &str) -> Result<Vec<u8>, AssetError> {
        let url = self
            .root_url
            .join(uri)
            .map_err(|e| AssetError::UnsupportedLocator(format!("{uri}: {e}")))?;

        #[cfg(not(target_arch = "wasm32"))]
        {
            tokio::time::timeout(self.timeout, self.fetch(url.clone()))
                .await
                .map_err(|_| AssetError::Http(format!("{url}: timed out after {:?}", self.timeout)))?
        }
        #[cfg(target_arch = "wasm32")]
        {
            self.fetch(url).await
        }
    }
}

/// Shared table of in-memory sources, keyed by full `blob:` locator.
pub type BlobTable = Arc<RwLock<FxHashMap<String, Arc<[u8]>>>>;

/// Serves bytes registered under `blob:` locators.
///
/// Stand-in for browser object URLs: a file picked or dropped by a user is
/// registered once and then loaded like any other source.
pub struct MemoryAssetReader {
    blobs: BlobTable,
}

impl MemoryAssetReader {
    #[must_use]
    pub fn new(blobs: BlobTable) -> Self {
        Self { blobs }
    }
}

impl AssetReader for MemoryAssetReader {
    async fn read_bytes(&self, uri: &str) -> Result<Vec<u8>, AssetError> {
        let guard = self.blobs.read();
        guard
            .get(uri)
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| AssetError::NotFound(uri.to_string()))
    }
}

/// Reader variant enum, avoids trait objects.
#[derive(Clone)]
pub enum AssetReaderVariant {
    File(Arc<FileAssetReader>),
    #[cfg(feature = "http")]
    Http(Arc<HttpAssetReader>),
    Memory(Arc<MemoryAssetReader>),
}

impl AssetReaderVariant {
    /// Picks a reader for `locator`.
    ///
    /// Returns the reader and the name to request from it: the file name for
    /// paths and URLs (so relative buffer URIs resolve next to the model), the
    /// whole locator for blobs.
    pub fn from_locator(
        locator: &str,
        blobs: &BlobTable,
        http_timeout_secs: u64,
    ) -> Result<(Self, String), AssetError> {
        let locator = locator.trim();
        if locator.is_empty() {
            return Err(AssetError::UnsupportedLocator(String::new()));
        }

        if locator.starts_with(BLOB_SCHEME) {
            let reader = Self::Memory(Arc::new(MemoryAssetReader::new(blobs.clone())));
            return Ok((reader, locator.to_string()));
        }

        if locator.starts_with("http://") || locator.starts_with("https://") {
            #[cfg(feature = "http")]
            {
                let reader = HttpAssetReader::new(locator, http_timeout_secs)?;
                let name = reader
                    .root_url()
                    .make_relative(&url::Url::parse(locator).map_err(|e| {
                        AssetError::UnsupportedLocator(format!("{locator}: {e}"))
                    })?)
                    .unwrap_or_else(|| Self::source_filename(locator).to_string());
                return Ok((Self::Http(Arc::new(reader)), name));
            }
            #[cfg(not(feature = "http"))]
            {
                let _ = http_timeout_secs;
                return Err(AssetError::FeatureNotEnabled(
                    "http (enable it with `features = [\"http\"]`)".to_string(),
                ));
            }
        }

        if locator.contains("://") || locator.starts_with("data:") {
            return Err(AssetError::UnsupportedLocator(locator.to_string()));
        }

        let reader = Self::File(Arc::new(FileAssetReader::new(locator)));
        Ok((reader, Self::source_filename(locator).to_string()))
    }

    pub async fn read_bytes(&self, uri: &str) -> Result<Vec<u8>, AssetError> {
        match self {
            Self::File(r) => r.read_bytes(uri).await,
            #[cfg(feature = "http")]
            Self::Http(r) => r.read_bytes(uri).await,
            Self::Memory(r) => r.read_bytes(uri).await,
        }
    }

    /// File-name part of a path or URL.
    #[must_use]
    pub fn source_filename(source: &str) -> &str {
        if source.starts_with("http://") || source.starts_with("https://") {
            source.rsplit('/').next().unwrap_or(source)
        } else {
            Path::new(source)
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or(source)
        }
    }
}
