//! Asset resolution.
//!
//! Blocks carry content-derived blob ids (an image's `sourceId`). The adapters
//! never read blob bytes themselves: a [`BlobStore`] owns storage and an
//! [`AssetsManager`] turns an id into the path written into markup,
//! `<asset_dir>/<id>.<ext>`.
//!
//! ## Object safety
//!
//! `BlobStore` is used behind `Arc<dyn BlobStore>`, so its methods return
//! boxed futures.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use futures_util::future::join_all;

use crate::config::CodecConfig;
use crate::error::{BlockDocError, Result};

/// A boxed future for object-safe async methods.
#[cfg(not(target_arch = "wasm32"))]
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A boxed future for object-safe async methods.
///
/// No `Send` bound on WASM, where everything runs on one thread.
#[cfg(target_arch = "wasm32")]
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Content-addressed blob storage.
pub trait BlobStore: Send + Sync {
    /// Read a blob. `Ok(None)` when the id is unknown.
    fn get<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>>>;

    /// Store a blob under an id, replacing any previous bytes.
    fn set<'a>(&'a self, id: &'a str, bytes: Vec<u8>) -> BoxFuture<'a, Result<()>>;

    /// Whether a blob exists.
    fn exists<'a>(&'a self, id: &'a str) -> BoxFuture<'a, bool> {
        Box::pin(async move { matches!(self.get(id).await, Ok(Some(_))) })
    }
}

/// In-memory blob store.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, for fixtures.
    pub fn with_blob(self, id: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.blobs.write().unwrap().insert(id.into(), bytes.into());
        self
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.read().unwrap().len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for MemoryBlobStore {
    fn get<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>>> {
        Box::pin(async move { Ok(self.blobs.read().unwrap().get(id).cloned()) })
    }

    fn set<'a>(&'a self, id: &'a str, bytes: Vec<u8>) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.blobs.write().unwrap().insert(id.to_string(), bytes);
            Ok(())
        })
    }
}

/// Blob store reading `<dir>/<id>` files, or `<dir>/<id>.<ext>` when an
/// extension was already attached.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone)]
pub struct DirBlobStore {
    dir: std::path::PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl DirBlobStore {
    /// Serve blobs from a directory.
    pub fn new(dir: impl Into<std::path::PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn find(&self, id: &str) -> Option<std::path::PathBuf> {
        if !is_file_name(id) {
            log::warn!("Refusing blob id '{}' outside {}", id, self.dir.display());
            return None;
        }
        let exact = self.dir.join(id);
        if exact.is_file() {
            return Some(exact);
        }
        let entries = std::fs::read_dir(&self.dir).ok()?;
        entries.flatten().map(|entry| entry.path()).find(|path| {
            path.is_file() && path.file_stem().and_then(|s| s.to_str()) == Some(id)
        })
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl BlobStore for DirBlobStore {
    fn get<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>>> {
        Box::pin(async move {
            match self.find(id) {
                Some(path) => Ok(Some(std::fs::read(path)?)),
                None => Ok(None),
            }
        })
    }

    fn set<'a>(&'a self, id: &'a str, bytes: Vec<u8>) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if !is_file_name(id) {
                return Err(BlockDocError::AssetResolutionFailure {
                    id: id.to_string(),
                    reason: "blob id is not a plain file name".to_string(),
                });
            }
            std::fs::create_dir_all(&self.dir)?;
            std::fs::write(self.dir.join(id), bytes)?;
            Ok(())
        })
    }
}

/// A single path component that stays inside its directory.
#[cfg(not(target_arch = "wasm32"))]
fn is_file_name(id: &str) -> bool {
    !id.is_empty() && !id.contains(['/', '\\', ':', '\0']) && !id.contains("..")
}

/// Guess a file extension from the first bytes of a blob.
pub fn sniff_extension(bytes: &[u8]) -> Option<&'static str> {
    const SIGNATURES: [(&[u8], &str); 6] = [
        (b"\x89PNG\r\n\x1a\n", "png"),
        (b"\xff\xd8\xff", "jpg"),
        (b"GIF87a", "gif"),
        (b"GIF89a", "gif"),
        (b"%PDF-", "pdf"),
        (b"<svg", "svg"),
    ];
    if let Some(&(_, ext)) = SIGNATURES.iter().find(|(magic, _)| bytes.starts_with(magic)) {
        return Some(ext);
    }
    if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some("webp");
    }
    None
}

/// Resolves blob ids to asset paths.
#[derive(Clone)]
pub struct AssetsManager {
    blobs: Arc<dyn BlobStore>,
    asset_dir: String,
    default_extension: String,
}

impl AssetsManager {
    /// Create a manager over a blob store, using the config's asset settings.
    pub fn new(blobs: Arc<dyn BlobStore>, config: &CodecConfig) -> Self {
        Self {
            blobs,
            asset_dir: config.asset_dir.clone(),
            default_extension: config.default_asset_extension.clone(),
        }
    }

    /// The underlying blob store.
    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Resolve one id to `<asset_dir>/<id>.<ext>`.
    ///
    /// # Errors
    ///
    /// Returns [`BlockDocError::AssetResolutionFailure`] if the id is empty,
    /// unknown to the store, or the store fails.
    pub async fn resolve(&self, id: &str) -> Result<String> {
        if id.is_empty() {
            return Err(BlockDocError::AssetResolutionFailure {
                id: id.to_string(),
                reason: "empty blob id".to_string(),
            });
        }
        let bytes = self
            .blobs
            .get(id)
            .await
            .map_err(|e| BlockDocError::AssetResolutionFailure {
                id: id.to_string(),
                reason: e.to_string(),
            })?
            .ok_or_else(|| BlockDocError::AssetResolutionFailure {
                id: id.to_string(),
                reason: "blob not found".to_string(),
            })?;

        let ext = sniff_extension(&bytes).unwrap_or(self.default_extension.as_str());
        Ok(format!("{}/{}.{}", self.asset_dir, id, ext))
    }

    /// Resolve many ids concurrently.
    ///
    /// Every id gets an entry; a failed lookup only affects its own entry.
    pub async fn prefetch<'a, I>(&self, ids: I) -> HashMap<String, Result<String>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut unique: Vec<&str> = ids.into_iter().collect();
        unique.sort_unstable();
        unique.dedup();

        let results = join_all(unique.iter().map(|id| self.resolve(id))).await;
        unique
            .into_iter()
            .map(String::from)
            .zip(results)
            .collect()
    }
}

impl std::fmt::Debug for AssetsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetsManager")
            .field("asset_dir", &self.asset_dir)
            .field("default_extension", &self.default_extension)
            .finish()
    }
}
