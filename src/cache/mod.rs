//! # Blob Cache Module
//!
//! Content-addressed (by filename) local cache for downloaded binary
//! media, scoped per identity.
//!
//! ## Cache Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          BLOB CACHE                                     │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  {data_dir}/media_cache/{scope}/                                        │
//! │  ├── a3f1b2.png          payload files, named by canonical key          │
//! │  ├── voice-note.amr                                                     │
//! │  └── receipt.pdf                                                        │
//! │                                                                         │
//! │  In-memory meta map (key → size, MIME, last_modified), rebuilt from     │
//! │  disk on open with MIME resolved from the extension table.              │
//! │                                                                         │
//! │  The canonical key is the last path segment of the source URL with      │
//! │  query parameters stripped. Two distinct resources sharing a filename   │
//! │  collide; that is accepted by design of this key scheme, not a defect.  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod mime;

pub use mime::{mime_for_extension, mime_for_filename, OCTET_STREAM};

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::store::ScopeId;

/// Blob cache configuration
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// Base data directory; payloads live under `media_cache/{scope}`
    /// inside it (None = in-memory, useful for testing)
    pub data_dir: Option<PathBuf>,
}

/// A cached media blob with its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedBlob {
    /// Canonical filename key.
    pub key: String,
    /// Payload bytes.
    pub bytes: Bytes,
    /// Payload size in bytes.
    pub size: u64,
    /// MIME type.
    pub mime_type: String,
    /// When the entry was written, Unix timestamp ms.
    pub last_modified: i64,
    /// Owning scope.
    pub scope: ScopeId,
}

/// Per-key metadata kept in memory.
#[derive(Debug, Clone)]
struct BlobMeta {
    size: u64,
    mime_type: String,
    last_modified: i64,
}

/// Derive the canonical cache key for a source URL.
///
/// The key is the last path segment with query parameters (and any
/// fragment) stripped; `display_name` overrides the URL-derived name and
/// goes through the same normalization so keys never contain separators.
pub fn key_for_url(url: &str, display_name: Option<&str>) -> Result<String> {
    let source = match display_name {
        Some(name) if !name.trim().is_empty() => name,
        _ => url,
    };

    let stripped = source
        .split_once('?')
        .map(|(before, _)| before)
        .unwrap_or(source);
    let stripped = stripped
        .split_once('#')
        .map(|(before, _)| before)
        .unwrap_or(stripped);

    let key = stripped.rsplit('/').next().unwrap_or("");
    if key.is_empty() {
        return Err(Error::ValidationError(format!(
            "no file name could be derived from '{}'",
            source
        )));
    }

    Ok(key.to_string())
}

/// Per-scope blob cache handle.
///
/// Payloads are stored on disk under the scope's cache directory (or in
/// memory when no data directory is configured); metadata lives in an
/// in-memory map rebuilt from disk on open.
pub struct BlobCache {
    scope: ScopeId,
    /// Payload directory (None = memory-backed)
    cache_dir: Option<PathBuf>,
    /// key → metadata
    meta: Mutex<HashMap<String, BlobMeta>>,
    /// key → payload, used only when memory-backed
    memory: Mutex<HashMap<String, Bytes>>,
}

impl BlobCache {
    /// Open the cache for a scope, rebuilding metadata from any payload
    /// files already on disk.
    pub fn open(scope: &ScopeId, config: &CacheConfig) -> Result<Self> {
        let cache_dir = match &config.data_dir {
            Some(dir) => {
                let dir = dir.join("media_cache").join(scope.as_str());
                std::fs::create_dir_all(&dir)?;
                Some(dir)
            }
            None => None,
        };

        let cache = Self {
            scope: scope.clone(),
            cache_dir,
            meta: Mutex::new(HashMap::new()),
            memory: Mutex::new(HashMap::new()),
        };

        let restored = cache.load_from_disk()?;
        if restored > 0 {
            tracing::info!(scope = %cache.scope, restored, "Blob cache metadata restored from disk");
        }

        Ok(cache)
    }

    /// The scope this cache was opened for.
    pub fn scope(&self) -> &ScopeId {
        &self.scope
    }

    /// Rebuild the metadata map from payload files on disk.
    ///
    /// MIME types are re-resolved from the extension table; the original
    /// response header is not persisted.
    fn load_from_disk(&self) -> Result<usize> {
        let dir = match &self.cache_dir {
            Some(d) => d,
            None => return Ok(0),
        };

        let mut meta = self.meta.lock();
        let mut count = 0;

        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let key = entry.file_name().to_string_lossy().to_string();
            let file_meta = entry.metadata()?;
            let last_modified = file_meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as i64)
                .unwrap_or_else(crate::time::now_timestamp_millis);

            meta.insert(
                key.clone(),
                BlobMeta {
                    size: file_meta.len(),
                    mime_type: mime_for_filename(&key).to_string(),
                    last_modified,
                },
            );
            count += 1;
        }

        Ok(count)
    }

    fn payload_path(&self, key: &str) -> Option<PathBuf> {
        self.cache_dir.as_ref().map(|d| d.join(key))
    }

    // ========================================================================
    // CACHE OPERATIONS
    // ========================================================================

    /// Get a cached blob. A miss is not an error.
    pub fn get(&self, key: &str) -> Result<Option<CachedBlob>> {
        let meta = match self.meta.lock().get(key).cloned() {
            Some(m) => m,
            None => return Ok(None),
        };

        let bytes = match self.payload_path(key) {
            Some(path) => match std::fs::read(&path) {
                Ok(data) => Bytes::from(data),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    // Payload vanished out from under the meta map;
                    // treat as a miss and drop the stale entry.
                    self.meta.lock().remove(key);
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            },
            None => match self.memory.lock().get(key).cloned() {
                Some(data) => data,
                None => return Ok(None),
            },
        };

        Ok(Some(CachedBlob {
            key: key.to_string(),
            bytes,
            size: meta.size,
            mime_type: meta.mime_type,
            last_modified: meta.last_modified,
            scope: self.scope.clone(),
        }))
    }

    /// Store a blob under a key, overwriting any existing entry.
    pub fn put(&self, key: &str, bytes: Bytes, mime_type: &str) -> Result<()> {
        if key.is_empty() || key.contains('/') || key.contains('\\') {
            return Err(Error::ValidationError(format!(
                "invalid cache key '{}'",
                key
            )));
        }

        match self.payload_path(key) {
            Some(path) => std::fs::write(&path, &bytes)?,
            None => {
                self.memory.lock().insert(key.to_string(), bytes.clone());
            }
        }

        self.meta.lock().insert(
            key.to_string(),
            BlobMeta {
                size: bytes.len() as u64,
                mime_type: mime_type.to_string(),
                last_modified: crate::time::now_timestamp_millis(),
            },
        );

        tracing::debug!(scope = %self.scope, key, size = bytes.len(), "Blob cached");
        Ok(())
    }

    /// Remove one cached entry.
    pub fn clear(&self, key: &str) -> Result<()> {
        if self.meta.lock().remove(key).is_some() {
            if let Some(path) = self.payload_path(key) {
                match std::fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
            self.memory.lock().remove(key);
        }
        Ok(())
    }

    /// Remove every cached entry for this scope.
    pub fn clear_all(&self) -> Result<()> {
        let keys: Vec<String> = self.meta.lock().keys().cloned().collect();
        for key in keys {
            self.clear(&key)?;
        }
        tracing::info!(scope = %self.scope, "Blob cache cleared");
        Ok(())
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.meta.lock().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.meta.lock().is_empty()
    }

    /// Total payload bytes currently cached.
    pub fn total_size(&self) -> u64 {
        self.meta.lock().values().map(|m| m.size).sum()
    }
}

// ============================================================================
// TESTS
// ============================================================================
