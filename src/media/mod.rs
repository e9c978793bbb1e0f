//! # Media Pipeline Module
//!
//! Cache-first, retrying media acquisition.
//!
//! ## Resolution Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       MEDIA RESOLUTION                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  resolve(url)                                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  1. Derive canonical key (display name overrides URL-derived name)      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  2. BlobCache.get(key) ──hit──► progress(100) once, return handle       │
//! │       │ miss                     (the transport is never invoked)       │
//! │       ▼                                                                 │
//! │  3. Host-native channel (desktop shell only)                            │
//! │       │ any failure falls back, same attempt                            │
//! │       ▼                                                                 │
//! │  4. Streaming transport (always available, proportional progress)       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  5. MIME from response header, else extension table                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  6. BlobCache.put(key, blob) ──► revocable process-lifetime handle      │
//! │                                                                         │
//! │  Recoverable failure in 2-6: 3 more attempts, backoff attempt × unit.   │
//! │  Partial buffers are discarded and never cached.                        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No cross-call deduplication: concurrent `resolve` calls for one key
//! each download independently; the overwrite-idempotent `put` makes
//! that benign.

mod transport;

pub use transport::{ByteTransport, FetchedBytes, HostChannel, HttpStreamTransport, ProgressFn};

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::cache::{key_for_url, mime_for_filename, BlobCache};
use crate::error::Result;

/// Media pipeline configuration
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Additional attempts after the first failure
    pub max_retries: u32,
    /// Backoff unit; the delay before retry `n` is `n × backoff_unit`
    pub backoff_unit: Duration,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_unit: Duration::from_millis(500),
        }
    }
}

/// Revocable, process-lifetime reference to resolved media bytes.
///
/// The caller owns releasing it via [`MediaPipeline::release`]; dropping
/// the pipeline releases everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaHandle(Uuid);

/// Result of a media resolution.
#[derive(Debug, Clone)]
pub struct ResolvedMedia {
    /// Handle to the in-memory payload.
    pub handle: MediaHandle,
    /// Canonical file name the payload was cached under.
    pub file_name: String,
    /// Payload size in bytes.
    pub size: u64,
    /// Resolved MIME type.
    pub mime_type: String,
}

/// Cache-first media acquisition pipeline.
pub struct MediaPipeline {
    cache: Arc<BlobCache>,
    streaming: Arc<dyn ByteTransport>,
    host_channel: Option<Arc<dyn HostChannel>>,
    config: MediaConfig,
    /// Live handles: id → payload
    handles: Mutex<HashMap<Uuid, Bytes>>,
}

impl MediaPipeline {
    /// Create a pipeline over a scope's blob cache.
    ///
    /// `host_channel` is present only when running under the desktop
    /// shell; everywhere else the streaming transport does all fetching.
    pub fn new(
        cache: Arc<BlobCache>,
        streaming: Arc<dyn ByteTransport>,
        host_channel: Option<Arc<dyn HostChannel>>,
        config: MediaConfig,
    ) -> Self {
        Self {
            cache,
            streaming,
            host_channel,
            config,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a media URL to a local handle plus metadata.
    ///
    /// Cache hits return immediately with a single `progress(100)`
    /// report. Misses download, cache, and then return; recoverable
    /// failures retry with linear backoff before the terminating error
    /// propagates, non-recoverable ones propagate at once.
    pub async fn resolve(
        &self,
        url: &str,
        display_name: Option<&str>,
        on_progress: Option<ProgressFn>,
    ) -> Result<ResolvedMedia> {
        let mut progress: ProgressFn = on_progress.unwrap_or_else(|| Box::new(|_| {}));

        let key = key_for_url(url, display_name)?;

        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = self.config.backoff_unit * attempt;
                tracing::warn!(url, key, attempt, "Retrying media resolution in {:?}", delay);
                tokio::time::sleep(delay).await;
            }

            match self.attempt(url, &key, &mut progress).await {
                Ok(resolved) => return Ok(resolved),
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(url, key, attempt, error = %e, "Media resolution attempt failed");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        // Unreachable only if max_retries wrapped, which it cannot
        Err(last_error.expect("at least one attempt was made"))
    }

    /// One full resolution attempt: cache check, fetch, cache fill.
    async fn attempt(
        &self,
        url: &str,
        key: &str,
        progress: &mut (dyn FnMut(u8) + Send),
    ) -> Result<ResolvedMedia> {
        if let Some(blob) = self.cache.get(key)? {
            progress(100);
            tracing::debug!(key, "Media cache hit");
            return Ok(ResolvedMedia {
                handle: self.register(blob.bytes),
                file_name: key.to_string(),
                size: blob.size,
                mime_type: blob.mime_type,
            });
        }

        let fetched = self.fetch_once(url, progress).await?;
        let mime_type = fetched
            .mime_type
            .unwrap_or_else(|| mime_for_filename(key).to_string());

        let size = fetched.bytes.len() as u64;
        self.cache.put(key, fetched.bytes.clone(), &mime_type)?;

        Ok(ResolvedMedia {
            handle: self.register(fetched.bytes),
            file_name: key.to_string(),
            size,
            mime_type,
        })
    }

    /// Fetch via the host-native channel when available, falling back to
    /// the streaming transport for the remainder of the attempt.
    async fn fetch_once(
        &self,
        url: &str,
        progress: &mut (dyn FnMut(u8) + Send),
    ) -> Result<FetchedBytes> {
        if let Some(channel) = &self.host_channel {
            match channel.fetch_bytes(url).await {
                Ok(bytes) => {
                    progress(100);
                    return Ok(FetchedBytes {
                        bytes,
                        mime_type: None,
                    });
                }
                Err(e) => {
                    tracing::warn!(url, error = %e, "Host channel fetch failed, falling back to streaming");
                }
            }
        }

        self.streaming.fetch(url, progress).await
    }

    // ========================================================================
    // HANDLE TABLE
    // ========================================================================

    fn register(&self, bytes: Bytes) -> MediaHandle {
        let id = Uuid::new_v4();
        self.handles.lock().insert(id, bytes);
        MediaHandle(id)
    }

    /// Read the payload behind a handle, if it is still live.
    pub fn handle_bytes(&self, handle: &MediaHandle) -> Option<Bytes> {
        self.handles.lock().get(&handle.0).cloned()
    }

    /// Release a handle, freeing its payload reference.
    pub fn release(&self, handle: MediaHandle) {
        self.handles.lock().remove(&handle.0);
    }

    /// Number of live handles.
    pub fn live_handles(&self) -> usize {
        self.handles.lock().len()
    }
}

// ============================================================================
// TESTS
// ============================================================================
