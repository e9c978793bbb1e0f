//! # Media Transports
//!
//! The two ways bytes get fetched: an optional host-native channel
//! (desktop shell IPC, full-buffer) and the always-available streaming
//! HTTP transport with progress-observable body reads.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;

use crate::error::{Error, Result};

/// Progress callback, invoked with a 0-100 percentage.
///
/// Callbacks fire synchronously within the transport's read loop;
/// callers must not block inside them.
pub type ProgressFn = Box<dyn FnMut(u8) + Send>;

/// Bytes fetched by a transport, with the MIME type the response
/// declared (if any).
#[derive(Debug, Clone)]
pub struct FetchedBytes {
    /// The full payload.
    pub bytes: Bytes,
    /// Content type from the response header, when present.
    pub mime_type: Option<String>,
}

/// Streaming byte fetch seam.
///
/// The pipeline drives retries and caching; a transport performs exactly
/// one fetch attempt.
#[async_trait]
pub trait ByteTransport: Send + Sync {
    /// Fetch the resource, reporting proportional progress when the
    /// payload length is known up front.
    async fn fetch(&self, url: &str, progress: &mut (dyn FnMut(u8) + Send)) -> Result<FetchedBytes>;
}

/// Host-native byte channel, present only under a desktop shell.
///
/// A single inter-process call returning the full byte buffer. Any
/// failure here makes the pipeline fall back to the streaming transport
/// for the remainder of the attempt.
#[async_trait]
pub trait HostChannel: Send + Sync {
    /// Fetch the full payload through the host process.
    async fn fetch_bytes(&self, url: &str) -> Result<Bytes>;
}

/// Streaming HTTP transport backed by reqwest.
pub struct HttpStreamTransport {
    client: reqwest::Client,
}

impl HttpStreamTransport {
    /// Create a transport with a fresh HTTP client.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpStreamTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ByteTransport for HttpStreamTransport {
    async fn fetch(&self, url: &str, progress: &mut (dyn FnMut(u8) + Send)) -> Result<FetchedBytes> {
        let response = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::TransportError(format!("HTTP status error for {}: {}", url, e)))?;

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());

        // Progress is only reported when the server declares a length
        let declared_len = response.content_length();

        let mut body = response.bytes_stream();
        let mut buffer = BytesMut::new();
        let mut last_pct: Option<u8> = None;

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            buffer.extend_from_slice(&chunk);

            if let Some(total) = declared_len {
                if total > 0 {
                    let pct = ((buffer.len() as u64).min(total) * 100 / total) as u8;
                    if last_pct != Some(pct) {
                        last_pct = Some(pct);
                        progress(pct);
                    }
                }
            }
        }

        Ok(FetchedBytes {
            bytes: buffer.freeze(),
            mime_type,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
