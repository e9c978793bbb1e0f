//! # Error Handling
//!
//! This module provides the error types for ShopTalk Core.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                      │
//! │  │                                                                      │
//! │  ├── Lifecycle Errors                                                   │
//! │  │   ├── NotInitialized      - Operation before scope open              │
//! │  │   └── ValidationError     - Missing required identifier              │
//! │  │                                                                      │
//! │  ├── Storage Errors                                                     │
//! │  │   ├── StorageError        - Engine/transaction failure               │
//! │  │   ├── SchemaError         - Open/migration failure                   │
//! │  │   └── NotFound            - Logical absence of a record              │
//! │  │                                                                      │
//! │  ├── Transport Errors                                                   │
//! │  │   ├── TransportError      - Network/IPC failure (retryable)          │
//! │  │   └── ChannelClosed       - Realtime channel went away               │
//! │  │                                                                      │
//! │  └── Internal Errors                                                    │
//! │      └── SerializationError  - Record encode/decode failure             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only the media pipeline retries internally (on retryable errors); every
//! other component propagates the first error and leaves retry policy to
//! the caller.

use thiserror::Error;

/// Result type alias for ShopTalk Core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ShopTalk Core
///
/// Errors are categorized by module/domain so the host layer can map them
/// onto user-visible notifications.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Lifecycle Errors (100-199)
    // ========================================================================

    /// Operation invoked before the scope was opened
    #[error("Scope '{0}' has not been opened. Call ScopeRegistry::open() first.")]
    NotInitialized(String),

    /// A required identifier was missing or empty
    #[error("Validation failed: {0}")]
    ValidationError(String),

    // ========================================================================
    // Storage Errors (400-499)
    // ========================================================================

    /// Underlying storage engine failure
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Schema creation or migration failed during open
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// A requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    // ========================================================================
    // Transport Errors (500-599)
    // ========================================================================

    /// Network or inter-process transport failure (retryable)
    #[error("Transport error: {0}")]
    TransportError(String),

    /// The realtime channel closed while a subscription was live
    #[error("Realtime channel closed: {0}")]
    ChannelClosed(String),

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================

    /// Record serialization or deserialization failed
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl Error {
    /// Get the error code for the host boundary
    ///
    /// Error codes are organized by category:
    /// - 100-199: Lifecycle
    /// - 400-499: Storage
    /// - 500-599: Transport
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            // Lifecycle (100-199)
            Error::NotInitialized(_) => 100,
            Error::ValidationError(_) => 101,

            // Storage (400-499)
            Error::StorageError(_) => 400,
            Error::SchemaError(_) => 401,
            Error::NotFound(_) => 402,

            // Transport (500-599)
            Error::TransportError(_) => 500,
            Error::ChannelClosed(_) => 501,

            // Internal (900-999)
            Error::SerializationError(_) => 900,
        }
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors can potentially be resolved by retrying. The
    /// media pipeline uses this to decide whether another attempt is
    /// worthwhile.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::TransportError(_) | Error::StorageError(_))
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::StorageError(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::TransportError(err.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================
