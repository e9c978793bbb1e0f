//! # Shoptalk Core
//!
//! Local-first persistence and media acquisition for a chat/commerce
//! client: durable per-identity record storage, a filename-keyed media
//! cache, cursor-paginated message history, a retrying fetch pipeline
//! and a realtime sync bridge.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       SHOPTALK CORE MODULES                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐  ┌──────────────┐   │
//! │  │    Sync     │  │    Media    │  │    Store    │  │    Cache     │   │
//! │  │             │  │             │  │             │  │              │   │
//! │  │ - Subscribe │  │ - Resolve   │  │ - Records   │  │ - Blobs      │   │
//! │  │ - Send      │  │ - Retry     │  │ - Indexes   │  │ - MIME       │   │
//! │  │ - Presence  │  │ - Progress  │  │ - Paging    │  │ - Keys       │   │
//! │  └──────┬──────┘  └──────┬──────┘  └──────┬──────┘  └──────┬───────┘   │
//! │         │                │                │                │           │
//! │         └────────────────┴───────┬────────┴────────────────┘           │
//! │                                  │                                     │
//! │                         ┌────────┴────────┐                            │
//! │                         │  Scope Registry │  one store + cache pair    │
//! │                         │                 │  per signed-in identity    │
//! │                         └─────────────────┘                            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`scope`] - Per-identity registry of store and cache handles
//! - [`store`] - Durable record storage (SQLite) and message pagination
//! - [`cache`] - Filename-keyed local cache for binary media
//! - [`media`] - Cache-first, retrying media acquisition pipeline
//! - [`sync`] - Realtime subscriptions and optimistic outbound writes
//!
//! ## Data Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            DATA FLOW                                    │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Inbound                                                                │
//! │  ───────                                                                │
//! │  realtime channel ──snapshots──► SyncBridge ──upserts──► RecordStore    │
//! │  media URL ──► MediaPipeline ──► BlobCache ──handle──► caller           │
//! │                                                                         │
//! │  Outbound                                                               │
//! │  ────────                                                               │
//! │  send_message ──► RecordStore (SENDING) ──► realtime channel            │
//! │                            │                     │                      │
//! │                            └──── HAS_SENT ◄── ok ┘                      │
//! │                                                                         │
//! │  Reads never wait on the network; the store is the source of truth      │
//! │  for the UI between snapshots.                                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod cache;
pub mod error;
pub mod media;
pub mod scope;
pub mod store;
pub mod sync;
/// Wall-clock helpers shared by timestamps and cache metadata.
pub mod time;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use cache::{BlobCache, CacheConfig, CachedBlob};
pub use error::{Error, Result};
pub use media::{MediaConfig, MediaHandle, MediaPipeline, ResolvedMedia};
pub use scope::{RegistryConfig, ScopeHandle, ScopeRegistry};
pub use store::{
    Contact, Conversation, ConversationUser, DeliveryOutcome, DeliveryState, Message,
    MessageIndex, MessageKind, Record, RecordStore, ScopeId, StoreConfig,
};
pub use sync::{MessageDraft, RealtimeChannel, SyncBridge};
