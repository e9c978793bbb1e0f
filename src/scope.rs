//! # Scope Registry
//!
//! Explicit owner of per-identity storage handles. Opening a scope
//! builds its record store and blob cache as a pair; everything
//! downstream borrows from the registry instead of reaching for a
//! global.
//!
//! Exactly one handle pair is live per scope. Re-opening a scope drops
//! the previous pair first, so a stale connection can never outlive a
//! sign-out/sign-in cycle.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::{BlobCache, CacheConfig};
use crate::error::{Error, Result};
use crate::store::{RecordStore, ScopeId, StoreConfig};

/// Registry configuration
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// Base data directory shared by stores and caches (None = in-memory
    /// stores and memory-backed caches, useful for testing)
    pub data_dir: Option<PathBuf>,
}

/// The storage handles of one open scope.
#[derive(Clone)]
pub struct ScopeHandle {
    /// Durable record store.
    pub store: Arc<RecordStore>,
    /// Media blob cache.
    pub cache: Arc<BlobCache>,
}

/// Registry of open scopes.
pub struct ScopeRegistry {
    config: RegistryConfig,
    scopes: Mutex<HashMap<String, ScopeHandle>>,
}

impl ScopeRegistry {
    /// Create an empty registry.
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            scopes: Mutex::new(HashMap::new()),
        }
    }

    /// Open a scope's store and cache, replacing any previous handles
    /// for the same scope.
    pub async fn open(&self, scope: &ScopeId) -> Result<ScopeHandle> {
        let store_config = StoreConfig {
            data_dir: self.config.data_dir.clone(),
        };
        let cache_config = CacheConfig {
            data_dir: self.config.data_dir.clone(),
        };

        let store = Arc::new(RecordStore::open(scope, &store_config).await?);
        let cache = Arc::new(BlobCache::open(scope, &cache_config)?);

        let handle = ScopeHandle { store, cache };
        let previous = self
            .scopes
            .lock()
            .insert(scope.as_str().to_string(), handle.clone());

        if previous.is_some() {
            tracing::warn!(scope = %scope, "Scope reopened, previous handles dropped");
        } else {
            tracing::info!(scope = %scope, "Scope opened");
        }

        Ok(handle)
    }

    /// Handles of an open scope.
    ///
    /// A scope that was never opened (or was closed) answers
    /// `NotInitialized` rather than opening implicitly.
    pub fn get(&self, scope: &ScopeId) -> Result<ScopeHandle> {
        self.scopes
            .lock()
            .get(scope.as_str())
            .cloned()
            .ok_or_else(|| Error::NotInitialized(format!("scope '{}' is not open", scope)))
    }

    /// Close a scope, dropping its handles. Closing a scope that is not
    /// open is a no-op.
    pub fn close(&self, scope: &ScopeId) {
        if self.scopes.lock().remove(scope.as_str()).is_some() {
            tracing::info!(scope = %scope, "Scope closed");
        }
    }

    /// Scopes currently open.
    pub fn open_scopes(&self) -> Vec<String> {
        self.scopes.lock().keys().cloned().collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Contact;

    fn registry() -> ScopeRegistry {
        ScopeRegistry::new(RegistryConfig::default())
    }

    #[tokio::test]
    async fn test_open_then_get_returns_same_store() {
        let registry = registry();
        let scope = ScopeId::new("user-1").unwrap();

        let opened = registry.open(&scope).await.unwrap();
        opened
            .store
            .put(&Contact {
                id: "c1".to_string(),
                name: "Alice".to_string(),
                friend_id: "f1".to_string(),
                owner_id: "user-1".to_string(),
                owner_type: "user".to_string(),
                friend_type: "user".to_string(),
                is_shop: false,
                remark: None,
                note: None,
                groups: None,
                blocked: false,
            })
            .unwrap();

        let fetched = registry.get(&scope).unwrap();
        let contact: Option<Contact> = fetched.store.get("c1").unwrap();
        assert!(contact.is_some());
    }

    #[tokio::test]
    async fn test_get_unopened_scope_is_not_initialized() {
        let registry = registry();
        let scope = ScopeId::new("ghost").unwrap();

        assert!(matches!(
            registry.get(&scope),
            Err(Error::NotInitialized(_))
        ));
    }

    #[tokio::test]
    async fn test_close_then_get_is_not_initialized() {
        let registry = registry();
        let scope = ScopeId::new("user-1").unwrap();

        registry.open(&scope).await.unwrap();
        registry.close(&scope);

        assert!(matches!(
            registry.get(&scope),
            Err(Error::NotInitialized(_))
        ));
        // Idempotent
        registry.close(&scope);
    }

    #[tokio::test]
    async fn test_reopen_replaces_handles() {
        let registry = registry();
        let scope = ScopeId::new("user-1").unwrap();

        registry.open(&scope).await.unwrap();
        registry.open(&scope).await.unwrap();

        assert_eq!(registry.open_scopes(), vec!["user-1".to_string()]);
    }

    #[tokio::test]
    async fn test_scopes_are_isolated() {
        let registry = registry();
        let a = ScopeId::new("user-a").unwrap();
        let b = ScopeId::new("user-b").unwrap();

        let ha = registry.open(&a).await.unwrap();
        let hb = registry.open(&b).await.unwrap();

        ha.cache
            .put("a.png", bytes::Bytes::from_static(b"x"), "image/png")
            .unwrap();
        assert!(hb.cache.get("a.png").unwrap().is_none());
    }
}
