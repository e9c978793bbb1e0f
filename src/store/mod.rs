//! # Record Store Module
//!
//! Durable, scoped, indexed storage for chat entities.
//!
//! ## Storage Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         RECORD STORE                                    │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────┐                                                    │
//! │  │   Application   │  reads via RecordStore / MessageIndex              │
//! │  └────────┬────────┘  writes via SyncBridge                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  ┌─────────────────┐  Typed API over the Record trait                   │
//! │  │   RecordStore   │  - put / get / get_all / get_by_index / delete     │
//! │  │   (this file)   │  - guarded, self-healing schema open               │
//! │  └────────┬────────┘  - full-record replace upserts                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  ┌─────────────────┐  SQLite wrapper                                    │
//! │  │    rusqlite     │  - One database file per scope                     │
//! │  │                 │  - In-memory for tests                             │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `open` is the only operation allowed to mutate schema. Everything else
//! is plain DML; engine failures surface as [`Error::StorageError`].

mod message_index;
mod records;
mod schema;

pub use message_index::{MessageIndex, DEFAULT_PAGE_SIZE};
pub use records::{
    Contact, Conversation, ConversationUser, DeliveryOutcome, DeliveryState, Message,
    MessageKind, Record, ScopeId,
};

use parking_lot::Mutex;
use rusqlite::{params_from_iter, Connection};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Record store configuration
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Directory holding per-scope database files (None = in-memory,
    /// useful for testing)
    pub data_dir: Option<PathBuf>,
}

/// The per-scope record store handle
///
/// Wraps a SQLite connection and provides typed operations over the
/// [`Record`] entities. Exactly one handle should be live per scope;
/// the scope registry enforces that and answers `NotInitialized` for
/// scopes that were never opened.
pub struct RecordStore {
    /// The underlying SQLite connection
    conn: Arc<Mutex<Connection>>,
    /// The scope this store belongs to
    scope: ScopeId,
}

impl RecordStore {
    /// Open or create the store for a scope.
    ///
    /// Ensures every entity collection and its declared secondary indexes
    /// exist. A database file missing an expected table (version drift
    /// from an older build) is healed by re-running the idempotent
    /// creation batch at a bumped version rather than failing.
    pub async fn open(scope: &ScopeId, config: &StoreConfig) -> Result<Self> {
        let conn = match &config.data_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                let path = dir.join(format!("{}.db", scope.as_str()));
                Connection::open(&path)
                    .map_err(|e| Error::StorageError(format!("Failed to open database: {}", e)))?
            }
            None => Connection::open_in_memory().map_err(|e| {
                Error::StorageError(format!("Failed to create in-memory database: {}", e))
            })?,
        };

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            scope: scope.clone(),
        };

        store.init_schema()?;

        Ok(store)
    }

    /// The scope this store was opened for.
    pub fn scope(&self) -> &ScopeId {
        &self.scope
    }

    /// Shared connection handle for the query layer.
    pub(crate) fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// Initialize or heal the schema.
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        let version: Option<i32> = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .ok();

        let missing = Self::missing_tables(&conn)?;

        match version {
            None => {
                // Fresh database, create all tables
                conn.execute_batch(schema::CREATE_TABLES)
                    .map_err(|e| Error::SchemaError(format!("Failed to create tables: {}", e)))?;

                conn.execute(
                    "INSERT INTO schema_version (version) VALUES (?)",
                    [schema::SCHEMA_VERSION],
                )
                .map_err(|e| Error::SchemaError(format!("Failed to set schema version: {}", e)))?;

                tracing::info!(
                    scope = %self.scope,
                    "Record store schema created (version {})",
                    schema::SCHEMA_VERSION
                );
            }
            Some(v) if v < schema::SCHEMA_VERSION || !missing.is_empty() => {
                // Version drift or a collection dropped by an older build.
                // The creation batch is fully idempotent, so re-running it
                // restores whatever is missing without touching live data.
                tracing::info!(
                    scope = %self.scope,
                    version = v,
                    missing = ?missing,
                    "Record store schema drift detected, healing at version {}",
                    schema::SCHEMA_VERSION
                );

                conn.execute_batch(schema::CREATE_TABLES)
                    .map_err(|e| Error::SchemaError(format!("Schema heal failed: {}", e)))?;
                conn.execute(
                    "UPDATE schema_version SET version = ?",
                    [schema::SCHEMA_VERSION],
                )
                .map_err(|e| Error::SchemaError(format!("Failed to bump schema version: {}", e)))?;
            }
            Some(v) => {
                tracing::debug!(scope = %self.scope, "Record store schema version: {}", v);
            }
        }

        Ok(())
    }

    /// Expected tables absent from the database.
    fn missing_tables(conn: &Connection) -> Result<Vec<&'static str>> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table'")
            .map_err(|e| Error::SchemaError(format!("Failed to inspect schema: {}", e)))?;
        let present: HashSet<String> = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| Error::SchemaError(format!("Failed to inspect schema: {}", e)))?
            .collect::<rusqlite::Result<_>>()
            .map_err(|e| Error::SchemaError(format!("Failed to inspect schema: {}", e)))?;

        Ok(schema::EXPECTED_TABLES
            .iter()
            .filter(|t| !present.contains(**t))
            .copied()
            .collect())
    }

    // ========================================================================
    // RECORD OPERATIONS
    // ========================================================================

    /// Upsert a record by primary key (full-record replace, no partial
    /// merge).
    pub fn put<R: Record>(&self, record: &R) -> Result<()> {
        let conn = self.conn.lock();
        let placeholders = vec!["?"; R::COLUMNS.len()].join(", ");
        let sql = format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
            R::TABLE,
            R::COLUMNS.join(", "),
            placeholders
        );

        conn.execute(&sql, params_from_iter(record.to_params().iter()))
            .map_err(|e| Error::StorageError(format!("Failed to put {}: {}", R::TABLE, e)))?;

        Ok(())
    }

    /// Get a record by primary key. Absence is not an error.
    pub fn get<R: Record>(&self, key: &str) -> Result<Option<R>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?",
            R::COLUMNS.join(", "),
            R::TABLE,
            R::COLUMNS[0]
        );

        let result = conn.query_row(&sql, [key], |row| R::from_row(row));

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::StorageError(format!(
                "Failed to get {}: {}",
                R::TABLE,
                e
            ))),
        }
    }

    /// Get every record of an entity.
    ///
    /// Full scan, O(n); acceptable only for small bounded sets such as
    /// conversation users and contacts.
    pub fn get_all<R: Record>(&self) -> Result<Vec<R>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM {}", R::COLUMNS.join(", "), R::TABLE);

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::StorageError(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| R::from_row(row))
            .map_err(|e| Error::StorageError(format!("Failed to query {}: {}", R::TABLE, e)))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(
                row.map_err(|e| Error::StorageError(format!("Failed to read {}: {}", R::TABLE, e)))?,
            );
        }

        Ok(records)
    }

    /// Equality lookup via a declared secondary index.
    ///
    /// The index name must be one the record declares; anything else is a
    /// `StorageError`, not a silent full scan.
    pub fn get_by_index<R: Record>(&self, index: &str, value: &str) -> Result<Vec<R>> {
        let column = R::INDEXES
            .iter()
            .find(|(name, _)| *name == index)
            .map(|(_, column)| *column)
            .ok_or_else(|| {
                Error::StorageError(format!("No index '{}' declared on {}", index, R::TABLE))
            })?;

        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?",
            R::COLUMNS.join(", "),
            R::TABLE,
            column
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::StorageError(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([value], |row| R::from_row(row))
            .map_err(|e| Error::StorageError(format!("Failed to query {}: {}", R::TABLE, e)))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(
                row.map_err(|e| Error::StorageError(format!("Failed to read {}: {}", R::TABLE, e)))?,
            );
        }

        Ok(records)
    }

    /// Delete a record by primary key.
    pub fn delete<R: Record>(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock();
        let sql = format!("DELETE FROM {} WHERE {} = ?", R::TABLE, R::COLUMNS[0]);

        conn.execute(&sql, [key])
            .map_err(|e| Error::StorageError(format!("Failed to delete from {}: {}", R::TABLE, e)))?;

        Ok(())
    }

    /// Number of records of an entity.
    pub fn count<R: Record>(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let sql = format!("SELECT COUNT(*) FROM {}", R::TABLE);

        let count: i64 = conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|e| Error::StorageError(format!("Failed to count {}: {}", R::TABLE, e)))?;

        Ok(count as usize)
    }

    /// Delete every record in every collection.
    ///
    /// Used by scope teardown on logout; the schema itself stays.
    pub fn wipe(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            "DELETE FROM conversation_users;
             DELETE FROM conversations;
             DELETE FROM messages;
             DELETE FROM contacts;",
        )
        .map_err(|e| Error::StorageError(format!("Failed to wipe store: {}", e)))?;

        tracing::info!(scope = %self.scope, "Record store wiped");
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_memory_store() -> RecordStore {
        let scope = ScopeId::new("test-user").unwrap();
        RecordStore::open(&scope, &StoreConfig::default())
            .await
            .unwrap()
    }

    fn sample_contact(id: &str, name: &str) -> Contact {
        Contact {
            id: id.to_string(),
            name: name.to_string(),
            friend_id: format!("friend-{}", id),
            owner_id: "owner-1".to_string(),
            owner_type: "user".to_string(),
            friend_type: "user".to_string(),
            is_shop: false,
            remark: None,
            note: None,
            groups: None,
            blocked: false,
        }
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = open_memory_store().await;
        let contact = sample_contact("c1", "Alice");

        store.put(&contact).unwrap();
        let loaded: Contact = store.get("c1").unwrap().unwrap();
        assert_eq!(loaded, contact);
    }

    #[tokio::test]
    async fn test_get_absent_is_none_not_error() {
        let store = open_memory_store().await;
        let loaded: Option<Contact> = store.get("nope").unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_put_is_full_replace() {
        let store = open_memory_store().await;
        let mut contact = sample_contact("c1", "Alice");
        contact.note = Some("old note".to_string());
        store.put(&contact).unwrap();

        // A second put with note cleared must not merge the old value back
        contact.note = None;
        contact.name = "Alice B".to_string();
        store.put(&contact).unwrap();

        let loaded: Contact = store.get("c1").unwrap().unwrap();
        assert_eq!(loaded.name, "Alice B");
        assert!(loaded.note.is_none());
        assert_eq!(store.count::<Contact>().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_all_and_delete() {
        let store = open_memory_store().await;
        store.put(&sample_contact("c1", "Alice")).unwrap();
        store.put(&sample_contact("c2", "Bob")).unwrap();

        let all: Vec<Contact> = store.get_all().unwrap();
        assert_eq!(all.len(), 2);

        store.delete::<Contact>("c1").unwrap();
        let all: Vec<Contact> = store.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "c2");
    }

    #[tokio::test]
    async fn test_get_by_index() {
        let store = open_memory_store().await;
        store.put(&sample_contact("c1", "Alice")).unwrap();
        store.put(&sample_contact("c2", "Bob")).unwrap();
        store.put(&sample_contact("c3", "Alice")).unwrap();

        let alices: Vec<Contact> = store.get_by_index("idx_contacts_name", "Alice").unwrap();
        assert_eq!(alices.len(), 2);

        let by_friend: Vec<Contact> = store
            .get_by_index("idx_contacts_friend", "friend-c2")
            .unwrap();
        assert_eq!(by_friend.len(), 1);
        assert_eq!(by_friend[0].id, "c2");
    }

    #[tokio::test]
    async fn test_undeclared_index_is_error() {
        let store = open_memory_store().await;
        let result: Result<Vec<Contact>> = store.get_by_index("idx_contacts_bogus", "x");
        assert!(matches!(result, Err(Error::StorageError(_))));
    }

    #[tokio::test]
    async fn test_wipe_clears_all_collections() {
        let store = open_memory_store().await;
        store.put(&sample_contact("c1", "Alice")).unwrap();
        store
            .put(&ConversationUser {
                id: "u1".to_string(),
                name: "Alice".to_string(),
                avatar: String::new(),
                status: "online".to_string(),
                last_seen: None,
                remark: None,
            })
            .unwrap();

        store.wipe().unwrap();
        assert_eq!(store.count::<Contact>().unwrap(), 0);
        assert_eq!(store.count::<ConversationUser>().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reopen_heals_dropped_table() {
        let dir = tempfile::tempdir().unwrap();
        let scope = ScopeId::new("heal-user").unwrap();
        let config = StoreConfig {
            data_dir: Some(dir.path().to_path_buf()),
        };

        {
            let store = RecordStore::open(&scope, &config).await.unwrap();
            store.put(&sample_contact("c1", "Alice")).unwrap();
            // Simulate version drift: an older build without the messages
            // collection
            store.conn.lock().execute_batch("DROP TABLE messages;").unwrap();
        }

        // Reopen self-heals: the missing collection is recreated and the
        // surviving data is untouched
        let store = RecordStore::open(&scope, &config).await.unwrap();
        assert_eq!(store.count::<Message>().unwrap(), 0);
        let contact: Option<Contact> = store.get("c1").unwrap();
        assert!(contact.is_some());
    }
}
