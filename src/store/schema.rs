//! # Record Store Schema
//!
//! SQL schema definitions for the per-scope record store.
//!
//! ## Schema Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         RECORD STORE SCHEMA                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌──────────────────┐   ┌─────────────────┐     ┌─────────────────┐     │
//! │  │conversation_users│   │  conversations  │     │    messages     │     │
//! │  ├──────────────────┤   ├─────────────────┤     ├─────────────────┤     │
//! │  │ id               │   │ id              │     │ id              │     │
//! │  │ name      (idx)  │   │ creator         │  ┌──│ conversation_id │     │
//! │  │ avatar           │   │ is_grouped      │  │  │ content         │     │
//! │  │ status           │   │ sender_id       │  │  │ kind            │     │
//! │  │ last_seen        │   │ receive_id      │  │  │ status          │     │
//! │  │ remark           │   │ users     (idx) │◄─┘  │ timestamp       │     │
//! │  └──────────────────┘   │ last_message    │     │ delete_at       │     │
//! │                         │ unread          │     │ ref_id          │     │
//! │  ┌──────────────────┐   │ remark          │     │ ref_content     │     │
//! │  │    contacts      │   │ pinned          │     └─────────────────┘     │
//! │  ├──────────────────┤   └─────────────────┘      (idx: conversation)    │
//! │  │ id               │                                                   │
//! │  │ name      (idx)  │   One database file per signed-in scope;          │
//! │  │ friend_id (idx)  │   re-scoping opens a different file.              │
//! │  │ owner_id ...     │                                                   │
//! │  └──────────────────┘                                                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Every table the store expects to exist after `open`.
///
/// The open path verifies this list against `sqlite_master` and re-runs
/// the creation batch when a table is missing (e.g. a database file left
/// behind by an older build), bumping the recorded version instead of
/// failing.
pub const EXPECTED_TABLES: &[&str] = &[
    "schema_version",
    "conversation_users",
    "conversations",
    "messages",
    "contacts",
];

/// SQL to create all tables
///
/// Every statement is idempotent (`IF NOT EXISTS`), so this batch doubles
/// as the additive migration for drifted databases.
pub const CREATE_TABLES: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);

-- Conversation users table
-- Profile snapshots of everyone appearing in a conversation
CREATE TABLE IF NOT EXISTS conversation_users (
    id TEXT PRIMARY KEY,
    -- Display name
    name TEXT NOT NULL,
    -- Avatar URL
    avatar TEXT NOT NULL,
    -- Presence/status text
    status TEXT NOT NULL,
    -- Last seen (Unix timestamp ms)
    last_seen INTEGER,
    -- Local nickname override
    remark TEXT
);
CREATE INDEX IF NOT EXISTS idx_conversation_users_name ON conversation_users(name);

-- Conversations table
CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    -- Who created the conversation
    creator TEXT NOT NULL,
    -- Group chat flag
    is_grouped INTEGER NOT NULL DEFAULT 0,
    sender_id TEXT NOT NULL,
    receive_id TEXT NOT NULL,
    -- Composite participant-set token; the conversation subscription
    -- is scoped by this value
    users TEXT NOT NULL,
    -- Preview of the most recent message
    last_message TEXT,
    -- Number of unread messages
    unread INTEGER NOT NULL DEFAULT 0,
    -- Local nickname override
    remark TEXT,
    -- Pinned-to-top flag
    pinned INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_conversations_users ON conversations(users);

-- Messages table
CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    -- Which conversation this belongs to (exactly one owner)
    conversation_id TEXT NOT NULL,
    content TEXT NOT NULL,
    -- Closed content-kind set: TEXT, IMAGE, AUDIO, VIDEO, LOCATION, ORDER, CARD
    kind TEXT NOT NULL,
    -- Delivery outcome: SENDING, HAS_SENT, RECEIVED, IS_READ, UNSEND, FAILED
    status TEXT NOT NULL,
    -- Numeric string; ordering compares the parsed value, never the text
    timestamp TEXT NOT NULL,
    -- Retention marker (Unix timestamp ms); NULL means keep forever
    delete_at INTEGER,
    -- Reference to another message (quote/reply)
    ref_id TEXT,
    ref_content TEXT
);
CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id);

-- Contacts table
CREATE TABLE IF NOT EXISTS contacts (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    -- The befriended identity
    friend_id TEXT NOT NULL,
    owner_id TEXT NOT NULL,
    owner_type TEXT NOT NULL,
    friend_type TEXT NOT NULL,
    -- Shop accounts get commerce affordances in the UI
    is_shop INTEGER NOT NULL DEFAULT 0,
    remark TEXT,
    note TEXT,
    -- Comma-separated contact group labels
    groups TEXT,
    blocked INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_contacts_name ON contacts(name);
CREATE INDEX IF NOT EXISTS idx_contacts_friend ON contacts(friend_id);
"#;
