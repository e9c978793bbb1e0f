//! # Record Types
//!
//! The typed entities held by the record store, plus the delivery state
//! machine for messages.
//!
//! ## Delivery State Machine
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      MESSAGE DELIVERY STATES                            │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   SENDING ──► HAS_SENT ──► RECEIVED ──► IS_READ (terminal)              │
//! │      │            │            │            │                           │
//! │      │            └────────────┴────────────┴──► UNSEND (terminal)      │
//! │      ▼                                                                  │
//! │   FAILED (terminal, local-only)                                         │
//! │                                                                         │
//! │   UNSEND is the explicit undo action, reachable once the remote         │
//! │   backend has seen the message. FAILED is produced only by the          │
//! │   optimistic send path when the publish does not go through; the        │
//! │   inbound sync path never emits it.                                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rusqlite::types::Type;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// Identity string partitioning all storage and cache namespaces.
///
/// One record store and one blob cache exist per active scope;
/// re-scoping closes and replaces the prior pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeId(pub String);

impl ScopeId {
    /// Create a scope id, rejecting empty identifiers.
    pub fn new(id: impl Into<String>) -> crate::error::Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(crate::error::Error::ValidationError(
                "scope id must not be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// The raw identity string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// RECORD CONTRACT
// ============================================================================

/// A typed entity the record store can persist.
///
/// Implementors declare their table, column order, and secondary indexes;
/// the store derives its SQL from these. `to_params` and `from_row` must
/// agree with `COLUMNS` positionally.
pub trait Record: Sized + Send {
    /// Table name.
    const TABLE: &'static str;
    /// Column list, primary key first.
    const COLUMNS: &'static [&'static str];
    /// Declared secondary indexes as (index name, column) pairs.
    const INDEXES: &'static [(&'static str, &'static str)];

    /// Primary key value.
    fn key(&self) -> &str;
    /// Bind values in `COLUMNS` order.
    fn to_params(&self) -> Vec<Box<dyn rusqlite::ToSql>>;
    /// Read a record from a row selected in `COLUMNS` order.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

// ============================================================================
// DELIVERY STATE
// ============================================================================

/// Successful delivery states, in progression order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// Written locally, publish not yet acknowledged.
    Sending,
    /// The remote channel accepted the message.
    HasSent,
    /// The recipient's device received it.
    Received,
    /// The recipient read it.
    IsRead,
    /// Retracted by the sender after delivery.
    Unsend,
}

impl DeliveryState {
    /// Whether the state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::IsRead | Self::Unsend)
    }

    /// Whether a transition to `next` is legal.
    ///
    /// The forward chain is Sending → HasSent → Received → IsRead;
    /// Unsend is reachable from HasSent or later via the explicit undo
    /// action.
    pub fn can_transition(&self, next: DeliveryState) -> bool {
        match (self, next) {
            (Self::Sending, Self::HasSent) => true,
            (Self::HasSent, Self::Received) => true,
            (Self::Received, Self::IsRead) => true,
            (Self::HasSent | Self::Received | Self::IsRead, Self::Unsend) => true,
            _ => false,
        }
    }
}

/// Delivery outcome stored on a message.
///
/// The declared state enumeration has no failure member, yet the
/// optimistic send path needs one; `Failed` is that distinct terminal
/// marker. It is local-only and never produced by the inbound sync path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// A regular delivery state.
    State(DeliveryState),
    /// Local publish failure; terminal.
    Failed,
}

impl DeliveryOutcome {
    /// Storage literal for this outcome.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::State(DeliveryState::Sending) => "SENDING",
            Self::State(DeliveryState::HasSent) => "HAS_SENT",
            Self::State(DeliveryState::Received) => "RECEIVED",
            Self::State(DeliveryState::IsRead) => "IS_READ",
            Self::State(DeliveryState::Unsend) => "UNSEND",
            Self::Failed => "FAILED",
        }
    }

    /// Parse a storage literal.
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "SENDING" => Self::State(DeliveryState::Sending),
            "HAS_SENT" => Self::State(DeliveryState::HasSent),
            "RECEIVED" => Self::State(DeliveryState::Received),
            "IS_READ" => Self::State(DeliveryState::IsRead),
            "UNSEND" => Self::State(DeliveryState::Unsend),
            "FAILED" => Self::Failed,
            _ => return None,
        })
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::State(s) => s.is_terminal(),
            Self::Failed => true,
        }
    }
}

// The wire and storage representation is the literal string, shared with
// the realtime channel's snapshot format.
impl Serialize for DeliveryOutcome {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DeliveryOutcome {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown delivery outcome '{}'", s)))
    }
}

// ============================================================================
// MESSAGE KIND
// ============================================================================

/// Closed set of message content kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Plain text.
    Text,
    /// Image attachment (content holds the media URL).
    Image,
    /// Voice note.
    Audio,
    /// Video attachment.
    Video,
    /// Shared map location.
    Location,
    /// Commerce order card.
    Order,
    /// Product/shop card.
    Card,
}

impl MessageKind {
    /// Storage literal for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Image => "IMAGE",
            Self::Audio => "AUDIO",
            Self::Video => "VIDEO",
            Self::Location => "LOCATION",
            Self::Order => "ORDER",
            Self::Card => "CARD",
        }
    }

    /// Parse a storage literal.
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "TEXT" => Self::Text,
            "IMAGE" => Self::Image,
            "AUDIO" => Self::Audio,
            "VIDEO" => Self::Video,
            "LOCATION" => Self::Location,
            "ORDER" => Self::Order,
            "CARD" => Self::Card,
            _ => return None,
        })
    }
}

impl Serialize for MessageKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MessageKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown message kind '{}'", s)))
    }
}

fn bad_literal(idx: usize, what: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("unknown {} literal '{}'", what, value).into(),
    )
}

// ============================================================================
// ENTITIES
// ============================================================================

/// Profile snapshot of a user appearing in conversations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationUser {
    /// User id (primary key).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Avatar URL.
    pub avatar: String,
    /// Presence/status text.
    pub status: String,
    /// Last seen, Unix timestamp ms.
    pub last_seen: Option<i64>,
    /// Local nickname override.
    pub remark: Option<String>,
}

impl Record for ConversationUser {
    const TABLE: &'static str = "conversation_users";
    const COLUMNS: &'static [&'static str] =
        &["id", "name", "avatar", "status", "last_seen", "remark"];
    const INDEXES: &'static [(&'static str, &'static str)] =
        &[("idx_conversation_users_name", "name")];

    fn key(&self) -> &str {
        &self.id
    }

    fn to_params(&self) -> Vec<Box<dyn rusqlite::ToSql>> {
        vec![
            Box::new(self.id.clone()),
            Box::new(self.name.clone()),
            Box::new(self.avatar.clone()),
            Box::new(self.status.clone()),
            Box::new(self.last_seen),
            Box::new(self.remark.clone()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            avatar: row.get(2)?,
            status: row.get(3)?,
            last_seen: row.get(4)?,
            remark: row.get(5)?,
        })
    }
}

/// A DM or group conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Conversation id (primary key).
    pub id: String,
    /// Who created the conversation.
    pub creator: String,
    /// Group chat flag.
    pub is_grouped: bool,
    /// Initiating side of the conversation.
    pub sender_id: String,
    /// Receiving side of the conversation.
    pub receive_id: String,
    /// Composite participant-set token; conversation subscriptions are
    /// scoped by this value.
    pub users: String,
    /// Preview of the most recent message.
    pub last_message: Option<String>,
    /// Unread message count.
    pub unread: i64,
    /// Local nickname override.
    pub remark: Option<String>,
    /// Pinned-to-top flag.
    pub pinned: bool,
}

impl Record for Conversation {
    const TABLE: &'static str = "conversations";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "creator",
        "is_grouped",
        "sender_id",
        "receive_id",
        "users",
        "last_message",
        "unread",
        "remark",
        "pinned",
    ];
    const INDEXES: &'static [(&'static str, &'static str)] =
        &[("idx_conversations_users", "users")];

    fn key(&self) -> &str {
        &self.id
    }

    fn to_params(&self) -> Vec<Box<dyn rusqlite::ToSql>> {
        vec![
            Box::new(self.id.clone()),
            Box::new(self.creator.clone()),
            Box::new(self.is_grouped),
            Box::new(self.sender_id.clone()),
            Box::new(self.receive_id.clone()),
            Box::new(self.users.clone()),
            Box::new(self.last_message.clone()),
            Box::new(self.unread),
            Box::new(self.remark.clone()),
            Box::new(self.pinned),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            creator: row.get(1)?,
            is_grouped: row.get(2)?,
            sender_id: row.get(3)?,
            receive_id: row.get(4)?,
            users: row.get(5)?,
            last_message: row.get(6)?,
            unread: row.get(7)?,
            remark: row.get(8)?,
            pinned: row.get(9)?,
        })
    }
}

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message id, unique within a scope (primary key).
    pub id: String,
    /// Owning conversation (exactly one).
    pub conversation_id: String,
    /// Content; media kinds carry the source URL here.
    pub content: String,
    /// Content kind.
    pub kind: MessageKind,
    /// Delivery outcome.
    pub status: DeliveryOutcome,
    /// Numeric string timestamp; ordering compares the parsed value.
    pub timestamp: String,
    /// Retention marker, Unix timestamp ms; None keeps forever.
    pub delete_at: Option<i64>,
    /// Referenced message id (quote/reply).
    pub ref_id: Option<String>,
    /// Referenced message preview.
    pub ref_content: Option<String>,
}

impl Message {
    /// The timestamp parsed for numeric comparison.
    ///
    /// An unparseable value sorts first (as 0) rather than failing the
    /// whole page.
    pub fn numeric_timestamp(&self) -> i64 {
        self.timestamp.parse().unwrap_or(0)
    }
}

impl Record for Message {
    const TABLE: &'static str = "messages";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "conversation_id",
        "content",
        "kind",
        "status",
        "timestamp",
        "delete_at",
        "ref_id",
        "ref_content",
    ];
    const INDEXES: &'static [(&'static str, &'static str)] =
        &[("idx_messages_conversation", "conversation_id")];

    fn key(&self) -> &str {
        &self.id
    }

    fn to_params(&self) -> Vec<Box<dyn rusqlite::ToSql>> {
        vec![
            Box::new(self.id.clone()),
            Box::new(self.conversation_id.clone()),
            Box::new(self.content.clone()),
            Box::new(self.kind.as_str()),
            Box::new(self.status.as_str()),
            Box::new(self.timestamp.clone()),
            Box::new(self.delete_at),
            Box::new(self.ref_id.clone()),
            Box::new(self.ref_content.clone()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let kind_text: String = row.get(3)?;
        let kind = MessageKind::parse(&kind_text)
            .ok_or_else(|| bad_literal(3, "message kind", &kind_text))?;
        let status_text: String = row.get(4)?;
        let status = DeliveryOutcome::parse(&status_text)
            .ok_or_else(|| bad_literal(4, "delivery outcome", &status_text))?;

        Ok(Self {
            id: row.get(0)?,
            conversation_id: row.get(1)?,
            content: row.get(2)?,
            kind,
            status,
            timestamp: row.get(5)?,
            delete_at: row.get(6)?,
            ref_id: row.get(7)?,
            ref_content: row.get(8)?,
        })
    }
}

/// An address-book contact.
///
/// `(owner_id, friend_id)` uniqueness is an application-level
/// expectation; the store does not enforce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// Contact id (primary key).
    pub id: String,
    /// Display name.
    pub name: String,
    /// The befriended identity.
    pub friend_id: String,
    /// The owning identity.
    pub owner_id: String,
    /// Owner account type.
    pub owner_type: String,
    /// Friend account type.
    pub friend_type: String,
    /// Shop accounts get commerce affordances in the UI.
    pub is_shop: bool,
    /// Local nickname override.
    pub remark: Option<String>,
    /// Free-form note.
    pub note: Option<String>,
    /// Comma-separated group labels.
    pub groups: Option<String>,
    /// Blocked flag.
    pub blocked: bool,
}

impl Record for Contact {
    const TABLE: &'static str = "contacts";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "friend_id",
        "owner_id",
        "owner_type",
        "friend_type",
        "is_shop",
        "remark",
        "note",
        "groups",
        "blocked",
    ];
    const INDEXES: &'static [(&'static str, &'static str)] = &[
        ("idx_contacts_name", "name"),
        ("idx_contacts_friend", "friend_id"),
    ];

    fn key(&self) -> &str {
        &self.id
    }

    fn to_params(&self) -> Vec<Box<dyn rusqlite::ToSql>> {
        vec![
            Box::new(self.id.clone()),
            Box::new(self.name.clone()),
            Box::new(self.friend_id.clone()),
            Box::new(self.owner_id.clone()),
            Box::new(self.owner_type.clone()),
            Box::new(self.friend_type.clone()),
            Box::new(self.is_shop),
            Box::new(self.remark.clone()),
            Box::new(self.note.clone()),
            Box::new(self.groups.clone()),
            Box::new(self.blocked),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            friend_id: row.get(2)?,
            owner_id: row.get(3)?,
            owner_type: row.get(4)?,
            friend_type: row.get(5)?,
            is_shop: row.get(6)?,
            remark: row.get(7)?,
            note: row.get(8)?,
            groups: row.get(9)?,
            blocked: row.get(10)?,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_id_rejects_empty() {
        assert!(ScopeId::new("").is_err());
        assert!(ScopeId::new("   ").is_err());
        assert!(ScopeId::new("user-1").is_ok());
    }

    #[test]
    fn test_delivery_forward_chain() {
        use DeliveryState::*;
        assert!(Sending.can_transition(HasSent));
        assert!(HasSent.can_transition(Received));
        assert!(Received.can_transition(IsRead));
        // No skipping ahead or moving backwards
        assert!(!Sending.can_transition(Received));
        assert!(!Received.can_transition(HasSent));
        assert!(!IsRead.can_transition(Received));
    }

    #[test]
    fn test_unsend_reachable_after_send() {
        use DeliveryState::*;
        assert!(HasSent.can_transition(Unsend));
        assert!(Received.can_transition(Unsend));
        assert!(IsRead.can_transition(Unsend));
        // Nothing to retract before the backend saw it
        assert!(!Sending.can_transition(Unsend));
        assert!(!Unsend.can_transition(HasSent));
    }

    #[test]
    fn test_terminal_outcomes() {
        assert!(DeliveryOutcome::Failed.is_terminal());
        assert!(DeliveryOutcome::State(DeliveryState::IsRead).is_terminal());
        assert!(DeliveryOutcome::State(DeliveryState::Unsend).is_terminal());
        assert!(!DeliveryOutcome::State(DeliveryState::Sending).is_terminal());
        assert!(!DeliveryOutcome::State(DeliveryState::HasSent).is_terminal());
    }

    #[test]
    fn test_outcome_literals_round_trip() {
        for literal in ["SENDING", "HAS_SENT", "RECEIVED", "IS_READ", "UNSEND", "FAILED"] {
            let outcome = DeliveryOutcome::parse(literal).expect(literal);
            assert_eq!(outcome.as_str(), literal);
        }
        assert!(DeliveryOutcome::parse("DELIVERED").is_none());
    }

    #[test]
    fn test_kind_literals() {
        for literal in ["TEXT", "IMAGE", "AUDIO", "VIDEO", "LOCATION", "ORDER", "CARD"] {
            let kind = MessageKind::parse(literal).expect(literal);
            assert_eq!(kind.as_str(), literal);
        }
        assert!(MessageKind::parse("STICKER").is_none());
    }

    #[test]
    fn test_numeric_timestamp_parsing() {
        let mut msg = Message {
            id: "m1".into(),
            conversation_id: "c1".into(),
            content: "hi".into(),
            kind: MessageKind::Text,
            status: DeliveryOutcome::State(DeliveryState::Sending),
            timestamp: "1700000000123".into(),
            delete_at: None,
            ref_id: None,
            ref_content: None,
        };
        assert_eq!(msg.numeric_timestamp(), 1700000000123);

        // "9" is numerically smaller than "10" even though it is
        // lexicographically larger
        msg.timestamp = "9".into();
        assert!(msg.numeric_timestamp() < 10);

        msg.timestamp = "not-a-number".into();
        assert_eq!(msg.numeric_timestamp(), 0);
    }
}
