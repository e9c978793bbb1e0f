//! # Sync Bridge Module
//!
//! Translates the realtime backend channel into record-store writes
//! (inbound) and optimistic local writes plus publishes (outbound).
//!
//! ## Data Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SYNC BRIDGE                                    │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Inbound (level-triggered)                                              │
//! │  ────────────────────────                                               │
//! │  realtime path ──snapshot──► feed.run() ──replace-upsert──► RecordStore │
//! │                                                                         │
//! │  Outbound (optimistic)                                                  │
//! │  ─────────────────────                                                  │
//! │  send_message ──► put(SENDING) ──► publish ──ok──► put(HAS_SENT)        │
//! │                   (visible before      │                                │
//! │                    any round trip)     └──err──► put(FAILED), propagate │
//! │                                                                         │
//! │  Concurrent inbound and local writes to the same id resolve             │
//! │  last-write-wins; there is no version vector or merge logic.            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The bridge never rolls back an optimistic write on publish failure
//! beyond the `FAILED` marker; reconciliation belongs to the caller.

mod channel;

pub use channel::{conversations_path, messages_path, presence_path, RealtimeChannel};

use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::{
    Conversation, DeliveryOutcome, DeliveryState, Message, MessageKind, RecordStore,
};

/// Outbound message draft; the bridge assigns id, timestamp and status.
#[derive(Debug, Clone)]
pub struct MessageDraft {
    /// Content; media kinds carry the source URL here.
    pub content: String,
    /// Content kind.
    pub kind: MessageKind,
    /// Optional retention marker, Unix timestamp ms.
    pub delete_at: Option<i64>,
    /// Referenced message id (quote/reply).
    pub ref_id: Option<String>,
    /// Referenced message preview.
    pub ref_content: Option<String>,
}

impl MessageDraft {
    /// A plain text draft.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: MessageKind::Text,
            delete_at: None,
            ref_id: None,
            ref_content: None,
        }
    }
}

/// Bridge between the realtime channel and the local record store.
pub struct SyncBridge {
    store: Arc<RecordStore>,
    channel: Arc<dyn RealtimeChannel>,
}

impl SyncBridge {
    /// Create a bridge over a scope's store and the realtime channel.
    pub fn new(store: Arc<RecordStore>, channel: Arc<dyn RealtimeChannel>) -> Self {
        Self { store, channel }
    }

    // ========================================================================
    // INBOUND SUBSCRIPTIONS
    // ========================================================================

    /// Subscribe to the conversation list containing an identity.
    ///
    /// Returns a feed; awaiting its `run` drives snapshot upserts until
    /// the channel closes. The feed is level-triggered: every
    /// notification carries the complete current list.
    pub async fn subscribe_conversations(&self, scope_user_id: &str) -> Result<ConversationFeed> {
        if scope_user_id.trim().is_empty() {
            return Err(Error::ValidationError(
                "scope user id must not be empty".to_string(),
            ));
        }

        let rx = self
            .channel
            .subscribe(&conversations_path(scope_user_id))
            .await?;

        tracing::info!(scope_user_id, "Subscribed to conversation list");
        Ok(ConversationFeed {
            store: Arc::clone(&self.store),
            rx,
        })
    }

    /// Subscribe to a single conversation's message list.
    pub async fn subscribe_messages(&self, conversation_id: &str) -> Result<MessageFeed> {
        if conversation_id.trim().is_empty() {
            return Err(Error::ValidationError(
                "conversation id must not be empty".to_string(),
            ));
        }

        let rx = self
            .channel
            .subscribe(&messages_path(conversation_id))
            .await?;

        tracing::info!(conversation_id, "Subscribed to message list");
        Ok(MessageFeed {
            store: Arc::clone(&self.store),
            rx,
        })
    }

    // ========================================================================
    // OUTBOUND WRITES
    // ========================================================================

    /// Send a message: optimistic local write, then publish.
    ///
    /// The record is visible locally with status `SENDING` before any
    /// network round trip. Publish success transitions it to `HAS_SENT`;
    /// failure stamps the terminal `FAILED` marker and propagates the
    /// publish error.
    pub async fn send_message(
        &self,
        conversation_id: &str,
        draft: MessageDraft,
    ) -> Result<Message> {
        if conversation_id.trim().is_empty() {
            return Err(Error::ValidationError(
                "conversation id must not be empty".to_string(),
            ));
        }

        let mut message = Message {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            content: draft.content,
            kind: draft.kind,
            status: DeliveryOutcome::State(DeliveryState::Sending),
            timestamp: crate::time::now_timestamp_millis().to_string(),
            delete_at: draft.delete_at,
            ref_id: draft.ref_id,
            ref_content: draft.ref_content,
        };

        self.store.put(&message)?;
        tracing::debug!(id = %message.id, conversation_id, "Optimistic message written");

        let payload = serde_json::to_value(&message)?;
        match self
            .channel
            .publish(&messages_path(conversation_id), payload)
            .await
        {
            Ok(()) => {
                message.status = DeliveryOutcome::State(DeliveryState::HasSent);
                self.store.put(&message)?;
                Ok(message)
            }
            Err(e) => {
                tracing::warn!(id = %message.id, error = %e, "Message publish failed");
                message.status = DeliveryOutcome::Failed;
                self.store.put(&message)?;
                Err(e)
            }
        }
    }

    /// One-shot write of the current identity's presence marker.
    pub async fn update_presence(&self, online: bool) -> Result<()> {
        let user_id = self.store.scope().as_str();
        let marker = json!({
            "id": user_id,
            "status": if online { "online" } else { "offline" },
            "last_seen": crate::time::now_timestamp_millis(),
        });

        self.channel
            .publish(&presence_path(user_id), marker)
            .await
    }

    /// Reset the local unread counter of a conversation.
    pub fn mark_read(&self, conversation_id: &str) -> Result<()> {
        let mut conversation: Conversation = self
            .store
            .get(conversation_id)?
            .ok_or_else(|| Error::NotFound(format!("conversation '{}'", conversation_id)))?;

        conversation.unread = 0;
        self.store.put(&conversation)
    }
}

// ============================================================================
// FEEDS
// ============================================================================

/// Level-triggered conversation-list feed.
pub struct ConversationFeed {
    store: Arc<RecordStore>,
    rx: mpsc::Receiver<Value>,
}

impl ConversationFeed {
    /// Drive snapshot upserts until the channel closes.
    pub async fn run(mut self) -> Result<()> {
        while let Some(snapshot) = self.rx.recv().await {
            let records: Vec<Conversation> = serde_json::from_value(snapshot)?;
            tracing::debug!(count = records.len(), "Conversation snapshot received");
            for record in &records {
                self.store.put(record)?;
            }
        }
        Ok(())
    }
}

/// Level-triggered per-conversation message feed.
pub struct MessageFeed {
    store: Arc<RecordStore>,
    rx: mpsc::Receiver<Value>,
}

impl MessageFeed {
    /// Drive snapshot upserts until the channel closes.
    pub async fn run(mut self) -> Result<()> {
        while let Some(snapshot) = self.rx.recv().await {
            let records: Vec<Message> = serde_json::from_value(snapshot)?;
            tracing::debug!(count = records.len(), "Message snapshot received");
            for record in &records {
                self.store.put(record)?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ScopeId, StoreConfig};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Mock channel recording publishes and handing out a pre-armed
    /// subscription receiver.
    struct MockChannel {
        published: Mutex<Vec<(String, Value)>>,
        fail_publish: bool,
        pending_rx: Mutex<Option<mpsc::Receiver<Value>>>,
    }

    impl MockChannel {
        fn new() -> Self {
            Self {
                published: Mutex::new(Vec::new()),
                fail_publish: false,
                pending_rx: Mutex::new(None),
            }
        }

        fn failing() -> Self {
            Self {
                fail_publish: true,
                ..Self::new()
            }
        }

        fn arm_subscription(&self) -> mpsc::Sender<Value> {
            let (tx, rx) = mpsc::channel(8);
            *self.pending_rx.lock() = Some(rx);
            tx
        }
    }

    #[async_trait]
    impl RealtimeChannel for MockChannel {
        async fn subscribe(&self, _path: &str) -> Result<mpsc::Receiver<Value>> {
            self.pending_rx
                .lock()
                .take()
                .ok_or_else(|| Error::ChannelClosed("no subscription armed".to_string()))
        }

        async fn publish(&self, path: &str, value: Value) -> Result<()> {
            if self.fail_publish {
                return Err(Error::TransportError("publish refused".to_string()));
            }
            self.published.lock().push((path.to_string(), value));
            Ok(())
        }
    }

    async fn open_bridge(channel: Arc<MockChannel>) -> (Arc<RecordStore>, SyncBridge) {
        let scope = ScopeId::new("user-1").unwrap();
        let store = Arc::new(
            RecordStore::open(&scope, &StoreConfig::default())
                .await
                .unwrap(),
        );
        let bridge = SyncBridge::new(Arc::clone(&store), channel);
        (store, bridge)
    }

    fn conversation(id: &str, unread: i64) -> Conversation {
        Conversation {
            id: id.to_string(),
            creator: "user-1".to_string(),
            is_grouped: false,
            sender_id: "user-1".to_string(),
            receive_id: "user-2".to_string(),
            users: "user-1,user-2".to_string(),
            last_message: None,
            unread,
            remark: None,
            pinned: false,
        }
    }

    #[tokio::test]
    async fn test_send_message_optimistic_then_has_sent() {
        let channel = Arc::new(MockChannel::new());
        let (store, bridge) = open_bridge(Arc::clone(&channel)).await;

        let sent = bridge
            .send_message("conv-1", MessageDraft::text("hello"))
            .await
            .unwrap();

        assert_eq!(sent.status, DeliveryOutcome::State(DeliveryState::HasSent));

        let stored: Message = store.get(&sent.id).unwrap().unwrap();
        assert_eq!(stored.status, DeliveryOutcome::State(DeliveryState::HasSent));
        assert_eq!(stored.conversation_id, "conv-1");

        // The published payload carried the pre-ack SENDING status
        let published = channel.published.lock();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "messages/conv-1");
        assert_eq!(published[0].1["status"], "SENDING");
        assert_eq!(published[0].1["kind"], "TEXT");
    }

    #[tokio::test]
    async fn test_send_failure_stamps_failed_and_propagates() {
        let channel = Arc::new(MockChannel::failing());
        let (store, bridge) = open_bridge(channel).await;

        let result = bridge
            .send_message("conv-1", MessageDraft::text("doomed"))
            .await;
        assert!(matches!(result, Err(Error::TransportError(_))));

        // The optimistic record survives with the terminal failure marker
        let all: Vec<Message> = store.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, DeliveryOutcome::Failed);
        assert!(all[0].status.is_terminal());
        assert_eq!(all[0].content, "doomed");
    }

    #[tokio::test]
    async fn test_send_rejects_empty_conversation_id() {
        let channel = Arc::new(MockChannel::new());
        let (_store, bridge) = open_bridge(channel).await;

        let result = bridge.send_message("", MessageDraft::text("x")).await;
        assert!(matches!(result, Err(Error::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_conversation_feed_replace_upserts_snapshots() {
        let channel = Arc::new(MockChannel::new());
        let tx = channel.arm_subscription();
        let (store, bridge) = open_bridge(channel).await;

        let feed = bridge.subscribe_conversations("user-1").await.unwrap();

        // First snapshot: two conversations; second: one updated
        tx.send(serde_json::to_value(vec![conversation("c1", 2), conversation("c2", 0)]).unwrap())
            .await
            .unwrap();
        tx.send(serde_json::to_value(vec![conversation("c1", 5)]).unwrap())
            .await
            .unwrap();
        drop(tx);

        feed.run().await.unwrap();

        let c1: Conversation = store.get("c1").unwrap().unwrap();
        assert_eq!(c1.unread, 5);
        assert!(store.get::<Conversation>("c2").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_message_feed_upserts_snapshots() {
        let channel = Arc::new(MockChannel::new());
        let tx = channel.arm_subscription();
        let (store, bridge) = open_bridge(channel).await;

        let feed = bridge.subscribe_messages("conv-1").await.unwrap();

        let snapshot = serde_json::json!([{
            "id": "m1",
            "conversation_id": "conv-1",
            "content": "from remote",
            "kind": "TEXT",
            "status": "RECEIVED",
            "timestamp": "1700000000000",
            "delete_at": null,
            "ref_id": null,
            "ref_content": null
        }]);
        tx.send(snapshot).await.unwrap();
        drop(tx);

        feed.run().await.unwrap();

        let m1: Message = store.get("m1").unwrap().unwrap();
        assert_eq!(m1.status, DeliveryOutcome::State(DeliveryState::Received));
        assert_eq!(m1.content, "from remote");
    }

    #[tokio::test]
    async fn test_subscribe_rejects_empty_ids() {
        let channel = Arc::new(MockChannel::new());
        let (_store, bridge) = open_bridge(channel).await;

        assert!(matches!(
            bridge.subscribe_conversations("  ").await,
            Err(Error::ValidationError(_))
        ));
        assert!(matches!(
            bridge.subscribe_messages("").await,
            Err(Error::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_update_presence_publishes_marker() {
        let channel = Arc::new(MockChannel::new());
        let (_store, bridge) = open_bridge(Arc::clone(&channel)).await;

        bridge.update_presence(true).await.unwrap();
        bridge.update_presence(false).await.unwrap();

        let published = channel.published.lock();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].0, "presence/user-1");
        assert_eq!(published[0].1["status"], "online");
        assert_eq!(published[1].1["status"], "offline");
    }

    #[tokio::test]
    async fn test_mark_read_resets_unread() {
        let channel = Arc::new(MockChannel::new());
        let (store, bridge) = open_bridge(channel).await;

        store.put(&conversation("c1", 7)).unwrap();
        bridge.mark_read("c1").unwrap();

        let c1: Conversation = store.get("c1").unwrap().unwrap();
        assert_eq!(c1.unread, 0);

        assert!(matches!(
            bridge.mark_read("missing"),
            Err(Error::NotFound(_))
        ));
    }
}
