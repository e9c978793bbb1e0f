//! # Realtime Channel Contract
//!
//! The subscribe/publish seam to the realtime backend. Only the contract
//! is consumed here; the backend implementation lives with the host.
//!
//! Subscriptions are **level-triggered**: every notification carries the
//! complete current value of the subscribed path, not a diff. That means
//! O(total remote records) processing per notification, which is fine at
//! chat scale; a diffing layer would slot in behind this trait if payload
//! growth ever makes it costly.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::Result;

/// Path-scoped realtime push/pull channel.
#[async_trait]
pub trait RealtimeChannel: Send + Sync {
    /// Open a long-lived, level-triggered subscription to a path.
    ///
    /// The receiver yields the path's complete current value on every
    /// change; the channel closing ends the stream.
    async fn subscribe(&self, path: &str) -> Result<mpsc::Receiver<Value>>;

    /// Publish a value to a path.
    async fn publish(&self, path: &str, value: Value) -> Result<()>;
}

/// Path of the conversation list containing an identity.
pub fn conversations_path(scope_user_id: &str) -> String {
    format!("conversations/{}", scope_user_id)
}

/// Path of a conversation's message list.
pub fn messages_path(conversation_id: &str) -> String {
    format!("messages/{}", conversation_id)
}

/// Path of an identity's presence marker.
pub fn presence_path(user_id: &str) -> String {
    format!("presence/{}", user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_shapes() {
        assert_eq!(conversations_path("u1"), "conversations/u1");
        assert_eq!(messages_path("conv-9"), "messages/conv-9");
        assert_eq!(presence_path("u1"), "presence/u1");
    }
}
