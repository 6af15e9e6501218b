//! Conversation history storage behind a narrow interface

use crate::types::ChatMessage;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// Narrow store interface so the in-memory implementation can be swapped
/// for a real database without touching orchestration logic. `append` is
/// all-or-nothing for a turn's additions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn history(&self, session_id: &str) -> Vec<ChatMessage>;

    async fn append(&self, session_id: &str, messages: Vec<ChatMessage>);
}

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, Vec<ChatMessage>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn history(&self, session_id: &str) -> Vec<ChatMessage> {
        let sessions = self.sessions.lock().await;
        sessions.get(session_id).cloned().unwrap_or_default()
    }

    async fn append(&self, session_id: &str, messages: Vec<ChatMessage>) {
        let mut sessions = self.sessions.lock().await;
        let history = sessions.entry(session_id.to_string()).or_default();
        history.extend(messages);
        debug!(
            session_id,
            total_messages = history.len(),
            "Committed turn messages to session history"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageRole;

    #[tokio::test]
    async fn history_is_empty_for_unknown_sessions() {
        let store = MemorySessionStore::new();
        assert!(store.history("missing").await.is_empty());
    }

    #[tokio::test]
    async fn appends_preserve_insertion_order() {
        let store = MemorySessionStore::new();
        store
            .append(
                "s1",
                vec![
                    ChatMessage::new(MessageRole::User, "first"),
                    ChatMessage::new(MessageRole::Assistant, "second"),
                ],
            )
            .await;
        store
            .append("s1", vec![ChatMessage::new(MessageRole::User, "third")])
            .await;

        let history = store.history("s1").await;
        let contents: Vec<_> = history.iter().map(ChatMessage::text).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }
}
