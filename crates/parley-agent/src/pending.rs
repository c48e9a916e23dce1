//! Coordinator bookkeeping: conversation id -> original initiator

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

/// Tracks who should ultimately receive the result of each forwarded
/// conversation. `take` removes the entry as it returns it, so the
/// initiator is notified exactly once per conversation.
#[derive(Clone, Default)]
pub struct PendingReplies {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl PendingReplies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the initiator for a conversation (first REQUEST wins a
    /// slot; later REQUESTs with the same id overwrite it).
    pub async fn remember(&self, conversation_id: &str, initiator: &str) {
        self.entries
            .lock()
            .await
            .insert(conversation_id.to_string(), initiator.to_string());
    }

    /// Remove and return the initiator for a conversation.
    pub async fn take(&self, conversation_id: &str) -> Option<String> {
        self.entries.lock().await.remove(conversation_id)
    }

    pub async fn contains(&self, conversation_id: &str) -> bool {
        self.entries.lock().await.contains_key(conversation_id)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn take_clears_the_entry_exactly_once() {
        let pending = PendingReplies::new();
        pending.remember("conv-1", "human@office").await;
        assert!(pending.contains("conv-1").await);

        assert_eq!(pending.take("conv-1").await.as_deref(), Some("human@office"));
        assert!(!pending.contains("conv-1").await);
        assert_eq!(pending.take("conv-1").await, None);
    }

    #[tokio::test]
    async fn conversations_are_independent() {
        let pending = PendingReplies::new();
        pending.remember("conv-1", "alpha@office").await;
        pending.remember("conv-2", "beta@office").await;
        assert_eq!(pending.take("conv-2").await.as_deref(), Some("beta@office"));
        assert!(pending.contains("conv-1").await);
    }
}
