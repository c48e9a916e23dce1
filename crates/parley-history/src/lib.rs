//! Parley History - bounded short-term memory per agent
//!
//! A fixed-capacity ring of message summaries per owning key (agent
//! name, or agent plus conversation). Oldest entries are evicted first;
//! entries are immutable once appended. The buffer gives the reasoning
//! backend its short-term memory and the console its `who` view.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

pub const DEFAULT_CAPACITY: usize = 20;

/// Payload previews are truncated to keep prompt sizes bounded.
const PREVIEW_CAP: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    In,
    Out,
}

/// One observed envelope, summarized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEntry {
    pub direction: Direction,
    pub peer: String,
    pub performative: String,
    pub conversation_id: String,
    pub preview: String,
    pub at: DateTime<Utc>,
}

impl ContextEntry {
    pub fn new(
        direction: Direction,
        peer: impl Into<String>,
        performative: impl Into<String>,
        conversation_id: impl Into<String>,
        payload: &serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            direction,
            peer: peer.into(),
            performative: performative.into(),
            conversation_id: conversation_id.into(),
            preview: preview_of(payload),
            at: Utc::now(),
        }
    }
}

fn preview_of(payload: &serde_json::Map<String, serde_json::Value>) -> String {
    let rendered = serde_json::Value::Object(payload.clone()).to_string();
    if rendered.chars().count() <= PREVIEW_CAP {
        return rendered;
    }
    let mut truncated: String = rendered.chars().take(PREVIEW_CAP).collect();
    truncated.push('…');
    truncated
}

/// The shared context buffer. Cloneable handle; clones share storage.
#[derive(Clone)]
pub struct ContextBuffer {
    store: Arc<Mutex<HashMap<String, VecDeque<ContextEntry>>>>,
    capacity: usize,
}

impl ContextBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            store: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Honors `PARLEY_HISTORY_LIMIT`, falling back to the default of 20.
    pub fn from_env() -> Self {
        let capacity = std::env::var("PARLEY_HISTORY_LIMIT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_CAPACITY);
        Self::new(capacity)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append one entry; evicts the oldest when the ring is full.
    pub async fn push(&self, key: &str, entry: ContextEntry) {
        let mut store = self.store.lock().await;
        let ring = store.entry(key.to_string()).or_default();
        if ring.len() == self.capacity {
            ring.pop_front();
        }
        ring.push_back(entry);
    }

    /// The most recent entries for a key, oldest-first, newest-last.
    pub async fn recent(&self, key: &str, limit: Option<usize>) -> Vec<ContextEntry> {
        let store = self.store.lock().await;
        let Some(ring) = store.get(key) else {
            return Vec::new();
        };
        let entries: Vec<ContextEntry> = ring.iter().cloned().collect();
        trim_to_tail(entries, limit)
    }

    /// Entries restricted to one conversation, order preserved.
    pub async fn recent_for_conversation(
        &self,
        key: &str,
        conversation_id: &str,
        limit: Option<usize>,
    ) -> Vec<ContextEntry> {
        let store = self.store.lock().await;
        let Some(ring) = store.get(key) else {
            return Vec::new();
        };
        let entries: Vec<ContextEntry> = ring
            .iter()
            .filter(|entry| entry.conversation_id == conversation_id)
            .cloned()
            .collect();
        trim_to_tail(entries, limit)
    }

    /// Render history as a JSON array string for the reasoning prompt.
    pub async fn format_for_prompt(
        &self,
        key: &str,
        conversation_id: Option<&str>,
        limit: Option<usize>,
    ) -> String {
        let entries = match conversation_id {
            Some(cid) => self.recent_for_conversation(key, cid, limit).await,
            None => self.recent(key, limit).await,
        };
        serde_json::to_string_pretty(&entries).unwrap_or_else(|_| "[]".to_string())
    }

    pub async fn clear(&self, key: &str) {
        self.store.lock().await.remove(key);
    }

    /// Entry counts per key, for inspection.
    pub async fn stats(&self) -> HashMap<String, usize> {
        self.store
            .lock()
            .await
            .iter()
            .map(|(key, ring)| (key.clone(), ring.len()))
            .collect()
    }
}

impl Default for ContextBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

fn trim_to_tail(entries: Vec<ContextEntry>, limit: Option<usize>) -> Vec<ContextEntry> {
    match limit {
        Some(limit) if entries.len() > limit => {
            entries[entries.len() - limit..].to_vec()
        }
        _ => entries,
    }
}
