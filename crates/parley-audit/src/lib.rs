//! Parley Audit - append-only trail of every envelope
//!
//! Each inbound or outbound message produces one independent record.
//! Sinks are external collaborators from the engine's point of view;
//! the engine treats recording as best-effort and never lets an audit
//! failure interrupt a conversation.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use parley_acl::AclMessage;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("audit I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("audit serialization failed: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, AuditError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditDirection {
    In,
    Out,
}

/// One audit record per message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub at: DateTime<Utc>,
    pub direction: AuditDirection,
    pub agent: String,
    pub peer: String,
    pub performative: String,
    pub conversation_id: String,
    pub protocol: String,
    pub ontology: String,
    pub language: String,
    pub payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl AuditRecord {
    pub fn for_message(
        direction: AuditDirection,
        agent: impl Into<String>,
        peer: impl Into<String>,
        message: &AclMessage,
    ) -> Self {
        Self {
            at: Utc::now(),
            direction,
            agent: agent.into(),
            peer: peer.into(),
            performative: message.performative.to_string(),
            conversation_id: message.conversation_id.clone(),
            protocol: message.protocol.clone(),
            ontology: message.ontology.clone(),
            language: message.language.clone(),
            payload: redact(Value::Object(message.payload.clone())),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Where audit records go.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: &AuditRecord) -> Result<()>;
}

const REDACT_KEYS: [&str; 6] = [
    "authorization",
    "api_key",
    "token",
    "password",
    "secret",
    "bearer",
];

/// Mask secret-bearing keys anywhere in a payload before it is written.
pub fn redact(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| {
                    if REDACT_KEYS.contains(&key.to_lowercase().as_str()) {
                        (key, Value::String("***".to_string()))
                    } else {
                        (key, redact(value))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(redact).collect()),
        other => other,
    }
}

/// Appends one JSON line per record to `<dir>/audit-<agent>.jsonl`.
pub struct JsonlAuditSink {
    dir: PathBuf,
}

impl JsonlAuditSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl AuditSink for JsonlAuditSink {
    async fn record(&self, record: &AuditRecord) -> Result<()> {
        use std::io::Write;

        let line = serde_json::to_string(record)
            .map_err(|e| AuditError::Serialization(e.to_string()))?;
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("audit-{}.jsonl", record.agent));
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

/// Emits records as structured tracing events.
#[derive(Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, record: &AuditRecord) -> Result<()> {
        tracing::info!(
            direction = ?record.direction,
            agent = %record.agent,
            peer = %record.peer,
            performative = %record.performative,
            conversation_id = %record.conversation_id,
            payload = %record.payload,
            "acl audit"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_acl::Performative;
    use serde_json::json;

    fn message() -> AclMessage {
        AclMessage::build(Performative::Inform)
            .conversation("conv-7")
            .text("order completed")
            .finish()
            .unwrap()
    }

    #[test]
    fn record_captures_the_envelope_fields() {
        let record =
            AuditRecord::for_message(AuditDirection::Out, "provider", "human@office", &message());
        assert_eq!(record.performative, "INFORM");
        assert_eq!(record.conversation_id, "conv-7");
        assert_eq!(record.payload["text"], json!("order completed"));
    }

    #[test]
    fn redaction_masks_secrets_at_any_depth() {
        let value = json!({
            "text": "fine",
            "api_key": "sk-live-123",
            "nested": {"Token": "abc", "list": [{"password": "p"}]}
        });
        let clean = redact(value);
        assert_eq!(clean["api_key"], json!("***"));
        assert_eq!(clean["nested"]["Token"], json!("***"));
        assert_eq!(clean["nested"]["list"][0]["password"], json!("***"));
        assert_eq!(clean["text"], json!("fine"));
    }

    #[tokio::test]
    async fn jsonl_sink_appends_one_line_per_record() {
        let dir = std::env::temp_dir().join(format!("parley-audit-{}", std::process::id()));
        let sink = JsonlAuditSink::new(&dir);
        let record =
            AuditRecord::for_message(AuditDirection::In, "reporter", "provider@office", &message());

        sink.record(&record).await.unwrap();
        sink.record(&record).await.unwrap();

        let contents = std::fs::read_to_string(dir.join("audit-reporter.jsonl")).unwrap();
        assert_eq!(contents.lines().count(), 2);
        let parsed: AuditRecord = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
        assert_eq!(parsed.conversation_id, "conv-7");

        let _ = std::fs::remove_dir_all(dir);
    }
}
