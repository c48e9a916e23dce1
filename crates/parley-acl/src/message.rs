//! The envelope model and its builders
//!
//! Every envelope that leaves this module has a performative in the
//! allowed set and a non-empty conversation id. Replies preserve the
//! conversation id, protocol, ontology, and language of the incoming
//! envelope unless explicitly overridden.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::performative::Performative;
use crate::time::new_conversation_id;
use crate::transitions::is_valid_transition;
use crate::{AclError, Result};

pub const DEFAULT_PROTOCOL: &str = "fipa-request";
pub const DEFAULT_ONTOLOGY: &str = "office.demo";
pub const DEFAULT_LANGUAGE: &str = "json";

/// Reserved ontology prefix: REQUESTs tagged with it ask for the peer
/// registry (action LIST/DISCOVER) and any agent answers them.
pub const REGISTRY_ONTOLOGY: &str = "office.registry";

pub(crate) fn default_protocol() -> String {
    DEFAULT_PROTOCOL.to_string()
}

pub(crate) fn default_ontology() -> String {
    DEFAULT_ONTOLOGY.to_string()
}

pub(crate) fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

/// One structured message instance exchanged between agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AclMessage {
    pub performative: Performative,
    pub conversation_id: String,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default = "default_ontology")]
    pub ontology: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_by: Option<DateTime<Utc>>,
    #[serde(default)]
    pub payload: Map<String, Value>,
    /// Stamped by the transport boundary, never trusted from the body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
}

impl AclMessage {
    /// Start building a new envelope.
    pub fn build(performative: Performative) -> MessageBuilder {
        MessageBuilder::new(performative)
    }

    /// Start building a reply that stays inside this conversation.
    pub fn reply(&self, performative: Performative) -> ReplyBuilder {
        let builder = MessageBuilder::new(performative)
            .conversation(self.conversation_id.clone())
            .protocol(self.protocol.clone())
            .ontology(self.ontology.clone())
            .language(self.language.clone());
        ReplyBuilder {
            incoming: self.performative,
            builder,
            strict: false,
        }
    }

    /// Parse and validate a self-describing JSON envelope.
    pub fn from_json(raw: &str) -> Result<AclMessage> {
        let message: AclMessage =
            serde_json::from_str(raw).map_err(|e| AclError::Malformed(e.to_string()))?;
        message.validate()?;
        Ok(message)
    }

    /// Serialize to the JSON wire body.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| AclError::Malformed(e.to_string()))
    }

    /// The `payload.text` field, when present and a string.
    pub fn text(&self) -> Option<&str> {
        self.payload.get("text").and_then(Value::as_str)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.conversation_id.trim().is_empty() {
            return Err(AclError::MissingConversationId);
        }
        Ok(())
    }
}

/// Builder for a fresh envelope. `finish` mints a conversation id when
/// none was supplied and rejects blank ones.
pub struct MessageBuilder {
    performative: Performative,
    conversation_id: Option<String>,
    protocol: String,
    ontology: String,
    language: String,
    reply_by: Option<DateTime<Utc>>,
    payload: Map<String, Value>,
}

impl MessageBuilder {
    fn new(performative: Performative) -> Self {
        Self {
            performative,
            conversation_id: None,
            protocol: default_protocol(),
            ontology: default_ontology(),
            language: default_language(),
            reply_by: None,
            payload: Map::new(),
        }
    }

    pub fn conversation(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    pub fn ontology(mut self, ontology: impl Into<String>) -> Self {
        self.ontology = ontology.into();
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = payload;
        self
    }

    /// Insert one payload entry.
    pub fn entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    /// Set `payload.text` unless the payload already carries one.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.payload
            .entry("text")
            .or_insert(Value::String(text.into()));
        self
    }

    pub fn reply_by(mut self, at: DateTime<Utc>) -> Self {
        self.reply_by = Some(at);
        self
    }

    pub fn reply_by_in(self, seconds: i64) -> Self {
        let at = Utc::now() + Duration::seconds(seconds);
        self.reply_by(at)
    }

    pub fn finish(self) -> Result<AclMessage> {
        let conversation_id = match self.conversation_id {
            Some(id) => {
                if id.trim().is_empty() {
                    return Err(AclError::MissingConversationId);
                }
                id
            }
            None => new_conversation_id("conv"),
        };
        Ok(AclMessage {
            performative: self.performative,
            conversation_id,
            protocol: self.protocol,
            ontology: self.ontology,
            language: self.language,
            reply_by: self.reply_by,
            payload: self.payload,
            sender: None,
            receiver: None,
        })
    }
}

/// Builder for an in-conversation reply. `strict()` additionally
/// enforces the transition rules against the incoming performative.
pub struct ReplyBuilder {
    incoming: Performative,
    builder: MessageBuilder,
    strict: bool,
}

impl ReplyBuilder {
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.builder = self.builder.protocol(protocol);
        self
    }

    pub fn ontology(mut self, ontology: impl Into<String>) -> Self {
        self.builder = self.builder.ontology(ontology);
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.builder = self.builder.language(language);
        self
    }

    pub fn payload(mut self, payload: Map<String, Value>) -> Self {
        self.builder = self.builder.payload(payload);
        self
    }

    pub fn entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.builder = self.builder.entry(key, value);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.builder = self.builder.text(text);
        self
    }

    pub fn reply_by(mut self, at: DateTime<Utc>) -> Self {
        self.builder = self.builder.reply_by(at);
        self
    }

    pub fn reply_by_in(mut self, seconds: i64) -> Self {
        self.builder = self.builder.reply_by_in(seconds);
        self
    }

    pub fn finish(self) -> Result<AclMessage> {
        if self.strict && !is_valid_transition(Some(self.incoming), self.builder.performative) {
            return Err(AclError::InvalidTransition {
                incoming: self.incoming.to_string(),
                outgoing: self.builder.performative.to_string(),
            });
        }
        self.builder.finish()
    }
}
