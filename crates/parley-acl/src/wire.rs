//! Wire codec - the two supported wire shapes
//!
//! Shape (a): the body is a self-describing JSON envelope, with the
//! FIPA tags mirrored into flat metadata for transports that match on
//! them. Shape (b), legacy: flat metadata plus a free-text body, which
//! decoding lifts into `payload.text`.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::message::{default_language, default_ontology, default_protocol, AclMessage};
use crate::performative::Performative;
use crate::{AclError, Result};

/// The opaque unit the transport moves between named endpoints.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub to: String,
    pub sender: String,
    pub body: String,
    pub metadata: BTreeMap<String, String>,
}

/// Encode an envelope into a datagram addressed to `to`.
pub fn encode(message: &AclMessage, to: &str, sender: &str) -> Result<Datagram> {
    let body = message.to_json()?;
    let mut metadata = BTreeMap::new();
    metadata.insert("performative".to_string(), message.performative.to_string());
    metadata.insert("protocol".to_string(), message.protocol.clone());
    metadata.insert(
        "conversation_id".to_string(),
        message.conversation_id.clone(),
    );
    metadata.insert("ontology".to_string(), message.ontology.clone());
    metadata.insert("language".to_string(), message.language.clone());
    if let Some(reply_by) = message.reply_by {
        metadata.insert(
            "reply_by".to_string(),
            reply_by.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
    }
    Ok(Datagram {
        to: to.to_string(),
        sender: sender.to_string(),
        body,
        metadata,
    })
}

/// Decode a datagram into a validated envelope.
///
/// Tries the body as a JSON envelope first, then falls back to the
/// legacy metadata shape. When both `conversation_id` and the legacy
/// `conversation-id` spelling appear in the metadata, the underscore
/// form wins. The sender/receiver stamps always come from the datagram.
pub fn decode(datagram: &Datagram) -> Result<AclMessage> {
    if !datagram.body.is_empty() {
        if let Ok(mut message) = AclMessage::from_json(&datagram.body) {
            message.sender = Some(datagram.sender.clone());
            message.receiver = Some(datagram.to.clone());
            return Ok(message);
        }
    }

    let md = &datagram.metadata;
    let conversation_id = md
        .get("conversation_id")
        .or_else(|| md.get("conversation-id"))
        .map(String::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(AclError::MissingConversationId)?
        .to_string();
    let performative: Performative = md
        .get("performative")
        .map(String::as_str)
        .unwrap_or("")
        .parse()?;
    let reply_by = md
        .get("reply_by")
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|at| at.with_timezone(&Utc));

    let mut payload = Map::new();
    if !datagram.body.is_empty() {
        payload.insert("text".to_string(), Value::String(datagram.body.clone()));
    }

    Ok(AclMessage {
        performative,
        conversation_id,
        protocol: md.get("protocol").cloned().unwrap_or_else(default_protocol),
        ontology: md.get("ontology").cloned().unwrap_or_else(default_ontology),
        language: md.get("language").cloned().unwrap_or_else(default_language),
        reply_by,
        payload,
        sender: Some(datagram.sender.clone()),
        receiver: Some(datagram.to.clone()),
    })
}
