//! Parley ACL - canonical FIPA-ACL envelope model
//!
//! Defines the message envelope exchanged between agents, the allowed
//! performative vocabulary, the minimal transition rules, and the codec
//! for both supported wire shapes (self-describing JSON body, or legacy
//! metadata plus free-text body).

pub mod message;
pub mod performative;
pub mod time;
pub mod transitions;
pub mod wire;

pub use message::{
    AclMessage, MessageBuilder, ReplyBuilder, DEFAULT_LANGUAGE, DEFAULT_ONTOLOGY,
    DEFAULT_PROTOCOL, REGISTRY_ONTOLOGY,
};
pub use performative::Performative;
pub use time::{ensure_reply_by, new_conversation_id};
pub use transitions::is_valid_transition;
pub use wire::{decode, encode, Datagram};

use thiserror::Error;

/// Errors that can occur constructing or decoding envelopes
#[derive(Error, Debug)]
pub enum AclError {
    #[error("unsupported performative '{0}'")]
    UnsupportedPerformative(String),

    #[error("conversation_id is required")]
    MissingConversationId,

    #[error("invalid transition {incoming} -> {outgoing}")]
    InvalidTransition { incoming: String, outgoing: String },

    #[error("malformed envelope: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, AclError>;
