//! The untrusted candidate reply

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A candidate reply produced by role logic or the reasoning backend.
///
/// The performative is deliberately a plain string: backend output is
/// untrusted, and parsing it into the typed vocabulary is the first
/// step of validation in the conversation pipeline. A `Plan` never
/// reaches the transport without passing that check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub performative: String,
    #[serde(default)]
    pub payload: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_by: Option<DateTime<Utc>>,
}

impl Plan {
    pub fn new(performative: impl Into<String>) -> Self {
        Self {
            performative: performative.into(),
            payload: Map::new(),
            text: None,
            reply_by: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = payload;
        self
    }

    /// Parse backend output. Tolerates missing payload/text fields but
    /// nothing structurally non-JSON.
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_backend_reply() {
        let plan = Plan::from_json(r#"{"performative":"AGREE","text":"OK."}"#).unwrap();
        assert_eq!(plan.performative, "AGREE");
        assert_eq!(plan.text.as_deref(), Some("OK."));
        assert!(plan.payload.is_empty());
    }

    #[test]
    fn keeps_unvalidated_performatives_as_is() {
        // Validation is the pipeline's job, not the parser's.
        let plan = Plan::from_json(r#"{"performative":"PROPOSE"}"#).unwrap();
        assert_eq!(plan.performative, "PROPOSE");
    }

    #[test]
    fn rejects_non_json() {
        assert!(Plan::from_json("Sure! Here is my plan: AGREE").is_err());
    }
}
