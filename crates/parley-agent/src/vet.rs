//! Plan validation and the deterministic fallback
//!
//! Backend output never flows directly into a sent message: every plan
//! is checked against the performative vocabulary and the transition
//! rules first, and an invalid plan is downgraded to a REFUSE rather
//! than sent or propagated as a fault.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use parley_acl::{is_valid_transition, AclMessage, Performative};
use parley_llm::Plan;

/// Outcome of vetting one plan.
#[derive(Debug)]
pub enum Vetted {
    Valid {
        performative: Performative,
        payload: Map<String, Value>,
        text: Option<String>,
        reply_by: Option<DateTime<Utc>>,
    },
    Invalid {
        reason: String,
    },
}

/// Check an untrusted plan against the vocabulary and the transition
/// table relative to the incoming performative.
pub fn vet_plan(incoming: &AclMessage, plan: Plan) -> Vetted {
    let performative = match plan.performative.parse::<Performative>() {
        Ok(performative) => performative,
        Err(_) => {
            return Vetted::Invalid {
                reason: format!("unsupported performative '{}'", plan.performative),
            }
        }
    };
    if !is_valid_transition(Some(incoming.performative), performative) {
        return Vetted::Invalid {
            reason: format!(
                "invalid transition {} -> {}",
                incoming.performative, performative
            ),
        };
    }
    Vetted::Valid {
        performative,
        payload: plan.payload,
        text: plan.text,
        reply_by: plan.reply_by,
    }
}

/// Deterministic default used when the reasoning backend fails or times
/// out. Always passes vetting for its incoming performative.
pub fn fallback_plan(incoming: &AclMessage) -> Plan {
    match incoming.performative {
        Performative::Request => Plan::new("AGREE").with_text("Accepted."),
        Performative::Agree => Plan::new("INFORM").with_text("Done."),
        _ => Plan::new("INFORM").with_text("Acknowledged."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incoming(performative: Performative) -> AclMessage {
        AclMessage::build(performative)
            .conversation("conv-1")
            .finish()
            .unwrap()
    }

    #[test]
    fn unknown_performative_is_invalid() {
        let verdict = vet_plan(&incoming(Performative::Request), Plan::new("PROPOSE"));
        assert!(matches!(verdict, Vetted::Invalid { reason } if reason.contains("PROPOSE")));
    }

    #[test]
    fn transition_violation_is_invalid() {
        let verdict = vet_plan(&incoming(Performative::Request), Plan::new("INFORM"));
        assert!(matches!(verdict, Vetted::Invalid { reason } if reason.contains("REQUEST")));
    }

    #[test]
    fn legal_plan_passes_with_its_content() {
        let plan = Plan::new("agree").with_text("on it");
        match vet_plan(&incoming(Performative::Request), plan) {
            Vetted::Valid {
                performative, text, ..
            } => {
                assert_eq!(performative, Performative::Agree);
                assert_eq!(text.as_deref(), Some("on it"));
            }
            Vetted::Invalid { reason } => panic!("unexpected rejection: {reason}"),
        }
    }

    #[test]
    fn fallback_plans_always_pass_vetting() {
        for performative in Performative::ALL {
            let message = incoming(performative);
            let plan = fallback_plan(&message);
            assert!(
                matches!(vet_plan(&message, plan), Vetted::Valid { .. }),
                "fallback rejected for {performative}"
            );
        }
    }
}
