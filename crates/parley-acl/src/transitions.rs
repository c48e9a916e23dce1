//! Minimal performative transition rules
//!
//! A guard against egregious protocol violations, not a full dialogue
//! state machine: only the REQUEST and AGREE cases are constrained.

use crate::performative::Performative;

/// Whether `outgoing` is a legal reply to `incoming`.
///
/// `None` means the outgoing message opens a conversation, which any
/// performative may do.
pub fn is_valid_transition(incoming: Option<Performative>, outgoing: Performative) -> bool {
    match incoming {
        None => true,
        Some(Performative::Request) => {
            matches!(outgoing, Performative::Agree | Performative::Refuse)
        }
        Some(Performative::Agree) => {
            matches!(outgoing, Performative::Inform | Performative::Failure)
        }
        Some(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Performative::*;

    #[test]
    fn opening_allows_anything() {
        for p in Performative::ALL {
            assert!(is_valid_transition(None, p));
        }
    }

    #[test]
    fn request_only_permits_agree_or_refuse() {
        for p in Performative::ALL {
            let expected = matches!(p, Agree | Refuse);
            assert_eq!(is_valid_transition(Some(Request), p), expected, "{p}");
        }
    }

    #[test]
    fn agree_only_permits_inform_or_failure() {
        for p in Performative::ALL {
            let expected = matches!(p, Inform | Failure);
            assert_eq!(is_valid_transition(Some(Agree), p), expected, "{p}");
        }
    }

    #[test]
    fn other_incoming_performatives_are_unconstrained() {
        for incoming in [Refuse, Inform, Failure, Cancel] {
            for outgoing in Performative::ALL {
                assert!(is_valid_transition(Some(incoming), outgoing));
            }
        }
    }
}
