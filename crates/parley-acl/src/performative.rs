//! The speech-act vocabulary an envelope may carry

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::AclError;

/// The minimal request/agree/refuse/inform/failure/cancel subset of
/// FIPA-ACL. Envelope construction fails for anything outside this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Performative {
    Request,
    Agree,
    Refuse,
    Inform,
    Failure,
    Cancel,
}

impl Performative {
    /// Every member of the allowed set, in wire order.
    pub const ALL: [Performative; 6] = [
        Performative::Request,
        Performative::Agree,
        Performative::Refuse,
        Performative::Inform,
        Performative::Failure,
        Performative::Cancel,
    ];

    /// Terminal performatives end a negotiation thread.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Performative::Inform | Performative::Failure | Performative::Refuse
        )
    }

    /// The uppercase wire spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Performative::Request => "REQUEST",
            Performative::Agree => "AGREE",
            Performative::Refuse => "REFUSE",
            Performative::Inform => "INFORM",
            Performative::Failure => "FAILURE",
            Performative::Cancel => "CANCEL",
        }
    }
}

impl fmt::Display for Performative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Performative {
    type Err = AclError;

    /// Case-insensitive; normalizes to the uppercase wire spelling.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "REQUEST" => Ok(Performative::Request),
            "AGREE" => Ok(Performative::Agree),
            "REFUSE" => Ok(Performative::Refuse),
            "INFORM" => Ok(Performative::Inform),
            "FAILURE" => Ok(Performative::Failure),
            "CANCEL" => Ok(Performative::Cancel),
            _ => Err(AclError::UnsupportedPerformative(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("request".parse::<Performative>().unwrap(), Performative::Request);
        assert_eq!("Agree".parse::<Performative>().unwrap(), Performative::Agree);
        assert_eq!("INFORM".parse::<Performative>().unwrap(), Performative::Inform);
    }

    #[test]
    fn rejects_everything_outside_the_set() {
        for bad in ["PROPOSE", "QUERY-REF", "subscribe", "", "AGREED"] {
            assert!(bad.parse::<Performative>().is_err(), "accepted '{bad}'");
        }
    }

    #[test]
    fn terminal_set() {
        assert!(Performative::Inform.is_terminal());
        assert!(Performative::Failure.is_terminal());
        assert!(Performative::Refuse.is_terminal());
        assert!(!Performative::Request.is_terminal());
        assert!(!Performative::Agree.is_terminal());
        assert!(!Performative::Cancel.is_terminal());
    }

    #[test]
    fn serde_uses_wire_spelling() {
        let json = serde_json::to_string(&Performative::Request).unwrap();
        assert_eq!(json, "\"REQUEST\"");
        let back: Performative = serde_json::from_str("\"FAILURE\"").unwrap();
        assert_eq!(back, Performative::Failure);
    }
}
