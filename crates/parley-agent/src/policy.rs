//! Sender authorization policy

use std::collections::HashSet;

use crate::config::AgentSettings;

fn alias_of(address: &str) -> &str {
    address.split('@').next().unwrap_or(address)
}

/// Who may talk to this agent. The allow-list matches either the full
/// transport address or its alias part; an empty configured list is
/// fail-open.
#[derive(Debug, Clone)]
pub enum SenderPolicy {
    AcceptUnknown,
    AllowList(HashSet<String>),
}

impl SenderPolicy {
    pub fn from_settings(settings: &AgentSettings) -> Self {
        match &settings.authorized_senders {
            None => SenderPolicy::AcceptUnknown,
            Some(list) => SenderPolicy::AllowList(list.iter().cloned().collect()),
        }
    }

    pub fn permits(&self, sender: &str) -> bool {
        match self {
            SenderPolicy::AcceptUnknown => true,
            SenderPolicy::AllowList(set) if set.is_empty() => true,
            SenderPolicy::AllowList(set) => {
                set.contains(sender) || set.contains(alias_of(sender))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_unknown_passes_everyone() {
        assert!(SenderPolicy::AcceptUnknown.permits("stranger@nowhere"));
    }

    #[test]
    fn empty_allow_list_is_fail_open() {
        let policy = SenderPolicy::AllowList(HashSet::new());
        assert!(policy.permits("anyone@office"));
    }

    #[test]
    fn allow_list_matches_address_or_alias() {
        let policy =
            SenderPolicy::AllowList(["human".to_string(), "audit@vault".to_string()].into());
        assert!(policy.permits("human@office"));
        assert!(policy.permits("audit@vault"));
        assert!(!policy.permits("stranger@office"));
    }
}
