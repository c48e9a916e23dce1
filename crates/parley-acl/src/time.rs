//! Conversation ids and reply-by deadlines

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Mint a fresh conversation id, e.g. `order-3fa94c1d`.
pub fn new_conversation_id(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &hex[..8])
}

/// Normalize a requested reply-by deadline.
///
/// Missing deadlines default to `now + default_lead`; deadlines earlier
/// than `now + min_lead` are clamped forward rather than rejected.
pub fn ensure_reply_by(
    requested: Option<DateTime<Utc>>,
    min_lead: Duration,
    default_lead: Duration,
) -> DateTime<Utc> {
    let now = Utc::now();
    match requested {
        None => now + default_lead,
        Some(at) => {
            let earliest = now + min_lead;
            if at < earliest {
                earliest
            } else {
                at
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_ids_carry_the_prefix_and_are_unique() {
        let a = new_conversation_id("conv");
        let b = new_conversation_id("conv");
        assert!(a.starts_with("conv-"));
        assert_eq!(a.len(), "conv-".len() + 8);
        assert_ne!(a, b);
    }

    #[test]
    fn missing_reply_by_gets_the_default_lead() {
        let at = ensure_reply_by(None, Duration::seconds(5), Duration::seconds(30));
        let lead = at - Utc::now();
        assert!(lead > Duration::seconds(25) && lead <= Duration::seconds(30));
    }

    #[test]
    fn past_reply_by_is_clamped_forward() {
        let stale = Utc::now() - Duration::seconds(60);
        let at = ensure_reply_by(Some(stale), Duration::seconds(5), Duration::seconds(30));
        assert!(at > Utc::now());
    }

    #[test]
    fn generous_reply_by_is_kept() {
        let generous = Utc::now() + Duration::seconds(120);
        let at = ensure_reply_by(Some(generous), Duration::seconds(5), Duration::seconds(30));
        assert_eq!(at, generous);
    }
}
