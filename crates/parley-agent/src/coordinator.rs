//! Coordinator role
//!
//! Accepts a REQUEST from an initiator, immediately AGREEs, routes the
//! request to the best-matching provider, and relays the terminal reply
//! back to the recorded initiator. The provider's own AGREE is dropped
//! as noise; the pending entry is cleared exactly once, on the first
//! terminal forward.

use async_trait::async_trait;

use parley_acl::{AclMessage, Performative};
use parley_directory::router;

use crate::role::{Outbound, RoleCx, RoleLogic};

pub struct CoordinatorRole {
    /// Alias used when routing finds no candidate.
    fallback_alias: String,
    /// Need text used when the request carries no usable text.
    default_need: String,
}

impl CoordinatorRole {
    pub fn new() -> Self {
        Self {
            fallback_alias: "provider".to_string(),
            default_need: "order fulfillment".to_string(),
        }
    }

    pub fn with_fallback(mut self, alias: impl Into<String>) -> Self {
        self.fallback_alias = alias.into();
        self
    }
}

impl Default for CoordinatorRole {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoleLogic for CoordinatorRole {
    async fn decide(
        &self,
        cx: &RoleCx<'_>,
        incoming: &AclMessage,
        sender: &str,
    ) -> Option<Vec<Outbound>> {
        let cid = incoming.conversation_id.clone();
        match incoming.performative {
            Performative::Request => {
                cx.pending.remember(&cid, sender).await;

                let agree = incoming
                    .reply(Performative::Agree)
                    .text("accepted for processing")
                    .finish()
                    .ok()?;

                let need = incoming
                    .text()
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or(&self.default_need)
                    .to_string();
                let snapshot = cx.directory.snapshot().await;
                let target = router::choose(&need, &snapshot, cx.alias, false, None, cx.picker)
                    .await
                    .unwrap_or_else(|| self.fallback_alias.clone());
                tracing::info!(conversation_id = %cid, %target, "routing request");

                let forward = incoming
                    .reply(Performative::Request)
                    .payload(incoming.payload.clone())
                    .finish()
                    .ok()?;

                Some(vec![
                    Outbound::reply(agree),
                    Outbound::to(target, forward),
                ])
            }
            performative if performative.is_terminal() => {
                let initiator = cx.pending.take(&cid).await;
                let reply_to = initiator.unwrap_or_else(|| sender.to_string());
                tracing::info!(
                    conversation_id = %cid,
                    %performative,
                    %reply_to,
                    "relaying terminal reply to the initiator"
                );
                let forward = incoming
                    .reply(performative)
                    .payload(incoming.payload.clone())
                    .finish()
                    .ok()?;
                Some(vec![Outbound::to(reply_to, forward)])
            }
            // The provider's AGREE (and anything else) is noise here.
            _ => Some(vec![]),
        }
    }
}
