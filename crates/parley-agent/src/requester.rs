//! Requester role
//!
//! Opens a conversation with a REQUEST and waits under a hard overall
//! deadline, distinct from the per-poll timeout. AGREE keeps the wait
//! alive; a terminal reply ends it and forwards an audit summary to the
//! configured observer; hitting the deadline logs a timeout outcome and
//! stops the wait with no further sends for that conversation.

use std::time::Instant;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::Mutex;

use parley_acl::{new_conversation_id, AclMessage, Performative};

use crate::agent::Agent;
use crate::role::{IdleStep, Outbound, RoleCx, RoleLogic};
use crate::Result;

/// How a requester conversation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Completed(Performative),
    TimedOut,
}

#[derive(Default)]
struct RequesterState {
    conversation_id: Option<String>,
    deadline: Option<Instant>,
    outcome: Option<RequestOutcome>,
}

pub struct RequesterRole {
    /// Alias that receives the audit summary on completion.
    observer: Option<String>,
    state: Mutex<RequesterState>,
}

impl RequesterRole {
    pub fn new(observer: Option<String>) -> Self {
        Self {
            observer,
            state: Mutex::new(RequesterState::default()),
        }
    }

    /// Send the opening REQUEST and arm the hard deadline.
    ///
    /// The reply-by carries a small jitter so repeated demo runs do not
    /// produce identical deadlines.
    pub async fn open(&self, agent: &Agent, to: &str, text: &str) -> Result<String> {
        let conversation_id = new_conversation_id("order");
        let jitter_secs = rand::thread_rng().gen_range(8..=15);
        let request = AclMessage::build(Performative::Request)
            .conversation(&conversation_id)
            .text(text)
            .reply_by_in(jitter_secs)
            .finish()?;

        agent.send_acl(to, &request).await?;

        let mut state = self.state.lock().await;
        state.conversation_id = Some(conversation_id.clone());
        state.deadline = Some(Instant::now() + agent.settings().reply_deadline);
        state.outcome = None;
        tracing::info!(%conversation_id, %to, "request opened");
        Ok(conversation_id)
    }

    /// The outcome, once the wait has ended.
    pub async fn outcome(&self) -> Option<RequestOutcome> {
        self.state.lock().await.outcome
    }
}

#[async_trait]
impl RoleLogic for RequesterRole {
    async fn decide(
        &self,
        _cx: &RoleCx<'_>,
        incoming: &AclMessage,
        sender: &str,
    ) -> Option<Vec<Outbound>> {
        let mut state = self.state.lock().await;
        let Some(cid) = state.conversation_id.clone() else {
            return Some(vec![]);
        };
        if incoming.conversation_id != cid {
            return Some(vec![]);
        }

        match incoming.performative {
            Performative::Agree => {
                tracing::info!(conversation_id = %cid, from = %sender, "agreed, still waiting");
                Some(vec![])
            }
            performative if performative.is_terminal() => {
                state.outcome = Some(RequestOutcome::Completed(performative));
                tracing::info!(
                    conversation_id = %cid,
                    %performative,
                    "terminal reply received"
                );
                let Some(observer) = &self.observer else {
                    return Some(vec![]);
                };
                let summary = incoming
                    .reply(Performative::Inform)
                    .text(format!(
                        "AUDIT: outcome for {cid}: {performative} {}",
                        incoming.text().unwrap_or("")
                    ))
                    .finish()
                    .ok()?;
                Some(vec![Outbound::to(observer.clone(), summary)])
            }
            _ => Some(vec![]),
        }
    }

    async fn on_idle(&self, _cx: &RoleCx<'_>) -> IdleStep {
        let mut state = self.state.lock().await;
        if state.outcome.is_some() {
            return IdleStep::Stop;
        }
        if let (Some(cid), Some(deadline)) = (&state.conversation_id, state.deadline) {
            if Instant::now() >= deadline {
                tracing::warn!(conversation_id = %cid, "no terminal reply before the deadline");
                state.outcome = Some(RequestOutcome::TimedOut);
                return IdleStep::Stop;
            }
        }
        IdleStep::Continue
    }
}
