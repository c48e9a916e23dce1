//! Role logic seam
//!
//! Roles are configurable behavior on one engine, not separate engines:
//! each gets the first chance to answer an inbound envelope, and an
//! idle hook on every quiet poll so deadlines are checked between
//! messages.

use std::time::Duration;

use async_trait::async_trait;

use parley_acl::AclMessage;
use parley_directory::{PeerDirectory, PeerPicker};

use crate::config::AgentSettings;
use crate::pending::PendingReplies;

/// What the engine lends a role for one decision.
pub struct RoleCx<'a> {
    pub alias: &'a str,
    pub settings: &'a AgentSettings,
    pub directory: &'a PeerDirectory,
    pub pending: &'a PendingReplies,
    pub picker: Option<&'a dyn PeerPicker>,
}

/// One envelope to dispatch after a decision.
pub struct Outbound {
    /// Destination alias or address; `None` replies to the sender.
    pub to: Option<String>,
    /// Simulated processing delay before this send.
    pub after: Option<Duration>,
    pub message: AclMessage,
}

impl Outbound {
    pub fn reply(message: AclMessage) -> Self {
        Self {
            to: None,
            after: None,
            message,
        }
    }

    pub fn to(target: impl Into<String>, message: AclMessage) -> Self {
        Self {
            to: Some(target.into()),
            after: None,
            message,
        }
    }

    pub fn delayed(mut self, after: Duration) -> Self {
        self.after = Some(after);
        self
    }
}

/// Signal from the idle hook back to the inbound loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleStep {
    Continue,
    Stop,
}

#[async_trait]
pub trait RoleLogic: Send + Sync {
    /// Answer an inbound envelope, or decline.
    ///
    /// `None` means no decision: the pipeline falls through to the
    /// delegated planner (when enabled). `Some(vec![])` means the
    /// envelope was handled and nothing goes out.
    async fn decide(
        &self,
        cx: &RoleCx<'_>,
        incoming: &AclMessage,
        sender: &str,
    ) -> Option<Vec<Outbound>>;

    /// Called on every quiet poll iteration.
    async fn on_idle(&self, _cx: &RoleCx<'_>) -> IdleStep {
        IdleStep::Continue
    }
}

/// Never decides anything; pure delegation or sink agents.
#[derive(Debug, Default)]
pub struct NullRole;

#[async_trait]
impl RoleLogic for NullRole {
    async fn decide(
        &self,
        _cx: &RoleCx<'_>,
        _incoming: &AclMessage,
        _sender: &str,
    ) -> Option<Vec<Outbound>> {
        None
    }
}
