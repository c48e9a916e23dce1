//! Parley Agent - the conversation engine every agent runs
//!
//! One inbound loop per agent, processing one message at a time through
//! the receive -> authorize -> decide -> validate -> send -> audit
//! pipeline. Role logic gets the first chance to answer; when it
//! declines and delegation is enabled, the reasoning backend proposes a
//! plan that is always revalidated before anything reaches the
//! transport.

pub mod agent;
pub mod config;
pub mod coordinator;
pub mod pending;
pub mod policy;
pub mod provider;
pub mod requester;
pub mod role;
pub mod vet;

pub use agent::{Agent, AgentConfig, PipelineStats};
pub use config::{persona_from_env, AgentSettings};
pub use coordinator::CoordinatorRole;
pub use pending::PendingReplies;
pub use policy::SenderPolicy;
pub use provider::ProviderRole;
pub use requester::{RequestOutcome, RequesterRole};
pub use role::{IdleStep, NullRole, Outbound, RoleCx, RoleLogic};
pub use vet::{fallback_plan, vet_plan, Vetted};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error(transparent)]
    Acl(#[from] parley_acl::AclError),

    #[error(transparent)]
    Transport(#[from] parley_transport::TransportError),
}

pub type Result<T> = std::result::Result<T, AgentError>;
