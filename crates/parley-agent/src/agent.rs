//! The agent runtime: one inbound loop, one pipeline per message

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::sync::Mutex;

use parley_acl::{ensure_reply_by, wire, AclMessage, Performative, REGISTRY_ONTOLOGY};
use parley_audit::{AuditDirection, AuditRecord, AuditSink};
use parley_directory::{PeerDescriptor, PeerDirectory, PeerPicker};
use parley_history::{ContextBuffer, ContextEntry, Direction};
use parley_llm::{peers_excerpt, Plan, Planner};
use parley_transport::{Datagram, LocalExchange, Mailbox};

use crate::config::AgentSettings;
use crate::pending::PendingReplies;
use crate::policy::SenderPolicy;
use crate::role::{IdleStep, RoleCx, RoleLogic};
use crate::vet::{fallback_plan, vet_plan, Vetted};
use crate::Result;

/// Counters observable by tests and the console. Shared across clones
/// of the handle returned by [`Agent::stats`].
#[derive(Debug, Default)]
pub struct PipelineStats {
    pub parse_errors: AtomicU64,
    pub unauthorized: AtomicU64,
    pub discovery_replies: AtomicU64,
    pub role_decisions: AtomicU64,
    pub delegated_plans: AtomicU64,
    pub fallback_plans: AtomicU64,
    pub plans_rejected: AtomicU64,
    pub delivery_failures: AtomicU64,
}

impl PipelineStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// Everything an agent needs besides the shared runtime services.
pub struct AgentConfig {
    pub name: String,
    pub persona: String,
    pub role_tag: String,
    pub settings: AgentSettings,
    pub role: Arc<dyn RoleLogic>,
    pub planner: Option<Planner>,
    pub picker: Option<Arc<dyn PeerPicker>>,
    pub audit: Vec<Arc<dyn AuditSink>>,
    /// Static knowledge snippet included in delegated prompts.
    pub knowledge: Option<String>,
}

pub struct Agent {
    name: String,
    persona: String,
    address: String,
    settings: AgentSettings,
    policy: SenderPolicy,
    exchange: LocalExchange,
    mailbox: Mailbox,
    directory: PeerDirectory,
    history: ContextBuffer,
    audit_sinks: Vec<Arc<dyn AuditSink>>,
    role: Arc<dyn RoleLogic>,
    planner: Option<Planner>,
    picker: Option<Arc<dyn PeerPicker>>,
    knowledge: Option<String>,
    pending: PendingReplies,
    last_sender: Arc<Mutex<HashMap<String, String>>>,
    stats: Arc<PipelineStats>,
}

impl Agent {
    /// Attach to the exchange and register in the directory.
    pub async fn new(
        config: AgentConfig,
        exchange: &LocalExchange,
        directory: PeerDirectory,
        history: ContextBuffer,
    ) -> Agent {
        let mailbox = exchange.attach(&config.name).await;
        let address = mailbox.address().to_string();
        directory
            .register(PeerDescriptor::new(
                config.name.clone(),
                address.clone(),
                config.role_tag.clone(),
                config.persona.clone(),
            ))
            .await;

        let policy = SenderPolicy::from_settings(&config.settings);
        Agent {
            name: config.name,
            persona: config.persona,
            address,
            settings: config.settings,
            policy,
            exchange: exchange.clone(),
            mailbox,
            directory,
            history,
            audit_sinks: config.audit,
            role: config.role,
            planner: config.planner,
            picker: config.picker,
            knowledge: config.knowledge,
            pending: PendingReplies::new(),
            last_sender: Arc::new(Mutex::new(HashMap::new())),
            stats: Arc::new(PipelineStats::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        self.stats.clone()
    }

    /// Shared handle to the pending-reply map (coordinator bookkeeping).
    pub fn pending(&self) -> PendingReplies {
        self.pending.clone()
    }

    pub async fn last_sender_for(&self, conversation_id: &str) -> Option<String> {
        self.last_sender.lock().await.get(conversation_id).cloned()
    }

    fn role_cx(&self) -> RoleCx<'_> {
        RoleCx {
            alias: &self.name,
            settings: &self.settings,
            directory: &self.directory,
            pending: &self.pending,
            picker: self.picker.as_deref(),
        }
    }

    /// The inbound loop: poll with a bounded timeout, process one
    /// message at a time to completion, check the idle hook between
    /// messages so role deadlines fire even on a quiet transport.
    pub async fn run(mut self) -> Agent {
        tracing::info!(agent = %self.name, address = %self.address, "agent up");
        loop {
            if let Some(datagram) = self.mailbox.recv_timeout(self.settings.poll_timeout).await {
                self.handle_datagram(datagram).await;
            }
            let cx = self.role_cx();
            if self.role.on_idle(&cx).await == IdleStep::Stop {
                drop(cx);
                tracing::info!(agent = %self.name, "agent loop stopped");
                break;
            }
        }
        self
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<Agent> {
        tokio::spawn(self.run())
    }

    /// One full receive-to-send cycle.
    pub async fn handle_datagram(&self, datagram: Datagram) {
        let sender = datagram.sender.clone();

        // Receive/parse: malformed envelopes are dropped, no reply.
        let message = match wire::decode(&datagram) {
            Ok(message) => message,
            Err(e) => {
                PipelineStats::bump(&self.stats.parse_errors);
                tracing::warn!(agent = %self.name, error = %e, "dropping unparseable envelope");
                return;
            }
        };

        // Authorize before any context update.
        if !self.policy.permits(&sender) {
            PipelineStats::bump(&self.stats.unauthorized);
            tracing::warn!(agent = %self.name, %sender, "dropping envelope from unauthorized sender");
            return;
        }

        self.note_inbound(&message, &sender).await;

        // Registry discovery is answered by every agent, regardless of role.
        if self.answer_discovery(&message, &sender).await {
            return;
        }

        // Role logic gets the first chance.
        let decision = {
            let cx = self.role_cx();
            self.role.decide(&cx, &message, &sender).await
        };
        if let Some(outbounds) = decision {
            PipelineStats::bump(&self.stats.role_decisions);
            for outbound in outbounds {
                if let Some(after) = outbound.after {
                    tokio::time::sleep(after).await;
                }
                let to = outbound.to.clone().unwrap_or_else(|| sender.clone());
                if let Err(e) = self.send_acl(&to, &outbound.message).await {
                    tracing::warn!(agent = %self.name, %to, error = %e, "outbound send failed");
                }
            }
            return;
        }

        // Delegated path: plan, vet, realize.
        if self.settings.delegate_to_llm {
            if let Some(planner) = &self.planner {
                self.delegate(planner, &message, &sender).await;
                return;
            }
        }

        tracing::debug!(
            agent = %self.name,
            conversation_id = %message.conversation_id,
            "no decision, message consumed"
        );
    }

    async fn note_inbound(&self, message: &AclMessage, sender: &str) {
        let entry = ContextEntry::new(
            Direction::In,
            sender,
            message.performative.as_str(),
            message.conversation_id.clone(),
            &message.payload,
        );
        self.history.push(&self.name, entry).await;
        self.last_sender
            .lock()
            .await
            .insert(message.conversation_id.clone(), sender.to_string());
        self.audit(AuditRecord::for_message(
            AuditDirection::In,
            self.name.clone(),
            sender,
            message,
        ))
        .await;
    }

    async fn answer_discovery(&self, message: &AclMessage, sender: &str) -> bool {
        if message.performative != Performative::Request
            || !message.ontology.starts_with(REGISTRY_ONTOLOGY)
        {
            return false;
        }
        let action = message
            .payload
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_ascii_uppercase();
        if action != "LIST" && action != "DISCOVER" {
            return false;
        }

        let snapshot = self.directory.snapshot().await;
        let agents = serde_json::to_value(&snapshot).unwrap_or_else(|_| json!({}));
        match message
            .reply(Performative::Inform)
            .entry("agents", agents)
            .entry("ts", json!(Utc::now().timestamp()))
            .finish()
        {
            Ok(reply) => {
                if let Err(e) = self.send_acl(sender, &reply).await {
                    tracing::warn!(agent = %self.name, error = %e, "discovery reply failed");
                }
                PipelineStats::bump(&self.stats.discovery_replies);
            }
            Err(e) => {
                tracing::warn!(agent = %self.name, error = %e, "discovery reply construction failed");
            }
        }
        true
    }

    async fn delegate(&self, planner: &Planner, message: &AclMessage, sender: &str) {
        let snapshot = self.directory.snapshot().await;
        let excerpt = peers_excerpt(&snapshot);
        let history_json = self
            .history
            .format_for_prompt(
                &self.name,
                Some(&message.conversation_id),
                Some(self.settings.history_limit),
            )
            .await;

        let plan: Plan = match planner
            .plan_reply(
                &self.name,
                &self.persona,
                &excerpt,
                &history_json,
                self.knowledge.as_deref(),
                message,
            )
            .await
        {
            Ok(plan) => {
                PipelineStats::bump(&self.stats.delegated_plans);
                plan
            }
            Err(e) => {
                PipelineStats::bump(&self.stats.fallback_plans);
                tracing::warn!(agent = %self.name, error = %e, "backend failed, using fallback plan");
                fallback_plan(message)
            }
        };

        let reply = match vet_plan(message, plan) {
            Vetted::Valid {
                performative,
                payload,
                text,
                reply_by,
            } => self.realize(message, performative, payload, text, reply_by),
            Vetted::Invalid { reason } => {
                PipelineStats::bump(&self.stats.plans_rejected);
                tracing::warn!(agent = %self.name, %reason, "plan rejected, downgrading to REFUSE");
                message
                    .reply(Performative::Refuse)
                    .text(reason)
                    .finish()
                    .map_err(Into::into)
            }
        };

        match reply {
            Ok(reply) => {
                if let Err(e) = self.send_acl(sender, &reply).await {
                    tracing::warn!(agent = %self.name, error = %e, "delegated reply send failed");
                }
            }
            Err(e) => {
                tracing::warn!(agent = %self.name, error = %e, "delegated reply construction failed");
            }
        }
    }

    /// Turn a vetted plan into a trusted envelope: conversation id,
    /// protocol, and ontology come from the incoming message; the
    /// reply-by deadline is clamped into the configured window.
    fn realize(
        &self,
        incoming: &AclMessage,
        performative: Performative,
        payload: serde_json::Map<String, Value>,
        text: Option<String>,
        reply_by: Option<DateTime<Utc>>,
    ) -> Result<AclMessage> {
        let mut builder = incoming.reply(performative).payload(payload);
        if let Some(text) = text {
            builder = builder.text(text);
        }
        let at = ensure_reply_by(
            reply_by,
            to_chrono(self.settings.reply_by_min_lead),
            to_chrono(self.settings.reply_by_default_lead),
        );
        Ok(builder.reply_by(at).finish()?)
    }

    /// Resolve, encode, dispatch, then record context-out and audit.
    /// Delivery failures are reported, never retried.
    pub async fn send_acl(&self, to: &str, message: &AclMessage) -> Result<()> {
        let destination = self.directory.resolve(to).await;
        let datagram = wire::encode(message, &destination, &self.address)?;
        let delivery = self.exchange.send(datagram).await;

        let entry = ContextEntry::new(
            Direction::Out,
            destination.clone(),
            message.performative.as_str(),
            message.conversation_id.clone(),
            &message.payload,
        );
        self.history.push(&self.name, entry).await;
        self.audit(AuditRecord::for_message(
            AuditDirection::Out,
            self.name.clone(),
            destination,
            message,
        ))
        .await;

        if let Err(e) = delivery {
            PipelineStats::bump(&self.stats.delivery_failures);
            return Err(e.into());
        }
        Ok(())
    }

    async fn audit(&self, record: AuditRecord) {
        for sink in &self.audit_sinks {
            if let Err(e) = sink.record(&record).await {
                tracing::debug!(agent = %self.name, error = %e, "audit sink failed");
            }
        }
    }
}

fn to_chrono(duration: std::time::Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::seconds(30))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::NullRole;

    async fn null_agent(
        exchange: &LocalExchange,
        directory: &PeerDirectory,
        name: &str,
    ) -> Agent {
        Agent::new(
            AgentConfig {
                name: name.to_string(),
                persona: "plain test agent".to_string(),
                role_tag: "generic".to_string(),
                settings: AgentSettings::default(),
                role: Arc::new(NullRole),
                planner: None,
                picker: None,
                audit: vec![],
                knowledge: None,
            },
            exchange,
            directory.clone(),
            ContextBuffer::default(),
        )
        .await
    }

    #[tokio::test]
    async fn registration_happens_on_construction() {
        let exchange = LocalExchange::new("office");
        let directory = PeerDirectory::new();
        let agent = null_agent(&exchange, &directory, "probe").await;
        assert_eq!(agent.address(), "probe@office");

        let snapshot = directory.snapshot().await;
        assert!(snapshot.contains_key("probe"));
        assert_eq!(snapshot["probe"].address, "probe@office");
    }

    #[tokio::test]
    async fn unparseable_datagrams_are_counted_and_dropped() {
        let exchange = LocalExchange::new("office");
        let directory = PeerDirectory::new();
        let agent = null_agent(&exchange, &directory, "probe").await;
        let stats = agent.stats();

        let datagram = Datagram {
            to: "probe@office".to_string(),
            sender: "tester@office".to_string(),
            body: "not json at all".to_string(),
            metadata: Default::default(),
        };
        agent.handle_datagram(datagram).await;

        assert_eq!(PipelineStats::get(&stats.parse_errors), 1);
    }

    #[tokio::test]
    async fn discovery_requests_are_answered_by_any_role() {
        let exchange = LocalExchange::new("office");
        let directory = PeerDirectory::new();
        let agent = null_agent(&exchange, &directory, "probe").await;
        let mut asker = exchange.attach("asker").await;

        let request = AclMessage::build(Performative::Request)
            .conversation("disc-1")
            .ontology(REGISTRY_ONTOLOGY)
            .entry("action", json!("LIST"))
            .finish()
            .unwrap();
        let datagram = wire::encode(&request, "probe@office", "asker@office").unwrap();
        agent.handle_datagram(datagram).await;

        let reply = asker
            .recv_timeout(std::time::Duration::from_millis(200))
            .await
            .expect("discovery reply");
        let message = wire::decode(&reply).unwrap();
        assert_eq!(message.performative, Performative::Inform);
        assert!(message.payload["agents"]
            .as_object()
            .unwrap()
            .contains_key("probe"));
    }
}
