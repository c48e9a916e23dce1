use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use parley_acl::{wire, AclMessage, Performative, REGISTRY_ONTOLOGY};
use parley_agent::{
    Agent, AgentConfig, AgentSettings, CoordinatorRole, NullRole, PipelineStats, ProviderRole,
    RequestOutcome, RequesterRole, RoleLogic,
};
use parley_directory::PeerDirectory;
use parley_history::ContextBuffer;
use parley_llm::{LlmRouter, Planner, ProviderKind};
use parley_transport::LocalExchange;

struct Office {
    exchange: LocalExchange,
    directory: PeerDirectory,
}

impl Office {
    fn new() -> Self {
        Self {
            exchange: LocalExchange::new("office"),
            directory: PeerDirectory::new(),
        }
    }

    async fn agent(
        &self,
        name: &str,
        persona: &str,
        role_tag: &str,
        settings: AgentSettings,
        role: Arc<dyn RoleLogic>,
        planner: Option<Planner>,
    ) -> Agent {
        Agent::new(
            AgentConfig {
                name: name.to_string(),
                persona: persona.to_string(),
                role_tag: role_tag.to_string(),
                settings,
                role,
                planner,
                picker: None,
                audit: vec![],
                knowledge: None,
            },
            &self.exchange,
            self.directory.clone(),
            ContextBuffer::default(),
        )
        .await
    }
}

fn bakery_settings() -> AgentSettings {
    AgentSettings {
        item_keyword: "bułek".to_string(),
        processing_delay: Duration::from_millis(10),
        poll_timeout: Duration::from_millis(20),
        ..AgentSettings::default()
    }
}

fn request(cid: &str, text: &str) -> AclMessage {
    AclMessage::build(Performative::Request)
        .conversation(cid)
        .text(text)
        .finish()
        .unwrap()
}

async fn expect_reply(
    mailbox: &mut parley_transport::Mailbox,
    what: &str,
) -> AclMessage {
    let datagram = mailbox
        .recv_timeout(Duration::from_secs(2))
        .await
        .unwrap_or_else(|| panic!("expected {what}"));
    wire::decode(&datagram).unwrap()
}

// Scenario A: a matching order gets AGREE, then INFORM with the
// extracted quantity.
#[tokio::test]
async fn provider_agrees_then_informs_with_the_extracted_quantity() {
    let office = Office::new();
    let provider = office
        .agent(
            "provider",
            "bakery orders, production, delivery",
            "provider",
            bakery_settings(),
            Arc::new(ProviderRole::new()),
            None,
        )
        .await;
    let handle = provider.spawn();

    let mut human = office.exchange.attach("human").await;
    let order = request("conv-a", "poproszę 6 bułek");
    office
        .exchange
        .send(wire::encode(&order, "provider@office", "human@office").unwrap())
        .await
        .unwrap();

    let agree = expect_reply(&mut human, "AGREE").await;
    assert_eq!(agree.performative, Performative::Agree);
    assert_eq!(agree.conversation_id, "conv-a");

    let inform = expect_reply(&mut human, "INFORM").await;
    assert_eq!(inform.performative, Performative::Inform);
    assert_eq!(inform.conversation_id, "conv-a");
    assert_eq!(inform.payload["quantity"], json!(6));
    assert!(inform.text().unwrap().contains('6'));

    handle.abort();
}

// Scenario B: an order without the configured keyword gets REFUSE and
// nothing else.
#[tokio::test]
async fn provider_refuses_when_the_keyword_is_missing() {
    let office = Office::new();
    let provider = office
        .agent(
            "provider",
            "bakery orders",
            "provider",
            bakery_settings(),
            Arc::new(ProviderRole::new()),
            None,
        )
        .await;
    let handle = provider.spawn();

    let mut human = office.exchange.attach("human").await;
    let order = request("conv-b", "two kilograms of coffee please");
    office
        .exchange
        .send(wire::encode(&order, "provider@office", "human@office").unwrap())
        .await
        .unwrap();

    let refuse = expect_reply(&mut human, "REFUSE").await;
    assert_eq!(refuse.performative, Performative::Refuse);
    assert!(refuse.text().unwrap().contains("bułek"));

    let followup = human.recv_timeout(Duration::from_millis(300)).await;
    assert!(followup.is_none(), "no INFORM may follow a REFUSE");

    handle.abort();
}

// Scenario C: the coordinator AGREEs to the initiator, relays the
// provider's terminal INFORM back, and clears its pending entry.
#[tokio::test]
async fn coordinator_relays_the_terminal_reply_and_clears_pending() {
    let office = Office::new();
    let provider = office
        .agent(
            "provider",
            "bakery orders, production, delivery, logistics",
            "provider",
            bakery_settings(),
            Arc::new(ProviderRole::new()),
            None,
        )
        .await;
    let coordinator = office
        .agent(
            "coordinator",
            "coordination, supervision, task assignment",
            "coordinator",
            bakery_settings(),
            Arc::new(CoordinatorRole::new()),
            None,
        )
        .await;
    let pending = coordinator.pending();

    let provider_handle = provider.spawn();
    let coordinator_handle = coordinator.spawn();

    let mut human = office.exchange.attach("human").await;
    let order = request("conv-c", "poproszę 6 bułek");
    office
        .exchange
        .send(wire::encode(&order, "coordinator@office", "human@office").unwrap())
        .await
        .unwrap();

    let agree = expect_reply(&mut human, "coordinator AGREE").await;
    assert_eq!(agree.performative, Performative::Agree);
    assert_eq!(agree.conversation_id, "conv-c");

    let inform = expect_reply(&mut human, "relayed INFORM").await;
    assert_eq!(inform.performative, Performative::Inform);
    assert_eq!(inform.conversation_id, "conv-c");
    assert_eq!(inform.payload["quantity"], json!(6));

    // The provider's own AGREE was dropped as noise, so the relayed
    // INFORM is the last thing the initiator hears.
    let extra = human.recv_timeout(Duration::from_millis(300)).await;
    assert!(extra.is_none());

    assert!(!pending.contains("conv-c").await);

    provider_handle.abort();
    coordinator_handle.abort();
}

// Scenario D: a requester with no terminal reply stops at its hard
// deadline and sends nothing further.
#[tokio::test]
async fn requester_times_out_at_the_hard_deadline() {
    let office = Office::new();
    let settings = AgentSettings {
        reply_deadline: Duration::from_millis(200),
        poll_timeout: Duration::from_millis(20),
        ..AgentSettings::default()
    };
    let requester_role = Arc::new(RequesterRole::new(None));
    let requester = office
        .agent(
            "requester",
            "orders things and waits",
            "requester",
            settings,
            requester_role.clone(),
            None,
        )
        .await;

    let mut silent = office.exchange.attach("silent").await;
    requester_role
        .open(&requester, "silent@office", "poproszę 6 bułek")
        .await
        .unwrap();

    let agent = requester.run().await;
    assert_eq!(requester_role.outcome().await, Some(RequestOutcome::TimedOut));

    // Exactly one send happened for this conversation: the opening
    // REQUEST.
    let opening = silent.recv_timeout(Duration::from_millis(100)).await;
    assert!(opening.is_some());
    let more = silent.recv_timeout(Duration::from_millis(300)).await;
    assert!(more.is_none(), "no sends may follow a timeout");
    drop(agent);
}

// Scenario E: registry discovery LIST returns the full directory.
#[tokio::test]
async fn discovery_list_enumerates_all_registered_aliases() {
    let office = Office::new();
    let provider = office
        .agent(
            "provider",
            "bakery orders",
            "provider",
            bakery_settings(),
            Arc::new(ProviderRole::new()),
            None,
        )
        .await;
    let reporter = office
        .agent(
            "reporter",
            "audit trail, reporting",
            "generic",
            bakery_settings(),
            Arc::new(NullRole),
            None,
        )
        .await;
    let provider_handle = provider.spawn();
    let reporter_handle = reporter.spawn();

    let mut human = office.exchange.attach("human").await;
    let discover = AclMessage::build(Performative::Request)
        .conversation("disc-1")
        .ontology(REGISTRY_ONTOLOGY)
        .entry("action", json!("LIST"))
        .finish()
        .unwrap();
    office
        .exchange
        .send(wire::encode(&discover, "reporter@office", "human@office").unwrap())
        .await
        .unwrap();

    let inform = expect_reply(&mut human, "discovery INFORM").await;
    assert_eq!(inform.performative, Performative::Inform);
    let agents = inform.payload["agents"].as_object().unwrap();
    assert!(agents.contains_key("provider"));
    assert!(agents.contains_key("reporter"));
    assert!(inform.payload.get("ts").is_some());

    provider_handle.abort();
    reporter_handle.abort();
}

// Delegated path: the deterministic backend proposes AGREE for a
// REQUEST, which survives vetting and is realized with a reply-by.
#[tokio::test]
async fn delegated_plan_is_vetted_and_realized() {
    let office = Office::new();
    let settings = AgentSettings {
        delegate_to_llm: true,
        poll_timeout: Duration::from_millis(20),
        ..AgentSettings::default()
    };
    let agent = office
        .agent(
            "assistant",
            "general helper",
            "generic",
            settings,
            Arc::new(NullRole),
            Some(Planner::new(LlmRouter::from_kind(ProviderKind::Deterministic))),
        )
        .await;
    let handle = agent.spawn();

    let mut human = office.exchange.attach("human").await;
    let order = request("conv-llm", "please do something");
    office
        .exchange
        .send(wire::encode(&order, "assistant@office", "human@office").unwrap())
        .await
        .unwrap();

    let reply = expect_reply(&mut human, "delegated AGREE").await;
    assert_eq!(reply.performative, Performative::Agree);
    assert_eq!(reply.conversation_id, "conv-llm");
    assert!(reply.reply_by.is_some(), "realize must stamp a reply-by");

    handle.abort();
}

// A plan that violates the transition table is downgraded to REFUSE
// instead of being sent.
#[tokio::test]
async fn invalid_plan_is_downgraded_to_refuse() {
    let office = Office::new();
    let settings = AgentSettings {
        delegate_to_llm: true,
        poll_timeout: Duration::from_millis(20),
        ..AgentSettings::default()
    };
    let agent = office
        .agent(
            "assistant",
            "general helper",
            "generic",
            settings,
            Arc::new(NullRole),
            Some(Planner::new(LlmRouter::from_kind(ProviderKind::Deterministic))),
        )
        .await;
    let stats = agent.stats();
    let handle = agent.spawn();

    // The deterministic backend always proposes AGREE; AGREE -> AGREE
    // violates the table, so the pipeline must refuse.
    let mut human = office.exchange.attach("human").await;
    let incoming = AclMessage::build(Performative::Agree)
        .conversation("conv-bad")
        .text("carry on")
        .finish()
        .unwrap();
    office
        .exchange
        .send(wire::encode(&incoming, "assistant@office", "human@office").unwrap())
        .await
        .unwrap();

    let reply = expect_reply(&mut human, "downgraded REFUSE").await;
    assert_eq!(reply.performative, Performative::Refuse);
    assert!(reply.text().unwrap().contains("AGREE"));
    assert_eq!(PipelineStats::get(&stats.plans_rejected), 1);

    handle.abort();
}

// Unauthorized senders are dropped before any reply or context update.
#[tokio::test]
async fn unauthorized_senders_get_no_reply() {
    let office = Office::new();
    let settings = AgentSettings {
        authorized_senders: Some(vec!["coordinator".to_string()]),
        ..bakery_settings()
    };
    let provider = office
        .agent(
            "provider",
            "bakery orders",
            "provider",
            settings,
            Arc::new(ProviderRole::new()),
            None,
        )
        .await;
    let stats = provider.stats();
    let handle = provider.spawn();

    let mut stranger = office.exchange.attach("stranger").await;
    let order = request("conv-x", "poproszę 6 bułek");
    office
        .exchange
        .send(wire::encode(&order, "provider@office", "stranger@office").unwrap())
        .await
        .unwrap();

    let reply = stranger.recv_timeout(Duration::from_millis(300)).await;
    assert!(reply.is_none());
    assert_eq!(PipelineStats::get(&stats.unauthorized), 1);

    handle.abort();
}
