//! Parley Office - a small negotiation office in one process
//!
//! Demo mode runs the scripted bakery scenario: a requester opens an
//! order, the coordinator AGREEs and routes it to the provider, and the
//! terminal reply is relayed back while the reporter collects the audit
//! trail. Console mode attaches an interactive human bridge instead.
//!
//! ```bash
//! # Scripted demo with defaults
//! parley-office
//!
//! # Interactive console
//! parley-office --mode console
//!
//! # With a reasoning backend
//! PARLEY_LLM_PROVIDER=ollama parley-office --llm
//! ```

mod console;

use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use parley_agent::{
    persona_from_env, Agent, AgentConfig, AgentSettings, CoordinatorRole, NullRole, ProviderRole,
    RequesterRole,
};
use parley_audit::{AuditSink, JsonlAuditSink, TracingAuditSink};
use parley_directory::PeerDirectory;
use parley_history::ContextBuffer;
use parley_llm::Planner;
use parley_transport::LocalExchange;

use console::Console;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Scripted bakery scenario
    Demo,
    /// Interactive human bridge
    Console,
}

/// Parley Office - agent negotiation demo
#[derive(Parser, Debug)]
#[command(name = "parley-office", about = "Run a small Parley agent office", version)]
struct Args {
    #[arg(long, value_enum, default_value = "demo")]
    mode: Mode,

    /// Opening order text for the demo requester
    #[arg(long, default_value = "poproszę 6 bułek", env = "PARLEY_ORDER_TEXT")]
    order_text: String,

    /// Delegate undecided messages to the reasoning backend
    #[arg(long, default_value = "false")]
    llm: bool,

    /// Directory for the JSONL audit trail
    #[arg(long, default_value = "out", env = "PARLEY_AUDIT_DIR")]
    audit_dir: String,
}

struct Office {
    exchange: LocalExchange,
    directory: PeerDirectory,
    audit: Vec<Arc<dyn AuditSink>>,
    llm: bool,
}

impl Office {
    fn new(audit_dir: &str, llm: bool) -> Self {
        let audit: Vec<Arc<dyn AuditSink>> = vec![
            Arc::new(JsonlAuditSink::new(audit_dir)),
            Arc::new(TracingAuditSink),
        ];
        Self {
            exchange: LocalExchange::new("office"),
            directory: PeerDirectory::from_env(),
            audit,
            llm,
        }
    }

    async fn agent(
        &self,
        alias: &str,
        role_tag: &str,
        role: Arc<dyn parley_agent::RoleLogic>,
        settings: AgentSettings,
    ) -> Agent {
        let planner = self.llm.then(Planner::from_env);
        Agent::new(
            AgentConfig {
                name: alias.to_string(),
                persona: persona_from_env(alias),
                role_tag: role_tag.to_string(),
                settings: AgentSettings {
                    delegate_to_llm: self.llm,
                    ..settings
                },
                role,
                planner,
                picker: None,
                audit: self.audit.clone(),
                knowledge: std::env::var("PARLEY_KNOWLEDGE").ok(),
            },
            &self.exchange,
            self.directory.clone(),
            ContextBuffer::from_env(),
        )
        .await
    }
}

async fn run_demo(office: &Office, order_text: &str) -> anyhow::Result<()> {
    let provider = office
        .agent(
            "provider",
            "provider",
            Arc::new(ProviderRole::new()),
            AgentSettings::from_env(),
        )
        .await;
    let coordinator = office
        .agent(
            "coordinator",
            "coordinator",
            Arc::new(CoordinatorRole::new()),
            AgentSettings::from_env(),
        )
        .await;
    let reporter = office
        .agent(
            "reporter",
            "generic",
            Arc::new(NullRole),
            AgentSettings::from_env(),
        )
        .await;

    let provider_handle = provider.spawn();
    let coordinator_handle = coordinator.spawn();
    let reporter_handle = reporter.spawn();

    let requester_role = Arc::new(RequesterRole::new(Some("reporter".to_string())));
    let requester = office
        .agent(
            "requester",
            "requester",
            requester_role.clone(),
            AgentSettings::from_env(),
        )
        .await;

    let conversation_id = requester_role
        .open(&requester, "coordinator", order_text)
        .await?;
    tracing::info!(%conversation_id, %order_text, "demo order opened");

    // The requester loop ends on a terminal reply or its hard deadline.
    let _requester = requester.run().await;
    match requester_role.outcome().await {
        Some(outcome) => println!("[office] order {conversation_id} finished: {outcome:?}"),
        None => println!("[office] order {conversation_id} ended without an outcome"),
    }

    provider_handle.abort();
    coordinator_handle.abort();
    reporter_handle.abort();
    Ok(())
}

async fn run_console(office: &Office) -> anyhow::Result<()> {
    let provider = office
        .agent(
            "provider",
            "provider",
            Arc::new(ProviderRole::new()),
            AgentSettings::from_env(),
        )
        .await;
    let coordinator = office
        .agent(
            "coordinator",
            "coordinator",
            Arc::new(CoordinatorRole::new()),
            AgentSettings::from_env(),
        )
        .await;
    let reporter = office
        .agent(
            "reporter",
            "generic",
            Arc::new(NullRole),
            AgentSettings::from_env(),
        )
        .await;

    let provider_handle = provider.spawn();
    let coordinator_handle = coordinator.spawn();
    let reporter_handle = reporter.spawn();

    let mailbox = office.exchange.attach("human").await;
    office
        .directory
        .register(parley_directory::PeerDescriptor::new(
            "human",
            office.exchange.address("human"),
            "human",
            persona_from_env("human"),
        ))
        .await;

    let console = Console::new(office.exchange.clone(), office.directory.clone(), "human");
    let inbox = console.watch_inbox(mailbox);
    console.run().await;
    inbox.abort();

    provider_handle.abort();
    coordinator_handle.abort();
    reporter_handle.abort();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new("info")
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let office = Office::new(&args.audit_dir, args.llm);

    match args.mode {
        Mode::Demo => run_demo(&office, &args.order_text).await,
        Mode::Console => run_console(&office).await,
    }
}
