//! Human/console bridge
//!
//! Direct commands on top of the same registry resolution and envelope
//! construction paths the engine uses. Supports both wire shapes: the
//! JSON envelope and the legacy metadata-plus-text datagram.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;

use parley_acl::{new_conversation_id, wire, AclMessage, Performative};
use parley_directory::{router, PeerDirectory};
use parley_transport::{LocalExchange, Mailbox};

pub const HELP_TEXT: &str = "\
[human] commands:
  help                              - show this help
  registry                          - list registered agents (alias, role, persona, address)
  who                               - show last sender per conversation id
  say <text...>                     - REQUEST to the best-matching peer (chosen by persona)
  json <to> <PERF> <text...>        - send a JSON FIPA-ACL envelope (to = alias or address)
  classic <to> <PERF> <text...>     - send the legacy wire shape (metadata + plain text)
  reply <CID> <PERF> <text...>      - answer the last sender in a thread, reusing its wire shape
  quit                              - leave the console loop";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireMode {
    Json,
    Classic,
}

/// One parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Registry,
    Who,
    Say {
        text: String,
    },
    Send {
        mode: WireMode,
        to: String,
        performative: String,
        text: String,
    },
    Reply {
        conversation_id: String,
        performative: String,
        text: String,
    },
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Command, String> {
        let line = line.trim();
        let mut parts = line.split_whitespace();
        let Some(head) = parts.next() else {
            return Err("empty line".to_string());
        };
        let rest: Vec<&str> = parts.collect();

        match head.to_lowercase().as_str() {
            "help" | "?" => Ok(Command::Help),
            "registry" => Ok(Command::Registry),
            "who" => Ok(Command::Who),
            "quit" => Ok(Command::Quit),
            "say" => {
                if rest.is_empty() {
                    return Err("usage: say <text...>".to_string());
                }
                Ok(Command::Say {
                    text: rest.join(" "),
                })
            }
            mode @ ("json" | "classic") => {
                if rest.len() < 3 {
                    return Err(format!("usage: {mode} <to> <PERF> <text...>"));
                }
                Ok(Command::Send {
                    mode: if mode == "json" {
                        WireMode::Json
                    } else {
                        WireMode::Classic
                    },
                    to: rest[0].to_string(),
                    performative: rest[1].to_string(),
                    text: rest[2..].join(" "),
                })
            }
            "reply" => {
                if rest.len() < 3 {
                    return Err("usage: reply <CID> <PERF> <text...>".to_string());
                }
                Ok(Command::Reply {
                    conversation_id: rest[0].to_string(),
                    performative: rest[1].to_string(),
                    text: rest[2..].join(" "),
                })
            }
            other => Err(format!("unknown command: {other}. Type 'help'.")),
        }
    }
}

pub struct Console {
    exchange: LocalExchange,
    directory: PeerDirectory,
    alias: String,
    address: String,
    last_sender: Arc<Mutex<HashMap<String, String>>>,
    last_mode: Arc<Mutex<HashMap<String, WireMode>>>,
}

impl Console {
    pub fn new(exchange: LocalExchange, directory: PeerDirectory, alias: &str) -> Self {
        let address = exchange.address(alias);
        Self {
            exchange,
            directory,
            alias: alias.to_string(),
            address,
            last_sender: Arc::new(Mutex::new(HashMap::new())),
            last_mode: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Print inbound traffic and keep the per-conversation bookkeeping
    /// the `who` and `reply` commands rely on.
    pub fn watch_inbox(&self, mut mailbox: Mailbox) -> tokio::task::JoinHandle<()> {
        let last_sender = self.last_sender.clone();
        let last_mode = self.last_mode.clone();
        tokio::spawn(async move {
            loop {
                let Some(datagram) =
                    mailbox.recv_timeout(std::time::Duration::from_secs(1)).await
                else {
                    continue;
                };
                match wire::decode(&datagram) {
                    Ok(message) => {
                        let mode = if message.language == "text" {
                            WireMode::Classic
                        } else {
                            WireMode::Json
                        };
                        let cid = message.conversation_id.clone();
                        last_sender
                            .lock()
                            .await
                            .insert(cid.clone(), datagram.sender.clone());
                        last_mode.lock().await.insert(cid.clone(), mode);
                        let pretty = serde_json::to_string_pretty(&message)
                            .unwrap_or_else(|_| "<unprintable>".to_string());
                        println!(
                            "\n[human] << {:?} from={} cid={} perf={}\n{}\n",
                            mode, datagram.sender, cid, message.performative, pretty
                        );
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "undecodable datagram at the console");
                    }
                }
            }
        })
    }

    pub async fn execute(&self, command: Command) -> bool {
        match command {
            Command::Help => println!("{HELP_TEXT}"),
            Command::Registry => {
                let snapshot = self.directory.snapshot().await;
                if snapshot.is_empty() {
                    println!("[human] (registry empty)");
                } else {
                    println!("[human] registered agents:");
                    let mut rows: Vec<_> = snapshot.values().collect();
                    rows.sort_by(|a, b| a.alias.cmp(&b.alias));
                    for peer in rows {
                        println!(
                            "  - {:12} | {:12} | {}\n    address: {}",
                            peer.alias, peer.role, peer.persona, peer.address
                        );
                    }
                }
            }
            Command::Who => {
                let map = self.last_sender.lock().await;
                if map.is_empty() {
                    println!("[human] no known conversations");
                } else {
                    println!("[human] last senders per conversation:");
                    for (cid, sender) in map.iter() {
                        println!("  {cid}: {sender}");
                    }
                }
            }
            Command::Say { text } => {
                let snapshot = self.directory.snapshot().await;
                let target = router::choose(&text, &snapshot, &self.alias, false, None, None)
                    .await
                    .unwrap_or_else(|| "coordinator".to_string());
                if let Err(e) = self.send_json(&target, "REQUEST", &text, None).await {
                    println!("[human] send failed: {e}");
                }
            }
            Command::Send {
                mode,
                to,
                performative,
                text,
            } => {
                let result = match mode {
                    WireMode::Json => self.send_json(&to, &performative, &text, None).await,
                    WireMode::Classic => self.send_classic(&to, &performative, &text, None).await,
                };
                if let Err(e) = result {
                    println!("[human] send failed: {e}");
                }
            }
            Command::Reply {
                conversation_id,
                performative,
                text,
            } => {
                let Some(to) = self.last_sender.lock().await.get(&conversation_id).cloned()
                else {
                    println!("[human] no known sender for CID={conversation_id}");
                    return true;
                };
                let mode = self
                    .last_mode
                    .lock()
                    .await
                    .get(&conversation_id)
                    .copied()
                    .unwrap_or(WireMode::Json);
                let result = match mode {
                    WireMode::Json => {
                        self.send_json(&to, &performative, &text, Some(&conversation_id))
                            .await
                    }
                    WireMode::Classic => {
                        self.send_classic(&to, &performative, &text, Some(&conversation_id))
                            .await
                    }
                };
                if let Err(e) = result {
                    println!("[human] send failed: {e}");
                }
            }
            Command::Quit => {
                println!("[human] console loop closed (agents keep running).");
                return false;
            }
        }
        true
    }

    async fn send_json(
        &self,
        to: &str,
        performative: &str,
        text: &str,
        cid: Option<&str>,
    ) -> anyhow::Result<()> {
        let performative: Performative = performative.parse()?;
        let cid = cid
            .map(str::to_string)
            .unwrap_or_else(|| new_conversation_id("human"));
        let message = AclMessage::build(performative)
            .conversation(&cid)
            .text(text)
            .entry("from", serde_json::json!("human"))
            .reply_by_in(20)
            .finish()?;
        let destination = self.directory.resolve(to).await;
        let datagram = wire::encode(&message, &destination, &self.address)?;
        self.exchange.send(datagram).await?;
        self.last_mode.lock().await.insert(cid.clone(), WireMode::Json);
        println!("[human] >> JSON to={destination} cid={cid} perf={performative}  text={text}");
        Ok(())
    }

    async fn send_classic(
        &self,
        to: &str,
        performative: &str,
        text: &str,
        cid: Option<&str>,
    ) -> anyhow::Result<()> {
        let performative: Performative = performative.parse()?;
        let cid = cid
            .map(str::to_string)
            .unwrap_or_else(|| new_conversation_id("human"));
        let destination = self.directory.resolve(to).await;

        let mut metadata = BTreeMap::new();
        metadata.insert("performative".to_string(), performative.to_string());
        metadata.insert("protocol".to_string(), parley_acl::DEFAULT_PROTOCOL.to_string());
        metadata.insert("conversation_id".to_string(), cid.clone());
        metadata.insert("ontology".to_string(), parley_acl::DEFAULT_ONTOLOGY.to_string());
        metadata.insert("language".to_string(), "text".to_string());
        let datagram = parley_acl::Datagram {
            to: destination.clone(),
            sender: self.address.clone(),
            body: text.to_string(),
            metadata,
        };
        self.exchange.send(datagram).await?;
        self.last_mode
            .lock()
            .await
            .insert(cid.clone(), WireMode::Classic);
        println!("[human] >> CLASSIC to={destination} cid={cid} perf={performative}  text={text}");
        Ok(())
    }

    /// Read commands from stdin until `quit` or EOF.
    pub async fn run(&self) {
        println!("{HELP_TEXT}");
        let stdin = BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "stdin read failed");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match Command::parse(&line) {
                Ok(command) => {
                    if !self.execute(command).await {
                        break;
                    }
                }
                Err(message) => println!("[human] {message}"),
            }
        }
    }
}
