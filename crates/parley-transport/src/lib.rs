//! Parley Transport - in-process datagram exchange
//!
//! Moves opaque datagrams between named endpoints with at-most-once
//! semantics: a send either lands in the destination mailbox or fails
//! loudly, and nothing is retried. No ordering is guaranteed across
//! independent conversations. Receives are bounded polls, never
//! infinite blocking reads, so agents can check deadlines between
//! messages.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

pub use parley_acl::Datagram;

const MAILBOX_DEPTH: usize = 64;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("unknown endpoint '{0}'")]
    UnknownEndpoint(String),

    #[error("delivery to '{to}' failed: {reason}")]
    Delivery { to: String, reason: String },
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// The receiving half of one endpoint.
pub struct Mailbox {
    address: String,
    receiver: mpsc::Receiver<Datagram>,
}

impl Mailbox {
    /// This endpoint's fully qualified address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Wait up to `timeout` for the next datagram.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<Datagram> {
        tokio::time::timeout(timeout, self.receiver.recv())
            .await
            .ok()
            .flatten()
    }
}

/// The in-process hub. Cloneable; all clones share the routing table.
#[derive(Clone)]
pub struct LocalExchange {
    domain: String,
    endpoints: Arc<Mutex<HashMap<String, mpsc::Sender<Datagram>>>>,
}

impl LocalExchange {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            endpoints: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The full address an alias gets on this exchange.
    pub fn address(&self, alias: &str) -> String {
        format!("{}@{}", alias, self.domain)
    }

    /// Register `alias` and hand back its mailbox. Re-attaching replaces
    /// the previous mailbox; datagrams queued there are dropped.
    pub async fn attach(&self, alias: &str) -> Mailbox {
        let address = self.address(alias);
        let (sender, receiver) = mpsc::channel(MAILBOX_DEPTH);
        self.endpoints.lock().await.insert(address.clone(), sender);
        Mailbox { address, receiver }
    }

    /// Best-effort, at-most-once send.
    pub async fn send(&self, datagram: Datagram) -> Result<()> {
        let sender = {
            let endpoints = self.endpoints.lock().await;
            endpoints.get(&datagram.to).cloned()
        };
        let Some(sender) = sender else {
            return Err(TransportError::UnknownEndpoint(datagram.to));
        };
        let to = datagram.to.clone();
        sender
            .try_send(datagram)
            .map_err(|e| TransportError::Delivery {
                to,
                reason: match e {
                    mpsc::error::TrySendError::Full(_) => "mailbox full".to_string(),
                    mpsc::error::TrySendError::Closed(_) => "mailbox closed".to_string(),
                },
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn datagram(to: &str) -> Datagram {
        Datagram {
            to: to.to_string(),
            sender: "tester@office".to_string(),
            body: "{}".to_string(),
            metadata: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn attached_endpoints_receive_datagrams() {
        let exchange = LocalExchange::new("office");
        let mut mailbox = exchange.attach("provider").await;
        assert_eq!(mailbox.address(), "provider@office");

        exchange.send(datagram("provider@office")).await.unwrap();
        let received = mailbox.recv_timeout(Duration::from_millis(100)).await;
        assert!(received.is_some());
    }

    #[tokio::test]
    async fn unknown_endpoint_is_a_loud_failure() {
        let exchange = LocalExchange::new("office");
        let err = exchange.send(datagram("ghost@office")).await.unwrap_err();
        assert!(matches!(err, TransportError::UnknownEndpoint(_)));
    }

    #[tokio::test]
    async fn recv_timeout_returns_none_when_idle() {
        let exchange = LocalExchange::new("office");
        let mut mailbox = exchange.attach("idle").await;
        let received = mailbox.recv_timeout(Duration::from_millis(20)).await;
        assert!(received.is_none());
    }

    #[tokio::test]
    async fn full_mailbox_rejects_instead_of_blocking() {
        let exchange = LocalExchange::new("office");
        let _mailbox = exchange.attach("slow").await;
        for _ in 0..MAILBOX_DEPTH {
            exchange.send(datagram("slow@office")).await.unwrap();
        }
        let err = exchange.send(datagram("slow@office")).await.unwrap_err();
        assert!(matches!(err, TransportError::Delivery { .. }));
    }

    #[tokio::test]
    async fn closed_mailbox_reports_delivery_failure() {
        let exchange = LocalExchange::new("office");
        let mailbox = exchange.attach("gone").await;
        drop(mailbox);
        let err = exchange.send(datagram("gone@office")).await.unwrap_err();
        assert!(matches!(err, TransportError::Delivery { .. }));
    }
}
