//! The peer directory service object

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// One registry entry: how to reach a peer and what it claims to do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerDescriptor {
    /// Local short name, e.g. `provider`.
    pub alias: String,
    /// Fully qualified transport address, e.g. `provider@office`.
    pub address: String,
    /// Free-form role tag: `coordinator`, `provider`, `generic`, ...
    pub role: String,
    /// Free-text capability description used for routing.
    pub persona: String,
    pub registered_at: DateTime<Utc>,
}

impl PeerDescriptor {
    pub fn new(
        alias: impl Into<String>,
        address: impl Into<String>,
        role: impl Into<String>,
        persona: impl Into<String>,
    ) -> Self {
        Self {
            alias: alias.into(),
            address: address.into(),
            role: role.into(),
            persona: persona.into(),
            registered_at: Utc::now(),
        }
    }
}

/// The process-wide peer directory.
///
/// Cloneable handle; all clones share one map. Writes take a single
/// lock, reads hand out defensive copies.
#[derive(Clone, Default)]
pub struct PeerDirectory {
    peers: Arc<RwLock<HashMap<String, PeerDescriptor>>>,
    snapshot_path: Option<PathBuf>,
}

impl PeerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Honors `PARLEY_REGISTRY_PATH` for the best-effort snapshot dump.
    pub fn from_env() -> Self {
        let snapshot_path = std::env::var("PARLEY_REGISTRY_PATH").ok().map(PathBuf::from);
        Self {
            peers: Arc::new(RwLock::new(HashMap::new())),
            snapshot_path,
        }
    }

    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Register or overwrite a peer (last write wins).
    pub async fn register(&self, descriptor: PeerDescriptor) {
        let alias = descriptor.alias.clone();
        let mut peers = self.peers.write().await;
        peers.insert(alias, descriptor);
        self.dump(&peers);
    }

    /// Point-in-time copy of the whole directory.
    pub async fn snapshot(&self) -> HashMap<String, PeerDescriptor> {
        self.peers.read().await.clone()
    }

    pub async fn get(&self, alias: &str) -> Option<PeerDescriptor> {
        self.peers.read().await.get(alias).cloned()
    }

    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.read().await.is_empty()
    }

    /// Resolve an alias to a transport address.
    ///
    /// Anything that already looks like a full address (contains `@`)
    /// passes through unchanged. Unknown aliases fall back to a
    /// `PARLEY_PEER_<ALIAS>` env hint, then to the input itself, and
    /// the transport reports the delivery failure.
    pub async fn resolve(&self, alias_or_address: &str) -> String {
        if alias_or_address.contains('@') {
            return alias_or_address.to_string();
        }
        if let Some(descriptor) = self.get(alias_or_address).await {
            return descriptor.address;
        }
        let hint = format!("PARLEY_PEER_{}", alias_or_address.to_uppercase());
        match std::env::var(&hint) {
            Ok(address) if !address.trim().is_empty() => address,
            _ => alias_or_address.to_string(),
        }
    }

    fn dump(&self, peers: &HashMap<String, PeerDescriptor>) {
        let Some(path) = &self.snapshot_path else {
            return;
        };
        let result = serde_json::to_string_pretty(peers).map(|json| {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            std::fs::write(path, json)
        });
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(path = %path.display(), error = %e, "registry dump failed"),
            Err(e) => tracing::debug!(error = %e, "registry serialization failed"),
        }
    }
}
