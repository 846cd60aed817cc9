//! Token lineage tracking and serialized status probing.
//!
//! Every login roots a tree; every refresh hangs a child under the node
//! whose refresh token was used. Nodes are never removed, including after
//! revocation, so probes can demonstrate that a revoked token is now
//! rejected.

use tracing::debug;

use crate::flow::{FlowConfig, TokenSet};

/// One obtained token set plus its lineage pointer.
#[derive(Debug, Clone)]
pub struct LedgerNode {
    /// Monotonically increasing, unique within the ledger.
    pub id: u64,
    /// `None` for login roots; the refreshed-from node otherwise.
    pub parent: Option<u64>,
    pub tokens: TokenSet,
}

/// Forest of token sets obtained via initial login and refreshes.
#[derive(Debug, Default)]
pub struct TokenLedger {
    nodes: Vec<LedgerNode>,
    next_id: u64,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a token set under `parent` (or as a new root) and return its
    /// assigned id.
    pub fn insert(&mut self, parent: Option<u64>, tokens: TokenSet) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.push(LedgerNode { id, parent, tokens });
        debug!(id, parent = ?parent, "Ledger node inserted");
        id
    }

    /// Nodes in insertion (id) order.
    pub fn nodes(&self) -> &[LedgerNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Outcome of one node's status probe. Each boolean is independently
/// "the response status was success"; transport failures read as `false`
/// without distinguishing the cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub node_id: u64,
    /// Provider userinfo endpoint accepts the access token.
    pub userinfo_ok: bool,
    /// Protected API accepts the access token.
    pub api_access_ok: bool,
    /// Protected API accepts the id token. `false` without a call when
    /// the node carries no id token.
    pub api_id_ok: bool,
}

/// Runs status probes over a ledger, strictly one node at a time.
pub struct StatusProber {
    http_client: reqwest::Client,
    config: FlowConfig,
}

impl StatusProber {
    pub fn new(http_client: reqwest::Client, config: FlowConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }

    /// Probe every ledger node in id order. Each node's probe fully
    /// completes, including all three network calls, before the next node
    /// starts: probe results land in per-node presentation state, and
    /// interleaved completion would apply them out of order.
    pub async fn refresh_status(&self, ledger: &TokenLedger) -> Vec<StatusReport> {
        let mut reports = Vec::with_capacity(ledger.len());
        for node in ledger.nodes() {
            reports.push(self.probe(node).await);
        }
        reports
    }

    /// Three independent checks for one node.
    async fn probe(&self, node: &LedgerNode) -> StatusReport {
        let userinfo_ok = self
            .check(&self.config.userinfo_url(), &node.tokens.access_token)
            .await;
        let api_access_ok = self
            .check(&self.config.api_user_url(), &node.tokens.access_token)
            .await;
        let api_id_ok = match node.tokens.id_token.as_deref() {
            Some(id_token) => self.check(&self.config.api_user_url(), id_token).await,
            None => false,
        };

        debug!(
            node_id = node.id,
            userinfo_ok, api_access_ok, api_id_ok, "Status probe completed"
        );

        StatusReport {
            node_id: node.id,
            userinfo_ok,
            api_access_ok,
            api_id_ok,
        }
    }

    async fn check(&self, url: &str, token: &str) -> bool {
        match self.http_client.get(url).bearer_auth(token).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}
