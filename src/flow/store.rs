//! Client-side storage collaborators.
//!
//! The browser's sessionStorage and localStorage are modeled as traits so
//! the flow can run against any backing: the in-memory implementations
//! here cover tests and non-browser hosts.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use super::client::TokenSet;

/// Durable storage key holding the serialized current token set.
pub const TOKENS_KEY: &str = "tokens";

/// Session-scoped mapping from a one-time `state` value to its paired
/// `code_verifier`. Entries are consumed exactly once.
pub trait CorrelationStore: Send + Sync {
    /// Record a pending login's state/verifier pair.
    fn put(&self, state: &str, verifier: &str);

    /// Consume and return the verifier for a returned `state`, removing
    /// the entry. A second call with the same state returns `None`.
    fn take(&self, state: &str) -> Option<String>;
}

/// Durable storage for the current token set, persisted across reloads
/// under the single fixed [`TOKENS_KEY`].
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Option<TokenSet>;
    fn save(&self, tokens: &TokenSet);
}

/// In-memory correlation store.
#[derive(Default)]
pub struct MemoryCorrelationStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryCorrelationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CorrelationStore for MemoryCorrelationStore {
    fn put(&self, state: &str, verifier: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(state.to_string(), verifier.to_string());
        }
    }

    fn take(&self, state: &str) -> Option<String> {
        let verifier = self.entries.write().ok()?.remove(state);
        debug!(state = %state, found = verifier.is_some(), "Correlation entry consumed");
        verifier
    }
}

/// In-memory token store. Values are kept serialized under [`TOKENS_KEY`],
/// mirroring how a browser host would persist them.
#[derive(Default)]
pub struct MemoryTokenStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<TokenSet> {
        let entries = self.entries.read().ok()?;
        let raw = entries.get(TOKENS_KEY)?;
        serde_json::from_str(raw).ok()
    }

    fn save(&self, tokens: &TokenSet) {
        let Ok(raw) = serde_json::to_string(tokens) else {
            return;
        };
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(TOKENS_KEY.to_string(), raw);
        }
    }
}
