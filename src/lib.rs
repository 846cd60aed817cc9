//! OIDC bearer-token verification and Authorization Code + PKCE flow client.
//!
//! Two halves share one provider:
//!
//! - [`verifier`] is the server side: it resolves signing keys from the
//!   provider's JWKS endpoint (fetched once, single-flight) and validates
//!   bearer tokens with claim rules that differ by `token_use`.
//! - [`flow`] is the client side: it drives the Authorization Code + PKCE
//!   flow end to end (redirect, code exchange, refresh, revoke) against the
//!   provider's hosted endpoints.
//! - [`ledger`] tracks the lineage of token sets obtained via login and
//!   refresh, and runs serialized status probes against them.
//!
//! The hosting wrapper around the verifier, environment loading, and any
//! rendering of flow state are the caller's concern.

pub mod error;
pub mod flow;
pub mod ledger;
pub mod verifier;

pub use error::{AuthError, Result};
pub use flow::{
    AuthFlowClient, CallbackParams, CorrelationStore, FlowConfig, FlowState,
    MemoryCorrelationStore, MemoryTokenStore, TokenSet, TokenStore,
};
pub use ledger::{LedgerNode, StatusProber, StatusReport, TokenLedger};
pub use verifier::{KeySetCache, ProviderConfig, TokenVerifier, VerifiedUser, VerifierConfig};
