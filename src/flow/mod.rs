//! Client side of the Authorization Code + PKCE flow.

pub mod client;
pub mod pkce;
pub mod store;

pub use client::{AuthFlowClient, CallbackParams, FlowConfig, FlowState, TokenSet};
pub use store::{CorrelationStore, MemoryCorrelationStore, MemoryTokenStore, TokenStore};
