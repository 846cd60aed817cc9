//! Server-side bearer-token verification against an OIDC provider.

pub mod claims;
pub mod keys;
pub mod verify;

pub use claims::{AccessClaims, IdClaims, TokenUse};
pub use keys::{KeySetCache, ProviderConfig, ProviderKeys, VerifierConfig};
pub use verify::{TokenVerifier, VerifiedUser};
