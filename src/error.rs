//! Error taxonomy for verification and the client flow.

use thiserror::Error;

/// Errors raised by token verification and the PKCE flow client.
///
/// Every variant is terminal for the operation that raised it; nothing in
/// this crate retries automatically.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Fetching the discovery document or JWKS failed. Cached for the
    /// lifetime of the [`KeySetCache`](crate::verifier::KeySetCache) that
    /// raised it.
    #[error("provider discovery failed: {0}")]
    Discovery(String),

    /// The Authorization header was missing or not `Bearer <token>`.
    #[error("missing or malformed bearer authorization header")]
    MalformedHeader,

    /// The token's `kid` does not resolve against the cached key set.
    #[error("key id '{0}' not found in provider JWKS")]
    UnknownKeyId(String),

    /// Access token `client_id` claim did not match the configured client.
    #[error("client_id must be '{expected}', got '{got}'")]
    ClientMismatch { expected: String, got: String },

    /// The provider's userinfo endpoint rejected an otherwise valid access
    /// token, meaning it was revoked or is inactive.
    #[error("access token rejected by userinfo endpoint (status {0})")]
    TokenInactive(u16),

    /// `token_use` claim outside the supported `access` / `id` values.
    #[error("token_use must be 'access' or 'id', got '{0}'")]
    UnsupportedTokenUse(String),

    /// Signature, issuer, audience, algorithm, or expiry validation failed.
    #[error("token validation failed: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// A callback arrived with a `state` that has no stored correlation
    /// entry (replayed, forged, or already consumed).
    #[error("no pending login matches callback state")]
    UnexpectedCallback,

    /// The token endpoint rejected the authorization-code exchange.
    #[error("authorization code exchange failed (status {status}): {body}")]
    CodeExchangeFailed { status: u16, body: String },

    /// The token endpoint rejected a refresh-token grant.
    #[error("token refresh failed (status {status}): {body}")]
    RefreshFailed { status: u16, body: String },

    /// The revocation endpoint rejected the request.
    #[error("token revocation failed (status {status}): {body}")]
    RevokeFailed { status: u16, body: String },

    /// Transport-level failure talking to the provider or protected API.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AuthError>;
