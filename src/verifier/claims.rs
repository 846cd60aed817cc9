//! Claim structures, tagged by token type.
//!
//! Access and id tokens are validated under different rules, so each gets
//! its own claim struct rather than one shape with a `token_use` string
//! threaded through shared code.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;

use crate::error::{AuthError, Result};

/// The `token_use` claim, dispatched before any signature work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenUse {
    /// Authorizes API calls; carries `client_id`, no audience.
    Access,
    /// Asserts identity to the client; carries `aud`.
    Id,
}

impl TokenUse {
    /// Parse the claim value, rejecting anything outside `access` / `id`.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "access" => Ok(TokenUse::Access),
            "id" => Ok(TokenUse::Id),
            other => Err(AuthError::UnsupportedTokenUse(other.to_string())),
        }
    }
}

/// Claims carried by an access token.
#[derive(Debug, Deserialize)]
pub struct AccessClaims {
    /// Subject (user identifier)
    pub sub: String,
    /// Issuing client. Must match the configured client id.
    pub client_id: Option<String>,
    /// Expiration time
    pub exp: u64,
}

/// Claims carried by an id token.
#[derive(Debug, Deserialize)]
pub struct IdClaims {
    /// Subject (user identifier)
    pub sub: String,
    /// Audience. Validated against the configured client id.
    pub aud: String,
    /// Expiration time
    pub exp: u64,
}

/// The unverified payload fields needed to pick a validation branch.
#[derive(Debug, Deserialize)]
pub struct UnverifiedPayload {
    #[serde(default)]
    pub token_use: Option<String>,
}

impl UnverifiedPayload {
    /// Decode the payload segment of a compact JWT without verifying the
    /// signature. Used only to read `token_use`; every claim that matters
    /// is re-read from the verified decode.
    pub fn decode(token: &str) -> Result<Self> {
        let payload = token
            .split('.')
            .nth(1)
            .ok_or(AuthError::MalformedHeader)?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| AuthError::MalformedHeader)?;
        serde_json::from_slice(&bytes).map_err(|_| AuthError::MalformedHeader)
    }
}
