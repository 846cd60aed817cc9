//! Bearer-token verification.

use std::str::FromStr;
use std::sync::Arc;

use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use tracing::{debug, warn};

use crate::error::{AuthError, Result};

use super::claims::{AccessClaims, IdClaims, TokenUse, UnverifiedPayload};
use super::keys::{KeySetCache, ProviderKeys, VerifierConfig};

/// Verified identity extracted from a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedUser {
    /// The token's `sub` claim.
    pub user_id: String,
}

/// Validates bearer tokens against the provider's published keys.
///
/// Stateless per call apart from the shared [`KeySetCache`]; concurrent
/// verifications only block each other while the first key fetch is in
/// flight.
pub struct TokenVerifier {
    http_client: reqwest::Client,
    config: VerifierConfig,
    keys: Arc<KeySetCache>,
}

impl TokenVerifier {
    pub fn new(http_client: reqwest::Client, config: VerifierConfig, keys: Arc<KeySetCache>) -> Self {
        Self {
            http_client,
            config,
            keys,
        }
    }

    /// Verify an `Authorization: Bearer <token>` header value and return
    /// the subject identity.
    ///
    /// Access tokens are checked for signature, issuer, and `client_id`,
    /// then probed against the provider's userinfo endpoint, since
    /// revocation is not locally verifiable from the JWT alone. Id tokens
    /// are checked for signature, issuer, and audience under the
    /// provider's advertised id-token algorithms.
    pub async fn verify(&self, bearer_header: &str) -> Result<VerifiedUser> {
        let token = extract_bearer(bearer_header)?;

        let payload = UnverifiedPayload::decode(token)?;
        let header = decode_header(token)?;
        let kid = header.kid.as_deref().unwrap_or("default").to_string();

        let provider = self.keys.provider_keys().await?;
        let decoding_key = provider
            .key(&kid)
            .ok_or_else(|| AuthError::UnknownKeyId(kid.clone()))?;

        // Key resolution comes first; the token_use branch decides the
        // validation rules but happens before any signature work.
        let token_use = match payload.token_use {
            Some(value) => TokenUse::parse(&value)?,
            None => return Err(AuthError::UnsupportedTokenUse(String::new())),
        };

        debug!(kid = %kid, token_use = ?token_use, "Verifying bearer token");

        let user_id = match token_use {
            TokenUse::Access => {
                let claims = self.verify_access(token, decoding_key, &provider)?;
                self.check_userinfo(token, &provider).await?;
                claims.sub
            }
            TokenUse::Id => self.verify_id(token, decoding_key, &provider)?.sub,
        };

        debug!(user_id = %user_id, "Bearer token verified");
        Ok(VerifiedUser { user_id })
    }

    /// Access tokens: RS256, issuer only (no audience claim), plus the
    /// `client_id` claim must name the configured client.
    fn verify_access(
        &self,
        token: &str,
        key: &jsonwebtoken::DecodingKey,
        provider: &ProviderKeys,
    ) -> Result<AccessClaims> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&provider.config.issuer]);
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "iss"]);

        let claims = decode::<AccessClaims>(token, key, &validation)?.claims;

        match claims.client_id.as_deref() {
            Some(client_id) if client_id == self.config.client_id => Ok(claims),
            other => Err(AuthError::ClientMismatch {
                expected: self.config.client_id.clone(),
                got: other.unwrap_or("").to_string(),
            }),
        }
    }

    /// Id tokens: signature, issuer, and audience, restricted to the
    /// algorithms the provider advertises for id tokens.
    fn verify_id(
        &self,
        token: &str,
        key: &jsonwebtoken::DecodingKey,
        provider: &ProviderKeys,
    ) -> Result<IdClaims> {
        let mut validation = Validation::new(Algorithm::RS256);
        let advertised = id_token_algorithms(provider);
        if !advertised.is_empty() {
            validation.algorithms = advertised;
        }
        validation.set_issuer(&[&provider.config.issuer]);
        validation.set_audience(&[&self.config.client_id]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        Ok(decode::<IdClaims>(token, key, &validation)?.claims)
    }

    /// Liveness check: a revoked access token still carries a valid
    /// signature, so ask the provider whether it is still active.
    async fn check_userinfo(&self, token: &str, provider: &ProviderKeys) -> Result<()> {
        let response = self
            .http_client
            .get(&provider.config.userinfo_endpoint)
            .bearer_auth(token)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            warn!(status = %response.status(), "Access token rejected by userinfo endpoint");
            Err(AuthError::TokenInactive(response.status().as_u16()))
        }
    }
}

/// Map the provider's advertised id-token algorithm names onto the ones
/// jsonwebtoken knows, skipping any it does not.
fn id_token_algorithms(provider: &ProviderKeys) -> Vec<Algorithm> {
    provider
        .config
        .id_token_signing_alg_values_supported
        .iter()
        .filter_map(|name| Algorithm::from_str(name).ok())
        .collect()
}

/// Extract the token from a `Bearer <token>` header value.
fn extract_bearer(header: &str) -> Result<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MalformedHeader)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def.ghi").unwrap(), "abc.def.ghi");
        assert_eq!(extract_bearer("bearer tok").unwrap(), "tok");
        assert!(extract_bearer("Basic dXNlcjpwYXNz").is_err());
        assert!(extract_bearer("Bearer ").is_err());
        assert!(extract_bearer("").is_err());
    }
}
