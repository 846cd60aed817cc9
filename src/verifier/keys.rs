//! Provider discovery and JWKS fetching with single-flight memoization.

use std::collections::HashMap;
use std::sync::Arc;

use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::{AuthError, Result};

/// Verifier configuration: where the provider lives and which client the
/// tokens must belong to.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Token issuer base URL (the `iss` claim value).
    pub issuer: String,
    /// Expected OAuth client id.
    pub client_id: String,
}

impl VerifierConfig {
    pub fn new(issuer: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            client_id: client_id.into(),
        }
    }

    /// Build the issuer from a Cognito-style region + user-pool identifier.
    pub fn for_user_pool(region: &str, user_pool_id: &str, client_id: impl Into<String>) -> Self {
        Self {
            issuer: format!("https://cognito-idp.{region}.amazonaws.com/{user_pool_id}"),
            client_id: client_id.into(),
        }
    }

    /// OpenID Connect discovery document URL.
    pub fn discovery_url(&self) -> String {
        format!("{}/.well-known/openid-configuration", self.issuer)
    }
}

/// OpenID Connect discovery document, reduced to the endpoints this crate
/// uses. Immutable once fetched.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Token issuer (iss claim). Must match exactly.
    pub issuer: String,
    /// Authorization endpoint URL.
    pub authorization_endpoint: String,
    /// Token endpoint URL.
    pub token_endpoint: String,
    /// Userinfo endpoint URL.
    pub userinfo_endpoint: String,
    /// Token revocation endpoint URL, when the provider publishes one.
    #[serde(default)]
    pub revocation_endpoint: Option<String>,
    /// JWKS endpoint URL.
    pub jwks_uri: String,
    /// Algorithms the provider signs id tokens with.
    #[serde(default)]
    pub id_token_signing_alg_values_supported: Vec<String>,
}

/// JWKS response from the endpoint.
#[derive(Debug, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

/// Individual JSON Web Key.
#[derive(Debug, Deserialize)]
pub struct Jwk {
    /// Key type (RSA, EC)
    pub kty: String,
    /// Key ID
    pub kid: Option<String>,
    /// Algorithm
    pub alg: Option<String>,
    /// Key use (sig, enc)
    #[serde(rename = "use")]
    pub key_use: Option<String>,
    /// RSA modulus (base64url)
    pub n: Option<String>,
    /// RSA exponent (base64url)
    pub e: Option<String>,
}

/// The provider's configuration and signing keys, bundled as one immutable
/// fetch result.
pub struct ProviderKeys {
    /// Discovery document.
    pub config: ProviderConfig,
    /// kid -> DecodingKey
    keys: HashMap<String, DecodingKey>,
}

impl ProviderKeys {
    /// Look up a decoding key by key id.
    pub fn key(&self, kid: &str) -> Option<&DecodingKey> {
        self.keys.get(kid)
    }

    /// Number of usable signing keys.
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }
}

/// Lazily fetches and memoizes the provider's discovery document and JWKS.
///
/// The first caller triggers two sequential fetches; concurrent callers
/// await the same in-flight initialization, and the outcome (success or
/// failure) is held for the lifetime of the cache. There is no TTL and no
/// re-fetch on key miss: a key rotated at the provider after the first
/// fetch stays unknown until the cache is rebuilt.
pub struct KeySetCache {
    http_client: reqwest::Client,
    discovery_url: String,
    cell: OnceCell<std::result::Result<Arc<ProviderKeys>, String>>,
}

impl KeySetCache {
    /// Create a cache for the given verifier configuration. Nothing is
    /// fetched until the first [`provider_keys`](Self::provider_keys) call.
    pub fn new(http_client: reqwest::Client, config: &VerifierConfig) -> Self {
        Self {
            http_client,
            discovery_url: config.discovery_url(),
            cell: OnceCell::new(),
        }
    }

    /// Get the memoized provider configuration and key set, fetching on
    /// first use. Safe to call concurrently; at most one fetch pair runs.
    pub async fn provider_keys(&self) -> Result<Arc<ProviderKeys>> {
        let outcome = self
            .cell
            .get_or_init(|| async {
                self.fetch()
                    .await
                    .map(Arc::new)
                    .map_err(|e| e.to_string())
            })
            .await;

        match outcome {
            Ok(keys) => Ok(Arc::clone(keys)),
            Err(msg) => Err(AuthError::Discovery(msg.clone())),
        }
    }

    /// Fetch the discovery document, then the JWKS it points at.
    async fn fetch(&self) -> Result<ProviderKeys> {
        debug!(url = %self.discovery_url, "Fetching OpenID configuration");

        let response = self.http_client.get(&self.discovery_url).send().await?;
        if !response.status().is_success() {
            return Err(AuthError::Discovery(format!(
                "discovery endpoint returned status {}",
                response.status()
            )));
        }
        let config: ProviderConfig = response
            .json()
            .await
            .map_err(|e| AuthError::Discovery(format!("invalid discovery document: {e}")))?;

        debug!(url = %config.jwks_uri, "Fetching JWKS");

        let response = self.http_client.get(&config.jwks_uri).send().await?;
        if !response.status().is_success() {
            return Err(AuthError::Discovery(format!(
                "JWKS endpoint returned status {}",
                response.status()
            )));
        }
        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| AuthError::Discovery(format!("invalid JWKS document: {e}")))?;

        let mut keys = HashMap::new();
        for jwk in jwks.keys {
            // Skip encryption keys
            if jwk.key_use.as_deref() == Some("enc") {
                continue;
            }

            match jwk_to_decoding_key(&jwk) {
                Ok(key) => {
                    let kid = jwk.kid.clone().unwrap_or_else(|| "default".to_string());
                    debug!(kid = %kid, kty = %jwk.kty, "Loaded JWK");
                    keys.insert(kid, key);
                }
                Err(e) => {
                    warn!(
                        kid = ?jwk.kid,
                        kty = %jwk.kty,
                        error = %e,
                        "Failed to parse JWK, skipping"
                    );
                }
            }
        }

        if keys.is_empty() {
            return Err(AuthError::Discovery(
                "no valid signing keys found in JWKS".to_string(),
            ));
        }

        info!(
            issuer = %config.issuer,
            key_count = keys.len(),
            "Provider keys loaded"
        );

        Ok(ProviderKeys { config, keys })
    }
}

/// Convert a JWK to a DecodingKey. Only RSA keys are accepted; this crate
/// verifies RS256 signatures exclusively.
fn jwk_to_decoding_key(jwk: &Jwk) -> std::result::Result<DecodingKey, String> {
    match jwk.kty.as_str() {
        "RSA" => {
            let n = jwk.n.as_ref().ok_or("RSA key missing 'n'")?;
            let e = jwk.e.as_ref().ok_or("RSA key missing 'e'")?;
            DecodingKey::from_rsa_components(n, e)
                .map_err(|e| format!("failed to build RSA decoding key: {e}"))
        }
        kty => Err(format!("unsupported key type: {kty}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwk_parsing() {
        let jwk_json = r#"{
            "kty": "RSA",
            "kid": "test-key-1",
            "alg": "RS256",
            "use": "sig",
            "n": "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw",
            "e": "AQAB"
        }"#;

        let jwk: Jwk = serde_json::from_str(jwk_json).unwrap();
        assert_eq!(jwk.kty, "RSA");
        assert_eq!(jwk.kid, Some("test-key-1".to_string()));

        assert!(jwk_to_decoding_key(&jwk).is_ok());
    }

    #[test]
    fn test_non_rsa_key_rejected() {
        let jwk = Jwk {
            kty: "EC".to_string(),
            kid: Some("ec-key".to_string()),
            alg: Some("ES256".to_string()),
            key_use: Some("sig".to_string()),
            n: None,
            e: None,
        };
        assert!(jwk_to_decoding_key(&jwk).is_err());
    }

    #[test]
    fn test_discovery_url() {
        let config = VerifierConfig::for_user_pool("eu-west-1", "eu-west-1_AbCdEf", "client-1");
        assert_eq!(
            config.discovery_url(),
            "https://cognito-idp.eu-west-1.amazonaws.com/eu-west-1_AbCdEf/.well-known/openid-configuration"
        );
    }
}
