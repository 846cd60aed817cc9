//! Authorization Code + PKCE flow orchestration.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{AuthError, Result};

use super::pkce;
use super::store::{CorrelationStore, TokenStore};

/// Endpoints and identity of the login flow. Paths follow the provider's
/// hosted-UI layout under one base URL.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Provider base URL hosting the login UI and OAuth2 endpoints.
    pub auth_base_url: String,
    /// OAuth client id.
    pub client_id: String,
    /// Redirect URI registered for the client; the callback lands here.
    pub redirect_uri: String,
    /// Base URL of the protected application API.
    pub api_base_url: String,
}

impl FlowConfig {
    pub fn authorize_url(&self) -> String {
        format!("{}/login", self.auth_base_url)
    }

    pub fn token_url(&self) -> String {
        format!("{}/oauth2/token", self.auth_base_url)
    }

    pub fn revoke_url(&self) -> String {
        format!("{}/oauth2/revoke", self.auth_base_url)
    }

    pub fn userinfo_url(&self) -> String {
        format!("{}/oauth2/userInfo", self.auth_base_url)
    }

    /// Protected endpoint that echoes the verified user id.
    pub fn api_user_url(&self) -> String {
        format!("{}/api/user", self.api_base_url)
    }
}

/// Tokens obtained from the provider's token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// `code` and `state` query parameters delivered on the redirect URI.
#[derive(Debug, Clone)]
pub struct CallbackParams {
    pub code: String,
    pub state: String,
}

impl CallbackParams {
    /// Pull `code` and `state` out of a callback URL's query, if present.
    pub fn from_url(url: &Url) -> Option<Self> {
        let mut code = None;
        let mut state = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                _ => {}
            }
        }
        Some(Self {
            code: code?,
            state: state?,
        })
    }
}

/// Where the flow currently stands.
#[derive(Debug, Clone)]
pub enum FlowState {
    /// No durable tokens and no callback: the next step is a login
    /// redirect.
    Unauthenticated,
    /// The redirect target was reloaded with `code` and `state` present;
    /// the next step is [`AuthFlowClient::complete_login`].
    PendingCallback(CallbackParams),
    /// A durable token set exists.
    Authenticated(TokenSet),
}

/// Drives redirect-to-login, code exchange, refresh, and revoke against
/// the provider's token endpoint.
///
/// Network operations either succeed or fail the enclosing call; nothing
/// is retried and no timeouts are imposed here.
pub struct AuthFlowClient<C, T> {
    http_client: reqwest::Client,
    config: FlowConfig,
    correlations: C,
    tokens: T,
}

impl<C: CorrelationStore, T: TokenStore> AuthFlowClient<C, T> {
    pub fn new(http_client: reqwest::Client, config: FlowConfig, correlations: C, tokens: T) -> Self {
        Self {
            http_client,
            config,
            correlations,
            tokens,
        }
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Determine the current flow state from the callback parameters (if
    /// the host was loaded with any) and durable storage. A stored token
    /// set short-circuits to `Authenticated` without a redirect.
    pub fn state(&self, callback: Option<CallbackParams>) -> FlowState {
        if let Some(params) = callback {
            return FlowState::PendingCallback(params);
        }
        match self.tokens.load() {
            Some(tokens) => FlowState::Authenticated(tokens),
            None => FlowState::Unauthenticated,
        }
    }

    /// Begin a login: generate the `state` and `code_verifier`
    /// correlators, store their pairing, and return the authorization URL
    /// for the caller to navigate to.
    pub fn begin_login(&self) -> Result<Url> {
        let state = pkce::generate_nonce();
        let code_verifier = pkce::generate_nonce();
        self.correlations.put(&state, &code_verifier);

        let challenge = pkce::code_challenge(&code_verifier);

        let mut url = Url::parse(&self.config.authorize_url())
            .map_err(|e| AuthError::Discovery(format!("invalid authorize URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("state", &state)
            .append_pair("code_challenge_method", "S256")
            .append_pair("code_challenge", &challenge)
            .append_pair("redirect_uri", &self.config.redirect_uri);

        info!(state = %state, "Login redirect prepared");
        Ok(url)
    }

    /// Complete a pending callback: consume the correlation entry for the
    /// returned `state`, exchange the code, and persist the token set.
    ///
    /// Fails with [`AuthError::UnexpectedCallback`] when no entry matches
    /// (a replayed or forged callback), and with
    /// [`AuthError::CodeExchangeFailed`] when the provider rejects the
    /// exchange; the authorization code is single-use, so a failed
    /// exchange is not retried.
    pub async fn complete_login(&self, params: &CallbackParams) -> Result<TokenSet> {
        let code_verifier = self
            .correlations
            .take(&params.state)
            .ok_or(AuthError::UnexpectedCallback)?;

        let response = self
            .http_client
            .post(self.config.token_url())
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", self.config.client_id.as_str()),
                ("code", params.code.as_str()),
                ("code_verifier", code_verifier.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(status, "Authorization code exchange rejected");
            return Err(AuthError::CodeExchangeFailed { status, body });
        }

        let tokens: TokenSet = response.json().await?;
        self.tokens.save(&tokens);

        info!("Login completed, token set persisted");
        Ok(tokens)
    }

    /// Exchange a refresh token for a new token set. The prior set is left
    /// untouched on failure; on success the new set becomes the persisted
    /// current set and is returned for ledger insertion.
    pub async fn refresh(&self, tokens: &TokenSet) -> Result<TokenSet> {
        let refresh_token = tokens.refresh_token.as_deref().ok_or_else(|| {
            AuthError::RefreshFailed {
                status: 0,
                body: "token set has no refresh token".to_string(),
            }
        })?;

        let response = self
            .http_client
            .post(self.config.token_url())
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(status, "Token refresh rejected");
            return Err(AuthError::RefreshFailed { status, body });
        }

        let refreshed: TokenSet = response.json().await?;
        self.tokens.save(&refreshed);

        debug!("Token set refreshed");
        Ok(refreshed)
    }

    /// Revoke a token set's refresh token at the provider. The local copy
    /// is deliberately kept so status probes can demonstrate the provider
    /// now rejects it.
    pub async fn revoke(&self, tokens: &TokenSet) -> Result<()> {
        let refresh_token = tokens.refresh_token.as_deref().ok_or_else(|| {
            AuthError::RevokeFailed {
                status: 0,
                body: "token set has no refresh token".to_string(),
            }
        })?;

        let response = self
            .http_client
            .post(self.config.revoke_url())
            .form(&[
                ("token", refresh_token),
                ("client_id", self.config.client_id.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(status, "Token revocation rejected");
            return Err(AuthError::RevokeFailed { status, body });
        }

        info!("Refresh token revoked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::store::{MemoryCorrelationStore, MemoryTokenStore};

    fn test_client() -> AuthFlowClient<MemoryCorrelationStore, MemoryTokenStore> {
        AuthFlowClient::new(
            reqwest::Client::new(),
            FlowConfig {
                auth_base_url: "https://auth.example.com".to_string(),
                client_id: "abc".to_string(),
                redirect_uri: "https://app.example".to_string(),
                api_base_url: "https://app.example".to_string(),
            },
            MemoryCorrelationStore::new(),
            MemoryTokenStore::new(),
        )
    }

    #[test]
    fn test_begin_login_url_shape() {
        let client = test_client();
        let url = client.begin_login().unwrap();

        assert_eq!(url.path(), "/login");
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["client_id"], "abc");
        assert_eq!(pairs["code_challenge_method"], "S256");
        assert_eq!(pairs["redirect_uri"], "https://app.example");
        assert_eq!(pairs["state"].len(), 64);

        // The stored verifier must derive exactly the challenge in the URL.
        let verifier = client.correlations.take(&pairs["state"]).unwrap();
        assert_eq!(pkce::code_challenge(&verifier), pairs["code_challenge"]);
    }

    #[test]
    fn test_state_transitions_from_storage() {
        let client = test_client();
        assert!(matches!(client.state(None), FlowState::Unauthenticated));

        let params = CallbackParams {
            code: "xyz".to_string(),
            state: "s1".to_string(),
        };
        assert!(matches!(
            client.state(Some(params)),
            FlowState::PendingCallback(_)
        ));

        client.tokens.save(&TokenSet {
            access_token: "at".to_string(),
            id_token: None,
            refresh_token: None,
        });
        assert!(matches!(client.state(None), FlowState::Authenticated(_)));
    }

    #[test]
    fn test_callback_params_from_url() {
        let url = Url::parse("https://app.example/?code=xyz&state=s1").unwrap();
        let params = CallbackParams::from_url(&url).unwrap();
        assert_eq!(params.code, "xyz");
        assert_eq!(params.state, "s1");

        let bare = Url::parse("https://app.example/").unwrap();
        assert!(CallbackParams::from_url(&bare).is_none());
    }

    #[tokio::test]
    async fn test_unexpected_callback_without_entry() {
        let client = test_client();
        let params = CallbackParams {
            code: "xyz".to_string(),
            state: "never-issued".to_string(),
        };
        let err = client.complete_login(&params).await.unwrap_err();
        assert!(matches!(err, AuthError::UnexpectedCallback));
    }

    #[tokio::test]
    async fn test_refresh_requires_refresh_token() {
        let client = test_client();
        let tokens = TokenSet {
            access_token: "at".to_string(),
            id_token: None,
            refresh_token: None,
        };
        assert!(matches!(
            client.refresh(&tokens).await.unwrap_err(),
            AuthError::RefreshFailed { .. }
        ));
        assert!(matches!(
            client.revoke(&tokens).await.unwrap_err(),
            AuthError::RevokeFailed { .. }
        ));
    }
}
