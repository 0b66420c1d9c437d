//! Delegated Authorization Code Flow with PKCE
//!
//! Drives one interactive sign-in against the identity provider and trades
//! the resulting code for an application token pair at the backend:
//!
//! 1. Build an [`AuthorizationRequest`] (RFC 7636 verifier/challenge, CSRF
//!    state, fixed scope, forced consent)
//! 2. Hand the authorization URL to the host's [`AuthorizationPrompt`] and
//!    wait for the redirect
//! 3. `POST /Auth/ExchangeDiscordCode` with the code and verifier
//! 4. Persist the new [`TokenRecord`] through the [`TokenStore`]
//!
//! The refresh grant (`POST /Auth/Refresh`) lives here as well since it
//! shares the token response format.
//!
//! Codes, verifiers and tokens are never logged.

use crate::error::{AuthError, Result};
use crate::token_store::TokenStore;
use crate::types::{AuthorizationRequest, TokenRecord, TokenResponse};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bridge_traits::authorization::{AuthorizationOutcome, AuthorizationPrompt};
use bridge_traits::error::BridgeError;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::time::Clock;
use core_runtime::config::ClientConfig;
use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const EXCHANGE_CODE_PATH: &str = "/Auth/ExchangeDiscordCode";
pub const REFRESH_PATH: &str = "/Auth/Refresh";

/// Scope requested from the identity provider.
pub const AUTHORIZATION_SCOPE: &str = "identify";

/// How long the user has to complete the consent page.
pub const DEFAULT_PROMPT_TIMEOUT: Duration = Duration::from_secs(300);

/// PKCE (Proof Key for Code Exchange) verifier plus CSRF state.
///
/// Only the challenge leaves the client during authorization; the verifier is
/// sent to the backend with the code.
#[derive(Clone)]
pub struct PkceVerifier {
    verifier: String,
    state: String,
}

impl PkceVerifier {
    /// Generate a 32-byte verifier and a 16-byte state, both base64url
    /// without padding.
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();

        let mut verifier_bytes = [0u8; 32];
        rng.fill(&mut verifier_bytes);

        let mut state_bytes = [0u8; 16];
        rng.fill(&mut state_bytes);

        Self {
            verifier: URL_SAFE_NO_PAD.encode(verifier_bytes),
            state: URL_SAFE_NO_PAD.encode(state_bytes),
        }
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// S256 challenge: BASE64URL(SHA256(code_verifier))
    pub fn challenge(&self) -> String {
        let hash = Sha256::digest(self.verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(hash)
    }
}

impl Default for PkceVerifier {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeCodeBody<'a> {
    code: &'a str,
    code_verifier: &'a str,
    redirect_uri: &'a str,
    client_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody<'a> {
    refresh_token: &'a str,
}

/// Authorization Flow Driver.
pub struct AuthorizationFlow {
    config: ClientConfig,
    http_client: Arc<dyn HttpClient>,
    prompt: Arc<dyn AuthorizationPrompt>,
    token_store: TokenStore,
    clock: Arc<dyn Clock>,
    prompt_timeout: Duration,
}

impl AuthorizationFlow {
    pub fn new(
        config: ClientConfig,
        http_client: Arc<dyn HttpClient>,
        prompt: Arc<dyn AuthorizationPrompt>,
        token_store: TokenStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            http_client,
            prompt,
            token_store,
            clock,
            prompt_timeout: DEFAULT_PROMPT_TIMEOUT,
        }
    }

    pub fn with_prompt_timeout(mut self, timeout: Duration) -> Self {
        self.prompt_timeout = timeout;
        self
    }

    /// Build a fresh authorization request.
    ///
    /// # Errors
    ///
    /// [`AuthError::Configuration`] when no client identifier is configured
    /// or the authorize endpoint is not a valid URL. No I/O happens before
    /// these checks.
    pub fn build_request(&self) -> Result<AuthorizationRequest> {
        if !self.config.has_client_id() {
            return Err(AuthError::Configuration(
                "Discord client id is not configured".to_string(),
            ));
        }

        let mut url = Url::parse(&self.config.authorize_url).map_err(|e| {
            AuthError::Configuration(format!(
                "Invalid authorize URL '{}': {}",
                self.config.authorize_url, e
            ))
        })?;

        let pkce = PkceVerifier::new();
        let redirect_uri = self.prompt.redirect_uri();

        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", AUTHORIZATION_SCOPE)
            .append_pair("state", pkce.state())
            .append_pair("code_challenge", &pkce.challenge())
            .append_pair("code_challenge_method", "S256")
            .append_pair("prompt", "consent");

        debug!("Built authorization URL");

        Ok(AuthorizationRequest {
            authorization_url: url.to_string(),
            redirect_uri,
            code_verifier: pkce.verifier().to_string(),
            state: pkce.state().to_string(),
        })
    }

    /// Run the interactive flow end to end and persist the resulting record.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Configuration`] before any I/O when the client id is missing
    /// - [`AuthError::AuthorizationCancelled`] when the user declines
    /// - [`AuthError::OperationTimeout`] when the prompt does not settle in time
    /// - [`AuthError::StateMismatch`] when the redirect carries a foreign state
    /// - [`AuthError::TokenExchange`] when the backend rejects the code
    #[instrument(skip(self))]
    pub async fn begin_interactive_authorization(&self) -> Result<TokenRecord> {
        let request = self.build_request()?;

        info!("Waiting for user authorization");
        let outcome = tokio::time::timeout(
            self.prompt_timeout,
            self.prompt.authorize(&request.authorization_url),
        )
        .await
        .map_err(|_| {
            warn!(
                timeout_secs = self.prompt_timeout.as_secs(),
                "Authorization prompt timed out"
            );
            AuthError::OperationTimeout {
                operation: "authorization prompt".to_string(),
            }
        })?
        .map_err(|e| {
            warn!(error = %e, "Authorization prompt failed");
            AuthError::PromptUnavailable(e.to_string())
        })?;

        let (code, state) = match outcome {
            AuthorizationOutcome::Code { code, state } => (code, state),
            AuthorizationOutcome::Cancelled => {
                info!("User cancelled authorization");
                return Err(AuthError::AuthorizationCancelled);
            }
        };

        if state != request.state {
            warn!("Authorization redirect carried an unexpected state");
            return Err(AuthError::StateMismatch);
        }

        let record = self.exchange_code(&code, &request).await?;
        self.token_store.save(&record).await?;

        info!(access_expiry = %record.access_expiry, "Authorization completed");
        Ok(record)
    }

    /// Exchange an authorization code for a token record at the backend.
    ///
    /// Does not persist the record.
    #[instrument(skip(self, code, request))]
    pub async fn exchange_code(
        &self,
        code: &str,
        request: &AuthorizationRequest,
    ) -> Result<TokenRecord> {
        let body = ExchangeCodeBody {
            code,
            code_verifier: &request.code_verifier,
            redirect_uri: &request.redirect_uri,
            client_id: &self.config.client_id,
        };

        debug!("Exchanging authorization code for tokens");

        let response = self
            .post_json(EXCHANGE_CODE_PATH, &body)
            .await
            .map_err(|e| {
                warn!(error = %e, "Token exchange request failed");
                match e {
                    BridgeError::Timeout(_) => AuthError::OperationTimeout {
                        operation: "token exchange".to_string(),
                    },
                    other => AuthError::Network(other.to_string()),
                }
            })?;

        if !response.is_success() {
            let status = response.status;
            let error_body = response
                .text()
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            warn!(
                status = status,
                error = %error_body,
                "Token exchange failed while exchanging authorization code"
            );

            return Err(AuthError::TokenExchange {
                status_code: status,
                body: error_body,
            });
        }

        let token_response: TokenResponse = response
            .json()
            .map_err(|e| AuthError::Serialization(format!("token exchange response: {}", e)))?;

        TokenRecord::from_response(token_response, self.clock.now())
    }

    /// Trade a refresh token for a new record. Does not persist it.
    ///
    /// Every failure is reported as [`AuthError::TokenRefresh`], with the
    /// status code when the backend answered.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenRecord> {
        debug!("Refreshing access token");

        let response = self
            .post_json(REFRESH_PATH, &RefreshBody { refresh_token })
            .await
            .map_err(|e| AuthError::TokenRefresh {
                status_code: None,
                reason: e.to_string(),
            })?;

        if !response.is_success() {
            let status = response.status;
            let error_body = response
                .text()
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            warn!(status = status, error = %error_body, "Token refresh rejected");

            return Err(AuthError::TokenRefresh {
                status_code: Some(status),
                reason: format!("Refresh endpoint returned {}", status),
            });
        }

        let token_response: TokenResponse =
            response.json().map_err(|e| AuthError::TokenRefresh {
                status_code: Some(response.status),
                reason: format!("Failed to parse token response: {}", e),
            })?;

        TokenRecord::from_response(token_response, self.clock.now()).map_err(|e| {
            AuthError::TokenRefresh {
                status_code: Some(response.status),
                reason: e.to_string(),
            }
        })
    }

    async fn post_json<T: Serialize>(
        &self,
        path: &str,
        body: &T,
    ) -> std::result::Result<HttpResponse, BridgeError> {
        let request = HttpRequest::new(HttpMethod::Post, self.config.api_url(path))
            .header("Accept", "application/json")
            .timeout(self.config.request_timeout)
            .json(body)?;

        self.http_client.execute(request).await
    }
}
