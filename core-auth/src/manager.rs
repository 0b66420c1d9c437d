//! # Token Lifecycle Manager
//!
//! Decides, on every call, whether the stored token can be reused, must be
//! refreshed, or requires the user to authorize again:
//!
//! ```text
//!            load()
//!              │
//!   ┌──────────┼─────────────────────────┐
//!   │ absent   │ access valid            │ access expired
//!   │          ▼                         ▼
//!   │     return token          refresh token usable?
//!   │                           │ yes              │ no
//!   │                           ▼                  │
//!   │                   POST /Auth/Refresh         │
//!   │                   │ ok         │ failed      │
//!   │                   ▼            ▼             ▼
//!   │             save + return    clear() ───► interactive
//!   └─────────────────────────────────────────► authorization
//! ```
//!
//! A rejected refresh token is discarded before the interactive flow starts,
//! so it is never retried silently. Calls are serialized: concurrent callers
//! wait for the in-flight refresh or prompt and then reuse its result.
//!
//! ## Usage
//!
//! ```no_run
//! use core_auth::{AccessTokenProvider, TokenLifecycleManager};
//! use core_runtime::config::CoreConfig;
//!
//! # async fn example(config: CoreConfig) -> core_auth::Result<()> {
//! let manager = TokenLifecycleManager::from_core_config(&config);
//!
//! let token = manager.get_access_token().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::oauth::AuthorizationFlow;
use crate::token_store::TokenStore;
use crate::types::TokenRecord;
use async_trait::async_trait;
use bridge_traits::time::Clock;
use core_runtime::config::CoreConfig;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Source of bearer tokens for authenticated requests.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Return a usable access token, refreshing or re-authorizing as needed.
    async fn get_access_token(&self) -> Result<String>;

    /// Drop the stored credentials after the backend rejected them, so the
    /// next [`get_access_token`](Self::get_access_token) authorizes again.
    async fn invalidate(&self) -> Result<()>;
}

pub struct TokenLifecycleManager {
    flow: AuthorizationFlow,
    token_store: TokenStore,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
    lifecycle_lock: Mutex<()>,
}

impl TokenLifecycleManager {
    pub fn new(flow: AuthorizationFlow, token_store: TokenStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            flow,
            token_store,
            clock,
            event_bus: None,
            lifecycle_lock: Mutex::new(()),
        }
    }

    /// Wire the flow and store from an assembled [`CoreConfig`].
    pub fn from_core_config(config: &CoreConfig) -> Self {
        let token_store = TokenStore::new(config.secure_store.clone());
        let flow = AuthorizationFlow::new(
            config.client.clone(),
            config.http_client.clone(),
            config.authorization_prompt.clone(),
            token_store.clone(),
            config.clock.clone(),
        );

        let manager = Self::new(flow, token_store, config.clock.clone());
        match &config.event_bus {
            Some(bus) => manager.with_event_bus(bus.clone()),
            None => manager,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn token_store(&self) -> &TokenStore {
        &self.token_store
    }

    /// Return a usable access token.
    ///
    /// # Errors
    ///
    /// Only the interactive path fails: `Configuration`,
    /// `AuthorizationCancelled`, `TokenExchange` and the other
    /// [`AuthError`](crate::AuthError)s of the flow propagate unchanged.
    /// Refresh failures are absorbed.
    #[instrument(skip(self))]
    pub async fn get_access_token(&self) -> Result<String> {
        let _guard = self.lifecycle_lock.lock().await;
        let now = self.clock.now();

        let Some(record) = self.token_store.load().await else {
            debug!("No stored tokens");
            return self.authorize_interactively().await;
        };

        if !record.is_access_expired(now) {
            debug!(access_expiry = %record.access_expiry, "Reusing stored access token");
            return Ok(record.access_token);
        }

        if !record.can_refresh(now) {
            info!("Refresh token unusable, discarding stored tokens");
            self.discard_tokens("refresh token expired").await;
            return self.authorize_interactively().await;
        }

        match self.refresh(&record).await {
            Ok(refreshed) => Ok(refreshed.access_token),
            Err(e) => {
                warn!(error = %e, "Token refresh failed, falling back to authorization");
                self.discard_tokens("refresh rejected").await;
                self.authorize_interactively().await
            }
        }
    }

    /// Run the interactive flow regardless of stored state.
    #[instrument(skip(self))]
    pub async fn sign_in(&self) -> Result<()> {
        let _guard = self.lifecycle_lock.lock().await;
        self.authorize_interactively().await.map(|_| ())
    }

    /// Remove the stored tokens.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<()> {
        let _guard = self.lifecycle_lock.lock().await;
        self.token_store.clear().await?;
        self.emit(AuthEvent::TokensCleared {
            reason: "signed out".to_string(),
        });
        info!("Signed out");
        Ok(())
    }

    /// Whether a token record is currently stored.
    pub async fn is_signed_in(&self) -> bool {
        self.token_store.load().await.is_some()
    }

    async fn refresh(&self, record: &TokenRecord) -> Result<TokenRecord> {
        self.emit(AuthEvent::TokenRefreshing);

        let refreshed = self.flow.refresh(&record.refresh_token).await?;
        self.token_store.save(&refreshed).await?;

        self.emit(AuthEvent::TokenRefreshed {
            expires_at: refreshed.access_expiry,
        });
        info!(access_expiry = %refreshed.access_expiry, "Access token refreshed");
        Ok(refreshed)
    }

    async fn authorize_interactively(&self) -> Result<String> {
        self.emit(AuthEvent::SigningIn);

        match self.flow.begin_interactive_authorization().await {
            Ok(record) => {
                self.emit(AuthEvent::SignedIn);
                Ok(record.access_token)
            }
            Err(e) => {
                self.emit(AuthEvent::AuthError {
                    message: e.to_string(),
                    recoverable: e.is_recoverable(),
                });
                Err(e)
            }
        }
    }

    /// Clear the store, logging rather than failing when the store is down.
    async fn discard_tokens(&self, reason: &str) {
        if let Err(e) = self.token_store.clear().await {
            warn!(error = %e, "Failed to clear stored tokens");
        }
        self.emit(AuthEvent::TokensCleared {
            reason: reason.to_string(),
        });
    }

    fn emit(&self, event: AuthEvent) {
        if let Some(bus) = &self.event_bus {
            // No subscribers is fine
            let _ = bus.emit(CoreEvent::Auth(event));
        }
    }
}

#[async_trait]
impl AccessTokenProvider for TokenLifecycleManager {
    async fn get_access_token(&self) -> Result<String> {
        TokenLifecycleManager::get_access_token(self).await
    }

    #[instrument(skip(self))]
    async fn invalidate(&self) -> Result<()> {
        let _guard = self.lifecycle_lock.lock().await;
        self.token_store.clear().await.map_err(|e| {
            warn!(error = %e, "Failed to clear rejected tokens");
            e
        })?;
        self.emit(AuthEvent::TokensCleared {
            reason: "access token rejected".to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use crate::test_support::{
        token_json, MemorySecureStore, PromptBehavior, ScriptedHttpClient, ScriptedPrompt,
    };
    use crate::token_store::DEFAULT_TOKEN_KEY;
    use bridge_traits::error::BridgeError;
    use bridge_traits::time::FixedClock;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use core_runtime::config::{resolve_config, RawSettings};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    struct Harness {
        manager: Arc<TokenLifecycleManager>,
        http: Arc<ScriptedHttpClient>,
        prompt: Arc<ScriptedPrompt>,
        secure_store: Arc<MemorySecureStore>,
        events: tokio::sync::broadcast::Receiver<CoreEvent>,
    }

    fn harness(behavior: PromptBehavior) -> Harness {
        let http = Arc::new(ScriptedHttpClient::new());
        let secure_store = Arc::new(MemorySecureStore::new());
        let prompt = Arc::new(
            ScriptedPrompt::new(behavior).watching(secure_store.clone(), DEFAULT_TOKEN_KEY),
        );
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(now()));
        let config = resolve_config(&RawSettings {
            api_base_url: Some("https://api.example.com".to_string()),
            client_id: Some("client-123".to_string()),
            ..RawSettings::default()
        });

        let token_store = TokenStore::new(secure_store.clone());
        let flow = AuthorizationFlow::new(
            config,
            http.clone(),
            prompt.clone(),
            token_store.clone(),
            clock.clone(),
        );
        let event_bus = EventBus::new(32);
        let events = event_bus.subscribe();
        let manager = TokenLifecycleManager::new(flow, token_store, clock).with_event_bus(event_bus);

        Harness {
            manager: Arc::new(manager),
            http,
            prompt,
            secure_store,
            events,
        }
    }

    async fn seed(h: &Harness, access_expiry: DateTime<Utc>, refresh_expiry: Option<DateTime<Utc>>) {
        let record = TokenRecord {
            access_token: "stored-access".to_string(),
            refresh_token: "stored-refresh".to_string(),
            access_expiry,
            refresh_expiry,
        };
        h.manager.token_store().save(&record).await.unwrap();
    }

    fn drain(events: &mut tokio::sync::broadcast::Receiver<CoreEvent>) -> Vec<AuthEvent> {
        let mut seen = Vec::new();
        while let Ok(CoreEvent::Auth(event)) = events.try_recv() {
            seen.push(event);
        }
        seen
    }

    #[tokio::test]
    async fn test_valid_token_reused_without_network() {
        let h = harness(PromptBehavior::Cancel);
        seed(&h, now() + Duration::minutes(5), None).await;

        let token = h.manager.get_access_token().await.unwrap();

        assert_eq!(token, "stored-access");
        assert_eq!(h.http.request_count(), 0);
        assert_eq!(h.prompt.call_count(), 0);
    }

    #[tokio::test]
    async fn test_expired_token_refreshed_and_persisted() {
        let mut h = harness(PromptBehavior::Cancel);
        seed(&h, now() - Duration::minutes(1), Some(now() + Duration::days(1))).await;
        h.http.respond(200, &token_json("new-access", "new-refresh"));

        let token = h.manager.get_access_token().await.unwrap();

        assert_eq!(token, "new-access");
        let stored = h.manager.token_store().load().await.unwrap();
        assert_eq!(stored.access_token, "new-access");
        assert_eq!(stored.refresh_token, "new-refresh");
        assert_eq!(h.prompt.call_count(), 0);

        let requests = h.http.requests();
        assert_eq!(requests[0].url, "https://api.example.com/Auth/Refresh");

        assert_eq!(
            drain(&mut h.events),
            vec![
                AuthEvent::TokenRefreshing,
                AuthEvent::TokenRefreshed {
                    expires_at: now() + Duration::hours(1)
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_rejected_refresh_clears_store_before_authorization() {
        let mut h = harness(PromptBehavior::Approve("code".to_string()));
        seed(&h, now() - Duration::minutes(1), Some(now() + Duration::days(1))).await;
        h.http
            .respond(400, "invalid refresh token")
            .respond(200, &token_json("interactive-access", "interactive-refresh"));

        let token = h.manager.get_access_token().await.unwrap();

        assert_eq!(token, "interactive-access");
        assert_eq!(h.prompt.tokens_present_at_prompt(), vec![false]);
        assert_eq!(h.http.request_count(), 2);
        assert_eq!(
            h.manager.token_store().load().await.unwrap().access_token,
            "interactive-access"
        );

        let events = drain(&mut h.events);
        assert!(events.contains(&AuthEvent::TokensCleared {
            reason: "refresh rejected".to_string()
        }));
        assert_eq!(events.last(), Some(&AuthEvent::SignedIn));
    }

    #[tokio::test]
    async fn test_refresh_network_failure_falls_back() {
        let h = harness(PromptBehavior::Approve("code".to_string()));
        seed(&h, now() - Duration::minutes(1), None).await;
        h.http
            .fail(BridgeError::Timeout("refresh".to_string()))
            .respond(200, &token_json("interactive-access", "r"));

        let token = h.manager.get_access_token().await.unwrap();

        assert_eq!(token, "interactive-access");
        assert_eq!(h.prompt.call_count(), 1);
    }

    #[tokio::test]
    async fn test_expired_refresh_token_skips_refresh_call() {
        let h = harness(PromptBehavior::Approve("code".to_string()));
        seed(&h, now() - Duration::hours(2), Some(now() - Duration::hours(1))).await;
        h.http.respond(200, &token_json("interactive-access", "r"));

        let token = h.manager.get_access_token().await.unwrap();

        assert_eq!(token, "interactive-access");
        let requests = h.http.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].url.ends_with("/Auth/ExchangeDiscordCode"));
        assert_eq!(h.prompt.tokens_present_at_prompt(), vec![false]);
    }

    #[tokio::test]
    async fn test_cancelled_authorization_propagates() {
        let mut h = harness(PromptBehavior::Cancel);

        let result = h.manager.get_access_token().await;

        assert!(matches!(result, Err(AuthError::AuthorizationCancelled)));
        assert!(!h.secure_store.contains(DEFAULT_TOKEN_KEY).await);

        let events = drain(&mut h.events);
        assert_eq!(events.first(), Some(&AuthEvent::SigningIn));
        assert!(matches!(
            events.last(),
            Some(AuthEvent::AuthError {
                recoverable: true,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let h = harness(PromptBehavior::Cancel);
        seed(&h, now() - Duration::minutes(1), Some(now() + Duration::days(1))).await;
        h.http.respond(200, &token_json("new-access", "new-refresh"));

        let first = tokio::spawn({
            let manager = h.manager.clone();
            async move { manager.get_access_token().await }
        });
        let second = tokio::spawn({
            let manager = h.manager.clone();
            async move { manager.get_access_token().await }
        });

        assert_eq!(first.await.unwrap().unwrap(), "new-access");
        assert_eq!(second.await.unwrap().unwrap(), "new-access");
        assert_eq!(h.http.request_count(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_authorization() {
        let h = harness(PromptBehavior::Approve("code".to_string()));
        seed(&h, now() + Duration::hours(1), None).await;
        h.http.respond(200, &token_json("fresh-access", "r"));

        h.manager.invalidate().await.unwrap();
        let token = h.manager.get_access_token().await.unwrap();

        assert_eq!(token, "fresh-access");
        assert_eq!(h.prompt.call_count(), 1);
    }

    #[tokio::test]
    async fn test_sign_in_ignores_stored_tokens_and_sign_out_clears() {
        let h = harness(PromptBehavior::Approve("code".to_string()));
        seed(&h, now() + Duration::hours(1), None).await;
        h.http.respond(200, &token_json("signed-in-access", "r"));

        h.manager.sign_in().await.unwrap();
        assert_eq!(h.prompt.call_count(), 1);
        assert_eq!(
            h.manager.get_access_token().await.unwrap(),
            "signed-in-access"
        );

        h.manager.sign_out().await.unwrap();
        assert!(!h.manager.is_signed_in().await);
    }
}
