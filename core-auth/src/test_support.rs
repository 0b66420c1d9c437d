//! In-memory bridge doubles shared by the unit tests of this crate.

use async_trait::async_trait;
use bridge_traits::authorization::{AuthorizationOutcome, AuthorizationPrompt};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::storage::SecureStore;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

pub const REDIRECT_URI: &str = "http://127.0.0.1:53682/callback";

#[derive(Default)]
pub struct MemorySecureStore {
    storage: Mutex<HashMap<String, Vec<u8>>>,
    failure: StdMutex<Option<String>>,
}

impl MemorySecureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following call fail as if the platform store were locked.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.storage.lock().await.contains_key(key)
    }

    fn check(&self) -> BridgeResult<()> {
        match self.failure.lock().unwrap().as_ref() {
            Some(message) => Err(BridgeError::NotAvailable(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SecureStore for MemorySecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
        self.check()?;
        self.storage
            .lock()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
        self.check()?;
        Ok(self.storage.lock().await.get(key).cloned())
    }

    async fn delete_secret(&self, key: &str) -> BridgeResult<()> {
        self.check()?;
        self.storage.lock().await.remove(key);
        Ok(())
    }
}

/// HTTP double that answers from a queue and records every request.
#[derive(Default)]
pub struct ScriptedHttpClient {
    responses: StdMutex<VecDeque<BridgeResult<HttpResponse>>>,
    requests: StdMutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, status: u16, body: &str) -> &Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(HttpResponse::new(status, body.to_string())));
        self
    }

    pub fn fail(&self, error: BridgeError) -> &Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for ScriptedHttpClient {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(BridgeError::OperationFailed(
                    "no scripted response left".to_string(),
                ))
            })
    }
}

#[derive(Clone, Debug)]
pub enum PromptBehavior {
    /// Return `code` with the state taken from the authorization URL.
    Approve(String),
    /// Return `code` with a fixed, unrelated state.
    ApproveWithState(String, String),
    Cancel,
    /// Never settle within `Duration`.
    Stall(Duration),
}

/// Authorization prompt double.
///
/// When `watch_store` is set, it records whether the token key was present at
/// the moment the prompt opened.
pub struct ScriptedPrompt {
    behavior: PromptBehavior,
    urls: StdMutex<Vec<String>>,
    watch_store: Option<(Arc<MemorySecureStore>, String)>,
    tokens_present_at_prompt: StdMutex<Vec<bool>>,
}

impl ScriptedPrompt {
    pub fn new(behavior: PromptBehavior) -> Self {
        Self {
            behavior,
            urls: StdMutex::new(Vec::new()),
            watch_store: None,
            tokens_present_at_prompt: StdMutex::new(Vec::new()),
        }
    }

    pub fn watching(mut self, store: Arc<MemorySecureStore>, key: &str) -> Self {
        self.watch_store = Some((store, key.to_string()));
        self
    }

    pub fn call_count(&self) -> usize {
        self.urls.lock().unwrap().len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    pub fn tokens_present_at_prompt(&self) -> Vec<bool> {
        self.tokens_present_at_prompt.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthorizationPrompt for ScriptedPrompt {
    fn redirect_uri(&self) -> String {
        REDIRECT_URI.to_string()
    }

    async fn authorize(&self, authorization_url: &str) -> BridgeResult<AuthorizationOutcome> {
        self.urls.lock().unwrap().push(authorization_url.to_string());

        if let Some((store, key)) = &self.watch_store {
            let present = store.contains(key).await;
            self.tokens_present_at_prompt.lock().unwrap().push(present);
        }

        match &self.behavior {
            PromptBehavior::Approve(code) => {
                let url = Url::parse(authorization_url)
                    .map_err(|e| BridgeError::OperationFailed(e.to_string()))?;
                let state = url
                    .query_pairs()
                    .find(|(key, _)| key == "state")
                    .map(|(_, value)| value.into_owned())
                    .unwrap_or_default();
                Ok(AuthorizationOutcome::Code {
                    code: code.clone(),
                    state,
                })
            }
            PromptBehavior::ApproveWithState(code, state) => Ok(AuthorizationOutcome::Code {
                code: code.clone(),
                state: state.clone(),
            }),
            PromptBehavior::Cancel => Ok(AuthorizationOutcome::Cancelled),
            PromptBehavior::Stall(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(AuthorizationOutcome::Cancelled)
            }
        }
    }
}

/// Body of a successful exchange/refresh response.
pub fn token_json(access: &str, refresh: &str) -> String {
    format!(
        r#"{{"accessToken":"{}","accessTokenExpiresIn":3600,"refreshToken":"{}","refreshTokenExpiresIn":2592000}}"#,
        access, refresh
    )
}
