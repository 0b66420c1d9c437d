//! # Core Configuration Module
//!
//! Resolves the client settings (API base URL, shareable-link base URL,
//! identity-provider client identifier) and assembles the bridge handles the
//! core needs into a [`CoreConfig`].
//!
//! ## Settings resolution
//!
//! Raw values come from the host's [`SettingsStore`] and, optionally, from
//! environment overrides. [`resolve_config`] turns them into a
//! [`ClientConfig`]: absent or blank values fall back to defaults, trailing
//! `/` is stripped from URLs and whitespace is trimmed from the client
//! identifier. An empty client identifier is valid at this stage; it only
//! becomes an error when an authorization flow is attempted.
//!
//! ```
//! use core_runtime::config::{resolve_config, RawSettings};
//!
//! let raw = RawSettings {
//!     api_base_url: Some("https://api.example.com/".to_string()),
//!     client_id: Some("  1234 ".to_string()),
//!     ..RawSettings::default()
//! };
//!
//! let config = resolve_config(&raw);
//! assert_eq!(config.api_base_url, "https://api.example.com");
//! assert_eq!(config.share_base_url, "https://api.example.com");
//! assert_eq!(config.client_id, "1234");
//! ```
//!
//! ## Bridge assembly
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .client_config(client_config)
//!     .http_client(Arc::new(MyHttpClient))
//!     .secure_store(Arc::new(MySecureStore))
//!     .file_system(Arc::new(MyFileSystem))
//!     .authorization_prompt(Arc::new(MyPrompt))
//!     .build()?;
//! ```
//!
//! With the `desktop-shims` feature, missing bridges are filled with the
//! `bridge-desktop` implementations; otherwise `build` fails fast with
//! [`Error::CapabilityMissing`].

use crate::error::{Error, Result};
use crate::events::EventBus;
use bridge_traits::{
    AuthorizationPrompt, Clock, FileSystemAccess, HttpClient, SecureStore, SettingsStore,
    SystemClock,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const SETTING_API_BASE_URL: &str = "api_base_url";
pub const SETTING_SHARE_BASE_URL: &str = "share_base_url";
pub const SETTING_CLIENT_ID: &str = "discord_client_id";
pub const SETTING_REDIRECT_URI: &str = "discord_redirect_uri";
pub const SETTING_REQUEST_TIMEOUT_SECS: &str = "request_timeout_secs";

pub const ENV_API_BASE_URL: &str = "MEDICBOT_API_URL";
pub const ENV_SHARE_BASE_URL: &str = "MEDICBOT_SHARE_URL";
pub const ENV_CLIENT_ID: &str = "MEDICBOT_DISCORD_CLIENT_ID";
pub const ENV_REDIRECT_URI: &str = "MEDICBOT_REDIRECT_URI";

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_AUTHORIZE_URL: &str = "https://discord.com/oauth2/authorize";
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:53682/callback";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Name of the asset cache directory under the host cache root.
pub const DEFAULT_CACHE_SUBDIRECTORY: &str = "audio";

/// Settings exactly as the host supplied them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSettings {
    pub api_base_url: Option<String>,
    pub share_base_url: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub request_timeout_secs: Option<String>,
}

impl RawSettings {
    /// Read the raw values from the host settings store.
    pub async fn load(store: &dyn SettingsStore) -> Result<Self> {
        let read = |key: &'static str| async move {
            store
                .get_string(key)
                .await
                .map_err(|e| Error::Config(format!("Failed to read setting '{}': {}", key, e)))
        };

        Ok(Self {
            api_base_url: read(SETTING_API_BASE_URL).await?,
            share_base_url: read(SETTING_SHARE_BASE_URL).await?,
            client_id: read(SETTING_CLIENT_ID).await?,
            redirect_uri: read(SETTING_REDIRECT_URI).await?,
            request_timeout_secs: read(SETTING_REQUEST_TIMEOUT_SECS).await?,
        })
    }

    /// Read overrides from the process environment.
    pub fn from_env() -> Self {
        Self {
            api_base_url: std::env::var(ENV_API_BASE_URL).ok(),
            share_base_url: std::env::var(ENV_SHARE_BASE_URL).ok(),
            client_id: std::env::var(ENV_CLIENT_ID).ok(),
            redirect_uri: std::env::var(ENV_REDIRECT_URI).ok(),
            request_timeout_secs: None,
        }
    }

    /// Layer `overrides` on top of `self`; present override values win.
    pub fn overlay(self, overrides: RawSettings) -> Self {
        Self {
            api_base_url: overrides.api_base_url.or(self.api_base_url),
            share_base_url: overrides.share_base_url.or(self.share_base_url),
            client_id: overrides.client_id.or(self.client_id),
            redirect_uri: overrides.redirect_uri.or(self.redirect_uri),
            request_timeout_secs: overrides.request_timeout_secs.or(self.request_timeout_secs),
        }
    }
}

/// Normalized client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Catalog/auth backend, without trailing `/`.
    pub api_base_url: String,
    /// Base for shareable asset links, without trailing `/`.
    pub share_base_url: String,
    /// Identity-provider client identifier; may be empty.
    pub client_id: String,
    /// Identity-provider authorization endpoint.
    pub authorize_url: String,
    /// Redirect URI registered with the identity provider.
    pub redirect_uri: String,
    /// Deadline applied to every backend request.
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn has_client_id(&self) -> bool {
        !self.client_id.is_empty()
    }

    /// Absolute URL of a backend route such as `/Auth/Refresh`.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        resolve_config(&RawSettings::default())
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn normalize_url(value: &str) -> String {
    value.trim_end_matches('/').to_string()
}

/// Resolve raw settings into a [`ClientConfig`]. Pure; never fails.
pub fn resolve_config(raw: &RawSettings) -> ClientConfig {
    let api_base_url = normalize_url(non_blank(&raw.api_base_url).unwrap_or(DEFAULT_API_BASE_URL));

    let share_base_url = non_blank(&raw.share_base_url)
        .map(normalize_url)
        .unwrap_or_else(|| api_base_url.clone());

    let client_id = raw
        .client_id
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    let redirect_uri = non_blank(&raw.redirect_uri)
        .unwrap_or(DEFAULT_REDIRECT_URI)
        .to_string();

    let request_timeout = non_blank(&raw.request_timeout_secs)
        .and_then(|secs| secs.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

    ClientConfig {
        api_base_url,
        share_base_url,
        client_id,
        authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
        redirect_uri,
        request_timeout,
    }
}

/// Bridge handles and settings the core is built from.
#[derive(Clone)]
pub struct CoreConfig {
    pub client: ClientConfig,

    pub http_client: Arc<dyn HttpClient>,

    pub secure_store: Arc<dyn SecureStore>,

    pub file_system: Arc<dyn FileSystemAccess>,

    pub authorization_prompt: Arc<dyn AuthorizationPrompt>,

    pub clock: Arc<dyn Clock>,

    pub event_bus: Option<EventBus>,

    pub cache_subdirectory: String,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("client", &self.client)
            .field("http_client", &"HttpClient { ... }")
            .field("secure_store", &"SecureStore { ... }")
            .field("file_system", &"FileSystemAccess { ... }")
            .field("authorization_prompt", &"AuthorizationPrompt { ... }")
            .field("event_bus", &self.event_bus.is_some())
            .field("cache_subdirectory", &self.cache_subdirectory)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }
}

#[derive(Default)]
pub struct CoreConfigBuilder {
    client: Option<ClientConfig>,
    http_client: Option<Arc<dyn HttpClient>>,
    secure_store: Option<Arc<dyn SecureStore>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    authorization_prompt: Option<Arc<dyn AuthorizationPrompt>>,
    clock: Option<Arc<dyn Clock>>,
    event_bus: Option<EventBus>,
    cache_subdirectory: Option<String>,
}

impl CoreConfigBuilder {
    pub fn client_config(mut self, client: ClientConfig) -> Self {
        self.client = Some(client);
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    pub fn authorization_prompt(mut self, prompt: Arc<dyn AuthorizationPrompt>) -> Self {
        self.authorization_prompt = Some(prompt);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn cache_subdirectory(mut self, name: impl Into<String>) -> Self {
        self.cache_subdirectory = Some(name.into());
        self
    }

    /// Build the configuration, filling platform defaults where available.
    ///
    /// # Errors
    ///
    /// [`Error::CapabilityMissing`] when a required bridge was not supplied
    /// and no desktop default is compiled in; [`Error::Config`] when the
    /// cache subdirectory is not a plain relative name.
    pub fn build(self) -> Result<CoreConfig> {
        let client = self.client.unwrap_or_default();

        let cache_subdirectory = self
            .cache_subdirectory
            .unwrap_or_else(|| DEFAULT_CACHE_SUBDIRECTORY.to_string());
        if cache_subdirectory.is_empty()
            || cache_subdirectory.contains(['/', '\\'])
            || cache_subdirectory == ".."
        {
            return Err(Error::Config(format!(
                "Cache subdirectory must be a single path segment, got '{}'",
                cache_subdirectory
            )));
        }

        let http_client = match self.http_client {
            Some(client) => client,
            None => defaults::http_client(&client)?,
        };
        let secure_store = match self.secure_store {
            Some(store) => store,
            None => defaults::secure_store()?,
        };
        let file_system = match self.file_system {
            Some(fs) => fs,
            None => defaults::file_system()?,
        };
        let authorization_prompt = match self.authorization_prompt {
            Some(prompt) => prompt,
            None => defaults::authorization_prompt(&client)?,
        };

        let config = CoreConfig {
            client,
            http_client,
            secure_store,
            file_system,
            authorization_prompt,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            event_bus: self.event_bus,
            cache_subdirectory,
        };

        debug!(api_base_url = %config.client.api_base_url, "Core configuration built");
        Ok(config)
    }
}

#[cfg(feature = "desktop-shims")]
mod defaults {
    use super::*;
    use bridge_desktop::{
        KeyringSecureStore, LoopbackBrowserPrompt, ReqwestHttpClient, TokioFileSystem,
    };

    pub(super) fn http_client(client: &ClientConfig) -> Result<Arc<dyn HttpClient>> {
        let http = ReqwestHttpClient::with_timeout(client.request_timeout)
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Arc::new(http))
    }

    pub(super) fn secure_store() -> Result<Arc<dyn SecureStore>> {
        Ok(Arc::new(KeyringSecureStore::new()))
    }

    pub(super) fn file_system() -> Result<Arc<dyn FileSystemAccess>> {
        Ok(Arc::new(TokioFileSystem::new()))
    }

    pub(super) fn authorization_prompt(
        client: &ClientConfig,
    ) -> Result<Arc<dyn AuthorizationPrompt>> {
        let prompt = LoopbackBrowserPrompt::new(client.redirect_uri.clone())
            .map_err(|e| Error::Config(format!("Invalid redirect URI: {}", e)))?;
        Ok(Arc::new(prompt))
    }
}

#[cfg(not(feature = "desktop-shims"))]
mod defaults {
    use super::*;

    fn missing(capability: &str, hint: &str) -> Error {
        Error::CapabilityMissing {
            capability: capability.to_string(),
            message: format!(
                "{} implementation is required. Desktop: enable the 'desktop-shims' feature. \
                 Other hosts: {}",
                capability, hint
            ),
        }
    }

    pub(super) fn http_client(_client: &ClientConfig) -> Result<Arc<dyn HttpClient>> {
        Err(missing("HttpClient", "inject a platform HTTP client."))
    }

    pub(super) fn secure_store() -> Result<Arc<dyn SecureStore>> {
        Err(missing(
            "SecureStore",
            "inject platform-native secure storage (Keychain/Keystore).",
        ))
    }

    pub(super) fn file_system() -> Result<Arc<dyn FileSystemAccess>> {
        Err(missing("FileSystemAccess", "inject a file system adapter."))
    }

    pub(super) fn authorization_prompt(
        _client: &ClientConfig,
    ) -> Result<Arc<dyn AuthorizationPrompt>> {
        Err(missing(
            "AuthorizationPrompt",
            "inject the platform's browser-redirect mechanism.",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::BridgeError;
    use std::collections::HashMap;

    struct MapSettingsStore(HashMap<String, String>);

    #[async_trait]
    impl SettingsStore for MapSettingsStore {
        async fn set_string(&self, _key: &str, _value: &str) -> bridge_traits::error::Result<()> {
            Err(BridgeError::NotAvailable("read-only".to_string()))
        }

        async fn get_string(&self, key: &str) -> bridge_traits::error::Result<Option<String>> {
            Ok(self.0.get(key).cloned())
        }

        async fn delete(&self, _key: &str) -> bridge_traits::error::Result<()> {
            Ok(())
        }

        async fn list_keys(&self) -> bridge_traits::error::Result<Vec<String>> {
            Ok(self.0.keys().cloned().collect())
        }
    }

    #[test]
    fn test_defaults_when_absent() {
        let config = resolve_config(&RawSettings::default());

        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.share_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.client_id, "");
        assert!(!config.has_client_id());
        assert_eq!(config.authorize_url, DEFAULT_AUTHORIZE_URL);
        assert_eq!(config.redirect_uri, DEFAULT_REDIRECT_URI);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn test_trailing_separators_stripped() {
        let raw = RawSettings {
            api_base_url: Some("https://api.example.com///".to_string()),
            share_base_url: Some(" https://share.example.com/ ".to_string()),
            ..RawSettings::default()
        };

        let config = resolve_config(&raw);
        assert_eq!(config.api_base_url, "https://api.example.com");
        assert_eq!(config.share_base_url, "https://share.example.com");
        assert_eq!(config.api_url("/Audio"), "https://api.example.com/Audio");
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let raw = RawSettings {
            api_base_url: Some("   ".to_string()),
            client_id: Some("   ".to_string()),
            request_timeout_secs: Some("zero".to_string()),
            ..RawSettings::default()
        };

        let config = resolve_config(&raw);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.client_id, "");
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn test_client_id_trimmed_and_timeout_parsed() {
        let raw = RawSettings {
            client_id: Some("\t987654321\n".to_string()),
            request_timeout_secs: Some("5".to_string()),
            ..RawSettings::default()
        };

        let config = resolve_config(&raw);
        assert_eq!(config.client_id, "987654321");
        assert!(config.has_client_id());
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_overlay_prefers_overrides() {
        let base = RawSettings {
            api_base_url: Some("https://stored.example.com".to_string()),
            client_id: Some("stored".to_string()),
            ..RawSettings::default()
        };
        let overrides = RawSettings {
            client_id: Some("env".to_string()),
            ..RawSettings::default()
        };

        let merged = base.overlay(overrides);
        assert_eq!(merged.api_base_url.as_deref(), Some("https://stored.example.com"));
        assert_eq!(merged.client_id.as_deref(), Some("env"));
    }

    #[tokio::test]
    async fn test_load_from_settings_store() {
        let mut values = HashMap::new();
        values.insert(SETTING_API_BASE_URL.to_string(), "https://api.example.com/".to_string());
        values.insert(SETTING_CLIENT_ID.to_string(), "abc".to_string());
        let store = MapSettingsStore(values);

        let raw = RawSettings::load(&store).await.unwrap();
        assert_eq!(raw.api_base_url.as_deref(), Some("https://api.example.com/"));
        assert_eq!(raw.client_id.as_deref(), Some("abc"));
        assert_eq!(raw.share_base_url, None);

        let config = resolve_config(&raw);
        assert_eq!(config.share_base_url, "https://api.example.com");
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_build_without_bridges_reports_missing_capability() {
        let result = CoreConfig::builder().build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "HttpClient");
            }
            other => panic!("Expected CapabilityMissing, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_invalid_cache_subdirectory_rejected() {
        let result = CoreConfig::builder().cache_subdirectory("../escape").build();
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
