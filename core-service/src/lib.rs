//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, filesystem,
//! secure storage, settings, authorization prompt) into the shared Rust core
//! and exposes the operations a host UI calls:
//!
//! - [`CoreService::fetch_audio_catalog`]
//! - [`CoreService::fetch_audio_file`]
//! - [`CoreService::build_shareable_link`]
//! - [`CoreService::sign_in`] / [`CoreService::sign_out`]
//!
//! Desktop apps typically enable the `desktop-shims` feature (which depends
//! on `bridge-desktop`) and only supply a settings store; other hosts pass
//! every bridge explicitly.

pub mod error;

pub use error::{CoreError, Result};

use std::path::PathBuf;
use std::sync::Arc;

use bridge_traits::{
    AuthorizationPrompt, Clock, FileSystemAccess, HttpClient, SecureStore, SettingsStore,
};
use core_auth::{AccessTokenProvider, TokenLifecycleManager};
use core_catalog::{AssetCache, AudioTrackDescriptor, AuthorizedClient, CatalogClient};
use core_runtime::config::{resolve_config, ClientConfig, CoreConfig, RawSettings};
use core_runtime::events::{EventBus, EventStream};
use tracing::{info, instrument};

/// Bridge handles supplied by the host.
///
/// Only the settings store is mandatory. Bridges left as `None` are filled
/// with desktop defaults when `desktop-shims` is enabled; otherwise
/// bootstrapping fails with [`CoreError::CapabilityMissing`].
pub struct CoreDependencies {
    pub settings_store: Arc<dyn SettingsStore>,
    pub http_client: Option<Arc<dyn HttpClient>>,
    pub filesystem: Option<Arc<dyn FileSystemAccess>>,
    pub secure_store: Option<Arc<dyn SecureStore>>,
    pub authorization_prompt: Option<Arc<dyn AuthorizationPrompt>>,
    pub clock: Option<Arc<dyn Clock>>,
    /// Apply `MEDICBOT_*` environment overrides on top of stored settings.
    pub read_environment: bool,
}

impl CoreDependencies {
    pub fn new(settings_store: Arc<dyn SettingsStore>) -> Self {
        Self {
            settings_store,
            http_client: None,
            filesystem: None,
            secure_store: None,
            authorization_prompt: None,
            clock: None,
            read_environment: true,
        }
    }

    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    pub fn with_filesystem(mut self, filesystem: Arc<dyn FileSystemAccess>) -> Self {
        self.filesystem = Some(filesystem);
        self
    }

    pub fn with_secure_store(mut self, secure_store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(secure_store);
        self
    }

    pub fn with_authorization_prompt(mut self, prompt: Arc<dyn AuthorizationPrompt>) -> Self {
        self.authorization_prompt = Some(prompt);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn without_environment(mut self) -> Self {
        self.read_environment = false;
        self
    }
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    client: ClientConfig,
    tokens: Arc<TokenLifecycleManager>,
    catalog: Arc<CatalogClient>,
    assets: Arc<AssetCache>,
    events: EventBus,
}

impl CoreService {
    /// Load settings, resolve them and assemble the core.
    ///
    /// # Errors
    ///
    /// [`CoreError::InitializationFailed`] when settings cannot be read or a
    /// default bridge cannot be created; [`CoreError::CapabilityMissing`]
    /// when a bridge is missing and no default is compiled in.
    #[instrument(skip(deps))]
    pub async fn bootstrap(deps: CoreDependencies) -> Result<Self> {
        let mut raw = RawSettings::load(deps.settings_store.as_ref()).await?;
        if deps.read_environment {
            raw = raw.overlay(RawSettings::from_env());
        }
        let client = resolve_config(&raw);

        let events = EventBus::default();
        let mut builder = CoreConfig::builder()
            .client_config(client)
            .event_bus(events.clone());
        if let Some(http_client) = deps.http_client {
            builder = builder.http_client(http_client);
        }
        if let Some(filesystem) = deps.filesystem {
            builder = builder.file_system(filesystem);
        }
        if let Some(secure_store) = deps.secure_store {
            builder = builder.secure_store(secure_store);
        }
        if let Some(prompt) = deps.authorization_prompt {
            builder = builder.authorization_prompt(prompt);
        }
        if let Some(clock) = deps.clock {
            builder = builder.clock(clock);
        }

        let service = Self::from_config(builder.build()?);
        info!(
            api_base_url = %service.client.api_base_url,
            has_client_id = service.client.has_client_id(),
            "Core service ready"
        );
        Ok(service)
    }

    /// Assemble the core from an already built configuration.
    pub fn from_config(config: CoreConfig) -> Self {
        let events = config.event_bus.clone().unwrap_or_else(EventBus::default);
        let tokens = Arc::new(
            TokenLifecycleManager::from_core_config(&config).with_event_bus(events.clone()),
        );

        let authorized = AuthorizedClient::new(
            config.http_client.clone(),
            tokens.clone() as Arc<dyn AccessTokenProvider>,
            config.client.request_timeout,
        );
        let catalog = CatalogClient::new(authorized.clone(), config.client.api_base_url.clone());
        let assets = AssetCache::new(
            config.file_system.clone(),
            authorized,
            config.client.api_base_url.clone(),
            config.cache_subdirectory.clone(),
        )
        .with_event_bus(events.clone());

        Self {
            client: config.client,
            tokens,
            catalog: Arc::new(catalog),
            assets: Arc::new(assets),
            events,
        }
    }

    pub fn client_config(&self) -> &ClientConfig {
        &self.client
    }

    /// Stream of auth and cache events.
    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    pub async fn fetch_audio_catalog(&self) -> Result<Vec<AudioTrackDescriptor>> {
        Ok(self.catalog.fetch_catalog().await?)
    }

    /// Local path of asset `id`, downloaded on first use.
    pub async fn fetch_audio_file(&self, id: &str) -> Result<PathBuf> {
        Ok(self.assets.fetch_asset(id).await?)
    }

    pub fn build_shareable_link(&self, id: &str, token: Option<&str>) -> String {
        core_catalog::build_shareable_link(&self.client.share_base_url, id, token)
    }

    /// Run the interactive authorization regardless of stored tokens.
    pub async fn sign_in(&self) -> Result<()> {
        Ok(self.tokens.sign_in().await?)
    }

    pub async fn sign_out(&self) -> Result<()> {
        Ok(self.tokens.sign_out().await?)
    }

    pub async fn is_signed_in(&self) -> bool {
        self.tokens.is_signed_in().await
    }
}

/// Convenience bootstrapper for desktop hosts.
///
/// Settings are read from the SQLite database at `settings_path`; every other
/// bridge uses the `bridge-desktop` implementation.
///
/// ```no_run
/// # async fn example() -> core_service::Result<()> {
/// let core = core_service::bootstrap_desktop("/tmp/medicbot/settings.db".into()).await?;
/// let tracks = core.fetch_audio_catalog().await?;
/// # Ok(())
/// # }
/// ```
#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
pub async fn bootstrap_desktop(settings_path: PathBuf) -> Result<CoreService> {
    let settings = bridge_desktop::SqliteSettingsStore::new(settings_path)
        .await
        .map_err(|err| CoreError::InitializationFailed(err.to_string()))?;
    CoreService::bootstrap(CoreDependencies::new(Arc::new(settings))).await
}
