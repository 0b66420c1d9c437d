//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the core library and platform-specific
//! implementations. Each trait represents a capability that the core requires but
//! that must be implemented differently per platform.
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with bearer auth and deadlines
//! - [`FileSystemAccess`](storage::FileSystemAccess) - File I/O for the asset cache
//!
//! ### Security & Storage
//! - [`SecureStore`](storage::SecureStore) - Credential persistence (Keychain/Keystore)
//! - [`SettingsStore`](storage::SettingsStore) - Key-value preferences storage
//!
//! ### Platform Integration
//! - [`AuthorizationPrompt`](authorization::AuthorizationPrompt) - Browser redirect for user consent
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type for consistent
//! error handling. Platform implementations should:
//!
//! - Convert platform-specific errors to `BridgeError`
//! - Report expired deadlines as `BridgeError::Timeout`
//! - Include error context (e.g., file paths, network status)
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent usage
//! across async tasks. Implementations must ensure thread safety.
//!
//! ## Example
//!
//! A host that already owns a web view can implement the consent step
//! itself:
//!
//! ```ignore
//! use bridge_traits::authorization::{AuthorizationOutcome, AuthorizationPrompt};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//!
//! pub struct WebViewPrompt;
//!
//! #[async_trait]
//! impl AuthorizationPrompt for WebViewPrompt {
//!     fn redirect_uri(&self) -> String {
//!         "medicbot://auth/callback".to_string()
//!     }
//!
//!     async fn authorize(&self, authorization_url: &str) -> Result<AuthorizationOutcome> {
//!         // Load the page and wait for the redirect
//!         todo!()
//!     }
//! }
//! ```

pub mod authorization;
pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use authorization::{AuthorizationOutcome, AuthorizationPrompt};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use storage::{FileSystemAccess, SecureStore, SettingsStore};
pub use time::{Clock, FixedClock, LogLevel, SystemClock};
