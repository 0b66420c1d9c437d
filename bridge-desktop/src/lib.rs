//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! This crate provides production-ready implementations of all bridge traits
//! using desktop-appropriate libraries:
//! - `HttpClient` using `reqwest`
//! - `FileSystemAccess` using `tokio::fs`
//! - `SecureStore` using `keyring` crate
//! - `SettingsStore` using SQLite-backed key-value store
//! - `AuthorizationPrompt` using the system browser and a loopback listener
//!
//! ## Feature Flags
//!
//! - `secure-store`: Enable OS keychain integration (default)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{LoopbackBrowserPrompt, ReqwestHttpClient, TokioFileSystem};
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let http_client = ReqwestHttpClient::new()?;
//!     let fs = TokioFileSystem::new();
//!     let prompt = LoopbackBrowserPrompt::new("http://127.0.0.1:53682/callback")?;
//!
//!     // Use in core configuration
//!     Ok(())
//! }
//! ```

mod browser;
mod filesystem;
mod http;
mod settings;

#[cfg(feature = "secure-store")]
mod secure_store;

pub use browser::LoopbackBrowserPrompt;
pub use filesystem::TokioFileSystem;
pub use http::ReqwestHttpClient;
pub use settings::SqliteSettingsStore;

#[cfg(feature = "secure-store")]
pub use secure_store::KeyringSecureStore;
