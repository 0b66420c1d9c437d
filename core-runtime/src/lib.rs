//! # Core Runtime Module
//!
//! Foundational infrastructure shared by the client crates:
//! - Logging and tracing setup
//! - Settings resolution and bridge assembly
//! - Event bus for auth and asset-cache notifications

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{resolve_config, ClientConfig, CoreConfig, RawSettings};
pub use error::{Error, Result};
pub use events::{AssetEvent, AuthEvent, CoreEvent, EventBus};
