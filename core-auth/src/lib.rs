//! # Authentication Module
//!
//! Token lifecycle for the Discord-delegated sign-in.
//!
//! ## Overview
//!
//! - [`TokenStore`]: persists the access/refresh token pair in the host's
//!   secure store
//! - [`AuthorizationFlow`]: interactive authorization code flow with PKCE and
//!   the backend code exchange
//! - [`TokenLifecycleManager`]: hands out access tokens, refreshing silently
//!   when possible and falling back to interactive authorization
//!
//! Auth state changes are published as [`core_runtime::events::AuthEvent`]s
//! when an event bus is attached.

pub mod error;
pub mod manager;
pub mod oauth;
pub mod token_store;
pub mod types;

#[cfg(test)]
mod test_support;

pub use error::{AuthError, Result};
pub use manager::{AccessTokenProvider, TokenLifecycleManager};
pub use oauth::{AuthorizationFlow, PkceVerifier};
pub use token_store::TokenStore;
pub use types::{AuthorizationRequest, TokenRecord, TokenResponse};
