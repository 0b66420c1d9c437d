//! Secure Token Storage
//!
//! Persists the single [`TokenRecord`] the client holds, serialized as JSON,
//! in the host's [`SecureStore`] (Keychain, Credential Manager, Secret
//! Service, ...).
//!
//! - Token values are never logged or placed in error messages
//! - A record that no longer deserializes is erased and reported as absent
//! - `save` is a single `set_secret` call, so readers observe either the old
//!   record or the new one
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::TokenStore;
//! use std::sync::Arc;
//! # use bridge_traits::storage::SecureStore;
//! # async fn example(secure_store: Arc<dyn SecureStore>) -> core_auth::Result<()> {
//! let token_store = TokenStore::new(secure_store);
//!
//! if let Some(record) = token_store.load().await {
//!     println!("access token expires at {}", record.access_expiry);
//! }
//!
//! token_store.clear().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::TokenRecord;
use bridge_traits::storage::SecureStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Secure-store key of the identity provider's token record.
pub const DEFAULT_TOKEN_KEY: &str = "oauth_tokens:discord";

#[derive(Clone)]
pub struct TokenStore {
    secure_store: Arc<dyn SecureStore>,
    key: String,
}

impl TokenStore {
    pub fn new(secure_store: Arc<dyn SecureStore>) -> Self {
        Self::with_key(secure_store, DEFAULT_TOKEN_KEY)
    }

    /// Create a store that keeps its record under a custom key.
    pub fn with_key(secure_store: Arc<dyn SecureStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        debug!(key = %key, "Initializing TokenStore");
        Self { secure_store, key }
    }

    /// Return the persisted record, or `None` when there is none.
    ///
    /// Never fails: an unreadable secure store is logged and treated as
    /// "absent", and a corrupted record is deleted.
    pub async fn load(&self) -> Option<TokenRecord> {
        let data = match self.secure_store.get_secret(&self.key).await {
            Ok(Some(data)) => data,
            Ok(None) => {
                debug!(key = %self.key, "No tokens found in storage");
                return None;
            }
            Err(e) => {
                warn!(
                    key = %self.key,
                    error = %e,
                    "Failed to read tokens from secure storage"
                );
                return None;
            }
        };

        match serde_json::from_slice::<TokenRecord>(&data) {
            Ok(record) => {
                debug!(
                    key = %self.key,
                    access_expiry = %record.access_expiry,
                    "Tokens loaded"
                );
                Some(record)
            }
            Err(e) => {
                warn!(
                    key = %self.key,
                    error = %e,
                    "Failed to deserialize tokens, they may be corrupted"
                );

                if let Err(delete_err) = self.secure_store.delete_secret(&self.key).await {
                    warn!(
                        key = %self.key,
                        error = %delete_err,
                        "Failed to delete corrupted token data"
                    );
                }

                None
            }
        }
    }

    /// Overwrite the persisted record.
    pub async fn save(&self, record: &TokenRecord) -> Result<()> {
        let json = serde_json::to_vec(record).map_err(|e| {
            warn!(key = %self.key, error = %e, "Failed to serialize tokens");
            AuthError::Serialization(format!("token record: {}", e))
        })?;

        self.secure_store
            .set_secret(&self.key, &json)
            .await
            .map_err(|e| {
                warn!(
                    key = %self.key,
                    error = %e,
                    "Failed to store tokens in secure storage"
                );
                AuthError::SecureStorageUnavailable(e.to_string())
            })?;

        info!(
            key = %self.key,
            has_refresh_token = !record.refresh_token.is_empty(),
            "Tokens stored securely"
        );
        Ok(())
    }

    /// Remove the persisted record. Idempotent.
    pub async fn clear(&self) -> Result<()> {
        self.secure_store
            .delete_secret(&self.key)
            .await
            .map_err(|e| {
                warn!(
                    key = %self.key,
                    error = %e,
                    "Failed to delete tokens from secure storage"
                );
                AuthError::SecureStorageUnavailable(e.to_string())
            })?;

        info!(key = %self.key, "Tokens cleared");
        Ok(())
    }

    /// Pure expiry predicate; see [`TokenRecord::is_access_expired`].
    pub fn is_access_expired(record: &TokenRecord, now: DateTime<Utc>) -> bool {
        record.is_access_expired(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemorySecureStore;
    use chrono::{Duration, TimeZone};

    fn record(access: &str) -> TokenRecord {
        let issued = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        TokenRecord {
            access_token: access.to_string(),
            refresh_token: format!("{}-refresh", access),
            access_expiry: issued + Duration::hours(1),
            refresh_expiry: Some(issued + Duration::days(30)),
        }
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let store = TokenStore::new(Arc::new(MemorySecureStore::new()));

        store.save(&record("first")).await.unwrap();
        assert_eq!(store.load().await, Some(record("first")));
    }

    #[tokio::test]
    async fn test_load_absent() {
        let store = TokenStore::new(Arc::new(MemorySecureStore::new()));
        assert_eq!(store.load().await, None);
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let store = TokenStore::new(Arc::new(MemorySecureStore::new()));

        store.save(&record("first")).await.unwrap();
        store.save(&record("second")).await.unwrap();

        assert_eq!(store.load().await, Some(record("second")));
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let secure_store = Arc::new(MemorySecureStore::new());
        let store = TokenStore::new(secure_store.clone());

        store.save(&record("first")).await.unwrap();
        store.clear().await.unwrap();
        store.clear().await.unwrap();

        assert_eq!(store.load().await, None);
        assert!(!secure_store.contains(DEFAULT_TOKEN_KEY).await);
    }

    #[tokio::test]
    async fn test_corrupted_record_is_erased() {
        let secure_store = Arc::new(MemorySecureStore::new());
        secure_store
            .set_secret(DEFAULT_TOKEN_KEY, b"{not json")
            .await
            .unwrap();
        let store = TokenStore::new(secure_store.clone());

        assert_eq!(store.load().await, None);
        assert!(!secure_store.contains(DEFAULT_TOKEN_KEY).await);
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let secure_store = Arc::new(MemorySecureStore::new());
        secure_store.fail_with("keychain locked");
        let store = TokenStore::new(secure_store);

        assert_eq!(store.load().await, None);
        assert!(matches!(
            store.save(&record("first")).await,
            Err(AuthError::SecureStorageUnavailable(_))
        ));
        assert!(matches!(
            store.clear().await,
            Err(AuthError::SecureStorageUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_custom_key() {
        let secure_store = Arc::new(MemorySecureStore::new());
        let store = TokenStore::with_key(secure_store.clone(), "oauth_tokens:staging");

        store.save(&record("first")).await.unwrap();
        assert!(secure_store.contains("oauth_tokens:staging").await);
        assert!(!secure_store.contains(DEFAULT_TOKEN_KEY).await);
    }

    #[test]
    fn test_is_access_expired() {
        let record = record("first");
        let before = record.access_expiry - Duration::seconds(1);

        assert!(!TokenStore::is_access_expired(&record, before));
        assert!(TokenStore::is_access_expired(&record, record.access_expiry));
    }
}
