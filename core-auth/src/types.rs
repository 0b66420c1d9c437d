use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AuthError, Result};

/// Longest lifetime honoured from a token response (100 years). Larger
/// values are clamped so the expiry stays representable.
pub const MAX_TOKEN_LIFETIME_SECS: i64 = 100 * 365 * 24 * 60 * 60;

fn expiry_after(now: DateTime<Utc>, lifetime_secs: i64) -> DateTime<Utc> {
    let lifetime = Duration::seconds(lifetime_secs.clamp(0, MAX_TOKEN_LIFETIME_SECS));
    now.checked_add_signed(lifetime).unwrap_or(now)
}

/// Access/refresh token pair with expiry metadata.
///
/// A record only exists after a successful exchange or refresh; "no record"
/// means the user never signed in or the tokens were cleared.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use core_auth::TokenRecord;
///
/// let now = Utc::now();
/// let record = TokenRecord {
///     access_token: "access".to_string(),
///     refresh_token: "refresh".to_string(),
///     access_expiry: now + Duration::minutes(10),
///     refresh_expiry: Some(now + Duration::days(30)),
/// };
///
/// assert!(!record.is_access_expired(now));
/// assert!(record.is_access_expired(now + Duration::minutes(10)));
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expiry: DateTime<Utc>,
    /// `None` when the backend did not declare a refresh lifetime.
    #[serde(default)]
    pub refresh_expiry: Option<DateTime<Utc>>,
}

impl TokenRecord {
    /// Build a record from a backend token response received at `now`.
    ///
    /// # Errors
    ///
    /// [`AuthError::Serialization`] when the response carries no access token.
    pub fn from_response(response: TokenResponse, now: DateTime<Utc>) -> Result<Self> {
        if response.access_token.is_empty() {
            return Err(AuthError::Serialization(
                "token response carried an empty access token".to_string(),
            ));
        }

        let refresh_expiry = (response.refresh_token_expires_in > 0)
            .then(|| expiry_after(now, response.refresh_token_expires_in));

        Ok(Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            access_expiry: expiry_after(now, response.access_token_expires_in),
            refresh_expiry,
        })
    }

    /// `true` once `now` has reached the access expiry.
    pub fn is_access_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.access_expiry
    }

    /// Whether a silent refresh is worth attempting at `now`.
    pub fn can_refresh(&self, now: DateTime<Utc>) -> bool {
        !self.refresh_token.is_empty() && self.refresh_expiry.map_or(true, |expiry| now < expiry)
    }
}

// Custom Debug implementation to avoid logging tokens
impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("access_expiry", &self.access_expiry)
            .field("refresh_expiry", &self.refresh_expiry)
            .finish()
    }
}

/// Token payload returned by the exchange and refresh endpoints.
///
/// Lifetimes are in seconds.
#[derive(Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_access_expires_in")]
    pub access_token_expires_in: i64,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub refresh_token_expires_in: i64,
}

fn default_access_expires_in() -> i64 {
    3600
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("access_token_expires_in", &self.access_token_expires_in)
            .field("refresh_token", &"[REDACTED]")
            .field("refresh_token_expires_in", &self.refresh_token_expires_in)
            .finish()
    }
}

/// One interactive authorization attempt.
///
/// Lives for a single authorization and is never persisted.
#[derive(Clone)]
pub struct AuthorizationRequest {
    pub authorization_url: String,
    pub redirect_uri: String,
    pub code_verifier: String,
    pub state: String,
}

impl fmt::Debug for AuthorizationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationRequest")
            .field("redirect_uri", &self.redirect_uri)
            .field("code_verifier", &"[REDACTED]")
            .field("state", &self.state)
            .finish()
    }
}
