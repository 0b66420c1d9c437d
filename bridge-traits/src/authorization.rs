//! Interactive Authorization Abstraction
//!
//! The consent step of a delegated authorization flow happens outside the
//! process: the user is sent to the identity provider in a browser (or web
//! view) and the provider redirects back with a short-lived code. Hosts
//! implement [`AuthorizationPrompt`] with whatever redirect facility the
//! platform offers.

use async_trait::async_trait;

use crate::error::Result;

/// Result of presenting the authorization page to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    /// The provider redirected back with a code.
    Code { code: String, state: String },
    /// The user closed the page or denied consent.
    Cancelled,
}

#[async_trait]
pub trait AuthorizationPrompt: Send + Sync {
    /// Redirect URI the provider should send the user back to.
    ///
    /// The value is embedded in the authorization URL and repeated verbatim
    /// in the code exchange.
    fn redirect_uri(&self) -> String;

    /// Present `authorization_url` to the user and suspend until the
    /// provider redirects back or the user gives up.
    ///
    /// # Errors
    ///
    /// Returns an error when the redirect mechanism itself fails (browser
    /// could not be opened, callback listener could not bind). A user
    /// declining consent is not an error; it is
    /// [`AuthorizationOutcome::Cancelled`].
    async fn authorize(&self, authorization_url: &str) -> Result<AuthorizationOutcome>;
}
