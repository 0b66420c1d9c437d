//! Bearer-authenticated GET with a single re-authorization retry.

use crate::error::{CatalogError, Result};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use core_auth::AccessTokenProvider;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Which public operation a request belongs to; selects the error variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Catalog,
    Asset,
}

impl FetchKind {
    fn failure(self, status_code: Option<u16>) -> CatalogError {
        match self {
            FetchKind::Catalog => CatalogError::CatalogFetch { status_code },
            FetchKind::Asset => CatalogError::AssetFetch { status_code },
        }
    }
}

#[derive(Clone)]
pub struct AuthorizedClient {
    http_client: Arc<dyn HttpClient>,
    tokens: Arc<dyn AccessTokenProvider>,
    request_timeout: Duration,
}

impl AuthorizedClient {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        tokens: Arc<dyn AccessTokenProvider>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            http_client,
            tokens,
            request_timeout,
        }
    }

    /// GET `url` with a bearer token and return the 2xx response.
    ///
    /// A 401 clears the stored tokens, obtains a new token and retries
    /// exactly once; whatever the retry returns is final. A failure to clear
    /// the tokens is logged and does not stop the retry.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::Auth`] when no token can be obtained
    /// - `kind`'s fetch error with the status of the last response, or
    ///   `None` when the request never got one
    pub async fn get(&self, url: &str, kind: FetchKind) -> Result<HttpResponse> {
        let token = self.tokens.get_access_token().await?;
        let mut response = self.send(url, &token, kind).await?;

        if response.is_unauthorized() {
            info!(?kind, "Access token rejected, re-authorizing once");
            if let Err(e) = self.tokens.invalidate().await {
                warn!(?kind, error = %e, "Could not clear rejected tokens, retrying anyway");
            }

            let token = self.tokens.get_access_token().await?;
            response = self.send(url, &token, kind).await?;
        }

        if !response.is_success() {
            warn!(?kind, status = response.status, "Request failed");
            return Err(kind.failure(Some(response.status)));
        }

        Ok(response)
    }

    async fn send(&self, url: &str, token: &str, kind: FetchKind) -> Result<HttpResponse> {
        let request = HttpRequest::new(HttpMethod::Get, url)
            .bearer_token(token)
            .timeout(self.request_timeout);

        debug!(?kind, url = url, "Sending authorized request");

        self.http_client.execute(request).await.map_err(|e| {
            warn!(?kind, error = %e, timed_out = e.is_timeout(), "Request did not complete");
            kind.failure(None)
        })
    }
}
