use crate::client::{AuthorizedClient, FetchKind};
use crate::error::{CatalogError, Result};
use crate::models::AudioTrackDescriptor;
use tracing::{info, instrument, warn};

pub const CATALOG_PATH: &str = "/Audio?enriched=true";

/// Reads the remote audio catalog.
pub struct CatalogClient {
    client: AuthorizedClient,
    api_base_url: String,
}

impl CatalogClient {
    pub fn new(client: AuthorizedClient, api_base_url: impl Into<String>) -> Self {
        Self {
            client,
            api_base_url: api_base_url.into(),
        }
    }

    /// Fetch every track descriptor, verbatim.
    #[instrument(skip(self))]
    pub async fn fetch_catalog(&self) -> Result<Vec<AudioTrackDescriptor>> {
        let url = format!("{}{}", self.api_base_url, CATALOG_PATH);
        let response = self.client.get(&url, FetchKind::Catalog).await?;

        let tracks: Vec<AudioTrackDescriptor> = response.json().map_err(|e| {
            warn!(error = %e, "Catalog response did not parse");
            CatalogError::InvalidResponse(format!("catalog: {}", e))
        })?;

        info!(count = tracks.len(), "Fetched audio catalog");
        Ok(tracks)
    }
}
