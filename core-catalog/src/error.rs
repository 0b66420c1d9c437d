use core_auth::AuthError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    /// Catalog request failed; `status_code` is `None` for transport
    /// failures and timeouts.
    #[error("Catalog fetch failed{}", status_suffix(.status_code))]
    CatalogFetch { status_code: Option<u16> },

    #[error("Asset fetch failed{}", status_suffix(.status_code))]
    AssetFetch { status_code: Option<u16> },

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Asset cache error: {0}")]
    Cache(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

fn status_suffix(status_code: &Option<u16>) -> String {
    match status_code {
        Some(code) => format!(" with status {}", code),
        None => String::new(),
    }
}

impl CatalogError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            CatalogError::CatalogFetch { status_code } | CatalogError::AssetFetch { status_code } => {
                *status_code
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
