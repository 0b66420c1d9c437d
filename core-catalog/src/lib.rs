//! # Catalog & Asset Access
//!
//! Authenticated reads against the audio API:
//!
//! - [`CatalogClient`] fetches the list of [`AudioTrackDescriptor`]s
//! - [`AssetCache`] resolves an asset id to a local file, downloading on a miss
//! - [`build_shareable_link`] formats a public link for an asset
//!
//! Both network paths go through [`AuthorizedClient`], which attaches the
//! bearer token and re-authorizes at most once when the server answers 401.

pub mod cache;
pub mod catalog;
pub mod client;
pub mod error;
pub mod links;
pub mod models;

pub use cache::{extension_for_content_type, sanitize_id, AssetCache};
pub use catalog::CatalogClient;
pub use client::{AuthorizedClient, FetchKind};
pub use error::{CatalogError, Result};
pub use links::build_shareable_link;
pub use models::AudioTrackDescriptor;
