//! # Asset Cache
//!
//! Resolves an asset id to a local file, downloading it on first use.
//!
//! Cached files live in `<cache dir>/<subdirectory>/audio-<sanitized id>.<ext>`
//! where `<ext>` comes from the response's `Content-Type`. Entries are
//! immutable once written and are never revalidated or evicted. Lookup picks
//! the first file (in name order) starting with `audio-<sanitized id>.`.
//!
//! Downloads are written under a hidden `.partial-` name and renamed into
//! place, so an interrupted write never turns into a cache hit. Partial files
//! left behind by an earlier process are swept on the first fetch.

use crate::client::{AuthorizedClient, FetchKind};
use crate::error::{CatalogError, Result};
use bridge_traits::storage::FileSystemAccess;
use core_runtime::events::{AssetEvent, CoreEvent, EventBus};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

pub const ASSET_PATH: &str = "/Audio";

const FILE_PREFIX: &str = "audio-";
const PARTIAL_PREFIX: &str = ".partial-";
const FALLBACK_EXTENSION: &str = "audio";

static PARTIAL_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// File stem shared by every cached variant of `id`.
pub fn cache_base_name(id: &str) -> String {
    format!("{}{}", FILE_PREFIX, sanitize_id(id))
}

/// Map a `Content-Type` header value to a file extension.
///
/// Parameters and case are ignored. Unknown `audio/<x>` subtypes map to
/// `<x>`; anything else, including a missing header, maps to `audio`.
pub fn extension_for_content_type(content_type: Option<&str>) -> String {
    let Some(content_type) = content_type else {
        return FALLBACK_EXTENSION.to_string();
    };

    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let known = match mime.as_str() {
        "audio/mpeg" => Some("mp3"),
        "audio/mp4" | "audio/x-m4a" => Some("m4a"),
        "audio/aac" => Some("aac"),
        "audio/wav" => Some("wav"),
        "audio/flac" => Some("flac"),
        "audio/ogg" => Some("ogg"),
        "audio/webm" => Some("webm"),
        _ => None,
    };
    if let Some(extension) = known {
        return extension.to_string();
    }

    match mime.strip_prefix("audio/") {
        Some(subtype) if !subtype.is_empty() => sanitize_id(subtype),
        _ => FALLBACK_EXTENSION.to_string(),
    }
}

pub struct AssetCache {
    fs: Arc<dyn FileSystemAccess>,
    client: AuthorizedClient,
    api_base_url: String,
    subdirectory: String,
    event_bus: Option<EventBus>,
    swept: OnceCell<()>,
}

impl AssetCache {
    pub fn new(
        fs: Arc<dyn FileSystemAccess>,
        client: AuthorizedClient,
        api_base_url: impl Into<String>,
        subdirectory: impl Into<String>,
    ) -> Self {
        Self {
            fs,
            client,
            api_base_url: api_base_url.into(),
            subdirectory: subdirectory.into(),
            event_bus: None,
            swept: OnceCell::new(),
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Directory holding the cached files; created if missing.
    pub async fn cache_directory(&self) -> Result<PathBuf> {
        let root = self
            .fs
            .get_cache_directory()
            .await
            .map_err(|e| CatalogError::Cache(format!("cache root unavailable: {}", e)))?;
        let dir = root.join(&self.subdirectory);

        self.fs
            .create_dir_all(&dir)
            .await
            .map_err(|e| CatalogError::Cache(format!("failed to create {:?}: {}", dir, e)))?;

        Ok(dir)
    }

    /// Return a local path holding asset `id`, downloading it on a miss.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::AssetFetch`] for a non-2xx answer (after the single
    ///   re-authorization retry) or a transport failure
    /// - [`CatalogError::Auth`] when no token can be obtained
    /// - [`CatalogError::Cache`] when the cache directory cannot be used
    #[instrument(skip(self))]
    pub async fn fetch_asset(&self, id: &str) -> Result<PathBuf> {
        let base_name = cache_base_name(id);
        let dir = self.cache_directory().await?;
        self.swept
            .get_or_init(|| self.sweep_partials(&dir))
            .await;

        if let Some(path) = self.find_cached(&dir, &base_name).await? {
            debug!(path = ?path, "Cache hit");
            return Ok(path);
        }

        let url = format!(
            "{}{}/{}",
            self.api_base_url,
            ASSET_PATH,
            urlencoding::encode(id)
        );
        let response = self.client.get(&url, FetchKind::Asset).await?;

        let extension = extension_for_content_type(response.header("content-type"));
        let target = dir.join(format!("{}.{}", base_name, extension));
        let size = response.body.len() as u64;

        self.write_atomically(&dir, &base_name, &target, response.body)
            .await?;

        info!(path = ?target, bytes = size, "Asset cached");
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Asset(AssetEvent::AssetCached {
                id: id.to_string(),
                path: target.to_string_lossy().into_owned(),
                bytes: size,
            }));
        }

        Ok(target)
    }

    /// Delete partial downloads abandoned by an earlier run. Failures only
    /// cost disk space, so they are logged and skipped.
    async fn sweep_partials(&self, dir: &Path) {
        let entries = match self.fs.list_directory(dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!(error = %e, "Skipping partial file sweep");
                return;
            }
        };

        let mut removed = 0usize;
        for path in entries {
            let is_partial = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(PARTIAL_PREFIX));
            if !is_partial {
                continue;
            }
            match self.fs.delete_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) => debug!(path = ?path, error = %e, "Could not remove partial file"),
            }
        }

        if removed > 0 {
            info!(count = removed, "Removed abandoned partial downloads");
        }
    }

    async fn find_cached(&self, dir: &Path, base_name: &str) -> Result<Option<PathBuf>> {
        let prefix = format!("{}.", base_name);

        let mut matches: Vec<PathBuf> = self
            .fs
            .list_directory(dir)
            .await
            .map_err(|e| CatalogError::Cache(format!("failed to list {:?}: {}", dir, e)))?
            .into_iter()
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(&prefix))
            })
            .collect();

        matches.sort();
        Ok(matches.into_iter().next())
    }

    async fn write_atomically(
        &self,
        dir: &Path,
        base_name: &str,
        target: &Path,
        body: bytes::Bytes,
    ) -> Result<()> {
        let partial = dir.join(format!(
            "{}{}-{}-{}",
            PARTIAL_PREFIX,
            base_name,
            std::process::id(),
            PARTIAL_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        let written = match self.fs.write_file(&partial, body).await {
            Ok(()) => self.fs.rename(&partial, target).await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            warn!(path = ?target, error = %e, "Failed to write cached asset");
            if let Err(cleanup) = self.fs.delete_file(&partial).await {
                debug!(error = %cleanup, "No partial file to clean up");
            }
            return Err(CatalogError::Cache(format!(
                "failed to write {:?}: {}",
                target, e
            )));
        }

        Ok(())
    }
}
