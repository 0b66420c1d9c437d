//! Storage and File System Abstractions
//!
//! Provides platform-agnostic traits for file I/O, secure credential storage,
//! and key-value settings storage.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// File system access used by the on-disk asset cache.
///
/// Paths handed to these methods are absolute paths rooted in the directory
/// returned by [`FileSystemAccess::get_cache_directory`].
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Root directory the host allows the core to cache files in.
    async fn get_cache_directory(&self) -> Result<PathBuf>;

    /// Create a directory and all parents. Succeeds if it already exists.
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;

    /// Move `from` to `to`, replacing any existing file at `to`.
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// List the immediate entries of a directory as full paths.
    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>>;
}

/// Credential persistence backed by the platform's secure store
/// (Keychain, Credential Manager, Secret Service).
#[async_trait]
pub trait SecureStore: Send + Sync {
    /// Store a secret, replacing any previous value for `key` in one step.
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()>;

    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Remove a secret. Deleting a missing key succeeds.
    async fn delete_secret(&self, key: &str) -> Result<()>;
}

/// Host-owned key-value preferences.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn list_keys(&self) -> Result<Vec<String>>;
}
