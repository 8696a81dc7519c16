//! # bazaar-storage — Shared-filesystem tree for models, data, and uploads
//!
//! The control plane and every job it launches share one filesystem. This
//! crate exposes that tree through the [`Storage`] trait, rooted at a
//! configured base directory so callers only ever see relative paths:
//!
//! ```text
//! models/{model_id}/model/…      model artifacts
//! data/{model_id}/…              training data, configs
//! uploads/{upload_id}/…          staged user uploads
//! logs/…                         control-plane logs
//! ```
//!
//! Paths are validated before use: absolute paths and parent-traversal
//! segments are rejected, so no caller can escape the base directory.
//!
//! There is no in-process locking. Each job writes into a unique model-scoped
//! subtree, so concurrent writers to the same path do not arise in practice;
//! if they did, last-writer-wins.

mod error;
mod local;

pub use error::StorageError;
pub use local::LocalStorage;

use std::pin::Pin;

use bytes::Bytes;
use tokio::io::AsyncRead;

/// A boxed async reader handed out for streaming reads.
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

/// Filesystem usage snapshot for the volume backing the base directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StorageUsage {
    pub total_bytes: u64,
    pub free_bytes: u64,
}

/// Read/write/list access to the shared filesystem tree.
///
/// All paths are relative to the implementation's base directory. Writes
/// create missing parent directories.
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    /// Read an entire file into memory.
    async fn read(&self, path: &str) -> Result<Bytes, StorageError>;

    /// Open a file for streaming reads (downloads, log tails).
    async fn open_reader(&self, path: &str) -> Result<ByteStream, StorageError>;

    /// Write a file, replacing any previous content.
    async fn write(&self, path: &str, contents: Bytes) -> Result<(), StorageError>;

    /// Append to a file, creating it if absent.
    async fn append(&self, path: &str, contents: Bytes) -> Result<(), StorageError>;

    /// Delete a file or directory subtree. Deleting a missing path is an error.
    async fn delete(&self, path: &str) -> Result<(), StorageError>;

    /// List the entries directly under a directory (names, not paths).
    async fn list(&self, path: &str) -> Result<Vec<String>, StorageError>;

    /// Whether a file or directory exists at the path.
    async fn exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Size in bytes: file length, or recursive total for a directory.
    async fn size(&self, path: &str) -> Result<u64, StorageError>;

    /// Zip a file or directory subtree into `{path}.zip`, returning the
    /// archive's relative path.
    async fn zip(&self, path: &str) -> Result<String, StorageError>;

    /// Extract a zip archive into the given destination directory.
    async fn unzip(&self, archive: &str, dest: &str) -> Result<(), StorageError>;

    /// Move a subtree to a new relative path (staging uploads into data dirs).
    async fn rename(&self, from: &str, to: &str) -> Result<(), StorageError>;

    /// Usage of the volume backing the base directory.
    async fn usage(&self) -> Result<StorageUsage, StorageError>;

    /// Absolute location of the base directory, for job templates that mount it.
    fn location(&self) -> &str;
}
